//! Convergence checker
//!
//! After an add commits, public resolvers take a while to see the new
//! delegation. The checker waits once (so the first negative answer is not
//! cached), then resolves the verification domain at a fixed interval until
//! it has seen `required_successes` consecutive successes.
//!
//! ## State Machine
//!
//! ```text
//! Waiting ──(initial delay)──▶ Polling(0)
//! Polling(n) ──ok──▶ Polling(n+1)   if n+1 < required
//! Polling(n) ──ok──▶ Converged      if n+1 = required
//! Polling(n) ──fail─▶ Polling(0)
//! ```
//!
//! A failed resolution only resets progress. The loop itself has no upper
//! bound; the caller picks a [`Deadline`] and gets
//! `Error::ConvergenceTimeout` when it fires.

use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, info, warn};

use crate::config::ConvergenceConfig;
use crate::error::{Error, Result};
use crate::traits::ResolutionCheck;

/// How long the caller is willing to wait for convergence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Wait until converged or externally terminated
    Unbounded,
    /// Give up after this long (measured from the start of the check,
    /// including the initial delay)
    Within(Duration),
}

/// Progress of a convergence check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    /// Initial delay has not elapsed yet
    Waiting,
    /// Polling with this many consecutive successes so far
    Polling(u32),
    /// Required successes observed (terminal)
    Converged,
}

impl ConvergenceState {
    /// Leave the initial delay
    pub fn start_polling(self) -> Self {
        match self {
            ConvergenceState::Waiting => ConvergenceState::Polling(0),
            other => other,
        }
    }

    /// Apply one resolution result
    pub fn observe(self, resolved: bool, required: u32) -> Self {
        match self {
            ConvergenceState::Polling(n) if resolved => {
                if n + 1 >= required {
                    ConvergenceState::Converged
                } else {
                    ConvergenceState::Polling(n + 1)
                }
            }
            ConvergenceState::Polling(_) => ConvergenceState::Polling(0),
            other => other,
        }
    }

    /// Whether the terminal state was reached
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceState::Converged)
    }
}

/// Summary of a successful convergence check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Domain that was polled
    pub domain: String,
    /// Total resolution attempts
    pub attempts: u32,
    /// How many times progress was reset by a failed resolution
    pub resets: u32,
    /// Time from start of check to convergence
    pub elapsed: Duration,
}

/// Polls a [`ResolutionCheck`] until the domain resolves reliably
pub struct ConvergenceChecker<'a> {
    resolver: &'a dyn ResolutionCheck,
    required_successes: u32,
    poll_interval: Duration,
    initial_delay: Duration,
}

impl<'a> ConvergenceChecker<'a> {
    /// Create a checker from configuration
    pub fn new(resolver: &'a dyn ResolutionCheck, config: &ConvergenceConfig) -> Self {
        Self {
            resolver,
            required_successes: config.required_successes.max(1),
            poll_interval: config.poll_interval(),
            initial_delay: config.initial_delay(),
        }
    }

    /// Wait for `domain` to converge within `deadline`
    ///
    /// # Returns
    ///
    /// - `Ok(ConvergenceReport)`: Required consecutive successes observed
    /// - `Err(Error::ConvergenceTimeout)`: The deadline fired first
    pub async fn wait_for(&self, domain: &str, deadline: Deadline) -> Result<ConvergenceReport> {
        let started = Instant::now();

        match deadline {
            Deadline::Unbounded => {
                info!("Waiting for {} to converge (no deadline)", domain);
                Ok(self.poll(domain, started).await)
            }
            Deadline::Within(limit) => {
                info!("Waiting for {} to converge (deadline {:?})", domain, limit);
                tokio::time::timeout(limit, self.poll(domain, started))
                    .await
                    .map_err(|_| {
                        warn!("{} did not converge within {:?}", domain, limit);
                        Error::ConvergenceTimeout {
                            domain: domain.to_string(),
                            required: self.required_successes,
                            elapsed: started.elapsed(),
                        }
                    })
            }
        }
    }

    async fn poll(&self, domain: &str, started: Instant) -> ConvergenceReport {
        let mut state = ConvergenceState::Waiting;

        debug!(
            "Sleeping {:?} before the first resolution of {}",
            self.initial_delay, domain
        );
        tokio::time::sleep(self.initial_delay).await;
        state = state.start_polling();

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        let mut attempts = 0u32;
        let mut resets = 0u32;

        while ticks.next().await.is_some() {
            attempts += 1;
            let resolved = self.resolver.resolves(domain).await;
            let next = state.observe(resolved, self.required_successes);

            match next {
                ConvergenceState::Converged => {
                    let elapsed = started.elapsed();
                    info!(
                        "{} converged after {} attempt(s) in {:?}",
                        domain, attempts, elapsed
                    );
                    return ConvergenceReport {
                        domain: domain.to_string(),
                        attempts,
                        resets,
                        elapsed,
                    };
                }
                ConvergenceState::Polling(n) if resolved => {
                    info!(
                        "{} resolved ({}/{})",
                        domain, n, self.required_successes
                    );
                }
                _ => {
                    if matches!(state, ConvergenceState::Polling(n) if n > 0) {
                        resets += 1;
                        warn!("{} failed to resolve, resetting success count", domain);
                    } else {
                        debug!("{} does not resolve yet", domain);
                    }
                }
            }

            state = next;
        }

        unreachable!("interval streams never end")
    }
}
