//! Configuration types for the delegation reconciler
//!
//! This module defines all configuration structures used throughout the crate.

use crate::convergence::Deadline;
use crate::record::DEFAULT_TTL;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Reconciliation branch selected by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Publish the desired name servers
    Add,
    /// Delete the delegation record
    Remove,
}

impl FromStr for Action {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Action::Add),
            "remove" => Ok(Action::Remove),
            other => Err(crate::Error::config(format!(
                "Unknown action '{}'. Valid actions: add, remove",
                other
            ))),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Add => write!(f, "add"),
            Action::Remove => write!(f, "remove"),
        }
    }
}

/// Main reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Which branch to run
    pub action: Action,

    /// Target managed zone
    pub zone: String,

    /// Delegation record name within the zone
    pub record_name: String,

    /// TTL applied to added records
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Whether to wait for resolution after a successful add
    #[serde(default)]
    pub verify_after_add: bool,

    /// Label prepended to the record name to build the verification domain
    #[serde(default = "default_verify_prefix")]
    pub verify_prefix: String,

    /// Convergence settings
    #[serde(default)]
    pub convergence: ConvergenceConfig,
}

impl ReconcileConfig {
    /// Create a configuration with defaults for everything but identity
    pub fn new(action: Action, zone: impl Into<String>, record_name: impl Into<String>) -> Self {
        Self {
            action,
            zone: zone.into(),
            record_name: record_name.into(),
            ttl: default_ttl(),
            verify_after_add: false,
            verify_prefix: default_verify_prefix(),
            convergence: ConvergenceConfig::default(),
        }
    }

    /// Enable verification after add
    pub fn with_verification(mut self, convergence: ConvergenceConfig) -> Self {
        self.verify_after_add = true;
        self.convergence = convergence;
        self
    }

    /// Set the TTL for added records
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.zone.trim().is_empty() {
            return Err(crate::Error::config("Zone identifier cannot be empty"));
        }
        if self.record_name.trim().trim_end_matches('.').is_empty() {
            return Err(crate::Error::config("Record name cannot be empty"));
        }
        if self.ttl == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        if self.verify_after_add {
            if self.verify_prefix.trim().is_empty() || self.verify_prefix.contains('.') {
                return Err(crate::Error::config(
                    "Verification prefix must be a single non-empty label",
                ));
            }
            self.convergence.validate()?;
        }
        Ok(())
    }

    /// Whether this run ends with a convergence check
    pub fn wants_verification(&self) -> bool {
        self.action == Action::Add && self.verify_after_add
    }

    /// Domain polled by the convergence checker (`<prefix>.<record-name>`)
    pub fn verification_domain(&self) -> String {
        format!(
            "{}.{}",
            self.verify_prefix.trim(),
            self.record_name.trim().trim_end_matches('.')
        )
    }
}

/// Convergence checker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    /// Consecutive successful resolutions needed
    #[serde(default = "default_required_successes")]
    pub required_successes: u32,

    /// Delay between resolution attempts (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Delay before the first attempt (in seconds)
    ///
    /// Querying too early lets resolvers cache the negative answer.
    #[serde(default = "default_initial_delay_secs")]
    pub initial_delay_secs: u64,

    /// Overall deadline in seconds; `None` waits forever
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

impl ConvergenceConfig {
    /// Validate the convergence configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.required_successes == 0 {
            return Err(crate::Error::config("Required successes must be > 0"));
        }
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.timeout_secs == Some(0) {
            return Err(crate::Error::config(
                "Verification timeout must be > 0 (use 'none' to wait forever)",
            ));
        }
        Ok(())
    }

    /// Delay between attempts
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Delay before the first attempt
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Deadline derived from `timeout_secs`
    pub fn deadline(&self) -> Deadline {
        match self.timeout_secs {
            Some(secs) => Deadline::Within(Duration::from_secs(secs)),
            None => Deadline::Unbounded,
        }
    }
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            required_successes: default_required_successes(),
            poll_interval_secs: default_poll_interval_secs(),
            initial_delay_secs: default_initial_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_verify_prefix() -> String {
    "pcf".to_string()
}

fn default_required_successes() -> u32 {
    3
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_initial_delay_secs() -> u64 {
    90
}

fn default_timeout_secs() -> Option<u64> {
    Some(1800)
}
