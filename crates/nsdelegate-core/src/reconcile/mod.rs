//! Transaction engine
//!
//! Compares the desired delegation with the record currently held by the
//! zone and applies the difference as a single atomic provider transaction.
//!
//! ## Branches
//!
//! ```text
//!               │ record absent        │ record present
//! ──────────────┼──────────────────────┼───────────────────────────────
//!  add          │ add(desired)         │ remove(existing), add(desired)
//!  remove       │ no-op (no txn)       │ remove(existing)
//! ```
//!
//! ## Invariants
//!
//! - Removals carry the values read from the zone, never the desired ones
//! - All removes are queued before all adds
//! - Adds use the run's TTL; the old record's TTL is not carried over
//! - The full existing record is replaced even when it overlaps the desired
//!   set; no per-value diff is computed
//! - A transaction that fails to commit is aborted, and one that is dropped
//!   before commit is discarded
//! - Against a dry-run provider the transaction still runs end to end, but
//!   the outcome is [`ReconcileOutcome::DryRun`] and counts as uncommitted

use std::fmt;

use crate::config::Action;
use crate::error::{Error, Result};
use crate::record::{DelegationRecord, NameServerSet, canonical_name};
use crate::traits::{ZoneProvider, ZoneTransaction};
use tracing::{debug, info, warn};

/// What the caller wants the zone to look like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    /// Add or remove
    pub action: Action,
    /// Absolute record name
    pub record_name: String,
    /// Candidate name servers (may be empty only for remove)
    pub name_servers: NameServerSet,
}

impl DesiredState {
    /// Desired state for an add
    pub fn add(record_name: &str, name_servers: NameServerSet) -> Self {
        Self {
            action: Action::Add,
            record_name: canonical_name(record_name),
            name_servers,
        }
    }

    /// Desired state for a remove
    pub fn remove(record_name: &str, name_servers: NameServerSet) -> Self {
        Self {
            action: Action::Remove,
            record_name: canonical_name(record_name),
            name_servers,
        }
    }
}

/// Result of a reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do (remove of an absent record)
    Unchanged {
        /// The record name that was checked
        record_name: String,
    },
    /// The record was deleted
    Removed {
        /// The record as it was before removal
        previous: DelegationRecord,
    },
    /// The record was replaced
    Replaced {
        /// The record before the transaction
        previous: DelegationRecord,
        /// The record after the transaction
        current: DelegationRecord,
    },
    /// The record was created
    Added {
        /// The record after the transaction
        current: DelegationRecord,
    },
    /// The provider only logged the transaction; the zone is untouched
    DryRun {
        /// Record that would have been removed
        previous: Option<DelegationRecord>,
        /// Record that would have been added
        proposed: Option<DelegationRecord>,
    },
}

impl ReconcileOutcome {
    /// Whether a transaction was committed
    pub fn committed(&self) -> bool {
        !matches!(
            self,
            ReconcileOutcome::Unchanged { .. } | ReconcileOutcome::DryRun { .. }
        )
    }

    /// The record held by the zone after this outcome
    ///
    /// `None` for a dry run, which leaves whatever was there.
    pub fn current(&self) -> Option<&DelegationRecord> {
        match self {
            ReconcileOutcome::Replaced { current, .. } | ReconcileOutcome::Added { current } => {
                Some(current)
            }
            ReconcileOutcome::Unchanged { .. }
            | ReconcileOutcome::Removed { .. }
            | ReconcileOutcome::DryRun { .. } => None,
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::Unchanged { record_name } => {
                write!(f, "{} absent, nothing to remove", record_name)
            }
            ReconcileOutcome::Removed { previous } => write!(f, "removed {}", previous),
            ReconcileOutcome::Replaced { previous, current } => {
                write!(f, "replaced {} with {}", previous, current)
            }
            ReconcileOutcome::Added { current } => write!(f, "added {}", current),
            ReconcileOutcome::DryRun { previous, proposed } => {
                write!(f, "[DRY-RUN] ")?;
                match (previous, proposed) {
                    (Some(previous), Some(proposed)) => {
                        write!(f, "would replace {} with {}", previous, proposed)
                    }
                    (None, Some(proposed)) => write!(f, "would add {}", proposed),
                    (Some(previous), None) => write!(f, "would remove {}", previous),
                    (None, None) => write!(f, "nothing to change"),
                }
            }
        }
    }
}

/// Operations a transaction will carry, in submission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionPlan {
    /// Existing record to remove
    pub remove: Option<DelegationRecord>,
    /// New record to add
    pub add: Option<DelegationRecord>,
}

impl TransactionPlan {
    /// Whether the plan needs no transaction at all
    pub fn is_empty(&self) -> bool {
        self.remove.is_none() && self.add.is_none()
    }
}

/// Compute the transaction for `desired` given the zone's `current` record
pub fn plan(
    desired: &DesiredState,
    current: Option<&DelegationRecord>,
    ttl: u32,
) -> Result<TransactionPlan> {
    match desired.action {
        Action::Remove => Ok(TransactionPlan {
            remove: current.cloned(),
            add: None,
        }),
        Action::Add => {
            if desired.name_servers.is_empty() {
                return Err(Error::NoNameServersForAdd(desired.record_name.clone()));
            }
            Ok(TransactionPlan {
                remove: current.cloned(),
                add: Some(DelegationRecord::new(
                    &desired.record_name,
                    ttl,
                    desired.name_servers.clone(),
                )),
            })
        }
    }
}

/// Zone Inspector stage: fetch the current record or `None`
pub async fn inspect(
    provider: &dyn ZoneProvider,
    zone: &str,
    record_name: &str,
) -> Result<Option<DelegationRecord>> {
    let record_name = canonical_name(record_name);
    let found = provider
        .find_record(zone, &record_name)
        .await
        .map_err(|e| match e {
            Error::ProviderQueryFailed(_) => e,
            other => Error::query_failed(other.to_string()),
        })?;

    match &found {
        Some(record) => info!("Zone {} holds {}", zone, record),
        None => info!("Zone {} has no NS record named {}", zone, record_name),
    }
    Ok(found)
}

/// Transaction Engine stage: apply `desired` against `current`
pub async fn apply(
    provider: &dyn ZoneProvider,
    zone: &str,
    desired: &DesiredState,
    current: Option<DelegationRecord>,
    ttl: u32,
) -> Result<ReconcileOutcome> {
    let plan = plan(desired, current.as_ref(), ttl)?;

    if plan.is_empty() {
        info!(
            "Record {} is already absent from zone {}, nothing to do",
            desired.record_name, zone
        );
        return Ok(ReconcileOutcome::Unchanged {
            record_name: desired.record_name.clone(),
        });
    }

    let mut txn = OpenTransaction::begin(provider, zone).await?;
    if let Some(existing) = &plan.remove {
        debug!("Queueing removal of {}", existing);
        txn.queue_remove(existing);
    }
    if let Some(record) = &plan.add {
        debug!("Queueing addition of {}", record);
        txn.queue_add(record);
    }
    txn.commit().await?;

    let outcome = match (plan.remove, plan.add) {
        (previous, proposed) if provider.is_dry_run() => {
            ReconcileOutcome::DryRun { previous, proposed }
        }
        (Some(previous), Some(current)) => ReconcileOutcome::Replaced { previous, current },
        (None, Some(current)) => ReconcileOutcome::Added { current },
        (Some(previous), None) => ReconcileOutcome::Removed { previous },
        (None, None) => unreachable!("empty plans return before a transaction is opened"),
    };
    info!("Zone {}: {}", zone, outcome);
    Ok(outcome)
}

/// Scoped provider transaction
///
/// Opened by [`OpenTransaction::begin`], finished only by
/// [`OpenTransaction::commit`]. A failed commit aborts; dropping the guard
/// without committing discards the queued operations.
struct OpenTransaction {
    inner: Box<dyn ZoneTransaction>,
    zone: String,
    queued: usize,
    finished: bool,
}

impl OpenTransaction {
    async fn begin(provider: &dyn ZoneProvider, zone: &str) -> Result<Self> {
        let inner = provider.begin(zone).await.map_err(|e| match e {
            Error::TransactionOpenFailed(_) => e,
            other => Error::open_failed(other.to_string()),
        })?;
        debug!("Opened transaction on zone {}", zone);

        Ok(Self {
            inner,
            zone: zone.to_string(),
            queued: 0,
            finished: false,
        })
    }

    fn queue_remove(&mut self, record: &DelegationRecord) {
        self.inner.queue_remove(record);
        self.queued += 1;
    }

    fn queue_add(&mut self, record: &DelegationRecord) {
        self.inner.queue_add(record);
        self.queued += 1;
    }

    async fn commit(mut self) -> Result<()> {
        let result = self.inner.execute().await;
        self.finished = true;

        match result {
            Ok(()) => {
                debug!(
                    "Committed {} operation(s) on zone {}",
                    self.queued, self.zone
                );
                Ok(())
            }
            Err(e) => {
                warn!("Transaction on zone {} failed: {}. Aborting.", self.zone, e);
                if let Err(abort_err) = self.inner.abort().await {
                    warn!(
                        "Failed to abort transaction on zone {}: {}",
                        self.zone, abort_err
                    );
                }
                Err(match e {
                    Error::TransactionCommitFailed(_) => e,
                    other => Error::commit_failed(other.to_string()),
                })
            }
        }
    }
}

impl Drop for OpenTransaction {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "Transaction on zone {} dropped before commit; {} queued operation(s) discarded",
                self.zone, self.queued
            );
        }
    }
}
