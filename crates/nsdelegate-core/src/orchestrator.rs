//! Reconciliation pipeline
//!
//! The Reconciler is responsible for:
//! - Creating and erasing the transient credential file
//! - Authenticating via the ProviderConnector
//! - Reading the desired state from the NameServerSource
//! - Inspecting and reconciling the zone
//! - Optionally waiting for convergence after an add
//!
//! ## Pipeline
//!
//! ```text
//! validate ─▶ credential ─▶ connect ─▶ read state ─▶ inspect ─▶ apply ─▶ (converge)
//!                 │                                                           │
//!                 └──────────────────── erase on every exit ──────────────────┘
//! ```
//!
//! Each stage returns a `Result`; the first error ends the run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::{Action, ReconcileConfig};
use crate::convergence::{ConvergenceChecker, ConvergenceReport};
use crate::credential::{Credential, CredentialFile};
use crate::error::{Error, Result};
use crate::reconcile::{self, ReconcileOutcome};
use crate::state;
use crate::traits::{NameServerSource, ProviderConnector, ResolutionCheck};

/// Summary of one run
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    /// Action that was run
    pub action: Action,
    /// Zone that was reconciled
    pub zone: String,
    /// What the transaction engine did
    pub outcome: ReconcileOutcome,
    /// Convergence result, when verification ran
    pub convergence: Option<ConvergenceReport>,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

/// Orchestrates one reconciliation run
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`] (validates configuration)
/// 2. Call [`Reconciler::run()`] once per action
///
/// ## Threading
///
/// Every stage runs sequentially on the calling task.
pub struct Reconciler {
    /// Authenticates and yields the zone provider
    connector: Box<dyn ProviderConnector>,

    /// Where desired name servers come from
    source: Option<Box<dyn NameServerSource>>,

    /// Resolution check for convergence
    resolver: Option<Box<dyn ResolutionCheck>>,

    /// Run configuration
    config: ReconcileConfig,

    /// Directory for the transient credential file
    credential_dir: PathBuf,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `connector`: Provider connector implementation
    /// - `source`: Name server source (required for `add`)
    /// - `resolver`: Resolution check (required when verification is enabled)
    /// - `config`: Reconciliation configuration
    pub fn new(
        connector: Box<dyn ProviderConnector>,
        source: Option<Box<dyn NameServerSource>>,
        resolver: Option<Box<dyn ResolutionCheck>>,
        config: ReconcileConfig,
    ) -> Result<Self> {
        config.validate()?;

        if config.action == Action::Add && source.is_none() {
            return Err(Error::config(
                "A name server source is required for action 'add'",
            ));
        }
        if config.wants_verification() && resolver.is_none() {
            return Err(Error::config(
                "A resolution check is required when verification is enabled",
            ));
        }

        Ok(Self {
            connector,
            source,
            resolver,
            config,
            credential_dir: std::env::temp_dir(),
        })
    }

    /// Write the transient credential file into `dir` instead of the system temp dir
    pub fn with_credential_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.credential_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Run the pipeline
    ///
    /// The credential file is erased before this returns, whatever the
    /// outcome. If the returned future is dropped mid-run, the file is
    /// erased by its guard.
    pub async fn run(&self, credential: &Credential) -> Result<ReconcileReport> {
        let started_at = Utc::now();
        info!(
            "Starting {} of {} in zone {}",
            self.config.action, self.config.record_name, self.config.zone
        );

        let credential_file = CredentialFile::create_in(&self.credential_dir, credential)?;
        let result = self.run_stages(&credential_file, started_at).await;

        match (result, credential_file.erase()) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(erase_err)) => Err(erase_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(erase_err)) => {
                error!("{}", erase_err);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        credential_file: &CredentialFile,
        started_at: DateTime<Utc>,
    ) -> Result<ReconcileReport> {
        let provider = self.connector.connect(credential_file).await?;
        info!("Authenticated with {}", provider.provider_name());

        let desired = state::read_desired(
            self.source.as_deref(),
            self.config.action,
            &self.config.record_name,
        )
        .await?;

        let current =
            reconcile::inspect(provider.as_ref(), &self.config.zone, &desired.record_name).await?;

        let outcome = reconcile::apply(
            provider.as_ref(),
            &self.config.zone,
            &desired,
            current,
            self.config.ttl,
        )
        .await?;

        let convergence = match (&self.resolver, self.config.wants_verification()) {
            (Some(resolver), true) if outcome.committed() => {
                let checker = ConvergenceChecker::new(resolver.as_ref(), &self.config.convergence);
                let domain = self.config.verification_domain();
                Some(
                    checker
                        .wait_for(&domain, self.config.convergence.deadline())
                        .await?,
                )
            }
            (Some(_), true) if provider.is_dry_run() => {
                info!("Dry run, skipping verification of {}", self.config.verification_domain());
                None
            }
            _ => None,
        };

        Ok(ReconcileReport {
            action: self.config.action,
            zone: self.config.zone.clone(),
            outcome,
            convergence,
            started_at,
            finished_at: Utc::now(),
        })
    }
}
