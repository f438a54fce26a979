// # nsdelegate
//
// Publishes (`add`) or withdraws (`remove`) the NS delegation record for an
// environment's DNS zone in its parent zone, then optionally waits until the
// delegation resolves.
//
// This binary is a thin integration layer:
// 1. Read and validate configuration from environment variables
// 2. Initialize tracing and a single-threaded runtime
// 3. Build the state source, Cloud DNS connector and resolution check
// 4. Run the core `Reconciler` once, racing it against SIGINT/SIGTERM
// 5. Map the outcome to an exit code
//
// All reconciliation logic lives in nsdelegate-core.
//
// ## Configuration
//
// ### Action and target
// - `DELEGATE_ACTION`: `add` or `remove`
// - `DELEGATE_ZONE`: Managed zone holding the delegation record
// - `DELEGATE_RECORD_NAME`: Delegation record name
// - `DELEGATE_RECORD_TTL`: TTL for added records (default 300)
//
// ### Desired name servers
// - `DELEGATE_STATE_LOCATION`: Terraform state file or directory
// - `DELEGATE_STATE_OUTPUT`: Output holding the name servers
// - `DELEGATE_NAME_SERVERS`: Comma-separated list instead of Terraform state
//
// ### Provider
// - `DELEGATE_CREDENTIAL`: Service-account key JSON
// - `DELEGATE_CREDENTIAL_DIR`: Where the transient key file is written
// - `DELEGATE_PROJECT_ID`: Project override
// - `DELEGATE_MODE`: `live` or `dry-run`
//
// ### Verification
// - `DELEGATE_VERIFY_AFTER_ADD`: Wait for resolution after `add`
// - `DELEGATE_VERIFY_PREFIX`: Label polled under the record (default `pcf`)
// - `DELEGATE_REQUIRED_SUCCESSES`: Consecutive successes (default 3)
// - `DELEGATE_VERIFY_TIMEOUT_SECS`: Deadline in seconds, or `none`
//
// ## Example
//
// ```bash
// export DELEGATE_ACTION=add
// export DELEGATE_ZONE=parent-zone
// export DELEGATE_RECORD_NAME=env.example.com
// export DELEGATE_STATE_LOCATION=/work/terraform-state
// export DELEGATE_CREDENTIAL="$(cat key.json)"
// export DELEGATE_VERIFY_AFTER_ADD=true
//
// nsdelegate
// ```

mod config;

use config::Config;
use nsdelegate_core::{
    ErrorCategory, NameServerSource, Reconciler, ResolutionCheck, StaticNameServerSource,
    TerraformStateSource,
};
use nsdelegate_provider_clouddns::CloudDnsConnector;
use nsdelegate_resolver_hickory::HickoryResolutionCheck;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelegateExitCode {
    /// Reconciled (including removal of an absent record)
    Success = 0,
    /// Configuration error, nothing was changed
    ConfigError = 1,
    /// State, credential, provider or transaction failure
    RuntimeError = 2,
    /// Record committed but did not resolve before the deadline
    ConvergenceTimeout = 3,
    /// Interrupted by SIGINT or SIGTERM
    Interrupted = 130,
}

impl From<DelegateExitCode> for ExitCode {
    fn from(code: DelegateExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<ErrorCategory> for DelegateExitCode {
    fn from(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Parameter => DelegateExitCode::ConfigError,
            ErrorCategory::Convergence => DelegateExitCode::ConvergenceTimeout,
            ErrorCategory::State
            | ErrorCategory::Provider
            | ErrorCategory::Transaction
            | ErrorCategory::Other => DelegateExitCode::RuntimeError,
        }
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return DelegateExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DelegateExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DelegateExitCode::ConfigError.into();
    }

    info!(
        "nsdelegate {}: {} {} in zone {}",
        env!("CARGO_PKG_VERSION"),
        config.action,
        config.record_name,
        config.zone
    );

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DelegateExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config)).into()
}

/// Build the reconciler from configuration
fn build_reconciler(config: &Config) -> nsdelegate_core::Result<Reconciler> {
    let source: Option<Box<dyn NameServerSource>> =
        match (&config.name_servers, &config.state_location) {
            (Some(list), _) => Some(Box::new(StaticNameServerSource::parse(list))),
            (None, Some(location)) => Some(Box::new(TerraformStateSource::with_output(
                location,
                config.state_output.clone(),
            ))),
            (None, None) => None,
        };

    if config.verify_after_add && config.dry_run {
        warn!("DRY-RUN mode: skipping verification, nothing will be published");
    }
    let resolver: Option<Box<dyn ResolutionCheck>> = if config.verifies() {
        Some(Box::new(HickoryResolutionCheck::from_system_conf()))
    } else {
        None
    };

    let connector = CloudDnsConnector::new()
        .with_project_id(config.project_id.clone())
        .with_dry_run(config.dry_run);

    let reconciler = Reconciler::new(
        Box::new(connector),
        source,
        resolver,
        config.reconcile_config(),
    )?;

    Ok(match &config.credential_dir {
        Some(dir) => reconciler.with_credential_dir(dir),
        None => reconciler,
    })
}

/// Run one reconciliation, stopping early on a shutdown signal
///
/// On a signal the run future is dropped: its open transaction is discarded
/// without sending, gcloud subprocesses are killed, and the credential file
/// is erased by its guard.
async fn run(config: Config) -> DelegateExitCode {
    let reconciler = match build_reconciler(&config) {
        Ok(reconciler) => reconciler,
        Err(e) => {
            error!("{}", e);
            return DelegateExitCode::from(e.category());
        }
    };

    tokio::select! {
        result = reconciler.run(&config.credential) => match result {
            Ok(report) => {
                info!("{}", report.outcome);
                if let Some(convergence) = &report.convergence {
                    info!(
                        "{} resolved after {} attempt(s) in {:?}",
                        convergence.domain, convergence.attempts, convergence.elapsed
                    );
                }
                info!(
                    "Finished {} in {}ms",
                    report.action,
                    (report.finished_at - report.started_at).num_milliseconds()
                );
                DelegateExitCode::Success
            }
            Err(e) => {
                let code = DelegateExitCode::from(e.category());
                if code == DelegateExitCode::ConvergenceTimeout {
                    error!("{} (the record change is committed and was left in place)", e);
                } else {
                    error!("{}", e);
                }
                code
            }
        },
        signal = wait_for_shutdown() => {
            warn!("Received {}, abandoning run", signal);
            DelegateExitCode::Interrupted
        }
    }
}

/// Wait for SIGTERM or SIGINT
///
/// If the handlers cannot be installed the run proceeds without them.
#[cfg(unix)]
async fn wait_for_shutdown() -> &'static str {
    let handlers = signal(SignalKind::terminate())
        .and_then(|term| Ok((term, signal(SignalKind::interrupt())?)));

    match handlers {
        Ok((mut sigterm, mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        }
        Err(e) => {
            warn!("Failed to install signal handlers: {}", e);
            std::future::pending().await
        }
    }
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "SIGINT",
        Err(e) => {
            warn!("Failed to wait for CTRL-C: {}", e);
            std::future::pending().await
        }
    }
}
