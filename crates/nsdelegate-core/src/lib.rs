// # nsdelegate-core
//
// Core library for reconciling a parent zone's NS delegation record with
// the name servers provisioned for an environment.
//
// ## Architecture Overview
//
// - **NameServerSource**: Trait for reading the desired name servers
// - **ZoneProvider / ZoneTransaction**: Trait pair for inspecting and
//   atomically mutating the delegation record
// - **ProviderConnector**: Trait that authenticates and yields a provider
// - **ResolutionCheck**: Trait for the black-box "does it resolve" query
// - **reconcile**: The transaction engine (add/replace/remove)
// - **ConvergenceChecker**: Polls resolution until the change is visible
// - **Reconciler**: Orchestrates the pipeline and owns the credential guard
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Provider, resolver and state store are
//    behind traits; the engine never talks HTTP or DNS directly
// 2. **Explicit Stages**: Each stage returns a `Result`, the orchestrator
//    composes them
// 3. **Scoped Resources**: Transactions and credential files are guards
//    that clean up on every exit path
// 4. **Idempotency**: Re-running the same action converges on the same
//    zone content

pub mod config;
pub mod convergence;
pub mod credential;
pub mod error;
pub mod orchestrator;
pub mod reconcile;
pub mod record;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{Action, ConvergenceConfig, ReconcileConfig};
pub use convergence::{ConvergenceChecker, ConvergenceReport, ConvergenceState, Deadline};
pub use credential::{Credential, CredentialFile};
pub use error::{Error, ErrorCategory, Result};
pub use orchestrator::{ReconcileReport, Reconciler};
pub use reconcile::{DesiredState, ReconcileOutcome};
pub use record::{DelegationRecord, NameServerSet, RECORD_TYPE};
pub use state::{StaticNameServerSource, TerraformStateSource};
pub use traits::{
    NameServerSource, ProviderConnector, ResolutionCheck, ZoneProvider, ZoneTransaction,
};
