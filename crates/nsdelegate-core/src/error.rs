//! Error types for the delegation reconciler
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the delegation reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid input parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// The infrastructure state location is missing or unreadable
    #[error("State unavailable: {0}")]
    StateUnavailable(String),

    /// The state store holds no name servers but the action requires some
    #[error("State empty: {0}")]
    StateEmpty(String),

    /// Transient credential material could not be written or erased
    #[error("Credential error: {0}")]
    Credential(String),

    /// Authentication against the DNS provider failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Record inspection failed for a reason other than "not found"
    #[error("Provider query failed: {0}")]
    ProviderQueryFailed(String),

    /// The provider refused to open a transaction
    #[error("Transaction open failed: {0}")]
    TransactionOpenFailed(String),

    /// The provider rejected the transaction; nothing was applied
    #[error("Transaction commit failed: {0}")]
    TransactionCommitFailed(String),

    /// An add was requested without any name servers
    #[error("No name servers for add: {0}")]
    NoNameServersForAdd(String),

    /// Convergence was not observed before the deadline fired
    #[error(
        "Convergence timeout: {domain} did not resolve {required} consecutive times within {elapsed:?}"
    )]
    ConvergenceTimeout {
        /// Domain that was polled
        domain: String,
        /// Consecutive successes that were required
        required: u32,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse error taxonomy used to pick process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or invalid input; nothing was mutated
    Parameter,
    /// State store unreadable or empty
    State,
    /// Credential, authentication or provider query failure
    Provider,
    /// Transaction could not be opened or committed
    Transaction,
    /// Verification deadline fired after a committed change
    Convergence,
    /// Malformed data that is none of the above
    Other,
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a state-unavailable error
    pub fn state_unavailable(msg: impl Into<String>) -> Self {
        Self::StateUnavailable(msg.into())
    }

    /// Create a state-empty error
    pub fn state_empty(msg: impl Into<String>) -> Self {
        Self::StateEmpty(msg.into())
    }

    /// Create a credential error
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::Credential(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a provider query error
    pub fn query_failed(msg: impl Into<String>) -> Self {
        Self::ProviderQueryFailed(msg.into())
    }

    /// Create a transaction-open error
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::TransactionOpenFailed(msg.into())
    }

    /// Create a transaction-commit error
    pub fn commit_failed(msg: impl Into<String>) -> Self {
        Self::TransactionCommitFailed(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Classify the error for exit-code mapping
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) => ErrorCategory::Parameter,
            Error::StateUnavailable(_) | Error::StateEmpty(_) => ErrorCategory::State,
            Error::Credential(_)
            | Error::Authentication(_)
            | Error::ProviderQueryFailed(_)
            | Error::Provider { .. } => ErrorCategory::Provider,
            Error::TransactionOpenFailed(_)
            | Error::TransactionCommitFailed(_)
            | Error::NoNameServersForAdd(_) => ErrorCategory::Transaction,
            Error::ConvergenceTimeout { .. } => ErrorCategory::Convergence,
            Error::Json(_) => ErrorCategory::Other,
        }
    }
}
