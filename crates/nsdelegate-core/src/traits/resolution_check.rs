// # Resolution Check Trait
//
// A single blocking question: does this domain resolve right now?
//
// ## Implementations
//
// - hickory-resolver: `nsdelegate-resolver-hickory` crate

use async_trait::async_trait;

/// Trait for the black-box resolution check used while polling
///
/// Failures are not errors here: a resolver timeout, NXDOMAIN or an empty
/// answer all collapse to `false`, which the convergence checker treats as
/// transient noise.
#[async_trait]
pub trait ResolutionCheck: Send + Sync {
    /// Whether `domain` currently resolves
    async fn resolves(&self, domain: &str) -> bool;
}
