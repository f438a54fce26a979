// # Name Server Source Trait
//
// Defines the interface for reading the desired set of authoritative name
// servers for the current environment.
//
// ## Implementations
//
// - Terraform state file: `state::TerraformStateSource`
// - Fixed list: `state::StaticNameServerSource`

use async_trait::async_trait;

use crate::record::NameServerSet;

/// Trait for infrastructure-state readers
///
/// # Contract
///
/// - Pure read: implementations never write to the state location
/// - A missing or unreadable location is `Error::StateUnavailable`
/// - An empty result is returned as an empty set; whether that is an error
///   depends on the action and is decided by `state::read_desired`
#[async_trait]
pub trait NameServerSource: Send + Sync {
    /// Read the current set of name servers
    async fn name_servers(&self) -> Result<NameServerSet, crate::Error>;

    /// Human-readable description of where the names come from (for logs)
    fn describe(&self) -> String;
}
