// # Zone Provider Traits
//
// Defines the interface to the DNS provider holding the parent zone.
//
// ## Implementations
//
// - Google Cloud DNS: `nsdelegate-provider-clouddns` crate
//
// ## Usage
//
// ```rust,ignore
// use nsdelegate_core::{ZoneProvider, DelegationRecord};
//
// let current = provider.find_record("parent-zone", "ns.example.com.").await?;
//
// let mut txn = provider.begin("parent-zone").await?;
// if let Some(existing) = &current {
//     txn.queue_remove(existing);
// }
// txn.queue_add(&desired);
// txn.execute().await?;
// ```

use async_trait::async_trait;

use crate::credential::CredentialFile;
use crate::record::DelegationRecord;

/// Trait for DNS provider implementations
///
/// # Contract
///
/// - Only NS record sets are ever queried or mutated
/// - Providers never retry; the orchestrator treats every failure as fatal
/// - Providers never cache record state between calls
#[async_trait]
pub trait ZoneProvider: Send + Sync {
    /// Look up the NS record set named `record_name` in `zone`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: The record exists
    /// - `Ok(None)`: The provider reports no matching record
    /// - `Err(Error::ProviderQueryFailed)`: Any other failure
    async fn find_record(
        &self,
        zone: &str,
        record_name: &str,
    ) -> Result<Option<DelegationRecord>, crate::Error>;

    /// Open a transaction scoped to `zone`
    ///
    /// # Returns
    ///
    /// - `Ok(txn)`: An open transaction with no queued operations
    /// - `Err(Error::TransactionOpenFailed)`: The zone cannot be mutated
    async fn begin(&self, zone: &str) -> Result<Box<dyn ZoneTransaction>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Whether executed transactions are only logged, never sent
    fn is_dry_run(&self) -> bool {
        false
    }
}

/// An open, atomic change against one zone
///
/// Operations are queued locally and submitted as one unit by
/// [`ZoneTransaction::execute`]. Dropping a transaction that was never
/// executed discards every queued operation; implementations must not
/// apply anything from `Drop`.
#[async_trait]
pub trait ZoneTransaction: Send {
    /// Queue removal of `record`; values must match the provider's copy exactly
    fn queue_remove(&mut self, record: &DelegationRecord);

    /// Queue addition of `record`
    fn queue_add(&mut self, record: &DelegationRecord);

    /// Submit all queued operations atomically
    ///
    /// Either every operation commits or none does.
    async fn execute(&mut self) -> Result<(), crate::Error>;

    /// Discard the transaction without applying anything
    async fn abort(&mut self) -> Result<(), crate::Error>;
}

/// Authenticates against a provider and yields a [`ZoneProvider`]
///
/// The credential file exists for the duration of this call and of the
/// whole run; connectors must not copy the secret elsewhere on disk.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    /// Authenticate with the given credential file
    async fn connect(
        &self,
        credential: &CredentialFile,
    ) -> Result<Box<dyn ZoneProvider>, crate::Error>;
}
