//! Core traits for the delegation reconciler
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`NameServerSource`]: Read the desired name servers from infrastructure state
//! - [`ZoneProvider`] / [`ZoneTransaction`]: Inspect and atomically mutate NS records
//! - [`ProviderConnector`]: Authenticate and produce a [`ZoneProvider`]
//! - [`ResolutionCheck`]: Black-box "does this domain resolve" query

pub mod name_server_source;
pub mod resolution_check;
pub mod zone_provider;

pub use name_server_source::NameServerSource;
pub use resolution_check::ResolutionCheck;
pub use zone_provider::{ProviderConnector, ZoneProvider, ZoneTransaction};
