// # Static Name Server Source
//
// Fixed list of name servers supplied directly by configuration.
//
// ## When to Use
//
// - Testing environments
// - Manual runs where the state store is not reachable
// - Overriding the state store for a one-off delegation

use async_trait::async_trait;

use crate::Error;
use crate::record::NameServerSet;
use crate::traits::NameServerSource;

/// In-memory name server source
#[derive(Debug, Clone, Default)]
pub struct StaticNameServerSource {
    name_servers: NameServerSet,
}

impl StaticNameServerSource {
    /// Create a source from any list of hostnames
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            name_servers: hosts.into_iter().collect(),
        }
    }

    /// Create a source from a comma-separated list
    pub fn parse(list: &str) -> Self {
        Self {
            name_servers: NameServerSet::parse_list(list),
        }
    }
}

#[async_trait]
impl NameServerSource for StaticNameServerSource {
    async fn name_servers(&self) -> Result<NameServerSet, Error> {
        Ok(self.name_servers.clone())
    }

    fn describe(&self) -> String {
        "static name server list".to_string()
    }
}
