//! Delegation record model
//!
//! Names are kept in canonical form: lowercase, trimmed, and absolute
//! (exactly one trailing dot). Two records compare equal only when their
//! canonical names, TTLs and name-server sets match.
//!
//! A record read back from a provider also remembers the name and values
//! byte-for-byte as the provider returned them. Providers delete by exact
//! content, so removals are sent with those stored values rather than the
//! canonical ones.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The only record type this system ever reads or writes
pub const RECORD_TYPE: &str = "NS";

/// Default TTL applied to added records (in seconds)
pub const DEFAULT_TTL: u32 = 300;

/// Canonicalize a DNS name: trim, lowercase, single trailing dot
pub fn canonical_name(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.').to_ascii_lowercase();
    format!("{}.", trimmed)
}

/// Order-irrelevant set of name-server hostnames
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameServerSet(BTreeSet<String>);

impl NameServerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Insert a hostname (canonicalized); blank entries are ignored
    pub fn insert(&mut self, host: &str) -> bool {
        if host.trim().trim_end_matches('.').is_empty() {
            return false;
        }
        self.0.insert(canonical_name(host))
    }

    /// Number of hostnames
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over hostnames in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Hostnames as an owned vector (provider payloads)
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }

    /// Parse a comma and/or whitespace separated list
    pub fn parse_list(list: &str) -> Self {
        list.split(|c: char| c == ',' || c.is_whitespace())
            .collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for NameServerSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for host in iter {
            set.insert(host.as_ref());
        }
        set
    }
}

impl fmt::Display for NameServerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, host) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", host)?;
        }
        write!(f, "}}")
    }
}

/// Record content exactly as a provider stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredContent {
    name: String,
    values: Vec<String>,
}

/// An NS record set as held by the DNS provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// Absolute record name
    pub name: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Authoritative name servers
    pub name_servers: NameServerSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stored: Option<StoredContent>,
}

impl DelegationRecord {
    /// Create a record, canonicalizing the name
    pub fn new(name: &str, ttl: u32, name_servers: NameServerSet) -> Self {
        Self {
            name: canonical_name(name),
            ttl,
            name_servers,
            stored: None,
        }
    }

    /// A record read from a provider
    ///
    /// `name` and `values` are kept verbatim for [`stored_name`] and
    /// [`stored_values`]; the canonical fields are derived from them.
    ///
    /// [`stored_name`]: DelegationRecord::stored_name
    /// [`stored_values`]: DelegationRecord::stored_values
    pub fn observed(name: &str, ttl: u32, values: Vec<String>) -> Self {
        Self {
            name: canonical_name(name),
            ttl,
            name_servers: values.iter().collect(),
            stored: Some(StoredContent {
                name: name.to_string(),
                values,
            }),
        }
    }

    /// Name as the provider stores it, or the canonical name
    pub fn stored_name(&self) -> &str {
        match &self.stored {
            Some(stored) => &stored.name,
            None => &self.name,
        }
    }

    /// Values as the provider stores them, in its order, or the canonical set
    pub fn stored_values(&self) -> Vec<String> {
        match &self.stored {
            Some(stored) => stored.values.clone(),
            None => self.name_servers.to_vec(),
        }
    }
}

impl PartialEq for DelegationRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.ttl == other.ttl
            && self.name_servers == other.name_servers
    }
}

impl Eq for DelegationRecord {}

impl fmt::Display for DelegationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.name, self.ttl, RECORD_TYPE, self.name_servers
        )
    }
}
