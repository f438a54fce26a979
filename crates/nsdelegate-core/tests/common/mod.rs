//! Test doubles and common utilities for reconciliation contract tests
//!
//! This module provides an in-memory zone with transaction semantics and
//! failure injection, a connector handing it out, and a scripted resolver.

#![allow(dead_code)]

use async_trait::async_trait;
use nsdelegate_core::error::{Error, Result};
use nsdelegate_core::record::canonical_name;
use nsdelegate_core::{
    Action, CredentialFile, DelegationRecord, NameServerSet, ProviderConnector, ReconcileConfig,
    ResolutionCheck, ZoneProvider, ZoneTransaction,
};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ZONE: &str = "example-zone";
pub const RECORD: &str = "ns.example.com";

/// Build a name server set from string slices
pub fn ns(hosts: &[&str]) -> NameServerSet {
    hosts.iter().collect()
}

/// Minimal configuration for `action` against the test zone and record
pub fn config(action: Action) -> ReconcileConfig {
    ReconcileConfig::new(action, ZONE, RECORD)
}

/// One queued transaction operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneOp {
    Remove(DelegationRecord),
    Add(DelegationRecord),
}

/// In-memory zone that applies transactions atomically
///
/// Clones share all state, so a test can keep one handle while the
/// reconciler owns another.
#[derive(Clone, Default)]
pub struct InMemoryZone {
    records: Arc<Mutex<HashMap<String, DelegationRecord>>>,
    committed: Arc<Mutex<Vec<Vec<ZoneOp>>>>,
    find_calls: Arc<AtomicUsize>,
    begin_calls: Arc<AtomicUsize>,
    execute_calls: Arc<AtomicUsize>,
    abort_calls: Arc<AtomicUsize>,
    fail_query: Arc<AtomicBool>,
    fail_begin: Arc<AtomicBool>,
    fail_commit: Arc<AtomicBool>,
    fail_abort: Arc<AtomicBool>,
    dry_run: Arc<AtomicBool>,
}

impl InMemoryZone {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zone pre-populated with one NS record
    pub fn with_record(name: &str, ttl: u32, hosts: &[&str]) -> Self {
        let zone = Self::new();
        zone.seed(DelegationRecord::new(name, ttl, ns(hosts)));
        zone
    }

    pub fn seed(&self, record: DelegationRecord) {
        self.records
            .lock()
            .unwrap()
            .insert(record.name.clone(), record);
    }

    pub fn record(&self, name: &str) -> Option<DelegationRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&canonical_name(name))
            .cloned()
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Transactions that committed, in order
    pub fn committed(&self) -> Vec<Vec<ZoneOp>> {
        self.committed.lock().unwrap().clone()
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn begin_calls(&self) -> usize {
        self.begin_calls.load(Ordering::SeqCst)
    }

    pub fn execute_calls(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    pub fn abort_calls(&self) -> usize {
        self.abort_calls.load(Ordering::SeqCst)
    }

    /// Calls that open or commit a transaction
    pub fn mutation_calls(&self) -> usize {
        self.begin_calls() + self.execute_calls()
    }

    /// Any call at all against the zone
    pub fn provider_calls(&self) -> usize {
        self.find_calls() + self.mutation_calls() + self.abort_calls()
    }

    pub fn fail_query(&self) {
        self.fail_query.store(true, Ordering::SeqCst);
    }

    pub fn fail_begin(&self) {
        self.fail_begin.store(true, Ordering::SeqCst);
    }

    pub fn fail_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    pub fn fail_abort(&self) {
        self.fail_abort.store(true, Ordering::SeqCst);
    }

    /// Accept transactions without applying them
    pub fn dry_run(&self) {
        self.dry_run.store(true, Ordering::SeqCst);
    }

    fn check_zone(&self, zone: &str) -> Result<()> {
        if zone == ZONE {
            Ok(())
        } else {
            Err(Error::provider("memory", format!("unknown zone {}", zone)))
        }
    }

    /// Apply `ops` all-or-nothing, the way the provider does
    fn commit(&self, ops: &[ZoneOp]) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let mut staged = records.clone();

        for op in ops {
            match op {
                ZoneOp::Remove(record) => match staged.get(&record.name) {
                    Some(existing)
                        if existing == record
                            && existing.stored_values() == record.stored_values() =>
                    {
                        staged.remove(&record.name);
                    }
                    _ => {
                        return Err(Error::provider(
                            "memory",
                            format!("removal of {} does not match the zone", record),
                        ));
                    }
                },
                ZoneOp::Add(record) => {
                    if staged.contains_key(&record.name) {
                        return Err(Error::provider(
                            "memory",
                            format!("{} already exists", record.name),
                        ));
                    }
                    staged.insert(record.name.clone(), record.clone());
                }
            }
        }

        *records = staged;
        self.committed.lock().unwrap().push(ops.to_vec());
        Ok(())
    }
}

#[async_trait]
impl ZoneProvider for InMemoryZone {
    async fn find_record(&self, zone: &str, record_name: &str) -> Result<Option<DelegationRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(Error::query_failed("injected query failure"));
        }
        self.check_zone(zone)?;
        Ok(self.record(record_name))
    }

    async fn begin(&self, zone: &str) -> Result<Box<dyn ZoneTransaction>> {
        self.begin_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_begin.load(Ordering::SeqCst) {
            return Err(Error::provider("memory", "injected open failure"));
        }
        self.check_zone(zone)?;
        Ok(Box::new(MemoryTransaction {
            zone: self.clone(),
            queued: Vec::new(),
        }))
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run.load(Ordering::SeqCst)
    }
}

/// Transaction against an [`InMemoryZone`]
pub struct MemoryTransaction {
    zone: InMemoryZone,
    queued: Vec<ZoneOp>,
}

#[async_trait]
impl ZoneTransaction for MemoryTransaction {
    fn queue_remove(&mut self, record: &DelegationRecord) {
        self.queued.push(ZoneOp::Remove(record.clone()));
    }

    fn queue_add(&mut self, record: &DelegationRecord) {
        self.queued.push(ZoneOp::Add(record.clone()));
    }

    async fn execute(&mut self) -> Result<()> {
        self.zone.execute_calls.fetch_add(1, Ordering::SeqCst);
        if self.zone.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::provider("memory", "injected commit failure"));
        }
        let ops = std::mem::take(&mut self.queued);
        if self.zone.is_dry_run() {
            return Ok(());
        }
        self.zone.commit(&ops)
    }

    async fn abort(&mut self) -> Result<()> {
        self.zone.abort_calls.fetch_add(1, Ordering::SeqCst);
        self.queued.clear();
        if self.zone.fail_abort.load(Ordering::SeqCst) {
            return Err(Error::provider("memory", "injected abort failure"));
        }
        Ok(())
    }
}

/// Connector handing out an [`InMemoryZone`]
#[derive(Clone)]
pub struct MockConnector {
    zone: InMemoryZone,
    connect_calls: Arc<AtomicUsize>,
    credential_paths: Arc<Mutex<Vec<PathBuf>>>,
    credential_contents: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl MockConnector {
    pub fn new(zone: InMemoryZone) -> Self {
        Self {
            zone,
            connect_calls: Arc::new(AtomicUsize::new(0)),
            credential_paths: Arc::new(Mutex::new(Vec::new())),
            credential_contents: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// Connector whose authentication always fails
    pub fn failing(zone: InMemoryZone) -> Self {
        Self {
            fail: true,
            ..Self::new(zone)
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Paths of the credential files seen during connect
    pub fn credential_paths(&self) -> Vec<PathBuf> {
        self.credential_paths.lock().unwrap().clone()
    }

    /// Contents of the credential files seen during connect
    pub fn credential_contents(&self) -> Vec<String> {
        self.credential_contents.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderConnector for MockConnector {
    async fn connect(&self, credential: &CredentialFile) -> Result<Box<dyn ZoneProvider>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.credential_paths
            .lock()
            .unwrap()
            .push(credential.path().to_path_buf());
        self.credential_contents
            .lock()
            .unwrap()
            .push(credential.read_to_string()?);

        if self.fail {
            return Err(Error::auth("injected authentication failure"));
        }
        Ok(Box::new(self.zone.clone()))
    }
}

/// Resolver returning scripted results, then a fixed fallback
#[derive(Clone)]
pub struct ScriptedResolver {
    results: Arc<Mutex<VecDeque<bool>>>,
    fallback: bool,
    domains: Arc<Mutex<Vec<String>>>,
}

impl ScriptedResolver {
    pub fn new(results: &[bool], fallback: bool) -> Self {
        Self {
            results: Arc::new(Mutex::new(results.iter().copied().collect())),
            fallback,
            domains: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Resolver that always succeeds
    pub fn always() -> Self {
        Self::new(&[], true)
    }

    /// Resolver that never succeeds
    pub fn never() -> Self {
        Self::new(&[], false)
    }

    /// Domains queried so far
    pub fn queried(&self) -> Vec<String> {
        self.domains.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResolutionCheck for ScriptedResolver {
    async fn resolves(&self, domain: &str) -> bool {
        self.domains.lock().unwrap().push(domain.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
