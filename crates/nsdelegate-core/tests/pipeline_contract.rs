//! Contract Test: Reconciliation Pipeline
//!
//! This test verifies the orchestrator's sequencing and resource handling.
//!
//! Constraints verified:
//! - The credential file exists during authentication and is erased on
//!   success and on every error path
//! - Verification runs only after a committed add, against `pcf.<record>`
//! - A convergence timeout is reported distinctly and leaves the committed
//!   record in place
//! - State read failures stop the run before the zone is touched

mod common;

use common::*;
use nsdelegate_core::{
    Action, ConvergenceConfig, Credential, Error, Reconciler, StaticNameServerSource,
    TerraformStateSource,
};
use std::time::Duration;
use tempfile::tempdir;
use tokio_test::{assert_err, assert_ok};

const SECRET: &str = r#"{"type": "service_account", "project_id": "test-project"}"#;

fn reconciler(
    connector: &MockConnector,
    source: Option<StaticNameServerSource>,
    resolver: Option<ScriptedResolver>,
    config: nsdelegate_core::ReconcileConfig,
    dir: &std::path::Path,
) -> Reconciler {
    Reconciler::new(
        Box::new(connector.clone()),
        source.map(|s| Box::new(s) as Box<dyn nsdelegate_core::NameServerSource>),
        resolver.map(|r| Box::new(r) as Box<dyn nsdelegate_core::ResolutionCheck>),
        config,
    )
    .expect("reconciler construction succeeds")
    .with_credential_dir(dir)
}

fn assert_dir_empty(dir: &std::path::Path) {
    let leftovers: Vec<_> = std::fs::read_dir(dir).unwrap().collect();
    assert!(leftovers.is_empty(), "credential file left behind: {:?}", leftovers);
}

#[tokio::test]
async fn add_publishes_and_erases_credential() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::new();
    let connector = MockConnector::new(zone.clone());

    let reconciler = reconciler(
        &connector,
        Some(StaticNameServerSource::new(["a.ns", "b.ns"])),
        None,
        config(Action::Add),
        dir.path(),
    );

    let report = assert_ok!(reconciler.run(&Credential::new(SECRET)).await);

    assert!(report.outcome.committed());
    assert!(report.convergence.is_none());
    assert!(report.finished_at >= report.started_at);
    assert_eq!(zone.record(RECORD).unwrap().name_servers, ns(&["a.ns", "b.ns"]));

    assert_eq!(connector.credential_contents(), vec![SECRET.to_string()]);
    assert!(!connector.credential_paths()[0].exists());
    assert_dir_empty(dir.path());
}

#[tokio::test]
async fn remove_of_absent_record_succeeds_without_mutation() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::new();
    let connector = MockConnector::new(zone.clone());

    let reconciler = reconciler(&connector, None, None, config(Action::Remove), dir.path());

    let report = assert_ok!(reconciler.run(&Credential::new(SECRET)).await);

    assert!(!report.outcome.committed());
    assert_eq!(zone.mutation_calls(), 0);
    assert_dir_empty(dir.path());
}

#[tokio::test]
async fn credential_erased_when_authentication_fails() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::new();
    let connector = MockConnector::failing(zone.clone());

    let reconciler = reconciler(
        &connector,
        Some(StaticNameServerSource::new(["a.ns"])),
        None,
        config(Action::Add),
        dir.path(),
    );

    let result = reconciler.run(&Credential::new(SECRET)).await;

    assert!(matches!(result, Err(Error::Authentication(_))));
    assert_eq!(zone.provider_calls(), 0);
    assert_dir_empty(dir.path());
}

#[tokio::test]
async fn credential_erased_when_commit_fails() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::with_record(RECORD, 300, &["a.ns"]);
    zone.fail_commit();
    let connector = MockConnector::new(zone.clone());

    let reconciler = reconciler(
        &connector,
        Some(StaticNameServerSource::new(["b.ns"])),
        None,
        config(Action::Add),
        dir.path(),
    );

    let result = reconciler.run(&Credential::new(SECRET)).await;

    assert!(matches!(result, Err(Error::TransactionCommitFailed(_))));
    assert_eq!(zone.record(RECORD).unwrap().name_servers, ns(&["a.ns"]));
    assert_dir_empty(dir.path());
}

#[tokio::test]
async fn empty_state_stops_before_zone_is_touched() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::new();
    let connector = MockConnector::new(zone.clone());

    let reconciler = reconciler(
        &connector,
        Some(StaticNameServerSource::new(Vec::<String>::new())),
        None,
        config(Action::Add),
        dir.path(),
    );

    let result = reconciler.run(&Credential::new(SECRET)).await;

    assert!(matches!(result, Err(Error::StateEmpty(_))));
    assert_eq!(zone.provider_calls(), 0);
    assert_dir_empty(dir.path());
}

#[tokio::test]
async fn unavailable_state_stops_before_zone_is_touched() {
    let dir = tempdir().unwrap();
    let state_dir = tempdir().unwrap();
    let zone = InMemoryZone::with_record(RECORD, 300, &["a.ns"]);
    let connector = MockConnector::new(zone.clone());

    let reconciler = Reconciler::new(
        Box::new(connector.clone()),
        Some(Box::new(TerraformStateSource::new(
            state_dir.path().join("missing"),
        ))),
        None,
        config(Action::Remove),
    )
    .unwrap()
    .with_credential_dir(dir.path());

    let result = reconciler.run(&Credential::new(SECRET)).await;

    assert!(matches!(result, Err(Error::StateUnavailable(_))));
    assert_eq!(zone.provider_calls(), 0);
    assert!(zone.record(RECORD).is_some());
    assert_dir_empty(dir.path());
}

#[tokio::test(start_paused = true)]
async fn add_with_verification_polls_derived_domain() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::new();
    let connector = MockConnector::new(zone.clone());
    let resolver = ScriptedResolver::new(&[true, true, false, true, true, true], false);

    let reconciler = reconciler(
        &connector,
        Some(StaticNameServerSource::new(["a.ns"])),
        Some(resolver.clone()),
        config(Action::Add).with_verification(ConvergenceConfig::default()),
        dir.path(),
    );

    let report = assert_ok!(reconciler.run(&Credential::new(SECRET)).await);

    let convergence = report.convergence.expect("verification ran");
    assert_eq!(convergence.domain, "pcf.ns.example.com");
    assert_eq!(convergence.attempts, 6);
    assert_eq!(convergence.resets, 1);
    assert!(resolver.queried().iter().all(|d| d == "pcf.ns.example.com"));
    assert_dir_empty(dir.path());
}

#[tokio::test(start_paused = true)]
async fn convergence_timeout_keeps_committed_record() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::new();
    let connector = MockConnector::new(zone.clone());

    let convergence = ConvergenceConfig {
        timeout_secs: Some(300),
        ..ConvergenceConfig::default()
    };
    let reconciler = reconciler(
        &connector,
        Some(StaticNameServerSource::new(["a.ns"])),
        Some(ScriptedResolver::never()),
        config(Action::Add).with_verification(convergence),
        dir.path(),
    );

    let started = tokio::time::Instant::now();
    let err = assert_err!(reconciler.run(&Credential::new(SECRET)).await);

    assert!(matches!(err, Error::ConvergenceTimeout { .. }));
    assert!(started.elapsed() >= Duration::from_secs(300));
    assert_eq!(zone.record(RECORD).unwrap().name_servers, ns(&["a.ns"]));
    assert_dir_empty(dir.path());
}

#[tokio::test]
async fn remove_never_verifies() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::with_record(RECORD, 300, &["a.ns"]);
    let connector = MockConnector::new(zone.clone());
    let resolver = ScriptedResolver::always();

    let reconciler = reconciler(
        &connector,
        None,
        Some(resolver.clone()),
        config(Action::Remove).with_verification(ConvergenceConfig::default()),
        dir.path(),
    );

    let report = assert_ok!(reconciler.run(&Credential::new(SECRET)).await);

    assert!(report.convergence.is_none());
    assert!(resolver.queried().is_empty());
    assert_eq!(zone.record(RECORD), None);
}

#[tokio::test]
async fn dry_run_add_skips_verification() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::new();
    zone.dry_run();
    let connector = MockConnector::new(zone.clone());
    let resolver = ScriptedResolver::always();

    let reconciler = reconciler(
        &connector,
        Some(StaticNameServerSource::new(["a.ns"])),
        Some(resolver.clone()),
        config(Action::Add).with_verification(ConvergenceConfig::default()),
        dir.path(),
    );

    let report = assert_ok!(reconciler.run(&Credential::new(SECRET)).await);

    assert!(!report.outcome.committed());
    assert!(report.outcome.to_string().starts_with("[DRY-RUN] would add"));
    assert!(report.convergence.is_none());
    assert!(resolver.queried().is_empty());
    assert_eq!(zone.record(RECORD), None);
    assert_dir_empty(dir.path());
}

#[tokio::test]
async fn dropped_run_erases_credential() {
    let dir = tempdir().unwrap();
    let zone = InMemoryZone::new();
    let connector = MockConnector::new(zone.clone());

    let reconciler = reconciler(
        &connector,
        Some(StaticNameServerSource::new(["a.ns"])),
        Some(ScriptedResolver::never()),
        config(Action::Add).with_verification(ConvergenceConfig {
            timeout_secs: None,
            ..ConvergenceConfig::default()
        }),
        dir.path(),
    );

    // Unbounded verification never finishes; the outer timeout stands in
    // for a signal dropping the run.
    let credential = Credential::new(SECRET);
    let result =
        tokio::time::timeout(Duration::from_millis(200), reconciler.run(&credential)).await;

    assert!(result.is_err(), "unbounded verification should still be waiting");
    assert!(zone.record(RECORD).is_some());
    assert_dir_empty(dir.path());
}

#[test]
fn add_requires_a_source() {
    let zone = InMemoryZone::new();
    let result = Reconciler::new(
        Box::new(MockConnector::new(zone)),
        None,
        None,
        config(Action::Add),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn verification_requires_a_resolver() {
    let zone = InMemoryZone::new();
    let result = Reconciler::new(
        Box::new(MockConnector::new(zone)),
        Some(Box::new(StaticNameServerSource::new(["a.ns"]))),
        None,
        config(Action::Add).with_verification(ConvergenceConfig::default()),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}
