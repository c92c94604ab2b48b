// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persist/restore protocol across simulated restarts: round-trip fidelity,
//! baseline rewind, staleness rejection, and configuration gating.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use datacount_rust::core::config::DataCountConfig;
use datacount_rust::core::output::sink::CollectingSink;
use datacount_rust::core::pattern::PatternSet;
use datacount_rust::core::persistence::{
    InMemoryStateStore, PersistedState, PersistenceAdapter, StateStore,
};
use datacount_rust::core::runtime::DataCountRuntime;

fn props(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn base_properties() -> HashMap<String, String> {
    props(&[
        ("count_key", "target"),
        ("pattern1", r"ok ^2\d\d$"),
        ("count_interval", "60"),
        ("store_counts", "true"),
    ])
}

fn adapter_for(store: Arc<dyn StateStore>, properties: &HashMap<String, String>) -> PersistenceAdapter {
    let config = DataCountConfig::from_properties(properties).unwrap();
    let patterns = PatternSet::from_properties(properties).unwrap();
    PersistenceAdapter::new(store, &config, &patterns)
}

fn table(entries: &[(&str, &[u64])]) -> HashMap<String, Vec<u64>> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_vec()))
        .collect()
}

/// Persisting then reloading under identical configuration inside the
/// freshness window reproduces exact counts and saved_duration.
#[test]
fn test_round_trip_exact_counts() {
    let _ = env_logger::builder().is_test(true).try_init();
    let properties = base_properties();
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let adapter = adapter_for(store.clone(), &properties);

    let counts = table(&[("web", &[3, 7, 10]), ("mail", &[1, 0, 1])]);
    adapter.save(counts.clone(), 23.5).unwrap();

    let reloaded = adapter_for(store, &properties);
    let (restored, saved_duration) = reloaded.load(60).expect("fresh state loads");
    assert_eq!(restored, counts);
    assert_eq!(saved_duration, 23.5);
}

/// Restart midway through the saved interval: the runtime restores counts
/// and rewinds its flush baseline to `now - saved_duration`.
#[test]
fn test_restart_resumes_interval_accounting() {
    let properties = base_properties();
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let adapter = adapter_for(store.clone(), &properties);

    // saved 15s ago, 30s into a 60s interval at save time
    adapter
        .save_state(&PersistedState {
            counts: table(&[("web", &[2, 8, 10])]),
            saved_at: Utc::now().timestamp() - 15,
            saved_duration: 30.0,
            aggregate: "tag".to_string(),
            count_key: "target".to_string(),
            patterns: vec![
                (0, "unmatched".to_string(), None),
                (1, "ok".to_string(), Some(r"^2\d\d$".to_string())),
            ],
        })
        .unwrap();

    let mut runtime =
        DataCountRuntime::from_properties(&properties, Box::new(CollectingSink::new()))
            .unwrap()
            .with_state_store(store);
    runtime.start().unwrap();

    let (counts, elapsed) = runtime.counter().export();
    assert_eq!(counts["web"], vec![2, 8, 10]);
    assert!(
        (30.0..31.5).contains(&elapsed),
        "baseline should sit 30s into the interval, elapsed = {elapsed}"
    );
    runtime.shutdown();
}

/// Restart after the freshness window: the stored state is rejected and
/// counting starts from an empty table.
#[test]
fn test_stale_state_starts_empty() {
    let properties = base_properties();
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let adapter = adapter_for(store.clone(), &properties);

    adapter
        .save_state(&PersistedState {
            counts: table(&[("web", &[2, 8, 10])]),
            saved_at: Utc::now().timestamp() - 61, // tick + 1
            saved_duration: 30.0,
            aggregate: "tag".to_string(),
            count_key: "target".to_string(),
            patterns: vec![
                (0, "unmatched".to_string(), None),
                (1, "ok".to_string(), Some(r"^2\d\d$".to_string())),
            ],
        })
        .unwrap();

    let mut runtime =
        DataCountRuntime::from_properties(&properties, Box::new(CollectingSink::new()))
            .unwrap()
            .with_state_store(store);
    runtime.start().unwrap();

    let (counts, elapsed) = runtime.counter().export();
    assert!(counts.is_empty());
    assert!(elapsed < 1.0, "baseline should be fresh, elapsed = {elapsed}");
    runtime.shutdown();
}

/// A pattern change between runs invalidates the stored state.
#[test]
fn test_changed_patterns_start_empty() {
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());
    let adapter = adapter_for(store.clone(), &base_properties());
    adapter.save(table(&[("web", &[0, 5, 5])]), 10.0).unwrap();

    let mut changed = base_properties();
    changed.insert("pattern2".to_string(), r"err ^5\d\d$".to_string());
    let mut runtime = DataCountRuntime::from_properties(&changed, Box::new(CollectingSink::new()))
        .unwrap()
        .with_state_store(store);
    runtime.start().unwrap();
    assert!(runtime.counter().export().0.is_empty());
    runtime.shutdown();
}

/// Shutdown persists after the final flush; a second instance picks the
/// snapshot up without double-counting anything.
#[test]
fn test_shutdown_persists_and_restart_does_not_double_count() {
    let properties = base_properties();
    let store: Arc<dyn StateStore> = Arc::new(InMemoryStateStore::new());

    let sink = CollectingSink::new();
    let emissions = sink.emitted.clone();
    let mut first = DataCountRuntime::from_properties(&properties, Box::new(sink))
        .unwrap()
        .with_state_store(store.clone());
    first.start().unwrap();
    first.process(
        "web",
        &[(0, datacount_rust::core::event::record_from_pairs([("target", "200")]))],
    );
    first.shutdown();
    // the one count was emitted by the final flush
    assert_eq!(emissions.lock().unwrap().len(), 1);

    let sink = CollectingSink::new();
    let emissions = sink.emitted.clone();
    let mut second = DataCountRuntime::from_properties(&properties, Box::new(sink))
        .unwrap()
        .with_state_store(store);
    second.start().unwrap();
    // restored table holds the retained key, zeroed
    let (counts, _) = second.counter().export();
    assert_eq!(counts["web"], vec![0, 0, 0]);
    second.flush_emit();
    let emitted = emissions.lock().unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0].2["web_ok_count"], serde_json::Value::from(0u64));
    drop(emitted);
    second.shutdown();
}

/// Store failures at save time are logged, never fatal, and leave
/// in-memory counting untouched.
#[test]
fn test_save_failure_is_non_fatal() {
    #[derive(Debug)]
    struct BrokenStore;
    impl StateStore for BrokenStore {
        fn put(&self, _key: &str, _value: &[u8]) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("disk on fire".into())
        }
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error + Send + Sync>> {
            Err("disk on fire".into())
        }
    }

    let properties = base_properties();
    let mut runtime =
        DataCountRuntime::from_properties(&properties, Box::new(CollectingSink::new()))
            .unwrap()
            .with_state_store(Arc::new(BrokenStore));
    runtime.start().unwrap();
    runtime.process(
        "web",
        &[(0, datacount_rust::core::event::record_from_pairs([("target", "200")]))],
    );
    // shutdown flushes then fails to persist; neither panics nor errors
    runtime.shutdown();
}
