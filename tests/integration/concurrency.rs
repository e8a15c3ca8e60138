//! Concurrency behavior of collection cycles
//!
//! Fetches within a cycle run in parallel but bounded, record order is
//! configuration order regardless of completion order, and readers never
//! see a cycle that has not finished.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fleetwatch::config::HostTarget;
use fleetwatch::normalize::Normalizer;
use fleetwatch::orchestrator::{CollectionEngine, CycleOptions};
use fleetwatch::sources::{
    RawObservation, SourceAdapter, SourceKind, SourceResult,
};
use fleetwatch::thresholds::ThresholdPolicy;

use crate::helpers::*;

/// Tracks how many fetches run at the same time.
struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceAdapter for ConcurrencyProbe {
    fn kind(&self) -> SourceKind {
        SourceKind::TimeSeries
    }

    async fn fetch(&self, target: &HostTarget) -> SourceResult<RawObservation> {
        let running = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(50)).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(RawObservation::new(SourceKind::TimeSeries).with_hostname(target.name.clone()))
    }
}

#[tokio::test]
async fn worker_limit_bounds_simultaneous_fetches() {
    let probe = ConcurrencyProbe::new();
    let targets = create_test_targets(&[
        ("h1", "10.0.0.1"),
        ("h2", "10.0.0.2"),
        ("h3", "10.0.0.3"),
        ("h4", "10.0.0.4"),
        ("h5", "10.0.0.5"),
        ("h6", "10.0.0.6"),
        ("h7", "10.0.0.7"),
        ("h8", "10.0.0.8"),
    ]);

    let engine = CollectionEngine::new(
        targets,
        probe.clone(),
        Normalizer::default(),
        ThresholdPolicy::default(),
        CycleOptions {
            worker_limit: 2,
            retry_attempts: 1,
        },
    );

    let snapshot = engine.run_cycle().await;

    assert_eq!(snapshot.records.len(), 8);
    let peak = probe.peak.load(Ordering::SeqCst);
    assert!(peak <= 2, "observed {peak} concurrent fetches with limit 2");
    assert!(peak >= 1);
}

/// Finishes fetches in reverse configuration order.
struct ReverseLatencyAdapter {
    total: usize,
    started: AtomicUsize,
}

#[async_trait]
impl SourceAdapter for ReverseLatencyAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::TimeSeries
    }

    async fn fetch(&self, target: &HostTarget) -> SourceResult<RawObservation> {
        // Earlier targets sleep longer, so completion order is reversed.
        let position = self.started.fetch_add(1, Ordering::SeqCst);
        let delay = (self.total - position.min(self.total)) as u64 * 20;
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(RawObservation::new(SourceKind::TimeSeries).with_hostname(target.name.clone()))
    }
}

#[tokio::test]
async fn record_order_is_configuration_order_not_completion_order() {
    let names = ["delta", "alpha", "zulu", "bravo"];
    let targets = create_test_targets(&[
        ("delta", "10.0.0.1"),
        ("alpha", "10.0.0.2"),
        ("zulu", "10.0.0.3"),
        ("bravo", "10.0.0.4"),
    ]);

    let adapter = Arc::new(ReverseLatencyAdapter {
        total: names.len(),
        started: AtomicUsize::new(0),
    });
    let engine = create_test_engine(targets, adapter);

    let snapshot = engine.run_cycle().await;

    let order: Vec<&str> = snapshot
        .records
        .iter()
        .map(|record| record.hostname.as_str())
        .collect();
    assert_eq!(order, names);
}

/// Never finishes a fetch within the test's lifetime.
struct StalledAdapter;

#[async_trait]
impl SourceAdapter for StalledAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::TimeSeries
    }

    async fn fetch(&self, _target: &HostTarget) -> SourceResult<RawObservation> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(RawObservation::new(SourceKind::TimeSeries))
    }
}

#[tokio::test]
async fn readers_see_the_previous_snapshot_while_a_cycle_runs() {
    use fleetwatch::store::{Snapshot, SnapshotStore};

    let store = SnapshotStore::new();
    store
        .publish(Snapshot {
            records: vec![fleetwatch::CanonicalMetricRecord::unreachable(
                "host1".to_string(),
                "172.16.0.10".to_string(),
                chrono::Utc::now(),
            )],
            collected_at: chrono::Utc::now(),
        })
        .await;

    let targets = create_test_targets(&[("host1", "172.16.0.10")]);
    let engine = Arc::new(create_test_engine(targets, Arc::new(StalledAdapter)));

    let cycle = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run_cycle().await }
    });

    // The in-flight cycle has published nothing; readers keep the old data.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let latest = store.latest().await;
    assert_eq!(latest.records.len(), 1);
    assert_eq!(latest.records[0].hostname, "host1");

    cycle.abort();
}
