//! Integration tests for the API serving layer
//!
//! The serving layer only ever reads the snapshot store; these tests
//! publish snapshots by hand and poll the HTTP surface like the
//! dashboard client would.

use chrono::Utc;
use fleetwatch::api::{ApiConfig, ApiState, MetricsResponse, spawn_api_server};
use fleetwatch::store::{Snapshot, SnapshotStore};
use fleetwatch::{CanonicalMetricRecord, MetricValue};
use std::net::SocketAddr;

async fn spawn_test_api(store: SnapshotStore) -> SocketAddr {
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        enable_cors: true,
    };

    spawn_api_server(config, ApiState::new(store)).await.unwrap()
}

fn sample_snapshot() -> Snapshot {
    let now = Utc::now();

    let mut host1 = CanonicalMetricRecord::unreachable(
        "node-a".to_string(),
        "172.16.0.10".to_string(),
        now,
    );
    host1.reachable = true;
    host1.memory_used_percent = MetricValue::Known(85.2);
    host1.high_memory = true;
    host1.os_version = MetricValue::Known("Debian 12".to_string());

    let host2 = CanonicalMetricRecord::unreachable(
        "host2".to_string(),
        "172.16.0.20".to_string(),
        now,
    );

    Snapshot {
        records: vec![host1, host2],
        collected_at: now,
    }
}

#[tokio::test]
async fn metrics_endpoint_returns_the_published_snapshot() {
    let store = SnapshotStore::new();
    store.publish(sample_snapshot()).await;

    let addr = spawn_test_api(store).await;

    let response = reqwest::get(format!("http://{addr}/api/metrics"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: MetricsResponse = response.json().await.unwrap();
    assert_eq!(body.hosts.len(), 2);
    assert_eq!(body.hosts[0].hostname, "node-a");
    assert_eq!(body.hosts[0].memory_used_percent, MetricValue::Known(85.2));
    assert!(body.hosts[0].high_memory);
    assert!(!body.hosts[1].reachable);
}

#[tokio::test]
async fn unknown_fields_serialize_as_null() {
    let store = SnapshotStore::new();
    store.publish(sample_snapshot()).await;

    let addr = spawn_test_api(store).await;

    let body: serde_json::Value = reqwest::get(format!("http://{addr}/api/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let host2 = &body["hosts"][1];
    assert_eq!(host2["memory_used_percent"], serde_json::Value::Null);
    assert_eq!(host2["auth_failure_count"], serde_json::Value::Null);
    // Derived and status flags are always concrete booleans.
    assert_eq!(host2["high_memory"], serde_json::Value::Bool(false));
    assert_eq!(host2["reachable"], serde_json::Value::Bool(false));
}

#[tokio::test]
async fn metrics_endpoint_serves_empty_before_the_first_cycle() {
    let addr = spawn_test_api(SnapshotStore::new()).await;

    let body: MetricsResponse = reqwest::get(format!("http://{addr}/api/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(body.hosts.is_empty());
}

#[tokio::test]
async fn polling_never_mutates_the_snapshot() {
    let store = SnapshotStore::new();
    store.publish(sample_snapshot()).await;

    let addr = spawn_test_api(store.clone()).await;

    let first: MetricsResponse = reqwest::get(format!("http://{addr}/api/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: MetricsResponse = reqwest::get(format!("http://{addr}/api/metrics"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(first.hosts[0].timestamp, second.hosts[0].timestamp);
    assert_eq!(store.latest().await.records.len(), 2);
}

#[tokio::test]
async fn health_endpoint_responds() {
    let addr = spawn_test_api(SnapshotStore::new()).await;

    let response = reqwest::get(format!("http://{addr}/api/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
