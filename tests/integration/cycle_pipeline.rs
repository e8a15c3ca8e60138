//! End-to-end collection cycles: adapter → normalizer → threshold → snapshot

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use fleetwatch::MetricValue;
use fleetwatch::config::HostTarget;
use fleetwatch::sources::fact_cache::{FactBatch, FactCacheAdapter, FactMap, FactRunner};
use fleetwatch::sources::remote_exec::{RemoteExecAdapter, RemoteSession, SessionBackend};
use fleetwatch::sources::timeseries::TimeSeriesQueryAdapter;
use fleetwatch::sources::SourceResult;
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

/// Matches any instant query whose expression contains the given marker.
struct QueryContains(&'static str);

impl wiremock::Match for QueryContains {
    fn matches(&self, request: &wiremock::Request) -> bool {
        request.url.query().unwrap_or("").contains(self.0)
    }
}

fn vector_body(value: &str) -> serde_json::Value {
    serde_json::json!({
        "status": "success",
        "data": {
            "resultType": "vector",
            "result": [{"metric": {}, "value": [1_700_000_000.0, value]}]
        }
    })
}

fn empty_vector_body() -> serde_json::Value {
    serde_json::json!({
        "status": "success",
        "data": {"resultType": "vector", "result": []}
    })
}

/// The two-host scenario: one host reports high memory, the other's
/// queries all answer empty. An empty answer is a missing metric, not an
/// unreachable host.
#[tokio::test]
async fn timeseries_cycle_distinguishes_missing_metrics_from_unreachable() {
    let mock_server = MockServer::start().await;
    let mock_url = url::Url::parse(&mock_server.uri()).unwrap();
    let port = mock_url.port().unwrap();

    // host1 polls as 127.0.0.1, host2 as localhost; the Host header tells
    // them apart on the shared mock endpoint.
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(header("host", format!("127.0.0.1:{port}").as_str()))
        .and(QueryContains("MemAvailable"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vector_body("85.2")))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(empty_vector_body()))
        .mount(&mock_server)
        .await;

    let targets = create_test_targets(&[("host1", "127.0.0.1"), ("host2", "localhost")]);
    let engine = create_test_engine(targets, Arc::new(TimeSeriesQueryAdapter::new(port)));

    let snapshot = engine.run_cycle().await;
    assert_eq!(snapshot.records.len(), 2);

    let host1 = &snapshot.records[0];
    assert!(host1.reachable);
    assert_eq!(host1.memory_used_percent, MetricValue::Known(85.2));
    assert!(host1.high_memory);

    let host2 = &snapshot.records[1];
    assert!(host2.reachable, "empty query answers are not unreachability");
    assert_eq!(host2.memory_used_percent, MetricValue::Unknown);
    assert!(!host2.high_memory);
}

struct StaticFactRunner {
    facts: HashMap<String, FactMap>,
}

#[async_trait]
impl FactRunner for StaticFactRunner {
    async fn run_batch(&self, _targets: &[HostTarget]) -> SourceResult<FactBatch> {
        Ok(FactBatch {
            facts: self.facts.clone(),
        })
    }
}

#[tokio::test]
async fn fact_cache_cycle_normalizes_mixed_value_shapes() {
    let mut facts = HashMap::new();
    facts.insert(
        "host1".to_string(),
        serde_json::from_value(serde_json::json!({
            "ansible_hostname": "node-a",
            "os": "Debian 12",
            "kernel": "6.1.0-18-amd64",
            "cpu_load": "12.5",
            "memory": 91.0,
            "disk": "41.0",
            "auth_errors": "7"
        }))
        .unwrap(),
    );
    facts.insert(
        "host2".to_string(),
        serde_json::from_value(serde_json::json!({
            "os": "N/A",
            "memory": "N/A",
            "disk": 38.5
        }))
        .unwrap(),
    );

    let adapter = FactCacheAdapter::new(Arc::new(StaticFactRunner { facts }));
    let targets = create_test_targets(&[("host1", "172.16.0.10"), ("host2", "172.16.0.20")]);
    let engine = create_test_engine(targets, Arc::new(adapter));

    let snapshot = engine.run_cycle().await;

    let host1 = &snapshot.records[0];
    assert_eq!(host1.hostname, "node-a");
    assert_eq!(host1.os_version, MetricValue::Known("Debian 12".to_string()));
    assert_eq!(host1.cpu_load_percent, MetricValue::Known(12.5));
    assert_eq!(host1.memory_used_percent, MetricValue::Known(91.0));
    assert_eq!(host1.auth_failure_count, MetricValue::Known(7));
    assert!(host1.high_memory);
    assert!(host1.reachable);

    // The "N/A" markers the backend writes never survive as values.
    let host2 = &snapshot.records[1];
    assert_eq!(host2.hostname, "host2");
    assert_eq!(host2.os_version, MetricValue::Unknown);
    assert_eq!(host2.memory_used_percent, MetricValue::Unknown);
    assert_eq!(host2.disk_used_percent, MetricValue::Known(38.5));
    assert!(!host2.high_memory);
    assert!(host2.reachable);
}

struct StaticLogBackend {
    log: &'static str,
}

struct StaticLogSession {
    log: &'static str,
}

#[async_trait]
impl SessionBackend for StaticLogBackend {
    async fn connect(&self, _target: &HostTarget) -> SourceResult<Box<dyn RemoteSession>> {
        Ok(Box::new(StaticLogSession { log: self.log }))
    }
}

#[async_trait]
impl RemoteSession for StaticLogSession {
    async fn exec(&mut self, _command: &str) -> SourceResult<Vec<u8>> {
        Ok(self.log.as_bytes().to_vec())
    }
}

#[tokio::test]
async fn remote_exec_cycle_contributes_only_the_auth_count() {
    let backend = StaticLogBackend {
        log: "sshd[1]: Failed password for root\nsshd[2]: Accepted publickey for ops\n",
    };
    let adapter = RemoteExecAdapter::new(Arc::new(backend), Path::new("/var/log/auth.log"));

    let targets = create_test_targets(&[("host1", "172.16.0.10")]);
    let engine = create_test_engine(targets, Arc::new(adapter));

    let snapshot = engine.run_cycle().await;
    let record = &snapshot.records[0];

    assert!(record.reachable);
    assert_eq!(record.auth_failure_count, MetricValue::Known(1));

    // Fields this source never produces stay unknown.
    assert_eq!(record.memory_used_percent, MetricValue::Unknown);
    assert_eq!(record.os_version, MetricValue::Unknown);
    assert!(!record.high_memory);
}
