//! Time-series query source
//!
//! Issues one query per metric dimension (CPU, memory, disk, uname
//! identity) against a Prometheus-compatible endpoint on each host, at a
//! fixed metrics port. Each query independently answers zero or one
//! result vector; an empty answer is a missing metric, not a failure.
//! Only the endpoint itself being broken (transport error, non-2xx,
//! malformed body) fails the host.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{instrument, trace};

use crate::config::HostTarget;

use super::{
    RawObservation, SourceAdapter, SourceError, SourceKind, SourceResult, fields,
};

/// Query expressions, one round trip each.
const CPU_QUERY: &str = r#"100 - avg(rate(node_cpu_seconds_total{mode="idle"}[5m])) * 100"#;
const MEMORY_QUERY: &str =
    r#"100 * (1 - node_memory_MemAvailable_bytes / node_memory_MemTotal_bytes)"#;
const DISK_QUERY: &str = r#"100 - 100 * node_filesystem_avail_bytes{mountpoint="/"} / node_filesystem_size_bytes{mountpoint="/"}"#;
const UNAME_QUERY: &str = "node_uname_info";

/// Instant-query response, the subset of the wire format we read
#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    data: QueryData,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<ResultVector>,
}

#[derive(Debug, Deserialize)]
struct ResultVector {
    #[serde(default)]
    metric: HashMap<String, String>,

    /// `[unix_timestamp, "value"]` - the value arrives as a string
    value: (f64, String),
}

/// Source adapter querying a time-series endpoint per host
pub struct TimeSeriesQueryAdapter {
    /// HTTP client (reused across requests for efficiency)
    client: reqwest::Client,

    /// Port the query endpoint listens on, on every host
    port: u16,
}

impl TimeSeriesQueryAdapter {
    pub fn new(port: u16) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            port,
        }
    }

    /// Run one instant query, returning the first result vector if any.
    async fn query(&self, target: &HostTarget, expr: &str) -> SourceResult<Option<ResultVector>> {
        let url = format!("http://{}:{}/api/v1/query", target.address, self.port);

        trace!("querying {url}");

        let response = self
            .client
            .get(&url)
            .query(&[("query", expr)])
            .send()
            .await
            .map_err(|e| SourceError::QueryBackendUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SourceError::QueryBackendUnavailable(format!(
                "HTTP {} from {url}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::QueryBackendUnavailable(e.to_string()))?;

        let parsed: QueryResponse = serde_json::from_str(&body).map_err(|e| {
            SourceError::QueryBackendUnavailable(format!("malformed query response: {e}"))
        })?;

        if parsed.status != "success" {
            return Err(SourceError::QueryBackendUnavailable(format!(
                "query answered status '{}'",
                parsed.status
            )));
        }

        Ok(parsed.data.result.into_iter().next())
    }
}

#[async_trait]
impl SourceAdapter for TimeSeriesQueryAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::TimeSeries
    }

    #[instrument(skip(self, target), fields(host = %target.name))]
    async fn fetch(&self, target: &HostTarget) -> SourceResult<RawObservation> {
        let mut raw = RawObservation::new(SourceKind::TimeSeries);

        // Values stay source-shaped strings; coercion is the normalizer's job.
        if let Some(sample) = self.query(target, CPU_QUERY).await? {
            raw = raw.with_text(fields::CPU_LOAD, sample.value.1);
        }
        if let Some(sample) = self.query(target, MEMORY_QUERY).await? {
            raw = raw.with_text(fields::MEMORY, sample.value.1);
        }
        if let Some(sample) = self.query(target, DISK_QUERY).await? {
            raw = raw.with_text(fields::DISK, sample.value.1);
        }

        if let Some(uname) = self.query(target, UNAME_QUERY).await? {
            if let Some(nodename) = uname.metric.get("nodename") {
                raw = raw.with_hostname(nodename.clone());
            }
            if let Some(sysname) = uname.metric.get("sysname") {
                raw = raw.with_text(fields::OS, sysname.clone());
            }
            if let Some(release) = uname.metric.get("release") {
                raw = raw.with_text(fields::KERNEL, release.clone());
            }
        }

        Ok(raw)
    }
}
