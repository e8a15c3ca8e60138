pub mod actors;
pub mod api;
pub mod config;
pub mod normalize;
pub mod orchestrator;
pub mod sources;
pub mod store;
pub mod thresholds;
pub mod util;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A telemetry value that may be unavailable.
///
/// Backends report gaps as missing keys, empty strings or sentinel markers.
/// All of those become `Unknown` here, so downstream code never has to
/// compare against magic strings or risk parsing one as a number.
///
/// Serializes as the plain value, or `null` when unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricValue<T> {
    Known(T),
    #[default]
    Unknown,
}

impl<T> MetricValue<T> {
    pub fn is_known(&self) -> bool {
        matches!(self, MetricValue::Known(_))
    }

    /// Borrow the inner value, if there is one.
    pub fn as_known(&self) -> Option<&T> {
        match self {
            MetricValue::Known(value) => Some(value),
            MetricValue::Unknown => None,
        }
    }

    pub fn into_known(self) -> Option<T> {
        match self {
            MetricValue::Known(value) => Some(value),
            MetricValue::Unknown => None,
        }
    }
}

impl<T> From<Option<T>> for MetricValue<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => MetricValue::Known(value),
            None => MetricValue::Unknown,
        }
    }
}

impl<T: Serialize> Serialize for MetricValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Known(value) => serializer.serialize_some(value),
            MetricValue::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for MetricValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

/// The normalized per-host result of one collection cycle.
///
/// Every numeric field is either a finite number or `Unknown` - the
/// normalizer guarantees this regardless of which source produced the raw
/// data. `high_memory` is derived each cycle and is never unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetricRecord {
    /// Authoritative display name for the host.
    pub hostname: String,

    /// Collection time at the hub (not backend-reported time).
    pub timestamp: DateTime<Utc>,

    /// Configured network address of the host.
    pub address: String,

    pub os_version: MetricValue<String>,
    pub kernel_version: MetricValue<String>,

    pub cpu_load_percent: MetricValue<f64>,
    pub memory_used_percent: MetricValue<f64>,
    pub disk_used_percent: MetricValue<f64>,

    /// Authentication failures observed in the host's auth log.
    pub auth_failure_count: MetricValue<u64>,

    /// Derived flag: memory usage is known and above the configured threshold.
    pub high_memory: bool,

    /// Whether collection for this host succeeded at all this cycle.
    pub reachable: bool,
}

impl CanonicalMetricRecord {
    /// Record for a host whose collection failed entirely this cycle.
    pub fn unreachable(hostname: String, address: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            hostname,
            timestamp,
            address,
            os_version: MetricValue::Unknown,
            kernel_version: MetricValue::Unknown,
            cpu_load_percent: MetricValue::Unknown,
            memory_used_percent: MetricValue::Unknown,
            disk_used_percent: MetricValue::Unknown,
            auth_failure_count: MetricValue::Unknown,
            high_memory: false,
            reachable: false,
        }
    }
}
