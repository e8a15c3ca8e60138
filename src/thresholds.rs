//! Threshold evaluation over normalized metrics
//!
//! Pure functions deriving alert flags from canonical records. The policy
//! is carried as data so deployments can tune limits without touching the
//! evaluation logic.

use crate::{CanonicalMetricRecord, MetricValue};

/// Memory usage above this percentage flags a host, unless configured otherwise.
pub const DEFAULT_HIGH_MEMORY_PERCENT: f64 = 80.0;

pub fn default_high_memory_percent() -> f64 {
    DEFAULT_HIGH_MEMORY_PERCENT
}

/// Deployment-tunable alert thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub high_memory_percent: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            high_memory_percent: DEFAULT_HIGH_MEMORY_PERCENT,
        }
    }
}

impl ThresholdPolicy {
    /// True iff memory usage is known and strictly above the threshold.
    ///
    /// Unknown never alerts; an unreachable host is already visible through
    /// its `reachable` flag.
    pub fn high_memory(&self, memory_used_percent: MetricValue<f64>) -> bool {
        match memory_used_percent {
            MetricValue::Known(value) => value > self.high_memory_percent,
            MetricValue::Unknown => false,
        }
    }

    /// Recompute the derived flags on a freshly normalized record.
    ///
    /// Runs every cycle; the flag is never carried over from a previous
    /// snapshot.
    pub fn annotate(&self, record: &mut CanonicalMetricRecord) {
        record.high_memory = self.high_memory(record.memory_used_percent);
    }
}
