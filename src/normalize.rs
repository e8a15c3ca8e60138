//! Normalization of source-shaped observations
//!
//! One adapter reports memory as the string `"85.2"`, another as a float,
//! a third not at all; gaps arrive as missing keys, empty strings or
//! sentinel markers like `"N/A"`. This module reconciles all of that into
//! [`CanonicalMetricRecord`]s with a fixed field order: identity strings
//! first, numeric fields second. Derived flags belong to the threshold
//! evaluator and are not touched here.
//!
//! No input ever makes normalization fail - bad data becomes `Unknown`,
//! never an error and never a stored-verbatim garbage value.

use chrono::{DateTime, Utc};

use crate::config::HostTarget;
use crate::sources::{RawObservation, RawValue, fields};
use crate::{CanonicalMetricRecord, MetricValue};

/// Which hostname is authoritative for display when the backend reports
/// its own node identity and it differs from the configured target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityPreference {
    /// Backend-reported identity wins, target name is the fallback
    #[default]
    Backend,

    /// Configured target name wins, backend identity is the fallback
    Target,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    identity: IdentityPreference,
}

impl Normalizer {
    pub fn new(identity: IdentityPreference) -> Self {
        Self { identity }
    }

    /// Convert one adapter's raw output into a canonical record.
    ///
    /// Partial by design: fields the active source never produces stay
    /// `Unknown`. The record is marked reachable; unreachable records are
    /// built by the orchestrator without going through normalization.
    pub fn normalize(
        &self,
        target: &HostTarget,
        raw: &RawObservation,
        collected_at: DateTime<Utc>,
    ) -> CanonicalMetricRecord {
        CanonicalMetricRecord {
            hostname: self.hostname(target, raw),
            timestamp: collected_at,
            address: target.address.clone(),
            os_version: text_field(raw, fields::OS),
            kernel_version: text_field(raw, fields::KERNEL),
            cpu_load_percent: percent_field(raw, fields::CPU_LOAD),
            memory_used_percent: percent_field(raw, fields::MEMORY),
            disk_used_percent: percent_field(raw, fields::DISK),
            auth_failure_count: count_field(raw, fields::AUTH_FAILURES),
            high_memory: false,
            reachable: true,
        }
    }

    fn hostname(&self, target: &HostTarget, raw: &RawObservation) -> String {
        let backend = raw
            .reported_hostname
            .as_deref()
            .map(str::trim)
            .filter(|name| !is_sentinel(name));
        let configured = Some(target.name.trim()).filter(|name| !name.is_empty());

        let preferred = match self.identity {
            IdentityPreference::Backend => backend.or(configured),
            IdentityPreference::Target => configured.or(backend),
        };

        preferred.unwrap_or("unknown").to_string()
    }
}

/// Markers various backends use for "value not available".
///
/// Treated as absent: storing them verbatim is how the literal string
/// `"N/A"` ends up being parsed as a float somewhere downstream.
fn is_sentinel(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || matches!(
            trimmed.to_ascii_lowercase().as_str(),
            "n/a" | "na" | "none" | "null" | "not available" | "unknown"
        )
}

fn text_field(raw: &RawObservation, key: &str) -> MetricValue<String> {
    match raw.get(key) {
        Some(RawValue::Text(text)) if !is_sentinel(text) => {
            MetricValue::Known(text.trim().to_string())
        }
        Some(RawValue::Number(number)) => MetricValue::Known(number.to_string()),
        _ => MetricValue::Unknown,
    }
}

fn numeric(raw: &RawObservation, key: &str) -> Option<f64> {
    match raw.get(key)? {
        RawValue::Number(number) => Some(*number),
        RawValue::Text(text) => text.trim().parse::<f64>().ok(),
    }
}

/// Percentages must land in [0, 100]; anything else is a data-quality
/// problem and becomes `Unknown` rather than being stored verbatim.
fn percent_field(raw: &RawObservation, key: &str) -> MetricValue<f64> {
    match numeric(raw, key) {
        Some(value) if value.is_finite() && (0.0..=100.0).contains(&value) => {
            MetricValue::Known(value)
        }
        _ => MetricValue::Unknown,
    }
}

fn count_field(raw: &RawObservation, key: &str) -> MetricValue<u64> {
    match raw.get(key) {
        Some(RawValue::Number(number))
            if number.is_finite() && *number >= 0.0 && number.fract() == 0.0 =>
        {
            MetricValue::Known(*number as u64)
        }
        Some(RawValue::Text(text)) => text.trim().parse::<u64>().ok().into(),
        _ => MetricValue::Unknown,
    }
}
