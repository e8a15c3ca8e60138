//! API response types

use serde::{Deserialize, Serialize};

use crate::CanonicalMetricRecord;

/// Response for `GET /api/metrics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub hosts: Vec<CanonicalMetricRecord>,
}

/// Response for `GET /api/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
