//! Fleet metrics endpoint

use axum::{Json, extract::State};

use crate::api::{state::ApiState, types::MetricsResponse};

/// GET /api/metrics
///
/// Returns the latest published snapshot. A request arriving while a
/// cycle is in flight sees the previous snapshot, not a partial one.
pub async fn get_metrics(State(state): State<ApiState>) -> Json<MetricsResponse> {
    let snapshot = state.store.latest().await;

    Json(MetricsResponse {
        hosts: snapshot.records.clone(),
    })
}
