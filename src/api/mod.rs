//! REST API for the aggregation hub
//!
//! Thin serving shell over the snapshot store. Handlers only ever read
//! the last published snapshot; a poll request never triggers a
//! collection cycle and never waits on one.
//!
//! ## Endpoints
//!
//! - `GET /api/metrics` - latest fleet snapshot
//! - `GET /api/health` - health check

pub mod routes;
pub mod state;
pub mod types;

pub use state::ApiState;
pub use types::{HealthResponse, MetricsResponse};

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:5000")
    pub bind_addr: SocketAddr,

    /// Enable CORS for external dashboards
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: crate::util::get_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Spawn the API server
///
/// Starts an Axum HTTP server in a background task and returns the
/// server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    info!("starting API server on {}", config.bind_addr);

    let mut app = Router::new()
        .route("/api/metrics", get(routes::metrics::get_metrics))
        .route("/api/health", get(routes::health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
