//! HTTP endpoints next to the gRPC listener
//!
//! - `GET /health` reports the serving engine's identifier
//! - `GET /metrics` renders Prometheus metrics

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use crate::metrics::metrics_handler;

/// Shared state of the HTTP router
#[derive(Clone)]
pub struct HttpState {
    /// Identifier of the engine this process serves
    pub engine: &'static str,
    pub started_at: DateTime<Utc>,
    pub metrics: Option<PrometheusHandle>,
}

impl HttpState {
    pub fn new(engine: &'static str, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
            metrics,
        }
    }
}

/// Create the health/metrics router
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<HttpState>) -> (StatusCode, Json<serde_json::Value>) {
    let uptime = (Utc::now() - state.started_at).num_seconds().max(0);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "engine": state.engine,
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": uptime,
        })),
    )
}
