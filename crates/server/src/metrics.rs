//! Observability Metrics
//!
//! Prometheus metrics for sessions and recognition.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::time::Duration;

use crate::http::HttpState;
use crate::ServerError;

/// Global Prometheus handle
static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Initialize metrics recorder
///
/// Installs the recorder on first call; later calls return the same handle.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    let handle = METRICS_HANDLE
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new().install_recorder()?;
            register_default_metrics();
            Ok::<_, metrics_exporter_prometheus::BuildError>(handle)
        })
        .map_err(|e| ServerError::Metrics(e.to_string()))?;
    Ok(handle.clone())
}

fn register_default_metrics() {
    gauge!("chipper_sessions_active").set(0.0);
    counter!("chipper_sessions_total").absolute(0);
    histogram!("chipper_session_duration_seconds").record(0.0);
    histogram!("chipper_recognition_duration_seconds").record(0.0);
}

/// Record a call entering the dispatcher
pub fn record_session_started(engine: &'static str) {
    counter!("chipper_sessions_total", "engine" => engine).increment(1);
    gauge!("chipper_sessions_active", "engine" => engine).increment(1.0);
}

/// Record a call leaving the dispatcher
pub fn record_session_finished(engine: &'static str, elapsed: Duration, outcome: &'static str) {
    gauge!("chipper_sessions_active", "engine" => engine).decrement(1.0);
    histogram!("chipper_session_duration_seconds", "engine" => engine, "outcome" => outcome)
        .record(elapsed.as_secs_f64());
}

/// Record a failed call by error kind
pub fn record_session_error(engine: &'static str, kind: &'static str) {
    counter!("chipper_session_errors_total", "engine" => engine, "kind" => kind).increment(1);
}

/// Record one engine recognition
pub fn record_recognition(engine: &'static str, elapsed: Duration, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    histogram!("chipper_recognition_duration_seconds", "engine" => engine, "status" => status)
        .record(elapsed.as_secs_f64());
}

/// Record the intent a session resolved to
pub fn record_intent(engine: &'static str, fallback: bool) {
    let kind = if fallback { "fallback" } else { "matched" };
    counter!("chipper_intents_total", "engine" => engine, "kind" => kind).increment(1);
}

/// Metrics endpoint handler
///
/// Returns Prometheus-formatted metrics.
pub async fn metrics_handler(State(state): State<HttpState>) -> impl IntoResponse {
    match state.metrics.as_ref() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            "Metrics not initialized".to_string(),
        ),
    }
}
