//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use telemetry::{health, metrics};

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET / - Service info.
pub async fn root_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "log-ingestion-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "healthy",
        "queue": state.queue.kind().to_string(),
        "endpoints": ["/ingest", "/health", "/health/ready", "/health/live"],
    }))
}

/// GET /health - Full health check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = health().report();

    Json(HealthResponse {
        status: format!("{:?}", report.status).to_lowercase(),
        queue: state.queue.kind().to_string(),
        queue_connected: health().queue.is_healthy(),
        store_connected: health().store.is_healthy(),
        queue_depth: metrics().queue_depth.get(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /health/ready - Readiness probe (can accept traffic).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe (service is running).
pub async fn live_handler() -> StatusCode {
    if health().is_alive() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
