//! Ingestion endpoint handler.
//!
//! Accepts two body shapes on one route:
//! 1. `application/json`: `{"tenant_id": "...", "log_id": "...", "text": "..."}`
//! 2. `text/plain`: raw text, tenant in the `X-Tenant-ID` header

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use pipeline_core::new_request_id;
use std::time::Instant;
use telemetry::metrics;
use tracing::{info, warn};

use crate::extractors::{ContentType, TenantHeader};
use crate::response::{ApiError, IngestResponse};
use crate::state::AppState;

/// POST /ingest
///
/// Responds 202 once the message is on the queue. Processing happens later and its
/// outcome is never reported back to the caller.
pub async fn ingest_handler(
    State(state): State<AppState>,
    ContentType(content_type): ContentType,
    TenantHeader(tenant): TenantHeader,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let start = Instant::now();
    let request_id = new_request_id();

    metrics().logs_received.inc();

    let receipt = state
        .gateway
        .ingest(&request_id, &body, &content_type, tenant.as_deref())
        .await
        .map_err(|e| {
            metrics().logs_rejected.inc();
            warn!(
                request_id = %request_id,
                tenant_header = tenant.as_deref().unwrap_or(""),
                content_type = %content_type,
                code = e.error_code(),
                error = %e,
                "Rejected ingest request"
            );
            ApiError::from(e).with_request_id(request_id.clone())
        })?;

    let latency_ms = start.elapsed().as_millis() as u64;
    metrics().logs_accepted.inc();
    metrics().ingest_latency_ms.observe(latency_ms);

    info!(
        tenant_id = %receipt.tenant_id,
        log_id = %receipt.log_id,
        request_id = %receipt.request_id,
        bytes = body.len(),
        latency_ms = latency_ms,
        "Log accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(receipt.into())))
}
