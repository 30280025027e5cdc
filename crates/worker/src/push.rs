//! Push delivery endpoint.
//!
//! Pub/Sub POSTs an envelope per message and treats any non-2xx status as a nack.
//! Processed messages answer 200. Messages that can never be processed are logged as
//! data loss and answered 204 so they are not redelivered. Only a store failure answers
//! 500 and asks for redelivery. A body that is not an envelope at all answers 400.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use queue::PushEnvelope;
use serde_json::json;
use telemetry::metrics;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::processor::{LogProcessor, ProcessOutcome};

#[derive(Clone)]
pub struct PushState {
    processor: Arc<LogProcessor>,
    slots: Arc<Semaphore>,
}

impl PushState {
    pub fn new(processor: Arc<LogProcessor>) -> Self {
        let slots = processor.config().max_concurrent_messages.max(1);
        Self {
            processor,
            slots: Arc::new(Semaphore::new(slots)),
        }
    }
}

pub fn router(processor: Arc<LogProcessor>) -> Router {
    Router::new()
        .route("/", get(root).post(receive))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(PushState::new(processor))
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy", "service": "log-processor-worker"}))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "healthy"}))
}

async fn stats(State(state): State<PushState>) -> Json<serde_json::Value> {
    Json(json!({
        "worker": state.processor.stats(),
        "metrics": metrics().snapshot(),
    }))
}

async fn receive(State(state): State<PushState>, body: Bytes) -> Response {
    let envelope: PushEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            error!(error = %e, "Push request is not a valid envelope");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let delivery = match envelope.into_delivery() {
        Ok(delivery) => delivery,
        Err(e) => {
            metrics().malformed_messages.inc();
            error!(error = %e, "Dropping undecodable push message, data lost");
            return StatusCode::NO_CONTENT.into_response();
        }
    };

    info!(message_id = %delivery.id, attempt = delivery.attempt, "Received push message");

    let Ok(_slot) = state.slots.acquire().await else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    match state.processor.process_payload(&delivery.payload).await {
        ProcessOutcome::Done(summary) => (StatusCode::OK, Json(summary)).into_response(),
        ProcessOutcome::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        // Already logged as data loss; acknowledged so the broker stops redelivering
        ProcessOutcome::Malformed(_) => StatusCode::NO_CONTENT.into_response(),
    }
}
