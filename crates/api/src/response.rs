//! Standardized API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pipeline_core::Error;
use serde::{Deserialize, Serialize};

use crate::gateway::Receipt;

/// Acceptance response for `POST /ingest`.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub message: String,
    pub log_id: String,
    pub tenant_id: String,
    pub request_id: String,
}

impl From<Receipt> for IngestResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            status: "accepted".to_string(),
            message: "Log queued for processing".to_string(),
            log_id: receipt.log_id,
            tenant_id: receipt.tenant_id,
            request_id: receipt.request_id,
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub queue: String,
    pub queue_connected: bool,
    pub store_connected: bool,
    pub queue_depth: u64,
    pub timestamp: String,
}

/// Error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error returned from handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse {
                status: "error".to_string(),
                code: code.into(),
                message: msg.into(),
                request_id: None,
            },
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.response.request_id = Some(request_id.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &err {
            Error::ValidationWithCode { message, .. } => message.clone(),
            Error::UnsupportedMediaType(msg)
            | Error::QueueUnavailable(msg)
            | Error::StoreUnavailable(msg)
            | Error::MalformedMessage(msg)
            | Error::InvalidTenant(msg) => msg.clone(),
            Error::Serialization(e) => e.to_string(),
            Error::Config(_) => "Internal server error".to_string(),
        };
        ApiError::with_code(status, err.error_code(), message)
    }
}
