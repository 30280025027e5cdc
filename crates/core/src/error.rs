//! Unified error types for the log pipeline.
//!
//! Error codes:
//! - VALID_001-005: Validation errors (user-caused, never retried)
//! - MEDIA_001: Unsupported content type
//! - QUEUE_001: Queue unavailable
//! - STORE_001: Store unavailable
//! - MSG_001: Malformed queue message

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Body could not be parsed
    InvalidFormat,
    /// VALID_002: tenant_id / log_id outside the allowed alphabet or length
    InvalidIdentifier,
    /// VALID_003: Tenant header missing on unstructured ingestion
    MissingTenant,
    /// VALID_004: Empty or whitespace-only text
    EmptyText,
    /// VALID_005: Text exceeds the configured byte limit
    PayloadTooLarge,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
            Self::InvalidIdentifier => "VALID_002",
            Self::MissingTenant => "VALID_003",
            Self::EmptyText => "VALID_004",
            Self::PayloadTooLarge => "VALID_005",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::PayloadTooLarge => 413,
            _ => 400,
        }
    }
}

/// Unified error type for the log pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Validation error with code.
    #[error("[{code}] {message}")]
    ValidationWithCode {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("invalid tenant: {0}")]
    InvalidTenant(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a validation error with code.
    pub fn validation_code(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::ValidationWithCode {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(msg.into())
    }

    pub fn queue_unavailable(msg: impl Into<String>) -> Self {
        Self::QueueUnavailable(msg.into())
    }

    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMessage(msg.into())
    }

    pub fn invalid_tenant(msg: impl Into<String>) -> Self {
        Self::InvalidTenant(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationWithCode { http_status, .. } => *http_status,
            Self::UnsupportedMediaType(_) => 400,
            Self::QueueUnavailable(_) => 500,
            Self::StoreUnavailable(_) => 500,
            Self::MalformedMessage(_) => 400,
            Self::InvalidTenant(_) => 400,
            Self::Serialization(_) => 400,
            Self::Config(_) => 500,
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationWithCode { code, .. } => code,
            Self::Serialization(_) => ValidationErrorCode::InvalidFormat.code(),
            Self::InvalidTenant(_) => ValidationErrorCode::InvalidIdentifier.code(),
            Self::UnsupportedMediaType(_) => "MEDIA_001",
            Self::QueueUnavailable(_) => "QUEUE_001",
            Self::StoreUnavailable(_) => "STORE_001",
            Self::MalformedMessage(_) => "MSG_001",
            Self::Config(_) => "INTERNAL_001",
        }
    }
}
