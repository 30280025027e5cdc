//! Core types, normalization, validation and redaction for the log pipeline.

pub mod error;
pub mod limits;
pub mod message;
pub mod payload;
pub mod redact;
pub mod tenant;

pub use error::{Error, Result, ValidationErrorCode};
pub use limits::IngestLimits;
pub use message::{new_request_id, NormalizedMessage, ProcessedLog, Source};
pub use payload::{ContentKind, RawPayload, StructuredPayload};
pub use redact::redact;
pub use tenant::{generate_log_id, is_safe_identifier, normalize_tenant_id};
