//! Ingestion gateway.
//!
//! Turns one HTTP body into one `NormalizedMessage` and hands it to the queue. The
//! receipt is only produced after the queue acknowledged the publish.

use std::sync::Arc;

use pipeline_core::{
    generate_log_id,
    limits::MAX_IDENTIFIER_LEN,
    normalize_tenant_id, ContentKind, Error, IngestLimits, NormalizedMessage, RawPayload, Result,
    Source, ValidationErrorCode,
};
use queue::MessageQueue;
use serde::Serialize;
use tracing::{debug, error};

pub const TENANT_HEADER: &str = "X-Tenant-ID";

/// Acceptance receipt returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub log_id: String,
    pub tenant_id: String,
    pub request_id: String,
}

pub struct Gateway {
    queue: Arc<dyn MessageQueue>,
    limits: IngestLimits,
}

impl Gateway {
    pub fn new(queue: Arc<dyn MessageQueue>, limits: IngestLimits) -> Self {
        Self { queue, limits }
    }

    pub fn limits(&self) -> IngestLimits {
        self.limits
    }

    /// Validate, normalize and publish one request body.
    pub async fn ingest(
        &self,
        request_id: &str,
        body: &[u8],
        content_type: &str,
        tenant_header: Option<&str>,
    ) -> Result<Receipt> {
        let message = self.normalize(request_id, body, content_type, tenant_header)?;

        if let Err(e) = self.queue.publish(&message).await {
            error!(
                tenant_id = %message.tenant_id,
                log_id = %message.log_id,
                request_id = %request_id,
                queue = %self.queue.kind(),
                error = %e,
                "Failed to publish message"
            );
            return Err(Error::queue_unavailable(
                "Failed to queue message for processing",
            ));
        }

        debug!(
            tenant_id = %message.tenant_id,
            log_id = %message.log_id,
            request_id = %request_id,
            "Message published"
        );

        Ok(Receipt {
            log_id: message.log_id,
            tenant_id: message.tenant_id,
            request_id: message.request_id,
        })
    }

    /// Build the canonical message for a body without publishing it.
    pub fn normalize(
        &self,
        request_id: &str,
        body: &[u8],
        content_type: &str,
        tenant_header: Option<&str>,
    ) -> Result<NormalizedMessage> {
        let kind = ContentKind::from_content_type(content_type)?;

        let raw_tenant = match kind {
            ContentKind::Structured => None,
            ContentKind::Unstructured => Some(required_tenant_header(tenant_header)?),
        };

        let payload = RawPayload::decode(kind, body)?;
        // Structured text only has to be non-empty, which the payload validator checks
        if kind == ContentKind::Unstructured && payload.text().trim().is_empty() {
            return Err(Error::validation_code(
                ValidationErrorCode::EmptyText,
                "Text payload cannot be empty",
            ));
        }
        if !self.limits.text_fits(payload.text()) {
            return Err(Error::validation_code(
                ValidationErrorCode::PayloadTooLarge,
                format!(
                    "Text payload exceeds maximum size of {} bytes",
                    self.limits.max_text_bytes
                ),
            ));
        }

        let message = match payload {
            RawPayload::Structured(p) => NormalizedMessage::new(
                normalize_tenant_id(&p.tenant_id),
                p.log_id,
                p.text,
                Source::Json,
                request_id,
            ),
            RawPayload::Unstructured { text } => {
                let tenant_id = normalize_tenant_id(raw_tenant.unwrap_or_default());
                if tenant_id.chars().count() > MAX_IDENTIFIER_LEN as usize {
                    return Err(Error::validation_code(
                        ValidationErrorCode::InvalidIdentifier,
                        format!(
                            "{} must be at most {} characters",
                            TENANT_HEADER, MAX_IDENTIFIER_LEN
                        ),
                    ));
                }
                let log_id = generate_log_id(&tenant_id);
                NormalizedMessage::new(tenant_id, log_id, text, Source::Text, request_id)
            }
        };

        Ok(message)
    }
}

fn required_tenant_header(header: Option<&str>) -> Result<&str> {
    match header.map(str::trim) {
        Some(tenant) if !tenant.is_empty() => Ok(tenant),
        _ => Err(Error::validation_code(
            ValidationErrorCode::MissingTenant,
            format!("{} header is required for text/plain content", TENANT_HEADER),
        )),
    }
}
