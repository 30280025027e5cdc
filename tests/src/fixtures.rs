//! Test fixtures.

use base64::{engine::general_purpose::STANDARD, Engine};
use pipeline_core::NormalizedMessage;
use uuid::Uuid;

/// Structured ingest body.
pub fn json_log(tenant_id: &str, log_id: &str, text: &str) -> serde_json::Value {
    serde_json::json!({
        "tenant_id": tenant_id,
        "log_id": log_id,
        "text": text,
    })
}

/// Unique log id for tests sharing global state.
pub fn unique_log_id(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..8])
}

/// A line containing one value of every redacted category.
pub fn pii_text() -> &'static str {
    "Call 555-123-4567 or mail jane.doe@example.com, ssn 123-45-6789, \
     card 4111 1111 1111 1111, from 192.168.0.1"
}

/// Expected redaction of `pii_text()`.
pub fn pii_text_redacted() -> &'static str {
    "Call [PHONE_REDACTED] or mail [EMAIL_REDACTED], ssn [SSN_REDACTED], \
     card [CREDIT_CARD_REDACTED], from [IP_ADDRESS_REDACTED]"
}

/// Pub/Sub push envelope for a message.
pub fn push_envelope(message: &NormalizedMessage, message_id: &str) -> serde_json::Value {
    let data = STANDARD.encode(message.to_vec().expect("message serializes"));
    serde_json::json!({
        "message": {
            "data": data,
            "messageId": message_id,
            "publishTime": "2024-01-01T00:00:00Z",
            "attributes": {
                "tenant_id": message.tenant_id,
                "log_id": message.log_id,
            },
        },
        "subscription": "projects/test/subscriptions/log-processing-push",
    })
}
