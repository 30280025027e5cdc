//! Queue message and persisted record types.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::tenant::{is_normalized_tenant, is_safe_identifier};

/// How a log entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Json,
    Text,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }

    /// Label stored on the processed record.
    pub fn upload_label(&self) -> &'static str {
        match self {
            Self::Json => "json_upload",
            Self::Text => "text_upload",
        }
    }
}

/// Canonical unit placed on the queue.
///
/// Built by the gateway only after identifiers have been validated and normalized, so
/// every consumer can rely on `tenant_id` and `log_id` being safe key segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub tenant_id: String,
    pub log_id: String,
    pub text: String,
    pub source: Source,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub ingested_at: DateTime<Utc>,
    pub request_id: String,
}

impl NormalizedMessage {
    pub fn new(
        tenant_id: impl Into<String>,
        log_id: impl Into<String>,
        text: impl Into<String>,
        source: Source,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            log_id: log_id.into(),
            text: text.into(),
            source,
            ingested_at: Utc::now(),
            request_id: request_id.into(),
        }
    }

    /// Decode a queue payload.
    ///
    /// Anything that does not decode into a message with safe identifiers is a
    /// `MalformedMessage`; such payloads are never retried.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        let message: Self = serde_json::from_slice(payload)
            .map_err(|e| Error::malformed(format!("invalid queue payload: {}", e)))?;
        message.check_identifiers()?;
        Ok(message)
    }

    /// Encode for the queue wire.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    fn check_identifiers(&self) -> Result<()> {
        if !is_normalized_tenant(&self.tenant_id) {
            return Err(Error::malformed(format!(
                "unsafe tenant_id in queue payload: {:?}",
                self.tenant_id
            )));
        }
        if !is_safe_identifier(&self.log_id) {
            return Err(Error::malformed(format!(
                "unsafe log_id in queue payload: {:?}",
                self.log_id
            )));
        }
        Ok(())
    }
}

/// Accepts RFC 3339 or a naive ISO-8601 timestamp, which is read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
}

/// Persisted result of processing one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedLog {
    pub tenant_id: String,
    pub log_id: String,
    pub request_id: String,
    pub ingested_at: DateTime<Utc>,
    pub source: String,
    pub original_text: String,
    pub modified_data: String,
    pub processed_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
    pub character_count: u64,
    pub redaction_count: u64,
}

impl ProcessedLog {
    /// Build the record for a message once processing has finished.
    pub fn from_message(
        message: &NormalizedMessage,
        modified_data: String,
        redaction_count: usize,
        processing_time_seconds: f64,
    ) -> Self {
        Self {
            tenant_id: message.tenant_id.clone(),
            log_id: message.log_id.clone(),
            request_id: message.request_id.clone(),
            ingested_at: message.ingested_at,
            source: message.source.upload_label().to_string(),
            original_text: message.text.clone(),
            modified_data,
            processed_at: Utc::now(),
            processing_time_seconds: round_millis(processing_time_seconds),
            character_count: message.text.chars().count() as u64,
            redaction_count: redaction_count as u64,
        }
    }

    /// Returns true if the record belongs at `(tenant_id, log_id)`.
    pub fn matches_key(&self, tenant_id: &str, log_id: &str) -> bool {
        self.tenant_id == tenant_id && self.log_id == log_id
    }
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Generate a fresh request id.
pub fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}
