//! Tenant and log identifier normalization.
//!
//! Identifiers end up as storage key segments, so everything that reaches the queue
//! is restricted to ASCII alphanumerics plus `_` and `-`.

use chrono::Utc;
use uuid::Uuid;
use validator::ValidationError;

use crate::limits::{LOG_ID_SUFFIX_LEN, MAX_IDENTIFIER_LEN, MIN_IDENTIFIER_LEN, TENANT_PREFIX};

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Normalize a raw tenant identifier.
///
/// Lowercases, replaces every character outside `[a-zA-Z0-9_-]` with `_` and prefixes
/// `tenant` when the result would start with `_` or `-`. Total: any input (including
/// the empty string) produces a valid tenant id, and the function is idempotent.
pub fn normalize_tenant_id(raw: &str) -> String {
    let mut normalized: String = raw
        .chars()
        .map(|c| {
            if is_identifier_char(c) {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    if normalized.is_empty() || normalized.starts_with(['_', '-']) {
        normalized.insert_str(0, TENANT_PREFIX);
    }

    normalized
}

/// Returns true if `value` is a safe storage path segment.
pub fn is_safe_identifier(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_identifier_char)
}

/// Returns true if `value` is a normalized tenant id.
pub fn is_normalized_tenant(value: &str) -> bool {
    is_safe_identifier(value)
        && !value.starts_with(['_', '-'])
        && !value.chars().any(|c| c.is_ascii_uppercase())
}

/// Validator hook for caller-supplied identifiers.
pub fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    let len = value.chars().count() as u64;
    if !(MIN_IDENTIFIER_LEN..=MAX_IDENTIFIER_LEN).contains(&len) || !is_safe_identifier(value) {
        let mut err = ValidationError::new("identifier");
        err.message = Some(
            format!(
                "must be {}-{} characters of letters, digits, hyphens and underscores",
                MIN_IDENTIFIER_LEN, MAX_IDENTIFIER_LEN
            )
            .into(),
        );
        return Err(err);
    }
    Ok(())
}

/// Generate a log id for payloads that arrive without one.
///
/// Format: `{tenant}_{YYYYmmddHHMMSS}_{random8}`.
pub fn generate_log_id(tenant_id: &str) -> String {
    let timestamp = Utc::now().format("%Y%m%d%H%M%S");
    let unique = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        tenant_id,
        timestamp,
        &unique[..LOG_ID_SUFFIX_LEN]
    )
}
