//! Inbound wire shapes accepted by the gateway.

use serde::Deserialize;
use validator::{Validate, ValidationErrors};

use crate::error::{Error, Result, ValidationErrorCode};
use crate::tenant::validate_identifier;

/// Recognized request body kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// `application/json`: `{tenant_id, log_id, text}`
    Structured,
    /// `text/plain`: raw body, tenant from the header
    Unstructured,
}

impl ContentKind {
    /// Classify a Content-Type header value. Matching is by substring so parameters
    /// such as `; charset=utf-8` are ignored.
    pub fn from_content_type(content_type: &str) -> Result<Self> {
        let lowered = content_type.to_ascii_lowercase();
        if lowered.contains("application/json") {
            Ok(Self::Structured)
        } else if lowered.contains("text/plain") {
            Ok(Self::Unstructured)
        } else {
            Err(Error::unsupported_media_type(format!(
                "Unsupported Content-Type: {}. Use application/json or text/plain",
                if content_type.is_empty() {
                    "<missing>"
                } else {
                    content_type
                }
            )))
        }
    }
}

/// Structured JSON body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StructuredPayload {
    #[validate(custom(function = "validate_identifier"))]
    pub tenant_id: String,
    #[validate(custom(function = "validate_identifier"))]
    pub log_id: String,
    #[validate(length(min = 1))]
    pub text: String,
}

impl StructuredPayload {
    pub fn parse(body: &[u8]) -> Result<Self> {
        let payload: Self = serde_json::from_slice(body).map_err(|e| {
            Error::validation_code(
                ValidationErrorCode::InvalidFormat,
                format!("Invalid JSON payload: {}", e),
            )
        })?;
        payload.validate().map_err(validation_error)?;
        Ok(payload)
    }
}

/// Decoded request body, before normalization.
#[derive(Debug, Clone)]
pub enum RawPayload {
    Structured(StructuredPayload),
    Unstructured { text: String },
}

impl RawPayload {
    /// Decode a body according to its kind. Text bodies must be UTF-8.
    pub fn decode(kind: ContentKind, body: &[u8]) -> Result<Self> {
        match kind {
            ContentKind::Structured => Ok(Self::Structured(StructuredPayload::parse(body)?)),
            ContentKind::Unstructured => {
                let text = std::str::from_utf8(body).map_err(|_| {
                    Error::validation_code(
                        ValidationErrorCode::InvalidFormat,
                        "Text payload must be valid UTF-8",
                    )
                })?;
                Ok(Self::Unstructured {
                    text: text.to_string(),
                })
            }
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Structured(p) => &p.text,
            Self::Unstructured { text } => text,
        }
    }
}

fn validation_error(errors: ValidationErrors) -> Error {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.keys().map(|k| k.to_string()).collect();
    fields.sort();

    // Identifier problems carry their own code; anything else is a format problem.
    let code = if field_errors
        .iter()
        .any(|(field, _)| *field == "tenant_id" || *field == "log_id")
    {
        ValidationErrorCode::InvalidIdentifier
    } else if field_errors.contains_key("text") {
        ValidationErrorCode::EmptyText
    } else {
        ValidationErrorCode::InvalidFormat
    };

    let mut detail: Vec<String> = field_errors
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{}: {}", field, msg),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect();
    detail.sort();

    Error::validation_code(
        code,
        format!("Invalid payload ({}): {}", fields.join(", "), detail.join("; ")),
    )
}
