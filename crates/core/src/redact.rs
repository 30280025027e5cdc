//! PII redaction.
//!
//! Categories are applied in a fixed order and each one scans the output of the
//! previous one, so a substring already replaced by an earlier category cannot match a
//! later one.

use regex::Regex;
use std::sync::LazyLock;

/// A redaction category and its pattern.
pub struct PiiPattern {
    pub name: &'static str,
    pub placeholder: &'static str,
    regex: Regex,
}

impl PiiPattern {
    fn new(name: &'static str, placeholder: &'static str, pattern: &str) -> Self {
        Self {
            name,
            placeholder,
            regex: Regex::new(pattern).expect("invalid PII pattern"),
        }
    }
}

static PATTERNS: LazyLock<Vec<PiiPattern>> = LazyLock::new(|| {
    vec![
        PiiPattern::new(
            "phone",
            "[PHONE_REDACTED]",
            r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b",
        ),
        PiiPattern::new(
            "email",
            "[EMAIL_REDACTED]",
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b",
        ),
        PiiPattern::new("ssn", "[SSN_REDACTED]", r"\b\d{3}-\d{2}-\d{4}\b"),
        PiiPattern::new(
            "credit_card",
            "[CREDIT_CARD_REDACTED]",
            r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b",
        ),
        PiiPattern::new(
            "ip_address",
            "[IP_ADDRESS_REDACTED]",
            r"\b(?:\d{1,3}\.){3}\d{1,3}\b",
        ),
    ]
});

/// Categories in application order.
pub fn patterns() -> &'static [PiiPattern] {
    &PATTERNS
}

/// Redact PII from `text`, returning the new text and the number of replacements.
///
/// With `enabled == false` the text is returned unchanged with a count of zero.
pub fn redact(text: &str, enabled: bool) -> (String, usize) {
    if !enabled {
        return (text.to_string(), 0);
    }

    let mut current = text.to_string();
    let mut count = 0;

    for pattern in PATTERNS.iter() {
        let matches = pattern.regex.find_iter(&current).count();
        if matches == 0 {
            continue;
        }
        count += matches;
        current = pattern
            .regex
            .replace_all(&current, pattern.placeholder)
            .into_owned();
    }

    (current, count)
}
