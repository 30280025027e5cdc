//! Size and identifier limits for the log pipeline.
//!
//! The text limit is configurable (`IngestLimits`); the identifier limits are fixed
//! because identifiers double as storage key segments.

use serde::{Deserialize, Serialize};

/// Default maximum text size in bytes (10MB).
pub const DEFAULT_MAX_TEXT_BYTES: usize = 10 * 1024 * 1024;

/// Minimum tenant_id / log_id length (chars).
pub const MIN_IDENTIFIER_LEN: u64 = 1;

/// Maximum tenant_id / log_id length (chars).
pub const MAX_IDENTIFIER_LEN: u64 = 100;

/// Prefix applied to normalized tenant ids that would start with `_` or `-`.
pub const TENANT_PREFIX: &str = "tenant";

/// Length of the random suffix of generated log ids.
pub const LOG_ID_SUFFIX_LEN: usize = 8;

/// Headroom on top of the text limit for JSON framing and escaping.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// Ingestion size policy, derived from a single configured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestLimits {
    /// Maximum UTF-8 byte length of an accepted text
    #[serde(default = "default_max_text_bytes")]
    pub max_text_bytes: usize,
}

fn default_max_text_bytes() -> usize {
    DEFAULT_MAX_TEXT_BYTES
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_text_bytes: default_max_text_bytes(),
        }
    }
}

impl IngestLimits {
    pub fn new(max_text_bytes: usize) -> Self {
        Self { max_text_bytes }
    }

    /// Returns true if the text fits the limit.
    pub fn text_fits(&self, text: &str) -> bool {
        text.len() <= self.max_text_bytes
    }

    /// Upper bound for raw request bodies. JSON escaping can inflate a text up to 6x.
    pub fn max_body_bytes(&self) -> usize {
        self.max_text_bytes
            .saturating_mul(6)
            .saturating_add(BODY_OVERHEAD_BYTES)
    }
}
