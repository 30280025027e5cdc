//! ClickHouse schema for processed logs.
//!
//! - `ORDER BY (tenant_id, log_id)`: tenant is the leading key, per-tenant scans are
//!   range reads
//! - `ReplacingMergeTree(version)`: the highest version per key survives merges, and
//!   `FINAL` reads see only that row, giving replace-on-upsert semantics

pub const TABLE: &str = "processed_logs";

pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {}", database)
}

pub const CREATE_PROCESSED_LOGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS processed_logs (
    tenant_id String,
    log_id String,
    request_id String,
    ingested_at DateTime64(3, 'UTC'),
    source LowCardinality(String),
    original_text String,
    modified_data String,
    processed_at DateTime64(3, 'UTC'),
    processing_time_seconds Float64,
    character_count UInt64,
    redaction_count UInt64,
    version UInt64
)
ENGINE = ReplacingMergeTree(version)
ORDER BY (tenant_id, log_id)
SETTINGS index_granularity = 8192
"#;
