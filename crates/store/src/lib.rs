//! Processed log persistence.
//!
//! Records are keyed by `(tenant_id, log_id)` with the tenant as the leading key
//! component. `upsert` is a full replace, which makes redelivered messages harmless.

pub mod clickhouse_store;
pub mod config;
pub mod isolation;
pub mod memory;
pub mod schema;

pub use clickhouse_store::ClickHouseStore;
pub use config::*;
pub use isolation::{verify_tenant_isolation, IsolationReport};
pub use memory::MemoryStore;

use async_trait::async_trait;
use pipeline_core::{is_safe_identifier, Error, ProcessedLog, Result};
use serde::Serialize;
use std::sync::Arc;

/// Aggregate store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_logs: u64,
    pub total_tenants: u64,
    pub backend: &'static str,
}

#[async_trait]
pub trait LogStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Replace whatever is stored at `(tenant_id, log_id)` with `record`.
    async fn upsert(&self, tenant_id: &str, log_id: &str, record: &ProcessedLog) -> Result<()>;

    async fn get(&self, tenant_id: &str, log_id: &str) -> Result<Option<ProcessedLog>>;

    /// Most recently written first.
    async fn list(&self, tenant_id: &str, limit: usize) -> Result<Vec<ProcessedLog>>;

    /// Distinct tenant ids with at least one record.
    async fn tenants(&self) -> Result<Vec<String>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// Reject writes whose record disagrees with its key or whose key is unsafe.
pub(crate) fn check_key(tenant_id: &str, log_id: &str, record: &ProcessedLog) -> Result<()> {
    if !is_safe_identifier(tenant_id) || !is_safe_identifier(log_id) {
        return Err(Error::invalid_tenant(format!(
            "unsafe store key ({:?}, {:?})",
            tenant_id, log_id
        )));
    }
    if !record.matches_key(tenant_id, log_id) {
        return Err(Error::invalid_tenant(format!(
            "record ({}, {}) does not match key ({}, {})",
            record.tenant_id, record.log_id, tenant_id, log_id
        )));
    }
    Ok(())
}

/// Build the configured backend. The ClickHouse schema is created on first use.
pub fn connect(config: &StoreConfig) -> Result<Arc<dyn LogStore>> {
    let store: Arc<dyn LogStore> = match config.kind {
        StoreKind::Memory => Arc::new(MemoryStore::new()),
        StoreKind::Clickhouse => Arc::new(ClickHouseStore::new(config.clickhouse.clone())?),
    };
    tracing::info!(backend = store.backend(), "Store backend selected");
    Ok(store)
}
