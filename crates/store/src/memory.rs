//! In-memory store: tenant → log id → record.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use pipeline_core::{ProcessedLog, Result};

use crate::{check_key, LogStore, StoreStats};

struct Versioned {
    version: u64,
    record: ProcessedLog,
}

#[derive(Default)]
struct Tables {
    tenants: HashMap<String, HashMap<String, Versioned>>,
    next_version: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records across tenants.
    pub fn len(&self) -> usize {
        self.tables.read().tenants.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn upsert(&self, tenant_id: &str, log_id: &str, record: &ProcessedLog) -> Result<()> {
        check_key(tenant_id, log_id, record)?;

        let mut tables = self.tables.write();
        tables.next_version += 1;
        let version = tables.next_version;
        tables
            .tenants
            .entry(tenant_id.to_string())
            .or_default()
            .insert(
                log_id.to_string(),
                Versioned {
                    version,
                    record: record.clone(),
                },
            );
        Ok(())
    }

    async fn get(&self, tenant_id: &str, log_id: &str) -> Result<Option<ProcessedLog>> {
        let tables = self.tables.read();
        Ok(tables
            .tenants
            .get(tenant_id)
            .and_then(|logs| logs.get(log_id))
            .map(|v| v.record.clone()))
    }

    async fn list(&self, tenant_id: &str, limit: usize) -> Result<Vec<ProcessedLog>> {
        let tables = self.tables.read();
        let Some(logs) = tables.tenants.get(tenant_id) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<&Versioned> = logs.values().collect();
        entries.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(entries
            .into_iter()
            .take(limit)
            .map(|v| v.record.clone())
            .collect())
    }

    async fn tenants(&self) -> Result<Vec<String>> {
        let tables = self.tables.read();
        let mut tenants: Vec<String> = tables
            .tenants
            .iter()
            .filter(|(_, logs)| !logs.is_empty())
            .map(|(tenant, _)| tenant.clone())
            .collect();
        tenants.sort();
        Ok(tenants)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let tables = self.tables.read();
        Ok(StoreStats {
            total_logs: tables.tenants.values().map(|l| l.len() as u64).sum(),
            total_tenants: tables.tenants.values().filter(|l| !l.is_empty()).count() as u64,
            backend: self.backend(),
        })
    }
}
