//! ClickHouse backend.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use clickhouse::{Client, Row};
use pipeline_core::{Error, ProcessedLog, Result};
use serde::{Deserialize, Serialize};
use telemetry::health;
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::config::ClickHouseConfig;
use crate::schema::{create_database, CREATE_PROCESSED_LOGS_TABLE, TABLE};
use crate::{check_key, LogStore, StoreStats};

/// Row layout of `processed_logs`. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
struct LogRow {
    tenant_id: String,
    log_id: String,
    request_id: String,
    ingested_at: i64,
    source: String,
    original_text: String,
    modified_data: String,
    processed_at: i64,
    processing_time_seconds: f64,
    character_count: u64,
    redaction_count: u64,
    version: u64,
}

impl LogRow {
    fn from_record(record: &ProcessedLog, version: u64) -> Self {
        Self {
            tenant_id: record.tenant_id.clone(),
            log_id: record.log_id.clone(),
            request_id: record.request_id.clone(),
            ingested_at: record.ingested_at.timestamp_millis(),
            source: record.source.clone(),
            original_text: record.original_text.clone(),
            modified_data: record.modified_data.clone(),
            processed_at: record.processed_at.timestamp_millis(),
            processing_time_seconds: record.processing_time_seconds,
            character_count: record.character_count,
            redaction_count: record.redaction_count,
            version,
        }
    }

    fn into_record(self) -> ProcessedLog {
        ProcessedLog {
            tenant_id: self.tenant_id,
            log_id: self.log_id,
            request_id: self.request_id,
            ingested_at: from_millis(self.ingested_at),
            source: self.source,
            original_text: self.original_text,
            modified_data: self.modified_data,
            processed_at: from_millis(self.processed_at),
            processing_time_seconds: self.processing_time_seconds,
            character_count: self.character_count,
            redaction_count: self.redaction_count,
        }
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn store_error(context: &str, e: clickhouse::error::Error) -> Error {
    health().store.set_unhealthy(e.to_string());
    error!(error = %e, "{}", context);
    Error::store_unavailable(format!("{}: {}", context, e))
}

pub struct ClickHouseStore {
    client: Client,
    /// Client without a database, used to create it
    admin: Client,
    config: ClickHouseConfig,
    schema: OnceCell<()>,
    last_version: AtomicU64,
}

impl ClickHouseStore {
    pub fn new(config: ClickHouseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(Error::config("clickhouse.url must not be empty"));
        }

        let mut admin = Client::default().with_url(&config.url);
        if let Some(ref user) = config.username {
            admin = admin.with_user(user);
        }
        if let Some(ref pass) = config.password {
            admin = admin.with_password(pass);
        }
        let client = admin.clone().with_database(&config.database);

        info!(
            url = %config.url,
            database = %config.database,
            "Created ClickHouse store"
        );

        Ok(Self {
            client,
            admin,
            config,
            schema: OnceCell::new(),
            last_version: AtomicU64::new(0),
        })
    }

    /// Create the database and table once per process.
    async fn ensure_schema(&self) -> Result<()> {
        if !self.config.create_schema {
            return Ok(());
        }
        self.schema
            .get_or_try_init(|| async {
                self.admin
                    .query(&create_database(&self.config.database))
                    .execute()
                    .await
                    .map_err(|e| store_error("Failed to create database", e))?;
                self.client
                    .query(CREATE_PROCESSED_LOGS_TABLE)
                    .execute()
                    .await
                    .map_err(|e| store_error("Failed to create table", e))?;
                info!(database = %self.config.database, table = TABLE, "ClickHouse schema ready");
                Ok::<(), Error>(())
            })
            .await?;
        Ok(())
    }

    /// Strictly increasing per process, so the latest write wins merges.
    fn next_version(&self) -> u64 {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or_default().max(0) as u64;
        let mut prev = self.last_version.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self.last_version.compare_exchange(
                prev,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Drop every row of a tenant (test cleanup).
    pub async fn delete_tenant(&self, tenant_id: &str) -> Result<()> {
        self.ensure_schema().await?;
        self.client
            .query("ALTER TABLE processed_logs DELETE WHERE tenant_id = ? SETTINGS mutations_sync = 1")
            .bind(tenant_id)
            .execute()
            .await
            .map_err(|e| store_error("Failed to delete tenant", e))
    }
}

#[async_trait]
impl LogStore for ClickHouseStore {
    fn backend(&self) -> &'static str {
        "clickhouse"
    }

    async fn upsert(&self, tenant_id: &str, log_id: &str, record: &ProcessedLog) -> Result<()> {
        check_key(tenant_id, log_id, record)?;
        self.ensure_schema().await?;

        let row = LogRow::from_record(record, self.next_version());
        let mut insert = self
            .client
            .insert(TABLE)
            .map_err(|e| store_error("Failed to start insert", e))?;
        insert
            .write(&row)
            .await
            .map_err(|e| store_error("Failed to write row", e))?;
        insert
            .end()
            .await
            .map_err(|e| store_error("Failed to commit insert", e))?;

        health().store.set_healthy();
        Ok(())
    }

    async fn get(&self, tenant_id: &str, log_id: &str) -> Result<Option<ProcessedLog>> {
        self.ensure_schema().await?;
        let row = self
            .client
            .query("SELECT ?fields FROM processed_logs FINAL WHERE tenant_id = ? AND log_id = ? LIMIT 1")
            .bind(tenant_id)
            .bind(log_id)
            .fetch_optional::<LogRow>()
            .await
            .map_err(|e| store_error("Failed to get log", e))?;
        Ok(row.map(LogRow::into_record))
    }

    async fn list(&self, tenant_id: &str, limit: usize) -> Result<Vec<ProcessedLog>> {
        self.ensure_schema().await?;
        let rows = self
            .client
            .query("SELECT ?fields FROM processed_logs FINAL WHERE tenant_id = ? ORDER BY version DESC LIMIT ?")
            .bind(tenant_id)
            .bind(limit as u64)
            .fetch_all::<LogRow>()
            .await
            .map_err(|e| store_error("Failed to list logs", e))?;
        Ok(rows.into_iter().map(LogRow::into_record).collect())
    }

    async fn tenants(&self) -> Result<Vec<String>> {
        self.ensure_schema().await?;
        self.client
            .query("SELECT DISTINCT tenant_id FROM processed_logs ORDER BY tenant_id")
            .fetch_all::<String>()
            .await
            .map_err(|e| store_error("Failed to list tenants", e))
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.ensure_schema().await?;
        let total_logs: u64 = self
            .client
            .query("SELECT count() FROM processed_logs FINAL")
            .fetch_one()
            .await
            .map_err(|e| store_error("Failed to count logs", e))?;
        let total_tenants: u64 = self
            .client
            .query("SELECT uniqExact(tenant_id) FROM processed_logs")
            .fetch_one()
            .await
            .map_err(|e| store_error("Failed to count tenants", e))?;

        Ok(StoreStats {
            total_logs,
            total_tenants,
            backend: self.backend(),
        })
    }
}
