//! Redpanda (Kafka-compatible) backend using rskafka.
//!
//! - One cached partition client, created on first use and dropped after errors
//! - Offsets tracked in-process and advanced only past settled deliveries
//! - A crashed delivery stops the offset, so the rest of the batch is fetched again

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use pipeline_core::{Error, NormalizedMessage, Result};
use rskafka::client::{
    partition::{Compression, OffsetAt, PartitionClient, UnknownTopicHandling},
    ClientBuilder, Credentials, SaslConfig,
};
use rskafka::record::Record;
use telemetry::{health, metrics};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{RedpandaConfig, StartOffset};
use crate::dispatch::{DeliveryOutcome, Dispatcher};
use crate::{backoff, ConsumeOptions, Delivery, MessageHandler, MessageQueue, QueueKind};

const UNINITIALIZED: i64 = -1;

/// Root store for managed clusters.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

pub struct RedpandaQueue {
    config: RedpandaConfig,
    client: RwLock<Option<Arc<PartitionClient>>>,
    /// Next offset to fetch
    next_offset: AtomicI64,
    closed: AtomicBool,
}

impl RedpandaQueue {
    pub fn new(config: RedpandaConfig) -> Result<Self> {
        if config.brokers.is_empty() {
            return Err(Error::config("redpanda.brokers must not be empty"));
        }

        info!(
            brokers = %config.broker_string(),
            topic = %config.topic,
            partition = config.partition,
            "Configured Redpanda queue"
        );

        Ok(Self {
            config,
            client: RwLock::new(None),
            next_offset: AtomicI64::new(UNINITIALIZED),
            closed: AtomicBool::new(false),
        })
    }

    async fn ensure_connected(&self) -> Result<Arc<PartitionClient>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::queue_unavailable("redpanda queue is closed"));
        }

        {
            let client = self.client.read().await;
            if let Some(ref c) = *client {
                return Ok(c.clone());
            }
        }

        let mut builder = ClientBuilder::new(self.config.brokers.clone());

        if let Some((username, password)) = self.config.credentials() {
            builder = builder
                .tls_config(create_tls_config())
                .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                    username.to_string(),
                    password.to_string(),
                )));
        } else if self.config.tls {
            builder = builder.tls_config(create_tls_config());
        }

        let client = builder.build().await.map_err(|e| {
            health().queue.set_unhealthy(e.to_string());
            Error::queue_unavailable(format!("Failed to connect to Redpanda: {}", e))
        })?;

        let partition_client = client
            .partition_client(
                self.config.topic.clone(),
                self.config.partition,
                UnknownTopicHandling::Error,
            )
            .await
            .map_err(|e| {
                health().queue.set_unhealthy(e.to_string());
                Error::queue_unavailable(format!("Failed to get partition client: {}", e))
            })?;

        let partition_client = Arc::new(partition_client);
        health().queue.set_healthy();

        {
            let mut guard = self.client.write().await;
            *guard = Some(partition_client.clone());
        }

        Ok(partition_client)
    }

    async fn reset_connection(&self) {
        let mut client = self.client.write().await;
        *client = None;
        debug!("Redpanda connection reset");
    }

    async fn current_offset(&self, client: &PartitionClient) -> Result<i64> {
        let current = self.next_offset.load(Ordering::SeqCst);
        if current != UNINITIALIZED {
            return Ok(current);
        }

        let at = match self.config.start_offset {
            StartOffset::Earliest => OffsetAt::Earliest,
            StartOffset::Latest => OffsetAt::Latest,
        };
        let offset = client
            .get_offset(at)
            .await
            .map_err(|e| Error::queue_unavailable(format!("Failed to get offset: {}", e)))?;

        self.next_offset.store(offset, Ordering::SeqCst);
        info!(
            topic = %self.config.topic,
            partition = self.config.partition,
            offset = offset,
            "Consumer initialized at offset"
        );
        Ok(offset)
    }

    /// Fetch one batch and hand every record to the dispatcher.
    async fn poll_batch(
        &self,
        dispatcher: &Dispatcher,
        options: &ConsumeOptions,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let client = self.ensure_connected().await?;
        let offset = self.current_offset(&client).await?;
        let max_wait_ms = options.poll_interval.as_millis().clamp(1, i32::MAX as u128) as i32;

        let (records, high_watermark) = client
            .fetch_records(offset, 1..self.config.fetch_max_bytes, max_wait_ms)
            .await
            .map_err(|e| Error::queue_unavailable(format!("Failed to fetch records: {}", e)))?;

        metrics()
            .queue_depth
            .set(high_watermark.saturating_sub(offset).max(0) as u64);

        if records.is_empty() {
            return Ok(());
        }

        debug!(count = records.len(), offset_start = offset, "Fetched batch from Redpanda");

        let mut pending: Vec<(i64, Option<JoinHandle<DeliveryOutcome>>)> =
            Vec::with_capacity(records.len());
        let mut interrupted_at = None;

        for record in records {
            let Some(value) = record.record.value else {
                warn!(offset = record.offset, "Skipping record without value");
                pending.push((record.offset, None));
                continue;
            };

            let Some(slot) = dispatcher.reserve(shutdown).await else {
                interrupted_at = Some(record.offset);
                break;
            };

            let delivery = Delivery::new(record.offset.to_string(), Bytes::from(value));
            let handle = dispatcher.dispatch(slot, delivery, |_| {});
            pending.push((record.offset, Some(handle)));
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        for (offset, handle) in pending {
            let outcome = match handle {
                Some(handle) => handle.await.unwrap_or(DeliveryOutcome::Crashed),
                None => DeliveryOutcome::Handled,
            };
            outcomes.push((offset, outcome));
        }

        let next = next_commit_offset(offset, &outcomes, interrupted_at);
        self.next_offset.store(next, Ordering::SeqCst);
        debug!(offset = next, "Committed offset");

        if has_crash(&outcomes) {
            warn!(offset = next, "Delivery crashed, refetching after backoff");
            backoff(options.error_backoff, shutdown).await;
        }
        Ok(())
    }
}

/// Whether a batch left a delivery to refetch.
fn has_crash(outcomes: &[(i64, DeliveryOutcome)]) -> bool {
    outcomes.iter().any(|(_, o)| !o.is_settled())
}

/// Offset to resume from after a batch: the first delivery that did not settle, the
/// first record never dispatched, or one past the last record.
fn next_commit_offset(
    current: i64,
    outcomes: &[(i64, DeliveryOutcome)],
    interrupted_at: Option<i64>,
) -> i64 {
    if let Some((offset, _)) = outcomes.iter().find(|(_, o)| !o.is_settled()) {
        return *offset;
    }
    if let Some(offset) = interrupted_at {
        return offset;
    }
    outcomes
        .iter()
        .map(|(offset, _)| offset + 1)
        .max()
        .unwrap_or(current)
}

#[async_trait]
impl MessageQueue for RedpandaQueue {
    fn kind(&self) -> QueueKind {
        QueueKind::Redpanda
    }

    async fn publish(&self, message: &NormalizedMessage) -> Result<()> {
        let start = Instant::now();
        let client = self.ensure_connected().await.inspect_err(|_| {
            metrics().queue_publish_errors.inc();
        })?;

        let record = Record {
            key: Some(format!("{}:{}", message.tenant_id, message.log_id).into_bytes()),
            value: Some(message.to_vec()?),
            headers: BTreeMap::from([
                ("tenant_id".to_string(), message.tenant_id.clone().into_bytes()),
                ("request_id".to_string(), message.request_id.clone().into_bytes()),
            ]),
            timestamp: Utc::now(),
        };

        match client.produce(vec![record], Compression::NoCompression).await {
            Ok(_offsets) => {
                metrics().logs_published.inc();
                debug!(
                    tenant_id = %message.tenant_id,
                    log_id = %message.log_id,
                    latency_ms = %start.elapsed().as_millis(),
                    "Published to Redpanda"
                );
                Ok(())
            }
            Err(e) => {
                metrics().queue_publish_errors.inc();
                health().queue.set_unhealthy(e.to_string());
                self.reset_connection().await;
                Err(Error::queue_unavailable(format!("Failed to produce: {}", e)))
            }
        }
    }

    async fn consume(
        &self,
        handler: Arc<dyn MessageHandler>,
        options: ConsumeOptions,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let dispatcher = Dispatcher::new(handler, options.max_in_flight);
        info!(
            topic = %self.config.topic,
            max_in_flight = options.max_in_flight,
            "Redpanda consumer started"
        );

        loop {
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = self.poll_batch(&dispatcher, &options, &shutdown) => result,
            };

            if let Err(e) = result {
                error!(error = %e, "Error polling Redpanda");
                self.reset_connection().await;
                if !backoff(options.error_backoff, &shutdown).await {
                    break;
                }
            }

            if shutdown.is_cancelled() {
                break;
            }
        }

        dispatcher.drain().await;
        info!("Redpanda consumer stopped");
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.reset_connection().await;
    }
}
