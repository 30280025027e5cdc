//! Per-message processing.
//!
//! Each message moves through `Received → Simulating → Redacting → Persisting` and
//! ends `Done` or `Failed`. [`LogProcessor::process_payload`] is the single entry
//! point for both the pull consume loop and the push endpoint.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pipeline_core::{redact, Error, NormalizedMessage, ProcessedLog, Result};
use queue::{Delivery, MessageHandler};
use serde::Serialize;
use store::LogStore;
use telemetry::{health, metrics};
use tracing::{debug, error, info, info_span, Instrument};

use crate::config::WorkerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Simulating,
    Redacting,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Simulating => "simulating",
            Self::Redacting => "redacting",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Result of processing one payload.
#[derive(Debug)]
pub enum ProcessOutcome {
    Done(ProcessedSummary),
    /// Persisting failed; a push sender should redeliver
    Failed(Error),
    /// Payload could not be decoded; dropped for good
    Malformed(Error),
}

impl ProcessOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedSummary {
    pub tenant_id: String,
    pub log_id: String,
    pub redaction_count: usize,
    pub processing_time_seconds: f64,
}

/// Running totals, updated only by this processor's own completions.
#[derive(Debug, Default)]
struct Counters {
    successful: AtomicU64,
    failed: AtomicU64,
    processing_micros: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorStats {
    pub total_messages: u64,
    pub successful: u64,
    pub failed: u64,
    /// Percent of messages that reached Done
    pub success_rate: f64,
    pub total_processing_time_seconds: f64,
    pub average_processing_time_seconds: f64,
}

pub struct LogProcessor {
    store: Arc<dyn LogStore>,
    config: WorkerConfig,
    counters: Counters,
}

impl LogProcessor {
    pub fn new(store: Arc<dyn LogStore>, config: WorkerConfig) -> Self {
        Self {
            store,
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Decode a queue payload and process it.
    pub async fn process_payload(&self, payload: &[u8]) -> ProcessOutcome {
        match NormalizedMessage::from_slice(payload) {
            Ok(message) => self.process(message).await,
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics().malformed_messages.inc();
                metrics().logs_failed.inc();
                error!(
                    stage = %Stage::Received,
                    bytes = payload.len(),
                    error = %e,
                    "Dropping malformed message, data lost"
                );
                ProcessOutcome::Malformed(e)
            }
        }
    }

    /// Process a decoded message.
    pub async fn process(&self, message: NormalizedMessage) -> ProcessOutcome {
        let span = info_span!(
            "process",
            tenant_id = %message.tenant_id,
            log_id = %message.log_id,
            request_id = %message.request_id,
        );
        self.run_stages(message).instrument(span).await
    }

    async fn run_stages(&self, message: NormalizedMessage) -> ProcessOutcome {
        let start = Instant::now();
        debug!(stage = %Stage::Received, source = message.source.as_str(), "Processing log");

        let chars = message.text.chars().count();
        let delay = self.config.simulated_delay(chars);
        debug!(stage = %Stage::Simulating, chars, delay_ms = %delay.as_millis());
        tokio::time::sleep(delay).await;

        debug!(stage = %Stage::Redacting);
        let (modified, redactions) = redact(&message.text, self.config.enable_pii_redaction);
        if redactions > 0 {
            metrics().redactions_applied.inc_by(redactions as u64);
            info!(redactions, "Redacted PII");
        }

        debug!(stage = %Stage::Persisting);
        let elapsed = start.elapsed();
        let record =
            ProcessedLog::from_message(&message, modified, redactions, elapsed.as_secs_f64());

        let store_start = Instant::now();
        let persisted = self
            .store
            .upsert(&message.tenant_id, &message.log_id, &record)
            .await;
        metrics()
            .store_latency_ms
            .observe(store_start.elapsed().as_millis() as u64);

        match persisted {
            Ok(()) => {
                let elapsed = start.elapsed();
                self.counters.successful.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .processing_micros
                    .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
                metrics().store_writes.inc();
                metrics().logs_processed.inc();
                metrics()
                    .processing_latency_ms
                    .observe(elapsed.as_millis() as u64);
                health().store.set_healthy();

                info!(
                    stage = %Stage::Done,
                    time_s = %format!("{:.3}", elapsed.as_secs_f64()),
                    "Processed log"
                );
                ProcessOutcome::Done(ProcessedSummary {
                    tenant_id: message.tenant_id,
                    log_id: message.log_id,
                    redaction_count: redactions,
                    processing_time_seconds: record.processing_time_seconds,
                })
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                metrics().store_errors.inc();
                metrics().logs_failed.inc();
                error!(stage = %Stage::Failed, error = %e, "Failed to persist processed log");
                ProcessOutcome::Failed(e)
            }
        }
    }

    pub fn stats(&self) -> ProcessorStats {
        let successful = self.counters.successful.load(Ordering::Relaxed);
        let failed = self.counters.failed.load(Ordering::Relaxed);
        let total = successful + failed;
        let total_time = self.counters.processing_micros.load(Ordering::Relaxed) as f64 / 1e6;

        ProcessorStats {
            total_messages: total,
            successful,
            failed,
            success_rate: if total > 0 {
                round_to(successful as f64 / total as f64 * 100.0, 2)
            } else {
                0.0
            },
            total_processing_time_seconds: round_to(total_time, 3),
            average_processing_time_seconds: if successful > 0 {
                round_to(total_time / successful as f64, 3)
            } else {
                0.0
            },
        }
    }
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

#[async_trait]
impl MessageHandler for LogProcessor {
    async fn handle(&self, delivery: Delivery) -> Result<()> {
        if delivery.attempt > 1 {
            debug!(delivery_id = %delivery.id, attempt = delivery.attempt, "Redelivery");
        }
        match self.process_payload(&delivery.payload).await {
            ProcessOutcome::Done(_) => Ok(()),
            ProcessOutcome::Failed(e) | ProcessOutcome::Malformed(e) => Err(e),
        }
    }
}
