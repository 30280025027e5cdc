//! In-process metrics.
//!
//! Plain atomics; a snapshot is serialized for the stats endpoints and the periodic
//! stats log line.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Saturates at zero.
    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));
    }
}

const BUCKET_COUNT: usize = 12;

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds: 1ms .. 5min. Simulated processing of large texts takes minutes.
    buckets: [AtomicU64; BUCKET_COUNT],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; BUCKET_COUNT] = [
        1, 5, 10, 50, 100, 500, 1_000, 5_000, 10_000, 30_000, 60_000, 300_000,
    ];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(BUCKET_COUNT - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Pipeline metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    // Gateway
    pub logs_received: Counter,
    pub logs_accepted: Counter,
    pub logs_rejected: Counter,

    // Queue producer
    pub logs_published: Counter,
    pub queue_publish_errors: Counter,

    // Queue consumer / worker
    pub messages_consumed: Counter,
    pub logs_processed: Counter,
    pub logs_failed: Counter,
    pub malformed_messages: Counter,
    pub handler_crashes: Counter,
    pub redactions_applied: Counter,

    // Store
    pub store_writes: Counter,
    pub store_errors: Counter,

    // Latency
    pub ingest_latency_ms: Histogram,
    pub processing_latency_ms: Histogram,
    pub store_latency_ms: Histogram,

    // Gauges
    pub in_flight: Gauge,
    pub queue_depth: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            logs_received: self.logs_received.get(),
            logs_accepted: self.logs_accepted.get(),
            logs_rejected: self.logs_rejected.get(),
            logs_published: self.logs_published.get(),
            queue_publish_errors: self.queue_publish_errors.get(),
            messages_consumed: self.messages_consumed.get(),
            logs_processed: self.logs_processed.get(),
            logs_failed: self.logs_failed.get(),
            malformed_messages: self.malformed_messages.get(),
            handler_crashes: self.handler_crashes.get(),
            redactions_applied: self.redactions_applied.get(),
            store_writes: self.store_writes.get(),
            store_errors: self.store_errors.get(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            processing_latency_mean_ms: self.processing_latency_ms.mean(),
            store_latency_mean_ms: self.store_latency_ms.mean(),
            in_flight: self.in_flight.get(),
            queue_depth: self.queue_depth.get(),
        }
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub logs_received: u64,
    pub logs_accepted: u64,
    pub logs_rejected: u64,
    pub logs_published: u64,
    pub queue_publish_errors: u64,
    pub messages_consumed: u64,
    pub logs_processed: u64,
    pub logs_failed: u64,
    pub malformed_messages: u64,
    pub handler_crashes: u64,
    pub redactions_applied: u64,
    pub store_writes: u64,
    pub store_errors: u64,
    pub ingest_latency_mean_ms: f64,
    pub processing_latency_mean_ms: f64,
    pub store_latency_mean_ms: f64,
    pub in_flight: u64,
    pub queue_depth: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

pub fn metrics() -> &'static Metrics {
    &METRICS
}
