//! At-least-once message queue between the gateway and the worker.
//!
//! Every backend implements [`MessageQueue`]. A delivery may be handed to the handler
//! more than once (consumer restart, broker redelivery, handler crash), so handlers
//! must be idempotent.

pub mod config;
pub mod dispatch;
pub mod memory;
pub mod pubsub;
pub mod redpanda;

pub use config::*;
pub use dispatch::{DeliveryOutcome, Dispatcher};
pub use memory::MemoryQueue;
pub use pubsub::{PubSubQueue, PushEnvelope};
pub use redpanda::RedpandaQueue;

use async_trait::async_trait;
use bytes::Bytes;
use pipeline_core::{NormalizedMessage, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One delivery of a queued payload.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Backend-specific id (memory sequence, broker offset, Pub/Sub message id)
    pub id: String,
    pub payload: Bytes,
    /// 1 on first delivery, incremented on each known redelivery
    pub attempt: u32,
}

impl Delivery {
    pub fn new(id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            attempt: 1,
        }
    }
}

/// Consumer-side callback.
///
/// An `Err` is logged by the consume loop and the delivery counts as handled; the
/// loop moves on. Only a panic leaves the delivery eligible for redelivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, delivery: Delivery) -> Result<()>;
}

/// Tuning for a consume loop.
#[derive(Debug, Clone, Copy)]
pub struct ConsumeOptions {
    /// Deliveries processed concurrently
    pub max_in_flight: usize,
    /// Pause after a failed poll or before redelivering a crashed delivery
    pub error_backoff: Duration,
    /// Broker-side wait for new data on each poll
    pub poll_interval: Duration,
}

impl Default for ConsumeOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 10,
            error_backoff: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Producer and consumer sides of a queue backend.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    fn kind(&self) -> QueueKind;

    /// Publish a message. Returns once the backend has acknowledged it.
    async fn publish(&self, message: &NormalizedMessage) -> Result<()>;

    /// Run the consume loop until `shutdown` is cancelled.
    ///
    /// Stops pulling on cancellation and returns after in-flight deliveries finish.
    async fn consume(
        &self,
        handler: Arc<dyn MessageHandler>,
        options: ConsumeOptions,
        shutdown: CancellationToken,
    ) -> Result<()>;

    /// Release connections. Idempotent; never fails.
    async fn close(&self);
}

/// Build the configured backend. Connections are established lazily.
pub fn connect(config: &QueueConfig) -> Result<Arc<dyn MessageQueue>> {
    let queue: Arc<dyn MessageQueue> = match config.kind {
        QueueKind::Memory => Arc::new(MemoryQueue::new()),
        QueueKind::Redpanda => Arc::new(RedpandaQueue::new(config.redpanda.clone())?),
        QueueKind::Pubsub => Arc::new(PubSubQueue::new(config.pubsub.clone())?),
    };
    tracing::info!(kind = %queue.kind(), "Queue backend selected");
    Ok(queue)
}

/// Sleep for `duration` unless cancelled first. Returns false if cancelled.
pub(crate) async fn backoff(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}
