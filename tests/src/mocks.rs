//! Mock implementations for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use pipeline_core::{Error, NormalizedMessage, ProcessedLog, Result};
use queue::{ConsumeOptions, MessageHandler, MessageQueue, QueueKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use store::{LogStore, MemoryStore, StoreStats};
use tokio_util::sync::CancellationToken;

/// Mock queue that captures published messages in memory.
///
/// Implements the same `MessageQueue` trait as the real backends, so tests can check
/// exactly what the gateway would have put on the wire.
#[derive(Clone, Default)]
pub struct MockQueue {
    messages: Arc<Mutex<Vec<NormalizedMessage>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured messages.
    pub fn captured(&self) -> Vec<NormalizedMessage> {
        self.messages.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }
}

#[async_trait]
impl MessageQueue for MockQueue {
    fn kind(&self) -> QueueKind {
        QueueKind::Memory
    }

    async fn publish(&self, message: &NormalizedMessage) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(Error::queue_unavailable("Mock queue failure"));
        }
        self.messages.lock().push(message.clone());
        Ok(())
    }

    async fn consume(
        &self,
        _handler: Arc<dyn MessageHandler>,
        _options: ConsumeOptions,
        shutdown: CancellationToken,
    ) -> Result<()> {
        shutdown.cancelled().await;
        Ok(())
    }

    async fn close(&self) {}
}

/// Store that fails the first `failures` upserts, then behaves like `MemoryStore`.
pub struct FlakyStore {
    inner: MemoryStore,
    remaining_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(failures: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            remaining_failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl LogStore for FlakyStore {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn upsert(&self, tenant_id: &str, log_id: &str, record: &ProcessedLog) -> Result<()> {
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(Error::store_unavailable("injected store failure"));
        }
        self.inner.upsert(tenant_id, log_id, record).await
    }

    async fn get(&self, tenant_id: &str, log_id: &str) -> Result<Option<ProcessedLog>> {
        self.inner.get(tenant_id, log_id).await
    }

    async fn list(&self, tenant_id: &str, limit: usize) -> Result<Vec<ProcessedLog>> {
        self.inner.list(tenant_id, limit).await
    }

    async fn tenants(&self) -> Result<Vec<String>> {
        self.inner.tenants().await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::Source;

    #[tokio::test]
    async fn test_mock_queue_captures_messages() {
        let mock = MockQueue::new();
        let message = NormalizedMessage::new("acme", "l1", "hello", Source::Text, "req");

        mock.publish(&message).await.unwrap();
        assert_eq!(mock.count(), 1);
        assert_eq!(mock.captured()[0], message);
    }

    #[tokio::test]
    async fn test_mock_queue_failure_mode() {
        let mock = MockQueue::new();
        mock.set_should_fail(true);

        let message = NormalizedMessage::new("acme", "l1", "hello", Source::Text, "req");
        assert!(mock.publish(&message).await.is_err());
        assert_eq!(mock.count(), 0);
    }

    #[tokio::test]
    async fn test_flaky_store_recovers() {
        let store = FlakyStore::new(1);
        let message = NormalizedMessage::new("acme", "l1", "hello", Source::Text, "req");
        let record = ProcessedLog::from_message(&message, "hello".into(), 0, 0.0);

        assert!(store.upsert("acme", "l1", &record).await.is_err());
        store.upsert("acme", "l1", &record).await.unwrap();
        assert!(store.get("acme", "l1").await.unwrap().is_some());
    }
}
