//! Common test setup functions.

use api::{router, state::AppState};
use axum::Router;
use pipeline_core::{IngestLimits, NormalizedMessage};
use queue::MessageQueue;
use std::sync::Arc;
use store::{LogStore, MemoryStore};
use worker::{LogProcessor, ProcessOutcome, WorkerConfig};

use crate::mocks::MockQueue;

/// Test context wiring the real gateway router to a capturing queue and an
/// in-memory store.
///
/// - `router` is the production Axum router with all middleware
/// - `queue` captures every published message
/// - `processor` is the production worker, fed from the captured messages
pub struct TestContext {
    pub queue: Arc<MockQueue>,
    pub store: Arc<MemoryStore>,
    pub processor: Arc<LogProcessor>,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_limits(IngestLimits::default())
    }

    pub fn with_limits(limits: IngestLimits) -> Self {
        let queue = Arc::new(MockQueue::new());
        let store = Arc::new(MemoryStore::new());
        let processor = Arc::new(LogProcessor::new(
            store.clone() as Arc<dyn LogStore>,
            fast_worker_config(),
        ));
        let router = router(AppState::new(
            queue.clone() as Arc<dyn MessageQueue>,
            limits,
        ));

        Self {
            queue,
            store,
            processor,
            router,
        }
    }

    /// Get all messages captured by the mock queue.
    pub fn captured(&self) -> Vec<NormalizedMessage> {
        self.queue.captured()
    }

    /// Run every captured message through the worker, as a consumer would.
    pub async fn process_captured(&self) -> Vec<ProcessOutcome> {
        let mut outcomes = Vec::new();
        for message in self.captured() {
            outcomes.push(self.processor.process(message).await);
        }
        outcomes
    }

    /// Set the mock queue to fail (for error testing).
    pub fn set_queue_failure(&self, should_fail: bool) {
        self.queue.set_should_fail(should_fail);
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker config without the simulated per-character delay.
pub fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        processing_time_per_char: 0.0,
        ..Default::default()
    }
}
