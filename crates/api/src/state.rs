//! Application state shared across handlers.

use std::sync::Arc;

use pipeline_core::IngestLimits;
use queue::MessageQueue;

use crate::gateway::Gateway;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    /// Queue the gateway publishes to (memory in tests)
    pub queue: Arc<dyn MessageQueue>,
}

impl AppState {
    pub fn new(queue: Arc<dyn MessageQueue>, limits: IngestLimits) -> Self {
        Self {
            gateway: Arc::new(Gateway::new(queue.clone(), limits)),
            queue,
        }
    }

    pub fn limits(&self) -> IngestLimits {
        self.gateway.limits()
    }
}
