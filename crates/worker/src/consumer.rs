//! Pull-style worker: drives the queue's consume loop into the processor.

use std::sync::Arc;

use pipeline_core::Result;
use queue::{MessageHandler, MessageQueue};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::processor::LogProcessor;

pub struct ConsumerWorker {
    queue: Arc<dyn MessageQueue>,
    processor: Arc<LogProcessor>,
}

impl ConsumerWorker {
    pub fn new(queue: Arc<dyn MessageQueue>, processor: Arc<LogProcessor>) -> Self {
        Self { queue, processor }
    }

    /// Consume until `shutdown` is cancelled, restarting the loop if it fails.
    ///
    /// Returns after in-flight messages have finished.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let options = self.processor.config().consume_options();
        info!(
            queue = %self.queue.kind(),
            max_in_flight = options.max_in_flight,
            "Consumer worker starting"
        );

        loop {
            let handler: Arc<dyn MessageHandler> = self.processor.clone();
            match self.queue.consume(handler, options, shutdown.clone()).await {
                Ok(()) if shutdown.is_cancelled() => break,
                Ok(()) => {
                    info!("Consume loop returned early, restarting");
                }
                Err(e) => {
                    error!(error = %e, "Consume loop failed");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(options.error_backoff) => {}
            }
        }

        info!("Consumer worker stopped");
        Ok(())
    }
}
