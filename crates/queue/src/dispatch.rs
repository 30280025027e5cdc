//! Bounded concurrent dispatch of deliveries to a handler.
//!
//! Shared by every pull-style consume loop. A slot is reserved before the next
//! delivery is pulled, so a busy worker stops taking messages off the queue.

use std::sync::Arc;

use telemetry::metrics;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, warn};

use crate::{Delivery, MessageHandler};

/// How a single delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Handler returned Ok
    Handled,
    /// Handler returned Err; logged and not redelivered
    Failed,
    /// Handler panicked; eligible for redelivery
    Crashed,
}

impl DeliveryOutcome {
    /// Whether the delivery can be acknowledged to the backend.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Crashed)
    }
}

pub struct Dispatcher {
    handler: Arc<dyn MessageHandler>,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl Dispatcher {
    pub fn new(handler: Arc<dyn MessageHandler>, max_in_flight: usize) -> Self {
        Self {
            handler,
            slots: Arc::new(Semaphore::new(max_in_flight.max(1))),
            tracker: TaskTracker::new(),
        }
    }

    /// Wait for a free slot. Returns `None` if shutdown fires first.
    pub async fn reserve(&self, shutdown: &CancellationToken) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => None,
            permit = self.slots.clone().acquire_owned() => permit.ok(),
        }
    }

    /// Run the handler for `delivery` in the background.
    ///
    /// `on_done` runs after the handler finishes and before the slot is released.
    pub fn dispatch<F>(
        &self,
        slot: OwnedSemaphorePermit,
        delivery: Delivery,
        on_done: F,
    ) -> JoinHandle<DeliveryOutcome>
    where
        F: FnOnce(DeliveryOutcome) + Send + 'static,
    {
        let handler = self.handler.clone();
        metrics().messages_consumed.inc();
        metrics().in_flight.inc();

        self.tracker.spawn(async move {
            let outcome = run_handler(handler, delivery).await;
            on_done(outcome);
            metrics().in_flight.dec();
            drop(slot);
            outcome
        })
    }

    /// Number of deliveries currently running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait for every dispatched delivery to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn run_handler(handler: Arc<dyn MessageHandler>, delivery: Delivery) -> DeliveryOutcome {
    let id = delivery.id.clone();

    // Inner task so a panicking handler surfaces as a JoinError instead of
    // tearing down the tracked task.
    let task = tokio::spawn(async move { handler.handle(delivery).await });

    match task.await {
        Ok(Ok(())) => DeliveryOutcome::Handled,
        Ok(Err(e)) => {
            warn!(delivery_id = %id, error = %e, "Handler failed, delivery dropped");
            DeliveryOutcome::Failed
        }
        Err(e) => {
            metrics().handler_crashes.inc();
            error!(delivery_id = %id, error = %e, "Handler crashed, delivery will be redelivered");
            DeliveryOutcome::Crashed
        }
    }
}
