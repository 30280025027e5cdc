//! In-process list queue.
//!
//! FIFO list plus an in-flight table. A delivery whose handler panics goes back to
//! the front of the list and is redelivered after `error_backoff`; anything still in
//! flight when a consume loop exits is requeued by the next one.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use pipeline_core::{Error, NormalizedMessage, Result};
use telemetry::metrics;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::dispatch::{DeliveryOutcome, Dispatcher};
use crate::{backoff, ConsumeOptions, Delivery, MessageHandler, MessageQueue, QueueKind};

#[derive(Debug, Clone)]
struct Entry {
    seq: u64,
    payload: Bytes,
    attempt: u32,
}

#[derive(Default)]
struct State {
    ready: VecDeque<Entry>,
    in_flight: HashMap<u64, Entry>,
    next_seq: u64,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    notify: Notify,
}

impl Shared {
    fn take(&self) -> Option<Entry> {
        let mut state = self.state.lock();
        let entry = state.ready.pop_front()?;
        state.in_flight.insert(entry.seq, entry.clone());
        metrics().queue_depth.set(state.ready.len() as u64);
        Some(entry)
    }

    async fn next(&self) -> Entry {
        loop {
            if let Some(entry) = self.take() {
                return entry;
            }
            self.notify.notified().await;
        }
    }

    fn settle(&self, seq: u64, outcome: DeliveryOutcome) {
        let mut state = self.state.lock();
        let Some(mut entry) = state.in_flight.remove(&seq) else {
            return;
        };
        if !outcome.is_settled() {
            entry.attempt += 1;
            state.ready.push_front(entry);
            metrics().queue_depth.set(state.ready.len() as u64);
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Return a taken entry to the front of the list without counting an attempt.
    fn untake(&self, seq: u64) {
        let mut state = self.state.lock();
        if let Some(entry) = state.in_flight.remove(&seq) {
            state.ready.push_front(entry);
            metrics().queue_depth.set(state.ready.len() as u64);
        }
    }

    /// Move deliveries abandoned by a previous consume loop back to the list.
    fn requeue_abandoned(&self) -> usize {
        let mut state = self.state.lock();
        let mut abandoned: Vec<Entry> = state.in_flight.drain().map(|(_, e)| e).collect();
        abandoned.sort_by_key(|e| std::cmp::Reverse(e.seq));
        let count = abandoned.len();
        for mut entry in abandoned {
            entry.attempt += 1;
            state.ready.push_front(entry);
        }
        count
    }
}

pub struct MemoryQueue {
    shared: Arc<Shared>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
            }),
        }
    }

    /// Messages waiting to be delivered.
    pub fn len(&self) -> usize {
        self.shared.state.lock().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Messages handed to a handler and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight.len()
    }

    /// Enqueue a raw payload, bypassing message encoding.
    pub fn push_raw(&self, payload: impl Into<Bytes>) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(Error::queue_unavailable("memory queue is closed"));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.ready.push_back(Entry {
            seq,
            payload: payload.into(),
            attempt: 1,
        });
        metrics().queue_depth.set(state.ready.len() as u64);
        drop(state);

        self.shared.notify.notify_one();
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    fn kind(&self) -> QueueKind {
        QueueKind::Memory
    }

    async fn publish(&self, message: &NormalizedMessage) -> Result<()> {
        let payload = message.to_vec()?;
        match self.push_raw(payload) {
            Ok(()) => {
                metrics().logs_published.inc();
                debug!(tenant_id = %message.tenant_id, log_id = %message.log_id, "Queued message");
                Ok(())
            }
            Err(e) => {
                metrics().queue_publish_errors.inc();
                Err(e)
            }
        }
    }

    async fn consume(
        &self,
        handler: Arc<dyn MessageHandler>,
        options: ConsumeOptions,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let requeued = self.shared.requeue_abandoned();
        if requeued > 0 {
            info!(count = requeued, "Requeued deliveries abandoned by a previous consumer");
        }

        let dispatcher = Dispatcher::new(handler, options.max_in_flight);
        info!(max_in_flight = options.max_in_flight, "Memory queue consumer started");

        loop {
            let Some(slot) = dispatcher.reserve(&shutdown).await else {
                break;
            };

            let entry = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                entry = self.shared.next() => entry,
            };

            if entry.attempt > 1 {
                debug!(seq = entry.seq, attempt = entry.attempt, "Pausing before redelivery");
                if !backoff(options.error_backoff, &shutdown).await {
                    self.shared.untake(entry.seq);
                    break;
                }
            }

            let delivery = Delivery {
                id: entry.seq.to_string(),
                payload: entry.payload,
                attempt: entry.attempt,
            };
            let shared = self.shared.clone();
            let seq = entry.seq;
            dispatcher.dispatch(slot, delivery, move |outcome| shared.settle(seq, outcome));
        }

        info!(in_flight = dispatcher.in_flight(), "Stopping memory consumer, draining");
        dispatcher.drain().await;
        info!("Memory queue consumer stopped");
        Ok(())
    }

    async fn close(&self) {
        self.shared.state.lock().closed = true;
    }
}
