//! Periodic worker statistics.

use std::sync::Arc;
use std::time::Duration;

use telemetry::metrics;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::processor::LogProcessor;

/// Log processor stats every `period` until cancelled, then once more.
pub async fn report_stats(
    processor: Arc<LogProcessor>,
    period: Duration,
    shutdown: CancellationToken,
) {
    if period.is_zero() {
        shutdown.cancelled().await;
        log_stats(&processor);
        return;
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => log_stats(&processor),
        }
    }

    log_stats(&processor);
}

pub fn log_stats(processor: &LogProcessor) {
    let stats = processor.stats();
    let snapshot = metrics().snapshot();
    info!(
        total_messages = stats.total_messages,
        successful = stats.successful,
        failed = stats.failed,
        success_rate = stats.success_rate,
        avg_processing_s = stats.average_processing_time_seconds,
        in_flight = snapshot.in_flight,
        queue_depth = snapshot.queue_depth,
        malformed = snapshot.malformed_messages,
        "Worker stats"
    );
}
