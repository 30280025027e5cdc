//! Worker configuration.

use std::time::Duration;

use pipeline_core::{Error, Result};
use queue::ConsumeOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Simulated processing cost, seconds per character
    #[serde(default = "default_processing_time_per_char")]
    pub processing_time_per_char: f64,
    /// Messages processed concurrently
    #[serde(default = "default_max_concurrent_messages")]
    pub max_concurrent_messages: usize,
    #[serde(default = "default_enable_pii_redaction")]
    pub enable_pii_redaction: bool,
    /// Pause after a failed queue poll
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Broker-side wait per poll
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Period of the stats log line (0 disables it)
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
}

fn default_processing_time_per_char() -> f64 {
    0.05
}

fn default_max_concurrent_messages() -> usize {
    10
}

fn default_enable_pii_redaction() -> bool {
    true
}

fn default_error_backoff_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_stats_interval_secs() -> u64 {
    60
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            processing_time_per_char: default_processing_time_per_char(),
            max_concurrent_messages: default_max_concurrent_messages(),
            enable_pii_redaction: default_enable_pii_redaction(),
            error_backoff_ms: default_error_backoff_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            stats_interval_secs: default_stats_interval_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.processing_time_per_char.is_finite() || self.processing_time_per_char < 0.0 {
            return Err(Error::config(
                "worker.processing_time_per_char must be a non-negative number",
            ));
        }
        if self.max_concurrent_messages == 0 {
            return Err(Error::config("worker.max_concurrent_messages must be at least 1"));
        }
        Ok(())
    }

    /// Simulated delay for a text of `chars` characters.
    pub fn simulated_delay(&self, chars: usize) -> Duration {
        Duration::try_from_secs_f64(chars as f64 * self.processing_time_per_char)
            .unwrap_or(Duration::ZERO)
    }

    pub fn consume_options(&self) -> ConsumeOptions {
        ConsumeOptions {
            max_in_flight: self.max_concurrent_messages,
            error_backoff: Duration::from_millis(self.error_backoff_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}
