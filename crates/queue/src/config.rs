//! Queue configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue backend, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// In-process list queue (single process, tests)
    #[default]
    Memory,
    /// Kafka-compatible broker, pull consumption
    Redpanda,
    /// Google Pub/Sub, push delivery to the worker's HTTP endpoint
    Pubsub,
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Memory => "memory",
            Self::Redpanda => "redpanda",
            Self::Pubsub => "pubsub",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueueConfig {
    #[serde(default)]
    pub kind: QueueKind,
    #[serde(default)]
    pub redpanda: RedpandaConfig,
    #[serde(default)]
    pub pubsub: PubSubConfig,
}

/// Where a fresh Redpanda consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    /// Replays the retained log; safe because processing is idempotent
    #[default]
    Earliest,
    Latest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default)]
    pub partition: i32,
    #[serde(default)]
    pub start_offset: StartOffset,
    /// Upper bound for one fetch
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: i32,
    /// SASL username (managed clusters)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password (managed clusters)
    #[serde(default)]
    pub sasl_password: Option<String>,
    /// Force TLS even without SASL credentials
    #[serde(default)]
    pub tls: bool,
}

fn default_brokers() -> Vec<String> {
    vec!["localhost:9092".to_string()]
}

fn default_topic() -> String {
    "log-processing".to_string()
}

fn default_fetch_max_bytes() -> i32 {
    4 * 1024 * 1024
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: default_brokers(),
            topic: default_topic(),
            partition: 0,
            start_offset: StartOffset::default(),
            fetch_max_bytes: default_fetch_max_bytes(),
            sasl_username: None,
            sasl_password: None,
            tls: false,
        }
    }
}

impl RedpandaConfig {
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) if !user.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    /// REST endpoint; point at the emulator for local runs
    #[serde(default = "default_pubsub_endpoint")]
    pub endpoint: String,
    /// OAuth bearer token. Not needed against the emulator.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_pubsub_endpoint() -> String {
    "https://pubsub.googleapis.com".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            topic: default_topic(),
            endpoint: default_pubsub_endpoint(),
            access_token: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl PubSubConfig {
    pub fn publish_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/topics/{}:publish",
            self.endpoint.trim_end_matches('/'),
            self.project_id,
            self.topic
        )
    }
}
