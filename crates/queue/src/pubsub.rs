//! Google Pub/Sub backend with push delivery.
//!
//! Publishing goes through the REST `topics.publish` call. Consumption is push-based:
//! the broker POSTs [`PushEnvelope`]s to the worker's HTTP endpoint, so `consume`
//! only waits for shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use pipeline_core::{Error, NormalizedMessage, Result};
use serde::{Deserialize, Serialize};
use telemetry::{health, metrics};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::PubSubConfig;
use crate::{ConsumeOptions, Delivery, MessageHandler, MessageQueue, QueueKind};

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    messages: Vec<OutboundMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    data: String,
    attributes: HashMap<&'static str, &'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Push request body sent by Pub/Sub.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEnvelope {
    pub message: Option<PushMessage>,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    pub data: Option<String>,
    #[serde(default, alias = "message_id")]
    pub message_id: Option<String>,
    #[serde(default, alias = "publish_time")]
    pub publish_time: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub delivery_attempt: Option<u32>,
}

impl PushEnvelope {
    /// Decode the envelope into a delivery.
    ///
    /// A missing message or data field, or undecodable base64, is a
    /// `MalformedMessage`: redelivering it would fail the same way.
    pub fn into_delivery(self) -> Result<Delivery> {
        let message = self
            .message
            .ok_or_else(|| Error::malformed("push envelope has no message"))?;
        let data = message
            .data
            .ok_or_else(|| Error::malformed("push message has no data"))?;
        let payload = STANDARD
            .decode(data.as_bytes())
            .map_err(|e| Error::malformed(format!("push data is not valid base64: {}", e)))?;

        Ok(Delivery {
            id: message.message_id.unwrap_or_default(),
            payload: Bytes::from(payload),
            attempt: message.delivery_attempt.unwrap_or(1),
        })
    }
}

pub struct PubSubQueue {
    config: PubSubConfig,
    http: OnceCell<reqwest::Client>,
}

impl PubSubQueue {
    pub fn new(config: PubSubConfig) -> Result<Self> {
        if config.project_id.is_empty() {
            return Err(Error::config("pubsub.project_id is required"));
        }
        info!(
            project_id = %config.project_id,
            topic = %config.topic,
            endpoint = %config.endpoint,
            "Configured Pub/Sub queue"
        );
        Ok(Self {
            config,
            http: OnceCell::new(),
        })
    }

    async fn client(&self) -> Result<&reqwest::Client> {
        self.http
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(Duration::from_millis(self.config.request_timeout_ms))
                    .build()
                    .map_err(|e| Error::queue_unavailable(format!("HTTP client: {}", e)))
            })
            .await
    }

    async fn send(&self, message: &NormalizedMessage) -> Result<String> {
        let body = PublishRequest {
            messages: vec![OutboundMessage {
                data: STANDARD.encode(message.to_vec()?),
                attributes: HashMap::from([
                    ("tenant_id", message.tenant_id.as_str()),
                    ("log_id", message.log_id.as_str()),
                ]),
            }],
        };

        let mut request = self.client().await?.post(self.config.publish_url()).json(&body);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::queue_unavailable(format!("Pub/Sub publish failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::queue_unavailable(format!(
                "Pub/Sub publish returned {}: {}",
                status, detail
            )));
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| Error::queue_unavailable(format!("Pub/Sub publish response: {}", e)))?;

        parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or_else(|| Error::queue_unavailable("Pub/Sub publish returned no message id"))
    }
}

#[async_trait]
impl MessageQueue for PubSubQueue {
    fn kind(&self) -> QueueKind {
        QueueKind::Pubsub
    }

    async fn publish(&self, message: &NormalizedMessage) -> Result<()> {
        let start = Instant::now();
        match self.send(message).await {
            Ok(message_id) => {
                metrics().logs_published.inc();
                health().queue.set_healthy();
                debug!(
                    tenant_id = %message.tenant_id,
                    log_id = %message.log_id,
                    message_id = %message_id,
                    latency_ms = %start.elapsed().as_millis(),
                    "Published to Pub/Sub"
                );
                Ok(())
            }
            Err(e) => {
                metrics().queue_publish_errors.inc();
                health().queue.set_unhealthy(e.to_string());
                Err(e)
            }
        }
    }

    async fn consume(
        &self,
        _handler: Arc<dyn MessageHandler>,
        _options: ConsumeOptions,
        shutdown: CancellationToken,
    ) -> Result<()> {
        info!(
            topic = %self.config.topic,
            "Pub/Sub uses push delivery; messages arrive on the worker endpoint"
        );
        shutdown.cancelled().await;
        Ok(())
    }

    async fn close(&self) {}
}
