//! Multi-tenant log processing pipeline
//!
//! - HTTP gateway: validates and normalizes logs, publishes them to the queue
//! - Worker: consumes the queue, redacts PII, upserts into the tenant-keyed store
//! - Push worker: the same processing behind a Pub/Sub push endpoint

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::de::DeserializeOwned;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use api::{router, AppState};
use pipeline_core::IngestLimits;
use queue::{MessageQueue, QueueConfig, QueueKind};
use store::StoreConfig;
use telemetry::init_tracing_from_env;
use worker::{push_router, report_stats, ConsumerWorker, LogProcessor, WorkerConfig};

/// Which parts of the pipeline this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
enum Role {
    /// Gateway and pull worker in one process
    #[default]
    All,
    Gateway,
    Worker,
    PushWorker,
}

impl Role {
    fn serves_gateway(self) -> bool {
        matches!(self, Self::All | Self::Gateway)
    }

    fn pulls(self) -> bool {
        matches!(self, Self::All | Self::Worker)
    }
}

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    role: Role,
    #[serde(default)]
    ingest: IngestLimits,
    #[serde(default)]
    queue: QueueConfig,
    #[serde(default)]
    store: StoreConfig,
    #[serde(default)]
    worker: WorkerConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            role: Role::default(),
            ingest: IngestLimits::default(),
            queue: QueueConfig::default(),
            store: StoreConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23 needs an explicit crypto provider before any TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting log processor v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    config
        .worker
        .validate()
        .context("Invalid worker configuration")?;

    info!(
        role = ?config.role,
        queue = %config.queue.kind,
        store = ?config.store.kind,
        max_text_bytes = config.ingest.max_text_bytes,
        "Loaded configuration"
    );

    let queue = queue::connect(&config.queue).context("Failed to create queue client")?;

    if config.role.pulls() && config.queue.kind == QueueKind::Pubsub {
        warn!("Pub/Sub delivers by push; run the push-worker role to process messages");
    }

    let shutdown = CancellationToken::new();
    let mut background: Vec<JoinHandle<()>> = Vec::new();
    let mut processor = None;

    if config.role != Role::Gateway {
        let store = store::connect(&config.store).context("Failed to create store client")?;
        let log_processor = Arc::new(LogProcessor::new(store, config.worker.clone()));

        background.push(tokio::spawn(report_stats(
            log_processor.clone(),
            Duration::from_secs(config.worker.stats_interval_secs),
            shutdown.clone(),
        )));

        if config.role.pulls() {
            let consumer = ConsumerWorker::new(queue.clone(), log_processor.clone());
            let token = shutdown.clone();
            background.push(tokio::spawn(async move {
                if let Err(e) = consumer.run(token).await {
                    error!(error = %e, "Consumer worker exited with error");
                }
            }));
        }

        processor = Some(log_processor);
    }

    let app = if config.role.serves_gateway() {
        Some(router(AppState::new(queue.clone(), config.ingest)))
    } else if config.role == Role::PushWorker {
        processor.clone().map(push_router)
    } else {
        None
    };

    match app {
        Some(app) => serve(&config, app).await?,
        None => shutdown_signal().await,
    }

    info!("Shutting down...");
    shutdown.cancel();

    // Consumer waits for in-flight messages before returning
    for handle in background {
        if let Err(e) = handle.await {
            error!(error = %e, "Background task failed");
        }
    }

    close_queue(queue).await;

    info!("Shutdown complete");
    Ok(())
}

async fn serve(config: &Config, app: axum::Router) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!(role = ?config.role, "Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn close_queue(queue: Arc<dyn MessageQueue>) {
    queue.close().await;
    info!(queue = %queue.kind(), "Queue closed");
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("PROCESSOR")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    apply_env_overrides(&mut config)?;
    check_topology(&config)?;
    Ok(config)
}

/// Reject role/queue combinations that can never deliver a message.
fn check_topology(config: &Config) -> Result<()> {
    if config.queue.kind == QueueKind::Memory && config.role != Role::All {
        bail!(
            "queue kind 'memory' only works in-process with role 'all' (got role {:?}); \
             use redpanda or pubsub to split gateway and worker",
            config.role
        );
    }
    Ok(())
}

/// Flat `PROCESSOR_*` variables for the common settings.
///
/// The config crate's nested parsing doesn't work reliably with underscored field names.
fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(role) = env_var("PROCESSOR_ROLE") {
        config.role = parse_enum(&role).context("Invalid PROCESSOR_ROLE")?;
    }
    if let Some(max) = env_var("PROCESSOR_MAX_TEXT_BYTES") {
        config.ingest.max_text_bytes = max.parse().context("Invalid PROCESSOR_MAX_TEXT_BYTES")?;
    }

    // Queue
    if let Some(kind) = env_var("PROCESSOR_QUEUE_KIND") {
        config.queue.kind = parse_enum(&kind).context("Invalid PROCESSOR_QUEUE_KIND")?;
    }
    if let Some(brokers) = env_var("PROCESSOR_REDPANDA_BROKERS") {
        config.queue.redpanda.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Some(topic) = env_var("PROCESSOR_REDPANDA_TOPIC") {
        config.queue.redpanda.topic = topic;
    }
    if let Some(username) = env_var("PROCESSOR_REDPANDA_SASL_USERNAME") {
        config.queue.redpanda.sasl_username = Some(username);
    }
    if let Some(password) = env_var("PROCESSOR_REDPANDA_SASL_PASSWORD") {
        config.queue.redpanda.sasl_password = Some(password);
    }
    if let Some(project) = env_var("PROCESSOR_PUBSUB_PROJECT_ID") {
        config.queue.pubsub.project_id = project;
    }
    if let Some(topic) = env_var("PROCESSOR_PUBSUB_TOPIC") {
        config.queue.pubsub.topic = topic;
    }
    if let Some(endpoint) = env_var("PROCESSOR_PUBSUB_ENDPOINT") {
        config.queue.pubsub.endpoint = endpoint;
    }
    if let Some(token) = env_var("PROCESSOR_PUBSUB_ACCESS_TOKEN") {
        config.queue.pubsub.access_token = Some(token);
    }

    // Store
    if let Some(kind) = env_var("PROCESSOR_STORE_KIND") {
        config.store.kind = parse_enum(&kind).context("Invalid PROCESSOR_STORE_KIND")?;
    }
    if let Some(url) = env_var("PROCESSOR_CLICKHOUSE_URL") {
        config.store.clickhouse.url = url;
    }
    if let Some(database) = env_var("PROCESSOR_CLICKHOUSE_DATABASE") {
        config.store.clickhouse.database = database;
    }
    if let Some(username) = env_var("PROCESSOR_CLICKHOUSE_USERNAME") {
        config.store.clickhouse.username = Some(username);
    }
    if let Some(password) = env_var("PROCESSOR_CLICKHOUSE_PASSWORD") {
        config.store.clickhouse.password = Some(password);
    }

    // Worker
    if let Some(per_char) = env_var("PROCESSOR_PROCESSING_TIME_PER_CHAR") {
        config.worker.processing_time_per_char = per_char
            .parse()
            .context("Invalid PROCESSOR_PROCESSING_TIME_PER_CHAR")?;
    }
    if let Some(max) = env_var("PROCESSOR_MAX_CONCURRENT_MESSAGES") {
        config.worker.max_concurrent_messages = max
            .parse()
            .context("Invalid PROCESSOR_MAX_CONCURRENT_MESSAGES")?;
    }
    if let Some(enabled) = env_var("PROCESSOR_ENABLE_PII_REDACTION") {
        config.worker.enable_pii_redaction = enabled
            .parse()
            .context("Invalid PROCESSOR_ENABLE_PII_REDACTION")?;
    }

    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a lowercase enum variant the same way the config file would.
fn parse_enum<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let value = serde_json::Value::String(raw.trim().to_ascii_lowercase());
    Ok(serde_json::from_value(value)?)
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
