//! Log processing worker.
//!
//! - Processor (decode → simulate → redact → upsert)
//! - Consumer (pull loop over the configured queue)
//! - Push endpoint (Pub/Sub push delivery)
//! - Stats reporter

pub mod config;
pub mod consumer;
pub mod processor;
pub mod push;
pub mod scheduler;

pub use config::WorkerConfig;
pub use consumer::ConsumerWorker;
pub use processor::{LogProcessor, ProcessOutcome, ProcessorStats, Stage};
pub use push::router as push_router;
pub use scheduler::{log_stats, report_stats};
