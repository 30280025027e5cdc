//! Pub/Sub push delivery tests.
//!
//! The push endpoint's status code is the acknowledgement. Any 2xx acks, 500 makes the
//! broker redeliver. Messages that can never be processed are acked and dropped.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{fixtures, mocks::FlakyStore, setup::fast_worker_config};
use pipeline_core::{NormalizedMessage, Source};
use std::sync::Arc;
use store::LogStore;
use worker::{push_router, LogProcessor};

fn push_server(store: Arc<dyn LogStore>) -> (TestServer, Arc<LogProcessor>) {
    let processor = Arc::new(LogProcessor::new(store, fast_worker_config()));
    let server = TestServer::new(push_router(processor.clone())).unwrap();
    (server, processor)
}

/// A store outage answers 500; the redelivery succeeds and is stored once.
#[tokio::test]
async fn test_store_failure_triggers_redelivery() {
    let store = Arc::new(FlakyStore::new(1));
    let (server, processor) = push_server(store.clone());

    let message = NormalizedMessage::new(
        "acme",
        "push-1",
        "card 4111-1111-1111-1111",
        Source::Json,
        "req-push",
    );
    let envelope = fixtures::push_envelope(&message, "m-1");

    server
        .post("/")
        .json(&envelope)
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(store.get("acme", "push-1").await.unwrap().is_none());

    server.post("/").json(&envelope).await.assert_status_ok();

    let stored = store.get("acme", "push-1").await.unwrap().unwrap();
    assert_eq!(stored.modified_data, "card [CREDIT_CARD_REDACTED]");
    assert_eq!(stored.request_id, "req-push");

    let stats = processor.stats();
    assert_eq!(stats.total_messages, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.success_rate, 50.0);
}

/// Undecodable messages are acknowledged with 204 so they are not redelivered.
#[tokio::test]
async fn test_malformed_messages_acknowledged_and_dropped() {
    let store = Arc::new(FlakyStore::new(0));
    let (server, _) = push_server(store.clone());

    let bad = [
        serde_json::json!({"subscription": "s"}),
        serde_json::json!({"message": {"messageId": "m"}}),
        serde_json::json!({"message": {"data": "%%% not base64 %%%"}}),
        serde_json::json!({"message": {"data": "eyJub3QiOiAiYSBtZXNzYWdlIn0="}}),
    ];

    for envelope in bad {
        server
            .post("/")
            .json(&envelope)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    // Not an envelope at all
    server
        .post("/")
        .content_type("application/json")
        .bytes("not json".into())
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    assert!(store.tenants().await.unwrap().is_empty());
}

/// Worker info, health and stats endpoints.
#[tokio::test]
async fn test_worker_endpoints() {
    let (server, _) = push_server(Arc::new(FlakyStore::new(0)));

    let root: serde_json::Value = server.get("/").await.json();
    assert_eq!(root["status"], "healthy");
    assert_eq!(root["service"], "log-processor-worker");

    server.get("/health").await.assert_status_ok();

    let message = NormalizedMessage::new("acme", "s1", "ok", Source::Text, "r");
    server
        .post("/")
        .json(&fixtures::push_envelope(&message, "m-2"))
        .await
        .assert_status_ok();

    let stats: serde_json::Value = server.get("/stats").await.json();
    assert_eq!(stats["worker"]["total_messages"], 1);
    assert_eq!(stats["worker"]["successful"], 1);
    assert!(stats["metrics"].get("logs_processed").is_some());
}
