//! End-to-end tests for the ingestion pipeline.
//!
//! POST /ingest → queue → worker → store, using the production router and worker with
//! an in-memory store.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::{fixtures, setup::TestContext};
use pipeline_core::{NormalizedMessage, Source};
use queue::{MemoryQueue, MessageQueue};
use std::sync::Arc;
use std::time::Duration;
use store::{verify_tenant_isolation, LogStore, MemoryStore};
use tokio_util::sync::CancellationToken;
use worker::{ConsumerWorker, LogProcessor};

/// JSON body: tenant is normalized, phone number redacted, characters counted.
#[tokio::test]
async fn test_json_ingest_e2e() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/ingest")
        .json(&fixtures::json_log("Acme", "x1", "call 555-000-1111"))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["message"], "Log queued for processing");
    assert_eq!(body["tenant_id"], "acme");
    assert_eq!(body["log_id"], "x1");
    assert!(body["request_id"].as_str().is_some_and(|id| !id.is_empty()));

    let captured = ctx.captured();
    assert_eq!(captured.len(), 1, "Queue should have captured 1 message");
    assert_eq!(captured[0].source, Source::Json);
    assert_eq!(captured[0].request_id, body["request_id"].as_str().unwrap());

    let outcomes = ctx.process_captured().await;
    assert!(outcomes.iter().all(|o| o.is_done()));

    let stored = ctx
        .store
        .get("acme", "x1")
        .await
        .unwrap()
        .expect("record should be stored");
    assert_eq!(stored.modified_data, "call [PHONE_REDACTED]");
    assert_eq!(stored.original_text, "call 555-000-1111");
    assert_eq!(stored.character_count, 17);
    assert_eq!(stored.redaction_count, 1);
    assert_eq!(stored.source, "json_upload");
}

/// text/plain body: tenant from the header, log id generated.
#[tokio::test]
async fn test_text_ingest_e2e() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server
        .post("/ingest")
        .content_type("text/plain")
        .add_header("X-Tenant-ID", "Globex Corp")
        .text(fixtures::pii_text())
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["tenant_id"], "globex_corp");
    let log_id = body["log_id"].as_str().unwrap().to_string();
    assert!(log_id.starts_with("globex_corp_"));

    ctx.process_captured().await;

    let stored = ctx.store.get("globex_corp", &log_id).await.unwrap().unwrap();
    assert_eq!(stored.modified_data, fixtures::pii_text_redacted());
    assert_eq!(stored.redaction_count, 5);
    assert_eq!(stored.source, "text_upload");
}

/// Delivering the same message twice leaves exactly one record.
#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    server
        .post("/ingest")
        .json(&fixtures::json_log("acme", "dup", "first 10.0.0.1"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    ctx.process_captured().await;
    ctx.process_captured().await;

    let logs = ctx.store.list("acme", 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].modified_data, "first [IP_ADDRESS_REDACTED]");

    // A later write to the same key replaces the record
    ctx.queue.clear();
    server
        .post("/ingest")
        .json(&fixtures::json_log("acme", "dup", "second"))
        .await
        .assert_status(StatusCode::ACCEPTED);
    ctx.process_captured().await;

    let logs = ctx.store.list("acme", 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].original_text, "second");
}

/// Two tenants using the same log id never see each other's records.
#[tokio::test]
async fn test_tenants_isolated_with_colliding_log_ids() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    for (tenant, text) in [("alpha", "alpha secret"), ("beta", "beta secret")] {
        server
            .post("/ingest")
            .json(&fixtures::json_log(tenant, "shared-id", text))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }
    ctx.process_captured().await;

    let alpha = ctx.store.get("alpha", "shared-id").await.unwrap().unwrap();
    let beta = ctx.store.get("beta", "shared-id").await.unwrap().unwrap();
    assert_eq!(alpha.original_text, "alpha secret");
    assert_eq!(beta.original_text, "beta secret");

    for tenant in ["alpha", "beta"] {
        let report = verify_tenant_isolation(ctx.store.as_ref(), tenant, 100)
            .await
            .unwrap();
        assert!(report.is_isolated(), "leaked: {:?}", report.leaked);
        assert_eq!(report.records_checked, 1);
    }
}

/// Full pull pipeline over the in-memory queue and the consumer loop.
#[tokio::test]
async fn test_pull_pipeline_with_memory_queue() {
    let queue = Arc::new(MemoryQueue::new());
    let store = Arc::new(MemoryStore::new());
    let processor = Arc::new(LogProcessor::new(
        store.clone(),
        integration_tests::setup::fast_worker_config(),
    ));
    let router = api::router(api::AppState::new(
        queue.clone(),
        pipeline_core::IngestLimits::default(),
    ));
    let server = TestServer::new(router).expect("Failed to create test server");

    let shutdown = CancellationToken::new();
    let consumer = ConsumerWorker::new(queue.clone(), processor.clone());
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(shutdown).await })
    };

    let mut log_ids = Vec::new();
    for i in 0..10 {
        let log_id = format!("pull-{}", i);
        server
            .post("/ingest")
            .json(&fixtures::json_log("Pipeline", &log_id, "mail me: ops@example.org"))
            .await
            .assert_status(StatusCode::ACCEPTED);
        log_ids.push(log_id);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.len() < log_ids.len() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "only {} of {} logs processed",
            store.len(),
            log_ids.len()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    shutdown.cancel();
    handle.await.unwrap().unwrap();
    queue.close().await;

    for log_id in &log_ids {
        let record = store.get("pipeline", log_id).await.unwrap().unwrap();
        assert_eq!(record.modified_data, "mail me: [EMAIL_REDACTED]");
    }

    let stats = processor.stats();
    assert_eq!(stats.successful, 10);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.success_rate, 100.0);
}

/// Messages published while no consumer runs are processed when one starts.
#[tokio::test]
async fn test_messages_wait_for_consumer() {
    let queue = Arc::new(MemoryQueue::new());
    let store = Arc::new(MemoryStore::new());

    for i in 0..3 {
        let message =
            NormalizedMessage::new("late", format!("l{}", i), "hi", Source::Text, "req");
        queue.publish(&message).await.unwrap();
    }
    assert_eq!(queue.len(), 3);

    let processor = Arc::new(LogProcessor::new(
        store.clone(),
        integration_tests::setup::fast_worker_config(),
    ));
    let consumer = ConsumerWorker::new(queue.clone(), processor);
    let shutdown = CancellationToken::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(shutdown).await })
    };

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while store.len() < 3 {
        assert!(tokio::time::Instant::now() < deadline, "queue not drained");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.cancel();
    handle.await.unwrap().unwrap();
    assert!(queue.is_empty());
}
