//! Error handling tests for POST /ingest.
//!
//! Every rejection carries `{status: "error", code, message, request_id}` and never
//! reaches the queue.

use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use integration_tests::{fixtures, setup::TestContext};
use pipeline_core::IngestLimits;

fn assert_error(response: &TestResponse, status: StatusCode, code: &str) -> serde_json::Value {
    response.assert_status(status);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], code, "unexpected body: {}", body);
    assert!(
        body["request_id"].as_str().is_some_and(|id| !id.is_empty()),
        "error response should carry a request_id"
    );
    body
}

#[tokio::test]
async fn test_text_without_tenant_header() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();

    let response = server
        .post("/ingest")
        .content_type("text/plain")
        .text("hello world")
        .await;

    let body = assert_error(&response, StatusCode::BAD_REQUEST, "VALID_003");
    assert!(body["message"].as_str().unwrap().contains("X-Tenant-ID"));
    assert_eq!(ctx.queue.count(), 0);
}

#[tokio::test]
async fn test_unsupported_content_type() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();

    let response = server
        .post("/ingest")
        .content_type("application/xml")
        .bytes("<log/>".into())
        .await;

    let body = assert_error(&response, StatusCode::BAD_REQUEST, "MEDIA_001");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("application/json"));
    assert!(message.contains("text/plain"));
    assert_eq!(ctx.queue.count(), 0);
}

#[tokio::test]
async fn test_invalid_json() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();

    let response = server
        .post("/ingest")
        .content_type("application/json")
        .bytes("{not json".into())
        .await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_001");
}

#[tokio::test]
async fn test_missing_json_fields() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();

    let response = server
        .post("/ingest")
        .json(&serde_json::json!({"tenant_id": "acme", "text": "no log id"}))
        .await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_001");
}

#[tokio::test]
async fn test_unsafe_identifiers_rejected() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();
    let too_long = "x".repeat(101);

    for (tenant, log_id) in [
        ("acme", "../../etc/passwd"),
        ("acme/other", "l1"),
        ("", "l1"),
        ("acme", too_long.as_str()),
    ] {
        let response = server
            .post("/ingest")
            .json(&fixtures::json_log(tenant, log_id, "text"))
            .await;
        assert_error(&response, StatusCode::BAD_REQUEST, "VALID_002");
    }
    assert_eq!(ctx.queue.count(), 0);
}

#[tokio::test]
async fn test_empty_text_rejected() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();

    let response = server
        .post("/ingest")
        .content_type("text/plain")
        .add_header("X-Tenant-ID", "acme")
        .text("   \n\t ")
        .await;
    let body = assert_error(&response, StatusCode::BAD_REQUEST, "VALID_004");
    assert_eq!(body["message"], "Text payload cannot be empty");

    let response = server
        .post("/ingest")
        .json(&fixtures::json_log("acme", "l1", ""))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_004");
}

#[tokio::test]
async fn test_size_limit_boundary() {
    let ctx = TestContext::with_limits(IngestLimits::new(1024));
    let server = TestServer::new(ctx.router.clone()).unwrap();

    let exact = "a".repeat(1024);
    server
        .post("/ingest")
        .content_type("text/plain")
        .add_header("X-Tenant-ID", "acme")
        .text(exact.clone())
        .await
        .assert_status(StatusCode::ACCEPTED);

    let over = "a".repeat(1025);
    let response = server
        .post("/ingest")
        .content_type("text/plain")
        .add_header("X-Tenant-ID", "acme")
        .text(over.clone())
        .await;
    assert_error(&response, StatusCode::PAYLOAD_TOO_LARGE, "VALID_005");

    let response = server
        .post("/ingest")
        .json(&fixtures::json_log("acme", "big", &over))
        .await;
    assert_error(&response, StatusCode::PAYLOAD_TOO_LARGE, "VALID_005");

    // Multi-byte characters are measured in bytes
    let wide = "é".repeat(513);
    let response = server
        .post("/ingest")
        .json(&fixtures::json_log("acme", "wide", &wide))
        .await;
    assert_error(&response, StatusCode::PAYLOAD_TOO_LARGE, "VALID_005");

    assert_eq!(ctx.queue.count(), 1);
}

#[tokio::test]
async fn test_queue_failure_returns_500() {
    let ctx = TestContext::new();
    ctx.set_queue_failure(true);
    let server = TestServer::new(ctx.router.clone()).unwrap();

    let response = server
        .post("/ingest")
        .json(&fixtures::json_log("acme", "l1", "hello"))
        .await;

    let body = assert_error(&response, StatusCode::INTERNAL_SERVER_ERROR, "QUEUE_001");
    assert_eq!(body["message"], "Failed to queue message for processing");

    // Recovers once the queue is back
    ctx.set_queue_failure(false);
    server
        .post("/ingest")
        .json(&fixtures::json_log("acme", "l1", "hello"))
        .await
        .assert_status(StatusCode::ACCEPTED);
}
