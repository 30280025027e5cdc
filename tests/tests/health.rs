//! Tests for health check endpoints.

use axum::http::StatusCode;
use axum_test::TestServer;
use integration_tests::setup::TestContext;

/// Test /health endpoint returns proper structure
#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).expect("Failed to create test server");

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    for field in [
        "status",
        "queue",
        "queue_connected",
        "store_connected",
        "queue_depth",
        "timestamp",
    ] {
        assert!(
            body.get(field).is_some(),
            "Response should have '{}' field",
            field
        );
    }
    assert_eq!(body["queue"], "memory");
}

/// Test /health/live always returns OK while the process runs
#[tokio::test]
async fn test_liveness_probe() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();

    server.get("/health/live").await.assert_status_ok();
}

/// Test /health/ready follows queue health
#[tokio::test]
async fn test_readiness_follows_queue_health() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();

    server.get("/health/ready").await.assert_status_ok();

    telemetry::health().queue.set_unhealthy("broker unreachable");
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = server.get("/health").await.json();
    assert_eq!(body["queue_connected"], false);

    telemetry::health().queue.set_healthy();
    server.get("/health/ready").await.assert_status_ok();
}

/// Test the service info root
#[tokio::test]
async fn test_root_service_info() {
    let ctx = TestContext::new();
    let server = TestServer::new(ctx.router.clone()).unwrap();

    let response = server.get("/").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["service"], "log-ingestion-gateway");
    assert!(body["endpoints"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e == "/ingest"));
}
