//! ClickHouse store tests.
//!
//! Requires Docker for testcontainers, or `PROCESSOR_TEST_CLICKHOUSE_URL`.
//! Run with `cargo test -p integration-tests --test store_clickhouse -- --ignored`.

use integration_tests::{containers::TestContainers, fixtures::unique_log_id};
use pipeline_core::{NormalizedMessage, ProcessedLog, Source};
use store::{verify_tenant_isolation, ClickHouseStore, LogStore};

fn record(tenant: &str, log_id: &str, text: &str) -> ProcessedLog {
    let message = NormalizedMessage::new(tenant, log_id, text, Source::Json, "req-ch");
    ProcessedLog::from_message(&message, text.to_uppercase(), 0, 0.25)
}

async fn connect_store(containers: &TestContainers) -> ClickHouseStore {
    ClickHouseStore::new(containers.clickhouse.clone()).expect("Failed to create store")
}

#[tokio::test]
#[ignore = "requires Docker or PROCESSOR_TEST_CLICKHOUSE_URL"]
async fn test_upsert_replaces_record() {
    let containers = TestContainers::start().await;
    let store = connect_store(&containers).await;
    let tenant = unique_log_id("tenant_replace");
    store.delete_tenant(&tenant).await.ok();

    store
        .upsert(&tenant, "l1", &record(&tenant, "l1", "first"))
        .await
        .expect("first upsert");
    store
        .upsert(&tenant, "l1", &record(&tenant, "l1", "second"))
        .await
        .expect("second upsert");

    let stored = store.get(&tenant, "l1").await.unwrap().expect("record");
    assert_eq!(stored.original_text, "second");
    assert_eq!(stored.modified_data, "SECOND");
    assert_eq!(stored.processing_time_seconds, 0.25);

    let all = store.list(&tenant, 10).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
#[ignore = "requires Docker or PROCESSOR_TEST_CLICKHOUSE_URL"]
async fn test_tenant_isolation() {
    let containers = TestContainers::start().await;
    let store = connect_store(&containers).await;
    let alpha = unique_log_id("alpha");
    let beta = unique_log_id("beta");

    for tenant in [&alpha, &beta] {
        for log_id in ["shared", "other"] {
            let text = format!("{} {}", tenant, log_id);
            store
                .upsert(tenant, log_id, &record(tenant, log_id, &text))
                .await
                .unwrap();
        }
    }

    let a = store.get(&alpha, "shared").await.unwrap().unwrap();
    assert_eq!(a.tenant_id, alpha);
    assert!(store.list(&alpha, 10).await.unwrap().iter().all(|r| r.tenant_id == alpha));

    for tenant in [&alpha, &beta] {
        let report = verify_tenant_isolation(&store, tenant, 100).await.unwrap();
        assert!(report.is_isolated(), "leaked: {:?}", report.leaked);
        assert_eq!(report.records_checked, 2);
    }

    let tenants = store.tenants().await.unwrap();
    assert!(tenants.contains(&alpha) && tenants.contains(&beta));

    store.delete_tenant(&alpha).await.unwrap();
    store.delete_tenant(&beta).await.unwrap();
}

#[tokio::test]
#[ignore = "requires Docker or PROCESSOR_TEST_CLICKHOUSE_URL"]
async fn test_list_newest_first() {
    let containers = TestContainers::start().await;
    let store = connect_store(&containers).await;
    let tenant = unique_log_id("tenant_order");

    for log_id in ["a", "b", "c"] {
        store
            .upsert(&tenant, log_id, &record(&tenant, log_id, log_id))
            .await
            .unwrap();
    }
    // Rewriting "a" makes it the newest
    store
        .upsert(&tenant, "a", &record(&tenant, "a", "a2"))
        .await
        .unwrap();

    let ids: Vec<String> = store
        .list(&tenant, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.log_id)
        .collect();
    assert_eq!(ids, vec!["a", "c", "b"]);

    let limited = store.list(&tenant, 2).await.unwrap();
    assert_eq!(limited.len(), 2);

    store.delete_tenant(&tenant).await.unwrap();
}
