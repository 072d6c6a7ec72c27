//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate the tables
//! between tests. Run with:
//!
//! ```bash
//! cargo test -p document-store --test postgres_integration
//! ```

use std::{sync::Arc, time::Duration};

use document_store::{
    AggregateId, ChangeSet, Document, DocumentStore, DocumentStoreExt, EventEnvelope,
    OUTBOX_COMMIT_LOCK, PostgresDocumentStore, StoreError, Version,
};
use futures_util::StreamExt;
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../../../migrations/001_create_documents.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents, outbox RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

fn product(id: AggregateId, version: i64, stock: u32, sku: &str) -> Document {
    Document::from_state(
        id,
        "Product",
        Version::new(version),
        &serde_json::json!({ "stock": stock }),
    )
    .unwrap()
    .with_unique_key(Some(sku.to_string()))
}

fn insert(doc: Document) -> ChangeSet {
    let mut changes = ChangeSet::new();
    changes.write(doc, Version::initial());
    changes
}

#[tokio::test]
#[serial]
async fn commit_and_get_document() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    store.commit(insert(product(id, 1, 10, "SKU-1"))).await.unwrap();

    let doc = store.get("Product", id).await.unwrap().unwrap();
    assert_eq!(doc.version, Version::first());
    assert_eq!(doc.state["stock"], 10);
    assert_eq!(doc.unique_key.as_deref(), Some("SKU-1"));
    assert!(store.exists("Product", id).await.unwrap());
    assert!(!store.exists("Order", id).await.unwrap());
}

#[tokio::test]
#[serial]
async fn stale_update_is_a_conflict() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    store.commit(insert(product(id, 1, 10, "SKU-1"))).await.unwrap();

    let mut first = ChangeSet::new();
    first.write(product(id, 2, 8, "SKU-1"), Version::first());
    store.commit(first).await.unwrap();

    let mut stale = ChangeSet::new();
    stale.write(product(id, 2, 9, "SKU-1"), Version::first());
    let result = store.commit(stale).await;

    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { actual, .. }) if actual == Version::new(2)
    ));
    assert_eq!(
        store.get("Product", id).await.unwrap().unwrap().state["stock"],
        8
    );
}

#[tokio::test]
#[serial]
async fn duplicate_insert_is_a_conflict() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    store.commit(insert(product(id, 1, 10, "SKU-1"))).await.unwrap();

    let result = store.commit(insert(product(id, 1, 10, "SKU-2"))).await;
    assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));
}

#[tokio::test]
#[serial]
async fn unique_key_violation_rolls_back_everything() {
    let store = get_test_store().await;
    store
        .commit(insert(product(AggregateId::new(), 1, 10, "SKU-1")))
        .await
        .unwrap();

    let other = AggregateId::new();
    let mut changes = ChangeSet::new();
    changes.write(product(other, 1, 5, "SKU-2"), Version::initial());
    changes.write(
        Document::from_state(AggregateId::new(), "Product", Version::first(), &serde_json::json!({}))
            .unwrap()
            .with_unique_key(Some("SKU-1".to_string())),
        Version::initial(),
    );
    changes.publish([EventEnvelope::new(
        other,
        "Product",
        "ProductCreated",
        Version::first(),
        &serde_json::json!({}),
    )
    .unwrap()]);

    let result = store.commit(changes).await;
    assert!(matches!(
        result,
        Err(StoreError::UniqueViolation { ref key, .. }) if key == "SKU-1"
    ));
    assert!(store.get("Product", other).await.unwrap().is_none());
    assert!(store.outbox_since(0).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn unique_keys_are_scoped_by_kind() {
    let store = get_test_store().await;
    store
        .commit(insert(product(AggregateId::new(), 1, 1, "KEY")))
        .await
        .unwrap();

    let mut order = product(AggregateId::new(), 1, 1, "KEY");
    order.kind = "Order".to_string();
    store.commit(insert(order)).await.unwrap();

    assert!(store.unique_key_taken("Order", "KEY").await.unwrap());
    assert!(!store.unique_key_taken("Cart", "KEY").await.unwrap());
}

#[tokio::test]
#[serial]
async fn max_unique_key_with_prefix() {
    let store = get_test_store().await;
    for key in ["ORD-2026-000002", "ORD-2026-000010", "ORD-2025-000099", "APT-2026-000500"] {
        let mut doc = product(AggregateId::new(), 1, 0, key);
        doc.kind = "Order".to_string();
        store.commit(insert(doc)).await.unwrap();
    }

    let max = store
        .max_unique_key_with_prefix("Order", "ORD-2026-")
        .await
        .unwrap();
    assert_eq!(max.as_deref(), Some("ORD-2026-000010"));

    let none = store
        .max_unique_key_with_prefix("Order", "ORD-2027-")
        .await
        .unwrap();
    assert!(none.is_none());
}

#[tokio::test]
#[serial]
async fn outbox_assigns_increasing_sequences() {
    let store = get_test_store().await;
    let id = AggregateId::new();

    let mut changes = insert(product(id, 1, 3, "SKU-1"));
    changes.publish([
        EventEnvelope::new(id, "Product", "ProductCreated", Version::first(), &serde_json::json!({}))
            .unwrap(),
        EventEnvelope::new(id, "Product", "LowStock", Version::first(), &serde_json::json!({}))
            .unwrap(),
    ]);

    let published = store.commit(changes).await.unwrap();
    assert_eq!(published.len(), 2);
    assert!(published[0].sequence < published[1].sequence);

    let after_first = store.outbox_since(published[0].sequence).await.unwrap();
    assert_eq!(after_first.len(), 1);
    assert_eq!(after_first[0].event_type, "LowStock");

    let streamed: Vec<_> = store.stream_outbox().await.unwrap().collect().await;
    assert_eq!(streamed.len(), 2);
    assert!(streamed.iter().all(|e| e.is_ok()));
}

#[tokio::test]
#[serial]
async fn concurrent_writers_on_same_version_only_one_wins() {
    let store = get_test_store().await;
    let id = AggregateId::new();
    store.commit(insert(product(id, 1, 10, "SKU-1"))).await.unwrap();

    let mut handles = Vec::new();
    for stock in [9u32, 8u32] {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut changes = ChangeSet::new();
            changes.write(product(id, 2, stock, "SKU-1"), Version::first());
            store.commit(changes).await
        }));
    }

    let mut ok = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(StoreError::ConcurrencyConflict { .. }) => conflicts += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(
        store.current_version("Product", id).await.unwrap(),
        Version::new(2)
    );
}

#[tokio::test]
#[serial]
async fn opposite_order_multi_document_commits_do_not_deadlock() {
    let store = get_test_store().await;
    let a = AggregateId::new();
    let b = AggregateId::new();
    let mut seed = insert(product(a, 1, 100, "SKU-A"));
    seed.write(product(b, 1, 100, "SKU-B"), Version::initial());
    store.commit(seed).await.unwrap();

    let mut handles = Vec::new();
    for task in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let ids = if task % 2 == 0 { [a, b] } else { [b, a] };
            for _ in 0..5 {
                loop {
                    let mut changes = ChangeSet::new();
                    for id in ids {
                        let doc = store.get("Product", id).await?.unwrap();
                        let stock = doc.state["stock"].as_u64().unwrap() as u32;
                        let sku = if id == a { "SKU-A" } else { "SKU-B" };
                        changes.write(
                            product(id, doc.version.as_i64() + 1, stock - 1, sku),
                            doc.version,
                        );
                    }
                    match store.commit(changes).await {
                        Ok(_) => break,
                        Err(StoreError::ConcurrencyConflict { .. }) => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
            Ok::<_, StoreError>(())
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            panic!("multi-document commit failed: {e}");
        }
    }

    for id in [a, b] {
        let doc = store.get("Product", id).await.unwrap().unwrap();
        assert_eq!(doc.state["stock"], 60);
        assert_eq!(doc.version, Version::new(41));
    }
}

#[tokio::test]
#[serial]
async fn outbox_sequences_follow_commit_order() {
    let store = get_test_store().await;

    // An earlier publisher that has drawn its sequence but not committed yet.
    let mut earlier = store.pool().begin().await.unwrap();
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(OUTBOX_COMMIT_LOCK)
        .execute(&mut *earlier)
        .await
        .unwrap();
    let earlier_sequence: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO outbox (event_id, event_type, aggregate_id, aggregate_type, version, timestamp, payload)
        VALUES ($1, 'ProductCreated', $2, 'Product', 1, now(), '{}')
        RETURNING sequence
        "#,
    )
    .bind(AggregateId::new().as_uuid())
    .bind(AggregateId::new().as_uuid())
    .fetch_one(&mut *earlier)
    .await
    .unwrap();

    let id = AggregateId::new();
    let mut changes = insert(product(id, 1, 3, "SKU-1"));
    changes.publish([EventEnvelope::new(
        id,
        "Product",
        "ProductCreated",
        Version::first(),
        &serde_json::json!({}),
    )
    .unwrap()]);
    let later = tokio::spawn({
        let store = store.clone();
        async move { store.commit(changes).await }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!later.is_finished());
    assert!(store.outbox_since(0).await.unwrap().is_empty());

    earlier.commit().await.unwrap();
    let published = later.await.unwrap().unwrap();
    assert!(published[0].sequence > earlier_sequence);

    let visible: Vec<i64> = store
        .outbox_since(0)
        .await
        .unwrap()
        .iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(visible, vec![earlier_sequence, published[0].sequence]);
}
