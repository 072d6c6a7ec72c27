use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, Document, EventEnvelope, EventId, Result, StoreError, Version,
    store::{ChangeSet, DocumentStore, DocumentWrite, OutboxStream},
};

const UNIQUE_KEY_INDEX: &str = "documents_kind_unique_key";
const PRIMARY_KEY: &str = "documents_pkey";

const DEADLOCK_DETECTED: &str = "40P01";
const SERIALIZATION_FAILURE: &str = "40001";

/// Advisory lock held from the first outbox insert until commit.
///
/// Outbox sequences are drawn under it, so they are handed out in commit
/// order: a sequence is never visible while a lower one is still pending.
pub const OUTBOX_COMMIT_LOCK: i64 = 0x6f75_7462_6f78;

const OUTBOX_COLUMNS: &str =
    "sequence, event_id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata";

/// PostgreSQL-backed document store.
///
/// Each commit runs in one transaction. Rows being updated are locked with
/// `SELECT ... FOR UPDATE` before their version is compared, so two writers
/// that read the same version cannot both succeed. Rows are locked in
/// `(kind, id)` order whatever order the change set lists them in.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        Ok(Document {
            id: AggregateId::from_uuid(row.try_get::<Uuid, _>("id")?),
            kind: row.try_get("kind")?,
            version: Version::new(row.try_get("version")?),
            unique_key: row.try_get("unique_key")?,
            updated_at: row.try_get("updated_at")?,
            state: row.try_get("state")?,
        })
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
            sequence: row.try_get("sequence")?,
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            timestamp: row.try_get("timestamp")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }

    async fn commit_in_transaction(&self, mut changes: ChangeSet) -> Result<Vec<EventEnvelope>> {
        changes
            .writes
            .sort_by(|a, b| {
                (&a.document.kind, a.document.id).cmp(&(&b.document.kind, b.document.id))
            });

        let mut tx = self.pool.begin().await?;

        for write in &changes.writes {
            Self::write_document(&mut tx, write).await?;
        }

        if !changes.outbox.is_empty() {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(OUTBOX_COMMIT_LOCK)
                .execute(&mut *tx)
                .await?;
        }

        let mut published = Vec::with_capacity(changes.outbox.len());
        for mut envelope in changes.outbox {
            let metadata_json = serde_json::to_value(&envelope.metadata)?;

            let sequence: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO outbox (event_id, event_type, aggregate_id, aggregate_type, version, timestamp, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING sequence
                "#,
            )
            .bind(envelope.event_id.as_uuid())
            .bind(&envelope.event_type)
            .bind(envelope.aggregate_id.as_uuid())
            .bind(&envelope.aggregate_type)
            .bind(envelope.version.as_i64())
            .bind(envelope.timestamp)
            .bind(&envelope.payload)
            .bind(metadata_json)
            .fetch_one(&mut *tx)
            .await?;

            envelope.sequence = sequence;
            published.push(envelope);
        }

        tx.commit().await?;
        Ok(published)
    }

    async fn write_document(
        tx: &mut Transaction<'_, Postgres>,
        write: &DocumentWrite,
    ) -> Result<()> {
        let doc = &write.document;

        let stored: Option<i64> =
            sqlx::query_scalar("SELECT version FROM documents WHERE kind = $1 AND id = $2 FOR UPDATE")
                .bind(&doc.kind)
                .bind(doc.id.as_uuid())
                .fetch_optional(&mut **tx)
                .await?;

        let actual = stored.map(Version::new).unwrap_or(Version::initial());
        if actual != write.expected_version {
            return Err(StoreError::ConcurrencyConflict {
                kind: doc.kind.clone(),
                id: doc.id,
                expected: write.expected_version,
                actual,
            });
        }

        let query = if stored.is_some() {
            sqlx::query(
                r#"
                UPDATE documents
                SET version = $3, unique_key = $4, updated_at = $5, state = $6
                WHERE kind = $1 AND id = $2
                "#,
            )
        } else {
            sqlx::query(
                r#"
                INSERT INTO documents (kind, id, version, unique_key, updated_at, state)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
        };

        query
            .bind(&doc.kind)
            .bind(doc.id.as_uuid())
            .bind(doc.version.as_i64())
            .bind(&doc.unique_key)
            .bind(doc.updated_at)
            .bind(&doc.state)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    match db_err.constraint() {
                        Some(UNIQUE_KEY_INDEX) => {
                            return StoreError::UniqueViolation {
                                kind: doc.kind.clone(),
                                key: doc.unique_key.clone().unwrap_or_default(),
                            };
                        }
                        // A concurrent insert of the same new document won the race
                        Some(PRIMARY_KEY) => {
                            return StoreError::ConcurrencyConflict {
                                kind: doc.kind.clone(),
                                id: doc.id,
                                expected: write.expected_version,
                                actual: Version::first(),
                            };
                        }
                        _ => {}
                    }
                }
                StoreError::Database(e)
            })?;

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, kind: &str, id: AggregateId) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT kind, id, version, unique_key, updated_at, state
            FROM documents
            WHERE kind = $1 AND id = $2
            "#,
        )
        .bind(kind)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn list(&self, kind: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT kind, id, version, unique_key, updated_at, state
            FROM documents
            WHERE kind = $1
            ORDER BY id ASC
            "#,
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn find_by_unique_key(&self, kind: &str, key: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            r#"
            SELECT kind, id, version, unique_key, updated_at, state
            FROM documents
            WHERE kind = $1 AND unique_key = $2
            "#,
        )
        .bind(kind)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_document).transpose()
    }

    async fn max_unique_key_with_prefix(
        &self,
        kind: &str,
        prefix: &str,
    ) -> Result<Option<String>> {
        let max: Option<String> = sqlx::query_scalar(
            "SELECT MAX(unique_key) FROM documents WHERE kind = $1 AND starts_with(unique_key, $2)",
        )
        .bind(kind)
        .bind(prefix)
        .fetch_one(&self.pool)
        .await?;

        Ok(max)
    }

    #[tracing::instrument(skip(self, changes), fields(writes = changes.writes.len()))]
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<EventEnvelope>> {
        changes.validate()?;
        let published = self
            .commit_in_transaction(changes)
            .await
            .map_err(aborted_as_retryable)?;
        metrics::counter!("document_store_commits_total", "backend" => "postgres").increment(1);
        Ok(published)
    }

    async fn outbox_since(&self, after: i64) -> Result<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox WHERE sequence > $1 ORDER BY sequence ASC"
        ))
        .bind(after)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn stream_outbox(&self) -> Result<OutboxStream> {
        use futures_util::StreamExt;

        // The boxed stream must be 'static, so rows are loaded up front
        // instead of borrowing the pool for the life of the stream.
        let rows = sqlx::query(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox ORDER BY sequence ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let stream = futures_util::stream::iter(rows).map(Self::row_to_event);
        Ok(Box::pin(stream))
    }
}

/// Deadlocks and serialization failures abort the whole transaction, which
/// can then be retried from a fresh read.
fn aborted_as_retryable(err: StoreError) -> StoreError {
    if let StoreError::Database(sqlx::Error::Database(db_err)) = &err
        && let Some(code) = db_err.code()
        && matches!(code.as_ref(), DEADLOCK_DETECTED | SERIALIZATION_FAILURE)
    {
        return StoreError::TransactionAborted {
            code: code.into_owned(),
            message: db_err.message().to_string(),
        };
    }
    err
}
