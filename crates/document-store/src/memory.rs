use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, Document, EventEnvelope, Result, StoreError, Version,
    store::{ChangeSet, DocumentStore, OutboxStream},
};

#[derive(Default)]
struct MemoryState {
    documents: HashMap<(String, AggregateId), Document>,
    outbox: Vec<EventEnvelope>,
}

impl MemoryState {
    fn check(&self, changes: &ChangeSet) -> Result<()> {
        let mut claimed: HashMap<(&str, &str), AggregateId> = HashMap::new();

        for write in &changes.writes {
            let doc = &write.document;
            let actual = self
                .documents
                .get(&(doc.kind.clone(), doc.id))
                .map(|stored| stored.version)
                .unwrap_or(Version::initial());

            if actual != write.expected_version {
                return Err(StoreError::ConcurrencyConflict {
                    kind: doc.kind.clone(),
                    id: doc.id,
                    expected: write.expected_version,
                    actual,
                });
            }

            if let Some(key) = doc.unique_key.as_deref() {
                let held_elsewhere = self.documents.values().any(|stored| {
                    stored.kind == doc.kind
                        && stored.id != doc.id
                        && stored.unique_key.as_deref() == Some(key)
                });
                let claimed_twice = claimed
                    .insert((doc.kind.as_str(), key), doc.id)
                    .is_some_and(|other| other != doc.id);

                if held_elsewhere || claimed_twice {
                    return Err(StoreError::UniqueViolation {
                        kind: doc.kind.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// In-memory document store.
///
/// A single lock guards documents and outbox, so a commit is checked in full
/// before any of it is applied. Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored documents.
    pub async fn document_count(&self) -> usize {
        self.state.read().await.documents.len()
    }

    /// Returns the total number of committed notifications.
    pub async fn outbox_len(&self) -> usize {
        self.state.read().await.outbox.len()
    }

    /// Clears all documents and notifications.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.documents.clear();
        state.outbox.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, kind: &str, id: AggregateId) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state.documents.get(&(kind.to_string(), id)).cloned())
    }

    async fn list(&self, kind: &str) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        let mut docs: Vec<_> = state
            .documents
            .values()
            .filter(|doc| doc.kind == kind)
            .cloned()
            .collect();
        docs.sort_by_key(|doc| doc.id);
        Ok(docs)
    }

    async fn find_by_unique_key(&self, kind: &str, key: &str) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .find(|doc| doc.kind == kind && doc.unique_key.as_deref() == Some(key))
            .cloned())
    }

    async fn max_unique_key_with_prefix(
        &self,
        kind: &str,
        prefix: &str,
    ) -> Result<Option<String>> {
        let state = self.state.read().await;
        Ok(state
            .documents
            .values()
            .filter(|doc| doc.kind == kind)
            .filter_map(|doc| doc.unique_key.as_deref())
            .filter(|key| key.starts_with(prefix))
            .max()
            .map(str::to_string))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<Vec<EventEnvelope>> {
        changes.validate()?;

        let mut state = self.state.write().await;
        state.check(&changes)?;

        for write in changes.writes {
            let doc = write.document;
            state.documents.insert((doc.kind.clone(), doc.id), doc);
        }

        let mut next = state.outbox.last().map(|e| e.sequence).unwrap_or(0);
        let mut published = Vec::with_capacity(changes.outbox.len());
        for mut envelope in changes.outbox {
            next += 1;
            envelope.sequence = next;
            published.push(envelope.clone());
            state.outbox.push(envelope);
        }

        metrics::counter!("document_store_commits_total", "backend" => "memory").increment(1);
        Ok(published)
    }

    async fn outbox_since(&self, after: i64) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        Ok(state
            .outbox
            .iter()
            .filter(|e| e.sequence > after)
            .cloned()
            .collect())
    }

    async fn stream_outbox(&self) -> Result<OutboxStream> {
        use futures_util::stream;

        let events = self.state.read().await.outbox.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}
