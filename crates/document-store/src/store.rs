use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, Document, EventEnvelope, Result, StoreError, Version};

/// One staged write: the new document and the version the writer read.
#[derive(Debug, Clone)]
pub struct DocumentWrite {
    /// The document to store. Its `version` must be `expected_version + 1`.
    pub document: Document,

    /// The version the stored document must still have for the write to apply.
    /// `Version::initial()` means the document must not exist yet.
    pub expected_version: Version,
}

/// All writes and notifications of one unit of work.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub writes: Vec<DocumentWrite>,
    pub outbox: Vec<EventEnvelope>,
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a document write.
    pub fn write(&mut self, document: Document, expected_version: Version) {
        self.writes.push(DocumentWrite {
            document,
            expected_version,
        });
    }

    /// Stages notifications to publish on commit.
    pub fn publish(&mut self, events: impl IntoIterator<Item = EventEnvelope>) {
        self.outbox.extend(events);
    }

    /// Returns true if nothing has been staged.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.outbox.is_empty()
    }

    /// Checks the change set before it reaches a backend.
    pub fn validate(&self) -> Result<()> {
        if self.writes.is_empty() {
            return Err(StoreError::InvalidChangeSet(
                "Cannot commit a change set without writes".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for write in &self.writes {
            let doc = &write.document;
            if !seen.insert((doc.kind.as_str(), doc.id)) {
                return Err(StoreError::InvalidChangeSet(format!(
                    "{} {} is written more than once",
                    doc.kind, doc.id
                )));
            }
            if doc.version != write.expected_version.next() {
                return Err(StoreError::InvalidChangeSet(format!(
                    "{} {} must move from version {} to {}, got {}",
                    doc.kind,
                    doc.id,
                    write.expected_version,
                    write.expected_version.next(),
                    doc.version
                )));
            }
        }

        Ok(())
    }
}

/// A stream of committed notifications.
pub type OutboxStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads a document by kind and id.
    async fn get(&self, kind: &str, id: AggregateId) -> Result<Option<Document>>;

    /// Loads every document of a kind.
    async fn list(&self, kind: &str) -> Result<Vec<Document>>;

    /// Loads the document of `kind` holding the given unique key.
    async fn find_by_unique_key(&self, kind: &str, key: &str) -> Result<Option<Document>>;

    /// Returns the lexicographically highest unique key of `kind` starting with `prefix`.
    async fn max_unique_key_with_prefix(&self, kind: &str, prefix: &str)
    -> Result<Option<String>>;

    /// Applies a change set atomically.
    ///
    /// Fails with `ConcurrencyConflict` if any document moved past the version
    /// its writer read, and with `UniqueViolation` if a unique key is already
    /// held by another document. On failure nothing is written.
    ///
    /// Returns the outbox envelopes with their assigned sequence numbers.
    async fn commit(&self, changes: ChangeSet) -> Result<Vec<EventEnvelope>>;

    /// Returns committed notifications with a sequence greater than `after`.
    async fn outbox_since(&self, after: i64) -> Result<Vec<EventEnvelope>>;

    /// Streams all committed notifications in sequence order.
    async fn stream_outbox(&self) -> Result<OutboxStream>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Checks if a document exists.
    async fn exists(&self, kind: &str, id: AggregateId) -> Result<bool> {
        Ok(self.get(kind, id).await?.is_some())
    }

    /// Checks if a unique key is already taken within `kind`.
    async fn unique_key_taken(&self, kind: &str, key: &str) -> Result<bool> {
        Ok(self.find_by_unique_key(kind, key).await?.is_some())
    }

    /// Returns the stored version of a document, or `Version::initial()` if absent.
    async fn current_version(&self, kind: &str, id: AggregateId) -> Result<Version> {
        Ok(self
            .get(kind, id)
            .await?
            .map(|doc| doc.version)
            .unwrap_or_else(Version::initial))
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: AggregateId, version: i64) -> Document {
        Document::from_state(id, "Product", Version::new(version), &serde_json::json!({}))
            .unwrap()
    }

    #[test]
    fn empty_change_set_is_rejected() {
        let result = ChangeSet::new().validate();
        assert!(matches!(result, Err(StoreError::InvalidChangeSet(_))));
    }

    #[test]
    fn duplicate_document_is_rejected() {
        let id = AggregateId::new();
        let mut changes = ChangeSet::new();
        changes.write(doc(id, 1), Version::initial());
        changes.write(doc(id, 1), Version::initial());
        assert!(matches!(
            changes.validate(),
            Err(StoreError::InvalidChangeSet(_))
        ));
    }

    #[test]
    fn version_must_advance_by_one() {
        let mut changes = ChangeSet::new();
        changes.write(doc(AggregateId::new(), 3), Version::first());
        assert!(matches!(
            changes.validate(),
            Err(StoreError::InvalidChangeSet(_))
        ));

        let mut changes = ChangeSet::new();
        changes.write(doc(AggregateId::new(), 2), Version::first());
        assert!(changes.validate().is_ok());
    }
}
