//! Atomic commit boundary for one use case.

use std::sync::Arc;

use document_store::{ChangeSet, Document, DocumentStore, EventEnvelope, Version};

use crate::{
    aggregate::{Aggregate, DomainEvent},
    error::DomainError,
};

/// Stages entity writes and their notifications, then commits them together.
///
/// `commit` consumes the unit of work, so it runs at most once. Dropping a
/// unit of work without committing writes nothing.
pub struct UnitOfWork<S: ?Sized> {
    store: Arc<S>,
    changes: ChangeSet,
}

impl<S: DocumentStore + ?Sized> UnitOfWork<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            changes: ChangeSet::new(),
        }
    }

    /// Stages a new entity. Fails if the entity was already persisted.
    pub fn add<A: Aggregate>(&mut self, aggregate: &mut A) -> Result<(), DomainError> {
        if aggregate.version() != Version::initial() {
            return Err(DomainError::AlreadyPersisted {
                aggregate_type: A::aggregate_type(),
                id: aggregate.id().to_string(),
            });
        }
        self.stage(aggregate)
    }

    /// Stages a change to a loaded entity.
    ///
    /// The commit fails with a concurrency conflict if someone else committed
    /// the entity after it was loaded.
    pub fn update<A: Aggregate>(&mut self, aggregate: &mut A) -> Result<(), DomainError> {
        self.stage(aggregate)
    }

    /// Stages a loaded entity only if it recorded a change since it was
    /// loaded. Returns whether anything was staged.
    pub fn update_if_changed<A: Aggregate>(&mut self, aggregate: &mut A) -> Result<bool, DomainError> {
        let events = aggregate.take_events();
        if events.is_empty() {
            return Ok(false);
        }
        self.stage_events(aggregate, events)?;
        Ok(true)
    }

    /// Returns true if anything has been staged.
    pub fn has_changes(&self) -> bool {
        !self.changes.writes.is_empty()
    }

    /// Commits all staged writes atomically.
    ///
    /// Returns the committed notifications for post-commit dispatch.
    pub async fn commit(self) -> Result<Vec<EventEnvelope>, DomainError> {
        if !self.has_changes() {
            return Ok(Vec::new());
        }

        let writes = self.changes.writes.len();
        let published = self.store.commit(self.changes).await?;
        tracing::debug!(writes, events = published.len(), "Unit of work committed");
        Ok(published)
    }

    fn stage<A: Aggregate>(&mut self, aggregate: &mut A) -> Result<(), DomainError> {
        let events = aggregate.take_events();
        self.stage_events(aggregate, events)
    }

    fn stage_events<A: Aggregate>(
        &mut self,
        aggregate: &mut A,
        events: Vec<A::Event>,
    ) -> Result<(), DomainError> {
        let id = aggregate.id();
        let expected = aggregate.version();
        let version = expected.next();

        let document = Document::from_state(id, A::aggregate_type(), version, &*aggregate)?
            .with_unique_key(aggregate.unique_key());

        let envelopes = events
            .iter()
            .map(|event| {
                EventEnvelope::new(id, A::aggregate_type(), event.event_type(), version, event)
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.changes.write(document, expected);
        self.changes.publish(envelopes);
        aggregate.set_version(version);
        Ok(())
    }
}
