//! Transactional document storage for the order lifecycle engine.
//!
//! Entities are persisted as versioned JSON documents. A [`ChangeSet`] groups
//! every write of one use case together with the notifications it produced,
//! and [`DocumentStore::commit`] applies it all-or-nothing.

pub mod document;
pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::{AggregateId, EventId};
pub use document::{Document, Version};
pub use error::{Result, StoreError};
pub use event::EventEnvelope;
pub use memory::InMemoryDocumentStore;
pub use postgres::{OUTBOX_COMMIT_LOCK, PostgresDocumentStore};
pub use store::{ChangeSet, DocumentStore, DocumentStoreExt, DocumentWrite, OutboxStream};
