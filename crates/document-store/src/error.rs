use thiserror::Error;

use crate::{AggregateId, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the version the writer read.
    #[error(
        "Concurrency conflict for {kind} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        kind: String,
        id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// Another document of the same kind already holds this unique key.
    #[error("Unique key violation for {kind}: {key} is already taken")]
    UniqueViolation { kind: String, key: String },

    /// The database aborted the transaction (deadlock or serialization
    /// failure); nothing was written.
    #[error("Transaction aborted ({code}): {message}")]
    TransactionAborted { code: String, message: String },

    /// The change set is malformed.
    #[error("Invalid change set: {0}")]
    InvalidChangeSet(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for errors that a fresh read-modify-write may resolve.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. }
                | StoreError::UniqueViolation { .. }
                | StoreError::TransactionAborted { .. }
        )
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
