//! Notification error types.

use thiserror::Error;

/// Errors that can occur while delivering notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// An error occurred reading the outbox.
    #[error("Document store error: {0}")]
    Store(#[from] document_store::StoreError),

    /// Failed to deserialize a notification payload.
    #[error("Notification deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// A subscriber-specific error.
    #[error("Subscriber {name} failed: {message}")]
    Subscriber { name: &'static str, message: String },
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;
