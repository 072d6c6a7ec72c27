use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::AggregateId;

/// Version number for a document, used for optimistic concurrency control.
///
/// A document that has never been written is at version 0. The first commit
/// stores it at version 1 and every later commit increments it by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the version (0) of a document that has not been stored yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) of a freshly inserted document.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A stored entity: its serialized state plus the bookkeeping the store needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// The entity this document belongs to.
    pub id: AggregateId,

    /// The kind of entity (e.g., "Order", "Product").
    pub kind: String,

    /// The version of the entity held in this document.
    pub version: Version,

    /// Optional business key that must be unique within `kind`.
    pub unique_key: Option<String>,

    /// When the document was last written.
    pub updated_at: DateTime<Utc>,

    /// The serialized entity state.
    pub state: serde_json::Value,
}

impl Document {
    /// Creates a document from a serializable state.
    pub fn from_state<T: Serialize>(
        id: AggregateId,
        kind: impl Into<String>,
        version: Version,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id,
            kind: kind.into(),
            version,
            unique_key: None,
            updated_at: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    /// Sets the unique business key for this document.
    pub fn with_unique_key(mut self, key: Option<String>) -> Self {
        self.unique_key = key;
        self
    }

    /// Deserializes the document state into a concrete type.
    pub fn into_state<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.state)
    }
}
