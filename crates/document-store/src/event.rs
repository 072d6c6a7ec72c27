use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::EventId;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{AggregateId, Version};

/// A notification describing something that happened to an entity.
///
/// Envelopes travel in the outbox of a [`ChangeSet`](crate::ChangeSet) and are
/// only visible to subscribers once the change set has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this notification.
    pub event_id: EventId,

    /// Position in the outbox, assigned on commit (0 before commit).
    pub sequence: i64,

    /// The type of the event (e.g., "StockReduced", "OrderCancelled").
    pub event_type: String,

    /// The entity this event belongs to.
    pub aggregate_id: AggregateId,

    /// The kind of entity (e.g., "Order", "Product").
    pub aggregate_type: String,

    /// The entity version that this event produced.
    pub version: Version,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Additional metadata about the event.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Wraps a serializable event for the outbox.
    pub fn new<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        version: Version,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: EventId::new(),
            sequence: 0,
            event_type: event_type.into(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            version,
            timestamp: Utc::now(),
            payload: serde_json::to_value(payload)?,
            metadata: HashMap::new(),
        })
    }

    /// Deserializes the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_wraps_payload() {
        let aggregate_id = AggregateId::new();
        let envelope = EventEnvelope::new(
            aggregate_id,
            "Product",
            "StockReduced",
            Version::new(3),
            &serde_json::json!({"quantity": 2}),
        )
        .unwrap()
        .with_metadata("correlation_id", serde_json::json!("123"));

        assert_eq!(envelope.sequence, 0);
        assert_eq!(envelope.event_type, "StockReduced");
        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.version, Version::new(3));
        let payload: serde_json::Value = envelope.decode().unwrap();
        assert_eq!(payload["quantity"], 2);
        assert_eq!(
            envelope.metadata.get("correlation_id"),
            Some(&serde_json::json!("123"))
        );
    }
}
