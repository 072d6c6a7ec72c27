//! Core entity and notification traits.

use common::AggregateId;
use document_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain notifications.
///
/// A notification is a plain record of something that already happened to an
/// entity. It is named in past tense and never fails to apply.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is used for outbox routing and subscriber filtering.
    fn event_type(&self) -> &'static str;
}

/// Trait for persisted entities that guard their own invariants.
///
/// Entities are plain state. Each mutation validates first, then records a
/// notification which is applied to the state and queued. The queue is
/// drained by the unit of work when the entity is staged for commit.
pub trait Aggregate: Serialize + DeserializeOwned + Send + Sync + Sized {
    /// The type of notifications this entity records.
    type Event: DomainEvent;

    /// Returns the entity type name, used as the document kind.
    fn aggregate_type() -> &'static str;

    /// Returns the entity's unique identifier.
    fn id(&self) -> AggregateId;

    /// Returns the version that was last loaded or committed.
    ///
    /// `Version::initial()` means the entity has never been persisted.
    fn version(&self) -> Version;

    /// Sets the version. Called by repositories and the unit of work.
    fn set_version(&mut self, version: Version);

    /// Applies a notification to the entity state.
    ///
    /// Must be deterministic and infallible: all checks happen before the
    /// notification is recorded.
    fn apply(&mut self, event: &Self::Event);

    /// Drains the notifications recorded since the last call.
    fn take_events(&mut self) -> Vec<Self::Event>;

    /// Returns the business key that must be unique among entities of this type.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Incremented { by: u32 },
        Reset,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CounterEvent::Incremented { .. } => "Incremented",
                CounterEvent::Reset => "Reset",
            }
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Counter {
        id: AggregateId,
        value: u32,
        #[serde(skip)]
        version: Version,
        #[serde(skip)]
        pending: Vec<CounterEvent>,
    }

    impl Counter {
        fn increment(&mut self, by: u32) {
            let event = CounterEvent::Incremented { by };
            self.apply(&event);
            self.pending.push(event);
        }
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;

        fn aggregate_type() -> &'static str {
            "Counter"
        }

        fn id(&self) -> AggregateId {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: &Self::Event) {
            match event {
                CounterEvent::Incremented { by } => self.value += by,
                CounterEvent::Reset => self.value = 0,
            }
        }

        fn take_events(&mut self) -> Vec<Self::Event> {
            std::mem::take(&mut self.pending)
        }
    }

    #[test]
    fn recorded_events_are_applied_and_drained() {
        let mut counter = Counter::default();
        counter.increment(2);
        counter.increment(3);

        assert_eq!(counter.value, 5);
        let events = counter.take_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "Incremented");
        assert!(counter.take_events().is_empty());
    }

    #[test]
    fn unique_key_defaults_to_none() {
        assert!(Counter::default().unique_key().is_none());
        assert_eq!(CounterEvent::Reset.event_type(), "Reset");
    }
}
