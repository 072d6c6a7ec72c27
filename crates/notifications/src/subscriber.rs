//! Subscriber trait and position tracking.

use async_trait::async_trait;
use document_store::EventEnvelope;

use crate::Result;

/// Tracks the last outbox entry a subscriber has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberPosition {
    /// Sequence of the last handled notification (0 when none).
    pub last_sequence: i64,

    /// Number of notifications handled.
    pub events_processed: u64,
}

impl SubscriberPosition {
    /// Creates a new position at zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Advances the position past the given outbox sequence.
    pub fn advance(&self, sequence: i64) -> Self {
        Self {
            last_sequence: self.last_sequence.max(sequence),
            events_processed: self.events_processed + 1,
        }
    }

    /// Returns true if a notification at `sequence` has not been seen yet.
    pub fn is_behind(&self, sequence: i64) -> bool {
        sequence > self.last_sequence
    }
}

impl std::fmt::Display for SubscriberPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position({}, {} handled)",
            self.last_sequence, self.events_processed
        )
    }
}

/// Something that reacts to committed notifications.
///
/// Subscribers must advance their position for every notification they
/// receive, including kinds they ignore, so catch-up never replays them.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Returns the name of this subscriber.
    fn name(&self) -> &'static str;

    /// Handles a single committed notification.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Returns the current position of this subscriber.
    async fn position(&self) -> SubscriberPosition;

    /// Resets the subscriber to its initial state.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_starts_at_zero() {
        let pos = SubscriberPosition::zero();
        assert_eq!(pos.last_sequence, 0);
        assert_eq!(pos.events_processed, 0);
        assert!(pos.is_behind(1));
    }

    #[test]
    fn position_advances_to_sequence() {
        let pos = SubscriberPosition::zero().advance(3);
        assert_eq!(pos.last_sequence, 3);
        assert_eq!(pos.events_processed, 1);
        assert!(!pos.is_behind(3));
        assert!(pos.is_behind(4));

        // never moves backwards
        let pos = pos.advance(2);
        assert_eq!(pos.last_sequence, 3);
        assert_eq!(pos.events_processed, 2);
    }

    #[test]
    fn position_display() {
        let pos = SubscriberPosition {
            last_sequence: 42,
            events_processed: 40,
        };
        assert_eq!(pos.to_string(), "position(42, 40 handled)");
    }
}
