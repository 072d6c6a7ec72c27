//! Delivers committed notifications to subscribers.

use std::sync::Arc;

use document_store::{DocumentStore, EventEnvelope};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::subscriber::Subscriber;

/// Hands committed notifications to every registered subscriber.
///
/// The dispatcher supports:
/// - Live delivery of the notifications returned by a commit
/// - Catch-up: replays the outbox to bring subscribers up to date
/// - Rebuild: resets all subscribers and replays from scratch
///
/// Deliveries are serialized. A subscriber only receives notifications past
/// its position, so replaying the same batch twice is harmless.
pub struct Dispatcher<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    subscribers: Vec<Box<dyn Subscriber>>,
    delivery: Mutex<()>,
}

impl<S: DocumentStore + ?Sized> Dispatcher<S> {
    /// Creates a new dispatcher reading from the given store's outbox.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            subscribers: Vec::new(),
            delivery: Mutex::new(()),
        }
    }

    /// Registers a subscriber with this dispatcher.
    pub fn register(&mut self, subscriber: Box<dyn Subscriber>) {
        self.subscribers.push(subscriber);
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Delivers the notifications of one commit.
    ///
    /// If an earlier commit has not reached the subscribers yet, the outbox
    /// is replayed first so every subscriber sees notifications in order.
    #[tracing::instrument(skip(self, events), fields(events = events.len()))]
    pub async fn dispatch(&self, events: &[EventEnvelope]) -> Result<()> {
        let Some(first) = events.iter().map(|e| e.sequence).min() else {
            return Ok(());
        };
        let _guard = self.delivery.lock().await;

        if let Some(lowest) = self.lowest_sequence().await
            && first > lowest + 1
        {
            tracing::debug!(lowest, first, "filling gap from outbox");
            for event in self.store.outbox_since(lowest).await? {
                if event.sequence >= first {
                    break;
                }
                self.deliver(&event).await?;
            }
        }

        for event in events {
            self.deliver(event).await?;
        }
        Ok(())
    }

    /// Runs catch-up processing: streams the whole outbox and delivers each
    /// notification to the subscribers that haven't seen it.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let _guard = self.delivery.lock().await;
        let mut stream = self.store.stream_outbox().await?;
        let mut read: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            read += 1;
            self.deliver(&event).await?;
        }

        tracing::info!(notifications_read = read, "catch-up complete");
        Ok(())
    }

    /// Resets all subscribers and replays the outbox.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for subscriber in &self.subscribers {
            subscriber.reset().await?;
        }
        self.run_catch_up().await
    }

    async fn lowest_sequence(&self) -> Option<i64> {
        let mut lowest = None;
        for subscriber in &self.subscribers {
            let seq = subscriber.position().await.last_sequence;
            lowest = Some(lowest.map_or(seq, |l: i64| l.min(seq)));
        }
        lowest
    }

    /// Hands one notification to every subscriber that is behind it.
    ///
    /// A failing subscriber does not stop delivery to the others; the first
    /// failure is returned once all have been tried.
    async fn deliver(&self, event: &EventEnvelope) -> Result<()> {
        let mut first_error = None;

        for subscriber in &self.subscribers {
            if !subscriber.position().await.is_behind(event.sequence) {
                continue;
            }
            match subscriber.handle(event).await {
                Ok(()) => {
                    metrics::counter!(
                        "notifications_dispatched_total",
                        "subscriber" => subscriber.name()
                    )
                    .increment(1);
                }
                Err(err) => {
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        event_type = %event.event_type,
                        sequence = event.sequence,
                        error = %err,
                        "subscriber failed"
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotificationError;
    use crate::subscriber::SubscriberPosition;
    use async_trait::async_trait;
    use common::AggregateId;
    use document_store::{ChangeSet, Document, InMemoryDocumentStore, Version};
    use tokio::sync::RwLock;

    /// Records the sequences it receives.
    #[derive(Clone)]
    struct RecordingSubscriber {
        seen: Arc<RwLock<Vec<i64>>>,
        position: Arc<RwLock<SubscriberPosition>>,
        fail_on: Option<i64>,
    }

    impl RecordingSubscriber {
        fn new() -> Self {
            Self {
                seen: Arc::new(RwLock::new(Vec::new())),
                position: Arc::new(RwLock::new(SubscriberPosition::zero())),
                fail_on: None,
            }
        }

        fn failing_on(sequence: i64) -> Self {
            Self {
                fail_on: Some(sequence),
                ..Self::new()
            }
        }

        async fn seen(&self) -> Vec<i64> {
            self.seen.read().await.clone()
        }
    }

    #[async_trait]
    impl Subscriber for RecordingSubscriber {
        fn name(&self) -> &'static str {
            "RecordingSubscriber"
        }

        async fn handle(&self, event: &EventEnvelope) -> Result<()> {
            let mut pos = self.position.write().await;
            *pos = pos.advance(event.sequence);
            if self.fail_on == Some(event.sequence) {
                return Err(NotificationError::Subscriber {
                    name: self.name(),
                    message: "boom".to_string(),
                });
            }
            self.seen.write().await.push(event.sequence);
            Ok(())
        }

        async fn position(&self) -> SubscriberPosition {
            *self.position.read().await
        }

        async fn reset(&self) -> Result<()> {
            self.seen.write().await.clear();
            *self.position.write().await = SubscriberPosition::zero();
            Ok(())
        }
    }

    /// Commits one document update carrying `count` notifications.
    async fn commit(
        store: &InMemoryDocumentStore,
        id: AggregateId,
        version: i64,
        count: usize,
    ) -> Vec<EventEnvelope> {
        let mut changes = ChangeSet::new();
        let doc = Document::from_state(
            id,
            "Test",
            Version::new(version),
            &serde_json::json!({"v": version}),
        )
        .unwrap();
        changes.write(doc, Version::new(version - 1));
        changes.publish((0..count).map(|i| {
            EventEnvelope::new(id, "Test", "Touched", Version::new(version), &i).unwrap()
        }));
        store.commit(changes).await.unwrap()
    }

    #[tokio::test]
    async fn dispatch_delivers_committed_batch() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let recorder = RecordingSubscriber::new();
        let mut dispatcher = Dispatcher::new(Arc::clone(&store));
        dispatcher.register(Box::new(recorder.clone()));

        let events = commit(&store, AggregateId::new(), 1, 2).await;
        dispatcher.dispatch(&events).await.unwrap();

        assert_eq!(recorder.seen().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn dispatch_twice_is_harmless() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let recorder = RecordingSubscriber::new();
        let mut dispatcher = Dispatcher::new(Arc::clone(&store));
        dispatcher.register(Box::new(recorder.clone()));

        let events = commit(&store, AggregateId::new(), 1, 1).await;
        dispatcher.dispatch(&events).await.unwrap();
        dispatcher.dispatch(&events).await.unwrap();

        assert_eq!(recorder.seen().await, vec![1]);
    }

    #[tokio::test]
    async fn dispatch_fills_gap_from_outbox() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let recorder = RecordingSubscriber::new();
        let mut dispatcher = Dispatcher::new(Arc::clone(&store));
        dispatcher.register(Box::new(recorder.clone()));

        let _missed = commit(&store, AggregateId::new(), 1, 1).await;
        let later = commit(&store, AggregateId::new(), 1, 1).await;
        dispatcher.dispatch(&later).await.unwrap();

        assert_eq!(recorder.seen().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn dispatch_empty_batch_is_noop() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let recorder = RecordingSubscriber::new();
        let mut dispatcher = Dispatcher::new(store);
        dispatcher.register(Box::new(recorder.clone()));

        dispatcher.dispatch(&[]).await.unwrap();
        assert!(recorder.seen().await.is_empty());
    }

    #[tokio::test]
    async fn catch_up_and_rebuild() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let id = AggregateId::new();
        commit(&store, id, 1, 2).await;
        commit(&store, id, 2, 1).await;

        let recorder = RecordingSubscriber::new();
        let mut dispatcher = Dispatcher::new(Arc::clone(&store));
        dispatcher.register(Box::new(recorder.clone()));
        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher.run_catch_up().await.unwrap();
        assert_eq!(recorder.seen().await, vec![1, 2, 3]);

        // nothing new to deliver
        dispatcher.run_catch_up().await.unwrap();
        assert_eq!(recorder.seen().await.len(), 3);

        dispatcher.rebuild_all().await.unwrap();
        assert_eq!(recorder.seen().await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn failing_subscriber_does_not_starve_others() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let failing = RecordingSubscriber::failing_on(1);
        let healthy = RecordingSubscriber::new();
        let mut dispatcher = Dispatcher::new(Arc::clone(&store));
        dispatcher.register(Box::new(failing.clone()));
        dispatcher.register(Box::new(healthy.clone()));

        let events = commit(&store, AggregateId::new(), 1, 1).await;
        let result = dispatcher.dispatch(&events).await;

        assert!(matches!(result, Err(NotificationError::Subscriber { .. })));
        assert_eq!(healthy.seen().await, vec![1]);
        assert!(failing.seen().await.is_empty());
    }
}
