//! Hands committed notifications to the dispatcher.

use std::sync::Arc;

use document_store::{DocumentStore, EventEnvelope};
use notifications::Dispatcher;

/// Post-commit publisher shared by the services.
///
/// Delivery failures are logged; a committed use case never fails because a
/// subscriber did.
pub struct Notifier<S: DocumentStore + ?Sized> {
    dispatcher: Option<Arc<Dispatcher<S>>>,
}

impl<S: DocumentStore + ?Sized> Clone for Notifier<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> Notifier<S> {
    pub fn new(dispatcher: Arc<Dispatcher<S>>) -> Self {
        Self {
            dispatcher: Some(dispatcher),
        }
    }

    /// A notifier that drops everything. Subscribers can still catch up
    /// from the outbox later.
    pub fn disabled() -> Self {
        Self { dispatcher: None }
    }

    pub async fn publish(&self, events: &[EventEnvelope]) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        if let Err(err) = dispatcher.dispatch(events).await {
            tracing::error!(error = %err, events = events.len(), "notification dispatch failed");
        }
    }
}

impl<S: DocumentStore + ?Sized> Default for Notifier<S> {
    fn default() -> Self {
        Self::disabled()
    }
}
