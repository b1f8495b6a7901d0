use crate::types::{EventRecord, ReviewEvent};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

pub const MAILBOX_CAPACITY: usize = 4;

/// Fan-out of review events to any number of subscribers.
///
/// Every subscriber owns a small bounded mailbox. Publishing never waits: a
/// full mailbox loses the event for that subscriber only, and subscribers
/// whose receiver was dropped are pruned on the next publish.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<EventRecord>>>>,
}

pub type Subscription = mpsc::Receiver<EventRecord>;

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(MAILBOX_CAPACITY);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Returns how many subscribers accepted the event.
    pub fn publish(&self, event: ReviewEvent) -> usize {
        let record = EventRecord::new(event);
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        subscribers.retain(|sender| match sender.try_send(record.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(kind = record.kind(), "subscriber mailbox full, event dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        delivered
    }

    /// Drops every mailbox sender. Subscribers drain what is queued and then
    /// see their stream end.
    pub fn close(&self) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
