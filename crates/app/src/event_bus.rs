//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use martha_domain::error::MarthaError;
use martha_domain::event::RelayEvent;

use crate::ports::EventPublisher;

/// In-process event bus using a tokio [`broadcast`] channel.
///
/// Used for relay events (SSE stream) and live snapshots (WebSocket feed).
/// Sending succeeds even when there are no active subscribers
/// (the message is simply dropped).
pub struct InProcessEventBus<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> InProcessEventBus<T> {
    /// Create a new event bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to messages on this bus.
    ///
    /// Returns a receiver that will get all messages sent *after*
    /// the subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Send to every current subscriber. Returns how many received it.
    pub fn send(&self, message: T) -> usize {
        // fails only when there are zero receivers
        self.sender.send(message).unwrap_or(0)
    }

    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for InProcessEventBus<RelayEvent> {
    fn publish(&self, event: RelayEvent) -> impl Future<Output = Result<(), MarthaError>> + Send {
        self.send(event);
        async { Ok(()) }
    }
}
