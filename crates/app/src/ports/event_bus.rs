//! Event bus port: publish relay changes to interested subscribers.

use std::future::Future;

use martha_domain::error::MarthaError;
use martha_domain::event::RelayEvent;

/// Publishes relay events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: RelayEvent) -> impl Future<Output = Result<(), MarthaError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: RelayEvent) -> impl Future<Output = Result<(), MarthaError>> + Send {
        (**self).publish(event)
    }
}
