//! Storage ports: configuration and relay history persistence.

use std::future::Future;

use martha_domain::config::ControllerConfig;
use martha_domain::error::MarthaError;
use martha_domain::event::RelayEvent;

/// Persists the controller configuration.
pub trait ConfigRepository {
    /// Load the saved configuration, `None` on first boot.
    fn load(&self) -> impl Future<Output = Result<Option<ControllerConfig>, MarthaError>> + Send;

    /// Replace the saved configuration.
    fn save(&self, config: &ControllerConfig) -> impl Future<Output = Result<(), MarthaError>> + Send;
}

/// Append-only history of accepted relay changes.
pub trait RelayLogStore {
    /// Persist one relay change.
    fn append(&self, event: RelayEvent) -> impl Future<Output = Result<(), MarthaError>> + Send;

    /// Get the most recent changes, ordered newest-first.
    fn recent(&self, limit: usize) -> impl Future<Output = Result<Vec<RelayEvent>, MarthaError>> + Send;
}
