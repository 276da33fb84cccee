//! Shared application state for axum handlers.

use std::sync::Arc;

use martha_app::broadcaster::Broadcaster;
use martha_app::event_bus::InProcessEventBus;
use martha_app::services::config_service::ConfigService;
use martha_app::services::controller::Controller;
use martha_domain::event::RelayEvent;

/// Application state shared across all axum handlers.
///
/// Generic over the tent hardware, relay log store, relay event publisher,
/// clock, config repository and log level control to avoid dynamic
/// dispatch. `Clone` is implemented manually so only the `Arc` wrappers are
/// cloned.
pub struct AppState<H, L, P, C, R, LC> {
    pub controller: Arc<Controller<H, L, P, C>>,
    pub config_service: Arc<ConfigService<R>>,
    /// Live snapshots and chart history.
    pub broadcaster: Arc<Broadcaster>,
    /// Relay changes, for the SSE stream.
    pub relay_events: Arc<InProcessEventBus<RelayEvent>>,
    pub log_control: Arc<LC>,
}

impl<H, L, P, C, R, LC> Clone for AppState<H, L, P, C, R, LC> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            config_service: Arc::clone(&self.config_service),
            broadcaster: Arc::clone(&self.broadcaster),
            relay_events: Arc::clone(&self.relay_events),
            log_control: Arc::clone(&self.log_control),
        }
    }
}

impl<H, L, P, C, R, LC> AppState<H, L, P, C, R, LC> {
    /// Create the state from `Arc`s already shared with the background tasks.
    pub fn from_arcs(
        controller: Arc<Controller<H, L, P, C>>,
        config_service: Arc<ConfigService<R>>,
        broadcaster: Arc<Broadcaster>,
        relay_events: Arc<InProcessEventBus<RelayEvent>>,
        log_control: Arc<LC>,
    ) -> Self {
        Self {
            controller,
            config_service,
            broadcaster,
            relay_events,
            log_control,
        }
    }
}
