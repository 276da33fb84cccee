//! # martha-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `SensorSource`, `WaterLevelProbe`, `RelayDriver`: tent hardware
//!   - `ConfigRepository`: persisted controller configuration
//!   - `RelayLogStore`: durable relay change history
//!   - `Clock`, `LogLevelControl`: host services
//! - Define the **use-cases** driving the tent:
//!   - `Controller`: sensor polling, control loops, relay commands
//!   - `ConfigService`: load, validate and persist configuration
//!   - `Broadcaster`: periodic live snapshots and chart history
//! - Provide **in-process infrastructure** (event bus, periodic runtime tasks)
//!
//! ## Dependency rule
//! Depends on `martha-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod broadcaster;
pub mod event_bus;
pub mod ports;
pub mod runtime;
pub mod services;

#[cfg(test)]
mod testing;
