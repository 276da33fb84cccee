//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`MarthaError`]
//! via `#[from]`. Adapter errors (storage, hardware) are boxed so the domain
//! never names an IO crate.

use crate::relay::RelayError;

/// Top-level error for every fallible operation in the controller.
#[derive(Debug, thiserror::Error)]
pub enum MarthaError {
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("relay command rejected")]
    Relay(#[from] RelayError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("hardware error")]
    Hardware(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A host facility (logging backend, clock) refused the request.
    #[error("host error")]
    Host(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated by user input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("rh_on_pct must be between 50 and 99, got {0}")]
    RhSetpointOutOfRange(f32),

    #[error("rh_hysteresis must not be negative, got {0}")]
    NegativeHysteresis(f32),

    #[error("co2_on_ppm ({on}) must be greater than co2_off_ppm ({off})")]
    Co2ThresholdsInverted { on: f32, off: f32 },

    #[error("water_low_pct ({low}) must be lower than water_high_pct ({high})")]
    WaterThresholdsInverted { low: f32, high: f32 },

    #[error("{field} must be a minute of the day (0-1439), got {value}")]
    MinuteOutOfRange { field: &'static str, value: u16 },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("water_max_mv ({max}) must be greater than water_min_mv ({min})")]
    CalibrationInverted { min: u32, max: u32 },

    #[error("rh_aggregation must be 0 (average), 1 (min) or 2 (max), got {0}")]
    UnknownAggregation(u8),

    #[error("log level must be 0-3, got {0}")]
    UnknownLogLevel(u8),

    #[error("invalid timezone {0:?}")]
    InvalidTimezone(String),

    #[error("timezone {0:?} has daylight saving rules, only fixed offsets are supported")]
    UnsupportedDst(String),

    /// The document parsed but a field has the wrong type.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

/// A lookup by name or index found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

impl NotFoundError {
    /// Build the error for an unknown relay channel reference.
    #[must_use]
    pub fn channel(raw: &str) -> Self {
        Self {
            entity: "relay channel",
            id: raw.to_string(),
        }
    }
}
