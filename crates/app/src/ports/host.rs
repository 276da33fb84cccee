//! Host services: time and runtime log verbosity.

use martha_domain::config::LogLevel;
use martha_domain::error::MarthaError;
use martha_domain::time::{Millis, Timestamp};

/// Source of time for the control core.
pub trait Clock {
    /// Monotonic milliseconds since start.
    fn uptime_ms(&self) -> Millis;

    /// Wall-clock time, `None` while it is not known.
    fn wall_clock(&self) -> Option<Timestamp>;
}

/// Changes the log verbosity of the running process.
pub trait LogLevelControl {
    /// # Errors
    ///
    /// Returns an error when the logging backend refuses the change.
    fn set_level(&self, level: LogLevel) -> Result<(), MarthaError>;
}
