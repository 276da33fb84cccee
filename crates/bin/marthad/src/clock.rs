//! Host clock: monotonic uptime plus the system wall clock.

use std::time::Instant;

use martha_app::ports::Clock;
use martha_domain::time::{self, Millis, Timestamp};

/// Uptime counts from construction, so build it as early as possible.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn uptime_ms(&self) -> Millis {
        Millis::try_from(self.start.elapsed().as_millis()).unwrap_or(Millis::MAX)
    }

    fn wall_clock(&self) -> Option<Timestamp> {
        Some(time::now())
    }
}
