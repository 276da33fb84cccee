//! In-memory port implementations shared by the service and runtime tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use martha_domain::config::ControllerConfig;
use martha_domain::error::MarthaError;
use martha_domain::event::RelayEvent;
use martha_domain::relay::PinOutputs;
use martha_domain::sensor::{Co2Reading, RhReading, SensorSnapshot};
use martha_domain::time::{Millis, Timestamp};

use crate::ports::{
    Clock, ConfigRepository, EventPublisher, RelayDriver, RelayLogStore, SensorSource,
    WaterLevelProbe,
};

#[derive(Default)]
pub struct FakeTent {
    pub snapshot: Mutex<SensorSnapshot>,
    pub millivolts: Mutex<Option<u32>>,
    pub applied: Mutex<Vec<PinOutputs>>,
    pub fail_reads: AtomicBool,
    /// The next `apply` yields this many times before writing.
    pub slow_apply: AtomicU32,
}

impl FakeTent {
    pub fn set_climate(&self, rh: f32, co2: f32, now: Millis) {
        let shelf = RhReading {
            rh_pct: rh,
            temp_c: 22.0,
            valid: true,
            timestamp_ms: now,
        };
        let mut snapshot = self.snapshot.lock().unwrap();
        snapshot.rh = [shelf; 3];
        snapshot.co2 = Co2Reading {
            co2_ppm: co2,
            valid: true,
            timestamp_ms: now,
            ..Co2Reading::default()
        };
    }

    pub fn last_applied(&self) -> PinOutputs {
        *self.applied.lock().unwrap().last().unwrap()
    }
}

impl SensorSource for FakeTent {
    async fn read(&self, _now: Millis) -> Result<SensorSnapshot, MarthaError> {
        if self.fail_reads.load(Ordering::Relaxed) {
            return Err(MarthaError::Hardware("bus stuck".into()));
        }
        Ok(*self.snapshot.lock().unwrap())
    }
}

impl WaterLevelProbe for FakeTent {
    async fn read_millivolts(&self) -> Result<Option<u32>, MarthaError> {
        Ok(*self.millivolts.lock().unwrap())
    }
}

impl RelayDriver for FakeTent {
    async fn apply(&self, outputs: PinOutputs) -> Result<(), MarthaError> {
        for _ in 0..self.slow_apply.swap(0, Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }
        self.applied.lock().unwrap().push(outputs);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLog {
    pub events: Mutex<Vec<RelayEvent>>,
}

impl RelayLogStore for InMemoryLog {
    async fn append(&self, event: RelayEvent) -> Result<(), MarthaError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RelayEvent>, MarthaError> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().rev().take(limit).cloned().collect())
    }
}

#[derive(Default)]
pub struct CountingPublisher {
    pub published: Mutex<Vec<RelayEvent>>,
}

impl EventPublisher for CountingPublisher {
    async fn publish(&self, event: RelayEvent) -> Result<(), MarthaError> {
        self.published.lock().unwrap().push(event);
        Ok(())
    }
}

/// Clock moved by hand.
#[derive(Default)]
pub struct ManualClock {
    pub uptime: AtomicU64,
    pub wall: Mutex<Option<Timestamp>>,
}

impl ManualClock {
    pub fn set(&self, ms: Millis) {
        self.uptime.store(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn uptime_ms(&self) -> Millis {
        self.uptime.load(Ordering::Relaxed)
    }

    fn wall_clock(&self) -> Option<Timestamp> {
        *self.wall.lock().unwrap()
    }
}

/// Clock following tokio time, so paused-time tests can advance it.
pub struct TokioClock {
    start: tokio::time::Instant,
}

impl Default for TokioClock {
    fn default() -> Self {
        Self {
            start: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn uptime_ms(&self) -> Millis {
        Millis::try_from(self.start.elapsed().as_millis()).unwrap()
    }

    fn wall_clock(&self) -> Option<Timestamp> {
        None
    }
}

#[derive(Default)]
pub struct InMemoryConfigRepo {
    pub stored: Mutex<Option<ControllerConfig>>,
    pub saves: Mutex<usize>,
}

impl ConfigRepository for InMemoryConfigRepo {
    async fn load(&self) -> Result<Option<ControllerConfig>, MarthaError> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, config: &ControllerConfig) -> Result<(), MarthaError> {
        *self.stored.lock().unwrap() = Some(config.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}
