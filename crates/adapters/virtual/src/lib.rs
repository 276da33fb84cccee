//! # martha-adapter-virtual
//!
//! Simulated tent hardware for running the controller on a desktop and in
//! tests.
//!
//! ## Simulated devices
//!
//! | Device | Port | Behaviour |
//! |--------|------|-----------|
//! | Climate | `SensorSource` | Fogger raises RH, exhaust flushes CO2, lights warm the air |
//! | Reservoir | `WaterLevelProbe` | Pump fills, otherwise it slowly drains |
//! | Relay board | `RelayDriver` | Latches the last written outputs |
//!
//! Physics advance on every sensor read by the uptime elapsed since the
//! previous read, using the outputs latched during that interval. No
//! randomness: the same sequence of calls gives the same readings.
//!
//! ## Dependency rule
//!
//! Depends on `martha-app` (port traits) and `martha-domain` only.

mod devices;

use std::sync::{Mutex, MutexGuard, PoisonError};

use martha_app::ports::{RelayDriver, SensorSource, WaterLevelProbe};
use martha_domain::error::MarthaError;
use martha_domain::relay::PinOutputs;
use martha_domain::sensor::{RH_SHELF_COUNT, SensorSnapshot};
use martha_domain::time::Millis;
use martha_domain::water_level::AdcCalibration;

pub use devices::{Climate, Reservoir};

/// Starting conditions of the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    pub rh_pct: f32,
    pub co2_ppm: f32,
    pub air_temp_c: f32,
    pub water_pct: f32,
}

impl Default for Seed {
    fn default() -> Self {
        let climate = Climate::default();
        Self {
            rh_pct: climate.rh_pct,
            co2_ppm: climate.co2_ppm,
            air_temp_c: climate.air_temp_c,
            water_pct: Reservoir::default().level_pct,
        }
    }
}

struct TentState {
    climate: Climate,
    reservoir: Reservoir,
    outputs: PinOutputs,
    last_step_ms: Option<Millis>,
    failed_shelves: [bool; RH_SHELF_COUNT],
}

/// The whole simulated tent.
pub struct SimulatedTent {
    state: Mutex<TentState>,
}

impl Default for SimulatedTent {
    fn default() -> Self {
        Self::new(Seed::default())
    }
}

impl SimulatedTent {
    #[must_use]
    pub fn new(seed: Seed) -> Self {
        Self {
            state: Mutex::new(TentState {
                climate: Climate {
                    rh_pct: seed.rh_pct,
                    co2_ppm: seed.co2_ppm,
                    air_temp_c: seed.air_temp_c,
                },
                reservoir: Reservoir {
                    level_pct: seed.water_pct,
                    probe: AdcCalibration::default(),
                },
                outputs: PinOutputs::default(),
                last_step_ms: None,
                failed_shelves: [false; RH_SHELF_COUNT],
            }),
        }
    }

    /// Make one RH shelf report invalid readings, or bring it back.
    pub fn set_shelf_failed(&self, shelf: usize, failed: bool) {
        if let Some(slot) = self.lock_state().failed_shelves.get_mut(shelf) {
            *slot = failed;
        }
    }

    /// Outputs last written by the controller.
    #[must_use]
    pub fn outputs(&self) -> PinOutputs {
        self.lock_state().outputs
    }

    #[must_use]
    pub fn climate(&self) -> Climate {
        self.lock_state().climate
    }

    #[must_use]
    pub fn reservoir(&self) -> Reservoir {
        self.lock_state().reservoir
    }

    fn lock_state(&self) -> MutexGuard<'_, TentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SensorSource for SimulatedTent {
    async fn read(&self, now: Millis) -> Result<SensorSnapshot, MarthaError> {
        let mut state = self.lock_state();
        let dt_s = state
            .last_step_ms
            .map_or(0.0, |last| devices::elapsed_s(last, now));
        let outputs = state.outputs;
        state.climate.step(outputs, dt_s);
        state.reservoir.step(outputs, dt_s);
        state.last_step_ms = Some(now);

        let mut snapshot = SensorSnapshot::default();
        state
            .climate
            .readings(outputs, state.failed_shelves, now, &mut snapshot);
        Ok(snapshot)
    }
}

impl WaterLevelProbe for SimulatedTent {
    async fn read_millivolts(&self) -> Result<Option<u32>, MarthaError> {
        Ok(Some(self.lock_state().reservoir.millivolts()))
    }
}

impl RelayDriver for SimulatedTent {
    async fn apply(&self, outputs: PinOutputs) -> Result<(), MarthaError> {
        self.lock_state().outputs = outputs;
        Ok(())
    }
}
