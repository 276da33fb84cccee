//! Sensor readings and the aggregated [`SensorSnapshot`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::time::Millis;

pub const RH_SHELF_COUNT: usize = 3;
pub const TEMP_PROBE_COUNT: usize = 5;
pub const LIGHT_CHANNEL_COUNT: usize = 11;

/// A reading older than this is no longer trusted.
pub const SENSOR_STALE_MS: Millis = 30_000;

/// Shelf humidity/temperature sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RhReading {
    pub rh_pct: f32,
    pub temp_c: f32,
    pub valid: bool,
    pub timestamp_ms: Millis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Co2Reading {
    pub co2_ppm: f32,
    pub temp_c: f32,
    pub rh_pct: f32,
    pub valid: bool,
    pub timestamp_ms: Millis,
}

/// Substrate temperature probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TempProbeReading {
    pub temp_c: f32,
    pub valid: bool,
    pub timestamp_ms: Millis,
}

/// Spectral light sensor, one count per band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LightReading {
    pub channels: [u16; LIGHT_CHANNEL_COUNT],
    pub valid: bool,
    pub timestamp_ms: Millis,
}

/// How the shelf RH readings are folded into the single value the humidity
/// loop acts on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RhAggregation {
    #[default]
    Average,
    /// Most conservative: the driest shelf.
    Min,
    /// Most aggressive: the wettest shelf.
    Max,
}

impl RhAggregation {
    /// Fold the valid readings. `None` when no reading is valid.
    #[must_use]
    pub fn aggregate(self, readings: &[RhReading]) -> Option<f32> {
        let valid = readings.iter().filter(|r| r.valid).map(|r| r.rh_pct);
        match self {
            Self::Average => mean(valid),
            Self::Min => valid.reduce(f32::min),
            Self::Max => valid.reduce(f32::max),
        }
    }

    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Average => 0,
            Self::Min => 1,
            Self::Max => 2,
        }
    }
}

impl TryFrom<u8> for RhAggregation {
    type Error = ValidationError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Average),
            1 => Ok(Self::Min),
            2 => Ok(Self::Max),
            other => Err(ValidationError::UnknownAggregation(other)),
        }
    }
}

impl From<RhAggregation> for u8 {
    fn from(mode: RhAggregation) -> Self {
        mode.code()
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f32>) -> Option<f32> {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f32)
}

/// Everything the controller knows about the tent at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub rh: [RhReading; RH_SHELF_COUNT],
    pub co2: Co2Reading,
    pub temps: [TempProbeReading; TEMP_PROBE_COUNT],
    pub light: LightReading,
    pub water_level_pct: f32,
    pub water_level_valid: bool,
    pub water_level_ts: Millis,
    pub rh_aggregate_pct: Option<f32>,
    pub temp_aggregate_c: Option<f32>,
}

impl SensorSnapshot {
    /// Recompute the RH aggregate with `mode` and the air temperature average
    /// from the valid shelves.
    pub fn update_aggregates(&mut self, mode: RhAggregation) {
        self.rh_aggregate_pct = mode.aggregate(&self.rh);
        self.temp_aggregate_c = mean(self.rh.iter().filter(|r| r.valid).map(|r| r.temp_c));
    }

    /// Invalidate readings that have not been refreshed for [`SENSOR_STALE_MS`].
    pub fn mark_stale(&mut self, now: Millis) {
        let stale = |ts: Millis| now.saturating_sub(ts) > SENSOR_STALE_MS;

        for reading in &mut self.rh {
            if reading.valid && stale(reading.timestamp_ms) {
                reading.valid = false;
            }
        }
        if self.co2.valid && stale(self.co2.timestamp_ms) {
            self.co2.valid = false;
        }
        for probe in &mut self.temps {
            if probe.valid && stale(probe.timestamp_ms) {
                probe.valid = false;
            }
        }
        if self.light.valid && stale(self.light.timestamp_ms) {
            self.light.valid = false;
        }
        if self.water_level_valid && stale(self.water_level_ts) {
            self.water_level_valid = false;
        }
    }

    #[must_use]
    pub fn any_rh_valid(&self) -> bool {
        self.rh.iter().any(|r| r.valid)
    }
}
