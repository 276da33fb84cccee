//! Water reservoir with an analog level probe.

use martha_domain::relay::{PinOutputs, RelayChannel};
use martha_domain::water_level::AdcCalibration;

const FILL_PCT_PER_S: f32 = 0.5;
const DRAIN_PCT_PER_S: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservoir {
    pub level_pct: f32,
    pub probe: AdcCalibration,
}

impl Default for Reservoir {
    fn default() -> Self {
        Self {
            level_pct: 50.0,
            probe: AdcCalibration::default(),
        }
    }
}

impl Reservoir {
    pub fn step(&mut self, outputs: PinOutputs, dt_s: f32) {
        let delta = if outputs.get(RelayChannel::Pump) {
            FILL_PCT_PER_S * dt_s
        } else {
            -DRAIN_PCT_PER_S * dt_s
        };
        self.level_pct = (self.level_pct + delta).clamp(0.0, 100.0);
    }

    /// Probe voltage for the current level, linear between the empty and
    /// full calibration points.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn millivolts(&self) -> u32 {
        let span = self.probe.water_max_mv.saturating_sub(self.probe.water_min_mv) as f32;
        self.probe.water_min_mv + (span * self.level_pct / 100.0).round() as u32
    }
}
