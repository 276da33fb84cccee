//! Reservoir top-off: pump on when low, off when full.

use super::{LoopOutcome, switch_group};
use crate::relay::{RelayBank, RelayChannel, RelaySource};
use crate::time::Millis;
use crate::water_level::WaterLevel;

#[derive(Debug, Clone)]
pub struct PumpLoop {
    low_pct: f32,
    high_pct: f32,
}

impl Default for PumpLoop {
    fn default() -> Self {
        Self::new(20.0, 80.0)
    }
}

impl PumpLoop {
    #[must_use]
    pub fn new(low_pct: f32, high_pct: f32) -> Self {
        Self { low_pct, high_pct }
    }

    pub fn set_thresholds(&mut self, low_pct: f32, high_pct: f32) {
        self.low_pct = low_pct;
        self.high_pct = high_pct;
    }

    pub fn tick(&mut self, level: &WaterLevel, bank: &mut RelayBank, now: Millis) -> LoopOutcome {
        if !level.is_valid() {
            return LoopOutcome::NoData;
        }

        let pumping = bank.get(RelayChannel::Pump);
        let want_pump = if level.is_below(self.low_pct) {
            true
        } else if level.is_above(self.high_pct) {
            false
        } else {
            pumping
        };
        if want_pump == pumping {
            return LoopOutcome::Steady;
        }

        switch_group(bank, &[RelayChannel::Pump], want_pump, RelaySource::PumpCtrl, now)
    }
}
