//! Relative humidity loop driving the fogger and tub fan.

use super::{LoopOutcome, switch_group};
use crate::relay::{RelayBank, RelayChannel, RelaySource};
use crate::sensor::SensorSnapshot;
use crate::time::Millis;

/// Minimum time between two fogger state changes.
pub const HUMIDITY_COOLDOWN_MS: Millis = 30_000;

const CHANNELS: [RelayChannel; 2] = [RelayChannel::Fogger, RelayChannel::TubFan];

/// Fogs below `on_rh`, stops above `on_rh + hysteresis`.
#[derive(Debug, Clone)]
pub struct HumidityLoop {
    on_rh: f32,
    hysteresis: f32,
    last_change_ms: Option<Millis>,
}

impl Default for HumidityLoop {
    fn default() -> Self {
        Self::new(85.0, 2.0)
    }
}

impl HumidityLoop {
    #[must_use]
    pub fn new(on_rh: f32, hysteresis: f32) -> Self {
        Self {
            on_rh,
            hysteresis,
            last_change_ms: None,
        }
    }

    pub fn set_thresholds(&mut self, on_rh: f32, hysteresis: f32) {
        self.on_rh = on_rh;
        self.hysteresis = hysteresis;
    }

    #[must_use]
    pub fn thresholds(&self) -> (f32, f32) {
        (self.on_rh, self.hysteresis)
    }

    #[must_use]
    pub fn is_fogging(bank: &RelayBank) -> bool {
        bank.get(RelayChannel::Fogger)
    }

    pub fn tick(&mut self, snapshot: &SensorSnapshot, bank: &mut RelayBank, now: Millis) -> LoopOutcome {
        let rh = match snapshot.rh_aggregate_pct {
            Some(rh) if snapshot.any_rh_valid() => rh,
            _ => return LoopOutcome::NoData,
        };

        let fogging = Self::is_fogging(bank);
        let want_fog = if fogging {
            rh < self.on_rh + self.hysteresis
        } else {
            rh < self.on_rh
        };
        if want_fog == fogging {
            return LoopOutcome::Steady;
        }

        if let Some(last) = self.last_change_ms
            && now.saturating_sub(last) < HUMIDITY_COOLDOWN_MS
        {
            return LoopOutcome::CoolingDown;
        }

        let outcome = switch_group(bank, &CHANNELS, want_fog, RelaySource::Humidity, now);
        if matches!(outcome, LoopOutcome::Switched(_)) {
            self.last_change_ms = Some(now);
        }
        outcome
    }
}
