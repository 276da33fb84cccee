//! CO2 loop driving fresh air exchange (exhaust and intake fans).

use super::{LoopOutcome, switch_group};
use crate::error::ValidationError;
use crate::relay::{RelayBank, RelayChannel, RelaySource};
use crate::sensor::SensorSnapshot;
use crate::time::Millis;

/// Once started, the fans run at least this long.
pub const FAE_MIN_RUN_MS: Millis = 60_000;

const CHANNELS: [RelayChannel; 2] = [RelayChannel::Exhaust, RelayChannel::Intake];

#[derive(Debug, Clone)]
pub struct Co2Loop {
    on_ppm: f32,
    off_ppm: f32,
    /// When the loop first saw both fans running, `None` while stopped.
    fan_on_ms: Option<Millis>,
}

impl Default for Co2Loop {
    fn default() -> Self {
        Self {
            on_ppm: 950.0,
            off_ppm: 800.0,
            fan_on_ms: None,
        }
    }
}

impl Co2Loop {
    /// # Errors
    ///
    /// Returns [`ValidationError::Co2ThresholdsInverted`] and keeps the
    /// previous thresholds when `off_ppm >= on_ppm`.
    pub fn set_thresholds(&mut self, on_ppm: f32, off_ppm: f32) -> Result<(), ValidationError> {
        if off_ppm.partial_cmp(&on_ppm) != Some(std::cmp::Ordering::Less) {
            return Err(ValidationError::Co2ThresholdsInverted {
                on: on_ppm,
                off: off_ppm,
            });
        }
        self.on_ppm = on_ppm;
        self.off_ppm = off_ppm;
        Ok(())
    }

    #[must_use]
    pub fn thresholds(&self) -> (f32, f32) {
        (self.on_ppm, self.off_ppm)
    }

    /// Both fans are running. A single fan left on by hand is not a flush.
    #[must_use]
    pub fn is_flushing(bank: &RelayBank) -> bool {
        CHANNELS.iter().all(|&channel| bank.get(channel))
    }

    pub fn tick(&mut self, snapshot: &SensorSnapshot, bank: &mut RelayBank, now: Millis) -> LoopOutcome {
        if !snapshot.co2.valid {
            return LoopOutcome::NoData;
        }
        let co2 = snapshot.co2.co2_ppm;

        let flushing = Self::is_flushing(bank);
        if !flushing {
            self.fan_on_ms = None;
        }
        let want_fae = if flushing {
            // fans started elsewhere get their minimum run from first sight
            let started = *self.fan_on_ms.get_or_insert(now);
            let min_run_met = now.saturating_sub(started) >= FAE_MIN_RUN_MS;
            co2 > self.off_ppm || !min_run_met
        } else {
            co2 > self.on_ppm
        };
        if want_fae == flushing {
            return LoopOutcome::Steady;
        }

        let outcome = switch_group(bank, &CHANNELS, want_fae, RelaySource::Co2, now);
        if want_fae && matches!(outcome, LoopOutcome::Switched(_)) {
            self.fan_on_ms = Some(now);
        }
        outcome
    }
}
