//! Daily lights window and UVC duty cycle.

use serde::{Deserialize, Serialize};

use super::{LoopOutcome, switch_group};
use crate::error::ValidationError;
use crate::relay::{RelayBank, RelayChannel, RelaySource};
use crate::time::{MINUTES_PER_DAY, Millis};

const MS_PER_MINUTE: Millis = 60_000;

/// Lights window in minutes of the local day, UVC cycle in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub lights_on_minute: u16,
    pub lights_off_minute: u16,
    pub uvc_on_min: u16,
    pub uvc_off_min: u16,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            lights_on_minute: 8 * 60,
            lights_off_minute: 20 * 60,
            uvc_on_min: 60,
            uvc_off_min: 240,
        }
    }
}

impl TimerConfig {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for minutes past the end of the day or a
    /// zero-length UVC phase.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("lights_on_minute", self.lights_on_minute),
            ("lights_off_minute", self.lights_off_minute),
        ] {
            if value >= MINUTES_PER_DAY {
                return Err(ValidationError::MinuteOutOfRange { field, value });
            }
        }
        if self.uvc_on_min == 0 {
            return Err(ValidationError::ZeroDuration { field: "uvc_on_min" });
        }
        if self.uvc_off_min == 0 {
            return Err(ValidationError::ZeroDuration {
                field: "uvc_off_min",
            });
        }
        Ok(())
    }

    /// Whether the lights belong on at `minute` of the day. Windows may wrap
    /// midnight.
    #[must_use]
    pub fn lights_wanted(&self, minute: u16) -> bool {
        let (on, off) = (self.lights_on_minute, self.lights_off_minute);
        if on < off {
            minute >= on && minute < off
        } else {
            minute >= on || minute < off
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerOutcome {
    pub lights: LoopOutcome,
    pub uvc: LoopOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct TimerScheduler {
    config: TimerConfig,
    uvc_last_flip_ms: Millis,
}

impl TimerScheduler {
    #[must_use]
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            uvc_last_flip_ms: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Replace the schedule and restart the UVC cycle from zero uptime.
    pub fn set_config(&mut self, config: TimerConfig) {
        self.config = config;
        self.uvc_last_flip_ms = 0;
    }

    /// `minute_of_day` is `None` when the wall clock is unknown; lights are
    /// then kept off.
    pub fn tick(&mut self, bank: &mut RelayBank, minute_of_day: Option<u16>, now: Millis) -> TimerOutcome {
        TimerOutcome {
            lights: self.tick_lights(bank, minute_of_day, now),
            uvc: self.tick_uvc(bank, now),
        }
    }

    fn tick_lights(&self, bank: &mut RelayBank, minute_of_day: Option<u16>, now: Millis) -> LoopOutcome {
        let want_on = minute_of_day.is_some_and(|m| self.config.lights_wanted(m));
        if want_on == bank.get(RelayChannel::Lights) {
            return LoopOutcome::Steady;
        }
        switch_group(bank, &[RelayChannel::Lights], want_on, RelaySource::Timer, now)
    }

    fn tick_uvc(&mut self, bank: &mut RelayBank, now: Millis) -> LoopOutcome {
        let uvc_on = bank.get(RelayChannel::Uvc);
        let phase_min = if uvc_on {
            self.config.uvc_on_min
        } else {
            self.config.uvc_off_min
        };
        let elapsed = now.saturating_sub(self.uvc_last_flip_ms);
        if elapsed < Millis::from(phase_min) * MS_PER_MINUTE {
            return LoopOutcome::Steady;
        }

        let outcome = switch_group(bank, &[RelayChannel::Uvc], !uvc_on, RelaySource::Timer, now);
        if matches!(outcome, LoopOutcome::Switched(_)) {
            self.uvc_last_flip_ms = now;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::test_support::armed_bank;
    use crate::relay::RelayError;

    const HOUR: Millis = 60 * MS_PER_MINUTE;

    #[test]
    fn should_turn_lights_on_inside_window() {
        let mut bank = armed_bank();
        let mut timer = TimerScheduler::default();
        timer.tick(&mut bank, Some(8 * 60), 20_000);
        assert!(bank.get(RelayChannel::Lights));

        timer.tick(&mut bank, Some(20 * 60), 21_000);
        assert!(!bank.get(RelayChannel::Lights));
    }

    #[test]
    fn should_handle_window_wrapping_midnight() {
        let config = TimerConfig {
            lights_on_minute: 22 * 60,
            lights_off_minute: 6 * 60,
            ..TimerConfig::default()
        };
        assert!(config.lights_wanted(23 * 60));
        assert!(config.lights_wanted(60));
        assert!(!config.lights_wanted(6 * 60));
        assert!(!config.lights_wanted(12 * 60));
    }

    #[test]
    fn should_keep_lights_off_when_time_unknown() {
        let mut bank = armed_bank();
        let mut timer = TimerScheduler::default();
        let outcome = timer.tick(&mut bank, None, 20_000);
        assert_eq!(outcome.lights, LoopOutcome::Steady);
        assert!(!bank.get(RelayChannel::Lights));
    }

    #[test]
    fn should_cycle_uvc_through_off_then_on_phase() {
        let mut bank = armed_bank();
        let mut timer = TimerScheduler::default();

        timer.tick(&mut bank, None, 4 * HOUR - 1);
        assert!(!bank.get(RelayChannel::Uvc));

        timer.tick(&mut bank, None, 4 * HOUR);
        assert!(bank.get(RelayChannel::Uvc));

        timer.tick(&mut bank, None, 5 * HOUR - 1);
        assert!(bank.get(RelayChannel::Uvc));

        timer.tick(&mut bank, None, 5 * HOUR);
        assert!(!bank.get(RelayChannel::Uvc));
    }

    #[test]
    fn should_retry_uvc_flip_refused_by_guard() {
        let mut timer = TimerScheduler::new(TimerConfig {
            uvc_off_min: 1,
            ..TimerConfig::default()
        });
        // booted late enough that the off phase ends inside the UVC guard
        let mut early = RelayBank::new(MS_PER_MINUTE - 8_000);
        early.tick(MS_PER_MINUTE);
        let outcome = timer.tick(&mut early, None, MS_PER_MINUTE);
        assert_eq!(outcome.uvc, LoopOutcome::Rejected(RelayError::UvcGuard));
        assert!(!early.get(RelayChannel::Uvc));

        let outcome = timer.tick(&mut early, None, MS_PER_MINUTE + 3_000);
        assert_eq!(outcome.uvc.changes().len(), 1);
        assert!(early.get(RelayChannel::Uvc));
    }

    #[test]
    fn should_reset_uvc_cycle_when_config_changes() {
        let mut bank = armed_bank();
        let mut timer = TimerScheduler::default();
        timer.tick(&mut bank, None, 4 * HOUR);
        assert!(bank.get(RelayChannel::Uvc));

        timer.set_config(TimerConfig {
            uvc_on_min: 30,
            ..TimerConfig::default()
        });
        assert_eq!(timer.config().uvc_on_min, 30);
        // measured from zero again, so 30 minutes are long gone
        timer.tick(&mut bank, None, 4 * HOUR + 1_000);
        assert!(!bank.get(RelayChannel::Uvc));
    }

    #[test]
    fn should_reject_minutes_past_end_of_day() {
        let config = TimerConfig {
            lights_on_minute: 1_440,
            ..TimerConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(TimerConfig::default().validate().is_ok());
    }
}
