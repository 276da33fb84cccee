//! Reservoir water level from an analog probe.
//!
//! Raw millivolt samples are clamped into the calibrated range, mapped to a
//! percentage and smoothed over [`WATER_LEVEL_SAMPLES`] samples.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::rolling_average::RollingAverage;

pub const WATER_LEVEL_SAMPLES: usize = 32;
/// Samples needed before the level is reported.
pub const WATER_LEVEL_MIN_SAMPLES: usize = 4;

/// Probe voltage at empty and full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdcCalibration {
    pub water_min_mv: u32,
    pub water_max_mv: u32,
}

impl Default for AdcCalibration {
    fn default() -> Self {
        Self {
            water_min_mv: 200,
            water_max_mv: 3100,
        }
    }
}

impl AdcCalibration {
    /// # Errors
    ///
    /// Returns [`ValidationError::CalibrationInverted`] when max is not above min.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.water_max_mv <= self.water_min_mv {
            return Err(ValidationError::CalibrationInverted {
                min: self.water_min_mv,
                max: self.water_max_mv,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaterLevel {
    calibration: AdcCalibration,
    average: RollingAverage<WATER_LEVEL_SAMPLES>,
}

impl WaterLevel {
    #[must_use]
    pub fn new(calibration: AdcCalibration) -> Self {
        Self {
            calibration,
            average: RollingAverage::new(),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn push_millivolts(&mut self, mv: u32) {
        let AdcCalibration {
            water_min_mv: min,
            water_max_mv: max,
        } = self.calibration;
        let clamped = mv.clamp(min, max);
        let pct = if max > min {
            100.0 * (clamped - min) as f32 / (max - min) as f32
        } else {
            0.0
        };
        self.average.push(pct);
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.average.count() >= WATER_LEVEL_MIN_SAMPLES
    }

    /// Smoothed level, `None` until enough samples were collected.
    #[must_use]
    pub fn level_percent(&self) -> Option<f32> {
        self.is_valid().then(|| self.average.average())
    }

    #[must_use]
    pub fn is_below(&self, low_pct: f32) -> bool {
        self.level_percent().is_some_and(|pct| pct < low_pct)
    }

    #[must_use]
    pub fn is_above(&self, high_pct: f32) -> bool {
        self.level_percent().is_some_and(|pct| pct > high_pct)
    }

    #[must_use]
    pub fn calibration(&self) -> AdcCalibration {
        self.calibration
    }

    /// Replace the calibration and restart smoothing.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::CalibrationInverted`] and keeps the old
    /// calibration when `max_mv <= min_mv`.
    pub fn set_calibration(&mut self, calibration: AdcCalibration) -> Result<(), ValidationError> {
        calibration.validate()?;
        if calibration != self.calibration {
            self.calibration = calibration;
            self.average.reset();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(mv: u32) -> WaterLevel {
        let mut level = WaterLevel::default();
        for _ in 0..WATER_LEVEL_SAMPLES {
            level.push_millivolts(mv);
        }
        level
    }

    fn close(actual: Option<f32>, expected: f32) -> bool {
        actual.is_some_and(|v| (v - expected).abs() < 0.5)
    }

    #[test]
    fn should_read_zero_at_min_voltage() {
        assert!(close(filled(200).level_percent(), 0.0));
    }

    #[test]
    fn should_read_hundred_at_max_voltage() {
        assert!(close(filled(3100).level_percent(), 100.0));
    }

    #[test]
    fn should_read_half_at_mid_voltage() {
        assert!(close(filled(1650).level_percent(), 50.0));
    }

    #[test]
    fn should_clamp_voltages_outside_calibration() {
        assert!(close(filled(0).level_percent(), 0.0));
        assert!(close(filled(4000).level_percent(), 100.0));
    }

    #[test]
    fn should_become_valid_after_four_samples() {
        let mut level = WaterLevel::default();
        for _ in 0..3 {
            level.push_millivolts(1650);
        }
        assert!(!level.is_valid());
        assert_eq!(level.level_percent(), None);
        assert!(!level.is_below(100.0));
        assert!(!level.is_above(0.0));

        level.push_millivolts(1650);
        assert!(level.is_valid());
    }

    #[test]
    fn should_compare_against_thresholds() {
        // 10% of 200..3100
        let low = filled(490);
        assert!(low.is_below(20.0));
        assert!(!low.is_above(80.0));

        // 90%
        let high = filled(2810);
        assert!(high.is_above(80.0));
        assert!(!high.is_below(20.0));
    }

    #[test]
    fn should_use_custom_calibration() {
        let mut level = WaterLevel::new(AdcCalibration {
            water_min_mv: 500,
            water_max_mv: 2500,
        });
        for _ in 0..8 {
            level.push_millivolts(1500);
        }
        assert!(close(level.level_percent(), 50.0));
    }

    #[test]
    fn should_reject_inverted_calibration_and_keep_previous() {
        let mut level = filled(1650);
        let err = level
            .set_calibration(AdcCalibration {
                water_min_mv: 3000,
                water_max_mv: 1000,
            })
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::CalibrationInverted {
                min: 3000,
                max: 1000
            }
        );
        assert_eq!(level.calibration(), AdcCalibration::default());
        assert!(level.is_valid());
    }

    #[test]
    fn should_reset_average_when_calibration_changes() {
        let mut level = filled(1650);
        level
            .set_calibration(AdcCalibration {
                water_min_mv: 500,
                water_max_mv: 2500,
            })
            .unwrap();
        assert!(!level.is_valid());
    }
}
