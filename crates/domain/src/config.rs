//! Persisted controller configuration.
//!
//! [`ControllerConfig`] is the full, validated configuration. User updates
//! arrive as a [`ConfigPatch`] where every field is optional; applying a patch
//! starts from the current configuration and validates the result as a whole,
//! so a rejected patch never leaves a half-applied configuration behind.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::control::timer::TimerConfig;
use crate::error::ValidationError;
use crate::sensor::{RhAggregation, TEMP_PROBE_COUNT};
use crate::time::TimeZone;
use crate::water_level::AdcCalibration;

/// Runtime log verbosity, numbered as in the configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Error => 0,
            Self::Warn => 1,
            Self::Info => 2,
            Self::Debug => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = ValidationError;

    fn try_from(code: u8) -> Result<Self, ValidationError> {
        match code {
            0 => Ok(Self::Error),
            1 => Ok(Self::Warn),
            2 => Ok(Self::Info),
            3 => Ok(Self::Debug),
            other => Err(ValidationError::UnknownLogLevel(other)),
        }
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        level.code()
    }
}

/// Everything the user can tune, persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub wifi_ssid: String,
    /// Stored but never exported.
    #[serde(skip_serializing)]
    pub wifi_pass: String,
    pub rh_on_pct: f32,
    pub rh_hysteresis: f32,
    pub co2_on_ppm: f32,
    pub co2_off_ppm: f32,
    pub water_low_pct: f32,
    pub water_high_pct: f32,
    pub timer: TimerConfig,
    pub adc: AdcCalibration,
    pub rh_aggregation: RhAggregation,
    pub timezone: TimeZone,
    pub log_level: LogLevel,
    pub probe_labels: [String; TEMP_PROBE_COUNT],
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            rh_on_pct: 85.0,
            rh_hysteresis: 2.0,
            co2_on_ppm: 950.0,
            co2_off_ppm: 800.0,
            water_low_pct: 20.0,
            water_high_pct: 80.0,
            timer: TimerConfig::default(),
            adc: AdcCalibration::default(),
            rh_aggregation: RhAggregation::Average,
            timezone: TimeZone::utc(),
            log_level: LogLevel::Info,
            probe_labels: std::array::from_fn(|i| format!("Shelf{}", i + 1)),
        }
    }
}

impl ControllerConfig {
    /// Check every cross-field rule.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(50.0..=99.0).contains(&self.rh_on_pct) {
            return Err(ValidationError::RhSetpointOutOfRange(self.rh_on_pct));
        }
        if self.rh_hysteresis.is_nan() || self.rh_hysteresis < 0.0 {
            return Err(ValidationError::NegativeHysteresis(self.rh_hysteresis));
        }
        if self.co2_on_ppm.partial_cmp(&self.co2_off_ppm) != Some(std::cmp::Ordering::Greater) {
            return Err(ValidationError::Co2ThresholdsInverted {
                on: self.co2_on_ppm,
                off: self.co2_off_ppm,
            });
        }
        if self.water_low_pct.partial_cmp(&self.water_high_pct) != Some(std::cmp::Ordering::Less)
        {
            return Err(ValidationError::WaterThresholdsInverted {
                low: self.water_low_pct,
                high: self.water_high_pct,
            });
        }
        self.timer.validate()?;
        self.adc.validate()?;
        Ok(())
    }
}

/// Partial update of the timer schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TimerPatch {
    pub lights_on_minute: Option<u16>,
    pub lights_off_minute: Option<u16>,
    pub uvc_on_min: Option<u16>,
    pub uvc_off_min: Option<u16>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct AdcPatch {
    pub water_min_mv: Option<u32>,
    pub water_max_mv: Option<u32>,
}

/// A user-submitted configuration change. Absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigPatch {
    pub wifi_ssid: Option<String>,
    pub wifi_pass: Option<String>,
    pub rh_on_pct: Option<f32>,
    pub rh_hysteresis: Option<f32>,
    pub co2_on_ppm: Option<f32>,
    pub co2_off_ppm: Option<f32>,
    pub water_low_pct: Option<f32>,
    pub water_high_pct: Option<f32>,
    pub timer: Option<TimerPatch>,
    pub adc: Option<AdcPatch>,
    pub rh_aggregation: Option<u8>,
    pub timezone: Option<String>,
    pub log_level: Option<u8>,
    pub probe_labels: Option<Vec<String>>,
}

impl ConfigPatch {
    /// Overlay the patch onto `current` and validate the result.
    ///
    /// Only the first five probe labels are taken.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the merged configuration breaks a rule.
    pub fn apply(self, current: &ControllerConfig) -> Result<ControllerConfig, ValidationError> {
        let mut next = current.clone();

        if let Some(v) = self.wifi_ssid {
            next.wifi_ssid = v;
        }
        if let Some(v) = self.wifi_pass {
            next.wifi_pass = v;
        }
        if let Some(v) = self.rh_on_pct {
            next.rh_on_pct = v;
        }
        if let Some(v) = self.rh_hysteresis {
            next.rh_hysteresis = v;
        }
        if let Some(v) = self.co2_on_ppm {
            next.co2_on_ppm = v;
        }
        if let Some(v) = self.co2_off_ppm {
            next.co2_off_ppm = v;
        }
        if let Some(v) = self.water_low_pct {
            next.water_low_pct = v;
        }
        if let Some(v) = self.water_high_pct {
            next.water_high_pct = v;
        }
        if let Some(timer) = self.timer {
            next.timer.lights_on_minute = timer.lights_on_minute.unwrap_or(next.timer.lights_on_minute);
            next.timer.lights_off_minute =
                timer.lights_off_minute.unwrap_or(next.timer.lights_off_minute);
            next.timer.uvc_on_min = timer.uvc_on_min.unwrap_or(next.timer.uvc_on_min);
            next.timer.uvc_off_min = timer.uvc_off_min.unwrap_or(next.timer.uvc_off_min);
        }
        if let Some(adc) = self.adc {
            next.adc.water_min_mv = adc.water_min_mv.unwrap_or(next.adc.water_min_mv);
            next.adc.water_max_mv = adc.water_max_mv.unwrap_or(next.adc.water_max_mv);
        }
        if let Some(code) = self.rh_aggregation {
            next.rh_aggregation = RhAggregation::try_from(code)?;
        }
        if let Some(raw) = self.timezone {
            next.timezone = raw.parse()?;
        }
        if let Some(code) = self.log_level {
            next.log_level = LogLevel::try_from(code)?;
        }
        if let Some(labels) = self.probe_labels {
            for (slot, label) in next.probe_labels.iter_mut().zip(labels) {
                *slot = label;
            }
        }

        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_validate_defaults() {
        let config = ControllerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.probe_labels[0], "Shelf1");
        assert_eq!(config.probe_labels[4], "Shelf5");
        assert_eq!(config.timezone.as_str(), "UTC0");
    }

    #[test]
    fn should_never_export_wifi_password() {
        let config = ControllerConfig {
            wifi_pass: "hunter2".to_string(),
            ..ControllerConfig::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("wifi_pass").is_none());
        assert_eq!(json["rh_on_pct"], 85.0);
        assert_eq!(json["rh_aggregation"], 0);
        assert_eq!(json["log_level"], 2);
        assert_eq!(json["timer"]["lights_on_minute"], 480);
        assert_eq!(json["adc"]["water_max_mv"], 3100);
    }

    #[test]
    fn should_apply_partial_patch_onto_current_config() {
        let patch: ConfigPatch = serde_json::from_value(serde_json::json!({
            "rh_on_pct": 88.0,
            "timer": { "uvc_on_min": 30 }
        }))
        .unwrap();
        let next = patch.apply(&ControllerConfig::default()).unwrap();
        assert_eq!(next.rh_on_pct, 88.0);
        assert_eq!(next.timer.uvc_on_min, 30);
        assert_eq!(next.timer.uvc_off_min, 240);
        assert_eq!(next.co2_on_ppm, 950.0);
    }

    #[test]
    fn should_reject_rh_setpoint_out_of_range() {
        let patch = ConfigPatch {
            rh_on_pct: Some(40.0),
            ..ConfigPatch::default()
        };
        assert_eq!(
            patch.apply(&ControllerConfig::default()),
            Err(ValidationError::RhSetpointOutOfRange(40.0))
        );
    }

    #[test]
    fn should_reject_inverted_co2_thresholds() {
        let patch = ConfigPatch {
            co2_off_ppm: Some(950.0),
            ..ConfigPatch::default()
        };
        assert!(matches!(
            patch.apply(&ControllerConfig::default()),
            Err(ValidationError::Co2ThresholdsInverted { .. })
        ));
    }

    #[test]
    fn should_reject_inverted_water_thresholds() {
        let patch = ConfigPatch {
            water_low_pct: Some(90.0),
            ..ConfigPatch::default()
        };
        assert!(matches!(
            patch.apply(&ControllerConfig::default()),
            Err(ValidationError::WaterThresholdsInverted { .. })
        ));
    }

    #[test]
    fn should_reject_minute_past_end_of_day() {
        let patch = ConfigPatch {
            timer: Some(TimerPatch {
                lights_off_minute: Some(1440),
                ..TimerPatch::default()
            }),
            ..ConfigPatch::default()
        };
        assert_eq!(
            patch.apply(&ControllerConfig::default()),
            Err(ValidationError::MinuteOutOfRange {
                field: "lights_off_minute",
                value: 1440
            })
        );
    }

    #[test]
    fn should_reject_unknown_codes_and_timezones() {
        let current = ControllerConfig::default();
        let agg = ConfigPatch {
            rh_aggregation: Some(5),
            ..ConfigPatch::default()
        };
        assert_eq!(
            agg.apply(&current),
            Err(ValidationError::UnknownAggregation(5))
        );

        let level = ConfigPatch {
            log_level: Some(4),
            ..ConfigPatch::default()
        };
        assert_eq!(level.apply(&current), Err(ValidationError::UnknownLogLevel(4)));

        let tz = ConfigPatch {
            timezone: Some("Mars".to_string()),
            ..ConfigPatch::default()
        };
        assert!(matches!(
            tz.apply(&current),
            Err(ValidationError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn should_reject_zero_uvc_durations_and_negative_hysteresis() {
        let current = ControllerConfig::default();
        let uvc = ConfigPatch {
            timer: Some(TimerPatch {
                uvc_off_min: Some(0),
                ..TimerPatch::default()
            }),
            ..ConfigPatch::default()
        };
        assert_eq!(
            uvc.apply(&current),
            Err(ValidationError::ZeroDuration {
                field: "uvc_off_min"
            })
        );

        let hyst = ConfigPatch {
            rh_hysteresis: Some(-1.0),
            ..ConfigPatch::default()
        };
        assert_eq!(
            hyst.apply(&current),
            Err(ValidationError::NegativeHysteresis(-1.0))
        );
    }

    #[test]
    fn should_take_only_first_five_probe_labels() {
        let labels = (1..=7).map(|i| format!("P{i}")).collect();
        let patch = ConfigPatch {
            probe_labels: Some(labels),
            ..ConfigPatch::default()
        };
        let next = patch.apply(&ControllerConfig::default()).unwrap();
        assert_eq!(next.probe_labels[4], "P5");
    }

    #[test]
    fn should_keep_remaining_labels_when_patch_is_short() {
        let patch = ConfigPatch {
            probe_labels: Some(vec!["Top".to_string()]),
            ..ConfigPatch::default()
        };
        let next = patch.apply(&ControllerConfig::default()).unwrap();
        assert_eq!(next.probe_labels[0], "Top");
        assert_eq!(next.probe_labels[1], "Shelf2");
    }

    #[test]
    fn should_parse_log_level_codes() {
        assert_eq!(LogLevel::try_from(3), Ok(LogLevel::Debug));
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert!(LogLevel::Error < LogLevel::Debug);
    }
}
