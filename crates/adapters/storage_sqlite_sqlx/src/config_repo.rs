//! `SQLite` implementation of [`ConfigRepository`].
//!
//! Each field is one row of the `settings` table under a short key, so a
//! store written by an older build still loads: missing keys fall back to
//! their defaults.

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::SqlitePool;

use martha_app::ports::ConfigRepository;
use martha_domain::config::{ControllerConfig, LogLevel};
use martha_domain::control::timer::TimerConfig;
use martha_domain::error::MarthaError;
use martha_domain::sensor::RhAggregation;
use martha_domain::time::TimeZone;
use martha_domain::water_level::AdcCalibration;

use crate::error::StorageError;

/// Written on every save; its absence means nothing was ever saved.
const MARKER_KEY: &str = "rh_on";

const SELECT_ALL: &str = "SELECT key, value FROM settings";

const UPSERT: &str = r"
    INSERT INTO settings (key, value) VALUES (?, ?)
    ON CONFLICT(key) DO UPDATE SET value = excluded.value
";

fn probe_key(index: usize) -> String {
    format!("probe_{index}")
}

fn to_settings(config: &ControllerConfig) -> Vec<(String, String)> {
    let mut settings = vec![
        ("wifi_ssid", config.wifi_ssid.clone()),
        ("wifi_pass", config.wifi_pass.clone()),
        (MARKER_KEY, config.rh_on_pct.to_string()),
        ("rh_hyst", config.rh_hysteresis.to_string()),
        ("co2_on", config.co2_on_ppm.to_string()),
        ("co2_off", config.co2_off_ppm.to_string()),
        ("wl_low", config.water_low_pct.to_string()),
        ("wl_high", config.water_high_pct.to_string()),
        ("adc_min", config.adc.water_min_mv.to_string()),
        ("adc_max", config.adc.water_max_mv.to_string()),
        ("rh_agg", config.rh_aggregation.code().to_string()),
        ("log_lvl", config.log_level.code().to_string()),
        ("timezone", config.timezone.to_string()),
        ("l_on", config.timer.lights_on_minute.to_string()),
        ("l_off", config.timer.lights_off_minute.to_string()),
        ("uvc_on", config.timer.uvc_on_min.to_string()),
        ("uvc_off", config.timer.uvc_off_min.to_string()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect::<Vec<_>>();
    settings.extend(
        config
            .probe_labels
            .iter()
            .enumerate()
            .map(|(index, label)| (probe_key(index), label.clone())),
    );
    settings
}

struct Settings(HashMap<String, String>);

impl Settings {
    fn text(&self, key: &str, default: String) -> String {
        self.0.get(key).cloned().unwrap_or(default)
    }

    fn parse<T: FromStr>(&self, key: &str, default: T) -> Result<T, StorageError> {
        match self.0.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|_| StorageError::InvalidSetting {
                key: key.to_string(),
                value: value.clone(),
            }),
        }
    }

    fn code<T: TryFrom<u8>>(&self, key: &str, default: u8) -> Result<T, StorageError> {
        let code = self.parse(key, default)?;
        T::try_from(code).map_err(|_| StorageError::InvalidSetting {
            key: key.to_string(),
            value: code.to_string(),
        })
    }

    fn into_config(self) -> Result<ControllerConfig, StorageError> {
        let defaults = ControllerConfig::default();
        let timer = TimerConfig {
            lights_on_minute: self.parse("l_on", defaults.timer.lights_on_minute)?,
            lights_off_minute: self.parse("l_off", defaults.timer.lights_off_minute)?,
            uvc_on_min: self.parse("uvc_on", defaults.timer.uvc_on_min)?,
            uvc_off_min: self.parse("uvc_off", defaults.timer.uvc_off_min)?,
        };
        let adc = AdcCalibration {
            water_min_mv: self.parse("adc_min", defaults.adc.water_min_mv)?,
            water_max_mv: self.parse("adc_max", defaults.adc.water_max_mv)?,
        };
        let mut probe_labels = defaults.probe_labels.clone();
        for (index, label) in probe_labels.iter_mut().enumerate() {
            if let Some(stored) = self.0.get(&probe_key(index)) {
                label.clone_from(stored);
            }
        }

        Ok(ControllerConfig {
            wifi_ssid: self.text("wifi_ssid", defaults.wifi_ssid),
            wifi_pass: self.text("wifi_pass", defaults.wifi_pass),
            rh_on_pct: self.parse(MARKER_KEY, defaults.rh_on_pct)?,
            rh_hysteresis: self.parse("rh_hyst", defaults.rh_hysteresis)?,
            co2_on_ppm: self.parse("co2_on", defaults.co2_on_ppm)?,
            co2_off_ppm: self.parse("co2_off", defaults.co2_off_ppm)?,
            water_low_pct: self.parse("wl_low", defaults.water_low_pct)?,
            water_high_pct: self.parse("wl_high", defaults.water_high_pct)?,
            timer,
            adc,
            rh_aggregation: self.code::<RhAggregation>("rh_agg", defaults.rh_aggregation.code())?,
            timezone: self.parse::<TimeZone>("timezone", defaults.timezone)?,
            log_level: self.code::<LogLevel>("log_lvl", defaults.log_level.code())?,
            probe_labels,
        })
    }
}

/// `SQLite`-backed configuration store.
pub struct SqliteConfigRepository {
    pool: SqlitePool,
}

impl SqliteConfigRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ConfigRepository for SqliteConfigRepository {
    async fn load(&self) -> Result<Option<ControllerConfig>, MarthaError> {
        let rows: Vec<(String, String)> = sqlx::query_as(SELECT_ALL)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let settings = Settings(rows.into_iter().collect());
        if !settings.0.contains_key(MARKER_KEY) {
            return Ok(None);
        }
        Ok(Some(settings.into_config()?))
    }

    async fn save(&self, config: &ControllerConfig) -> Result<(), MarthaError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        for (key, value) in to_settings(config) {
            sqlx::query(UPSERT)
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }
        tx.commit().await.map_err(StorageError::from)?;
        Ok(())
    }
}
