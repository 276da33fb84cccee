//! Daemon configuration: TOML file with environment variable overrides.
//!
//! Looks for `marthad.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.
//!
//! This only covers how the daemon runs. The controller's own settings
//! (setpoints, timer, timezone) live in the database and are edited through
//! the API.

use martha_adapter_storage_sqlite_sqlx::DEFAULT_RETENTION;
use martha_adapter_virtual::Seed;
use martha_app::runtime::Periods;
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Task periods.
    pub control: ControlConfig,
    /// Simulated tent.
    pub simulation: SimulationConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
    /// Relay events kept in the log before the oldest are dropped.
    pub relay_log_retention: u32,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Background task periods, in milliseconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub sensor_period_ms: u64,
    pub control_period_ms: u64,
    pub broadcast_period_ms: u64,
    /// Control tick stall that trips the watchdog.
    pub watchdog_timeout_ms: u64,
}

/// Starting conditions of the simulated tent.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// No real hardware driver exists yet, so this must stay on.
    pub enabled: bool,
    pub rh_pct: f32,
    pub co2_ppm: f32,
    pub air_temp_c: f32,
    pub water_pct: f32,
}

impl Config {
    /// Load configuration from `marthad.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are unusable.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("marthad.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("MARTHA_HOST") {
            self.server.host = val;
        }
        if let Some(port) = var("MARTHA_PORT").and_then(|val| val.parse().ok()) {
            self.server.port = port;
        }
        if let Some(val) = var("MARTHA_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("MARTHA_DATABASE_URL") {
            self.database.url = val;
        }
        if let Some(val) = var("MARTHA_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        let control = &self.control;
        for (name, value) in [
            ("sensor_period_ms", control.sensor_period_ms),
            ("control_period_ms", control.control_period_ms),
            ("broadcast_period_ms", control.broadcast_period_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be non-zero")));
            }
        }
        if control.watchdog_timeout_ms <= control.control_period_ms {
            return Err(ConfigError::Validation(
                "watchdog_timeout_ms must exceed control_period_ms".to_string(),
            ));
        }
        if !self.simulation.enabled {
            return Err(ConfigError::Validation(
                "simulation.enabled = false needs a hardware driver, none is built in".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.simulation.water_pct) {
            return Err(ConfigError::Validation(
                "simulation.water_pct must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    #[must_use]
    pub fn periods(&self) -> Periods {
        Periods {
            sensor_ms: self.control.sensor_period_ms,
            control_ms: self.control.control_period_ms,
            broadcast_ms: self.control.broadcast_period_ms,
            watchdog_timeout_ms: self.control.watchdog_timeout_ms,
        }
    }

    #[must_use]
    pub fn seed(&self) -> Seed {
        Seed {
            rh_pct: self.simulation.rh_pct,
            co2_ppm: self.simulation.co2_ppm,
            air_temp_c: self.simulation.air_temp_c,
            water_pct: self.simulation.water_pct,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:martha.db?mode=rwc".to_string(),
            relay_log_retention: DEFAULT_RETENTION,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tower_http=debug,sqlx=warn".to_string(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        let periods = Periods::default();
        Self {
            sensor_period_ms: periods.sensor_ms,
            control_period_ms: periods.control_ms,
            broadcast_period_ms: periods.broadcast_ms,
            watchdog_timeout_ms: periods.watchdog_timeout_ms,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let seed = Seed::default();
        Self {
            enabled: true,
            rh_pct: seed.rh_pct,
            co2_ppm: seed.co2_ppm,
            air_temp_c: seed.air_temp_c,
            water_pct: seed.water_pct,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:martha.db?mode=rwc");
        assert_eq!(config.database.relay_log_retention, DEFAULT_RETENTION);
        assert_eq!(config.control.sensor_period_ms, 2_000);
        assert_eq!(config.control.control_period_ms, 1_000);
        assert_eq!(config.control.broadcast_period_ms, 2_000);
        assert_eq!(config.control.watchdog_timeout_ms, 30_000);
        assert!(config.simulation.enabled);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.periods(), Periods::default());
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [database]
            url = 'sqlite:test.db'
            relay_log_retention = 500

            [logging]
            filter = 'debug'

            [control]
            sensor_period_ms = 500
            control_period_ms = 250
            broadcast_period_ms = 1000
            watchdog_timeout_ms = 5000

            [simulation]
            enabled = true
            rh_pct = 70.0
            co2_ppm = 1200.0
            air_temp_c = 19.5
            water_pct = 35.0
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.database.relay_log_retention, 500);
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(
            config.periods(),
            Periods {
                sensor_ms: 500,
                control_ms: 250,
                broadcast_ms: 1_000,
                watchdog_timeout_ms: 5_000,
            }
        );
        assert_eq!(
            config.seed(),
            Seed {
                rh_pct: 70.0,
                co2_ppm: 1_200.0,
                air_temp_c: 19.5,
                water_pct: 35.0,
            }
        );
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [server]
            port = 8080

            [simulation]
            co2_ppm = 900.0
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.url, "sqlite:martha.db?mode=rwc");
        assert!((config.seed().co2_ppm - 900.0).abs() < f32::EPSILON);
        assert_eq!(config.seed().water_pct, Seed::default().water_pct);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_accept_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_zero_period() {
        let mut config = Config::default();
        config.control.sensor_period_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("sensor_period_ms"));
    }

    #[test]
    fn should_reject_watchdog_shorter_than_control_period() {
        let mut config = Config::default();
        config.control.watchdog_timeout_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_disabled_simulation() {
        let mut config = Config::default();
        config.simulation.enabled = false;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_water_seed_out_of_range() {
        let mut config = Config::default();
        config.simulation.water_pct = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_format_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn should_override_host_and_port_from_env() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("MARTHA_HOST", "127.0.0.1"), ("MARTHA_PORT", "8081")]));
        assert_eq!(config.bind_addr(), "127.0.0.1:8081");
    }

    #[test]
    fn should_ignore_unparsable_port_override() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("MARTHA_PORT", "eighty")]));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_split_bind_override() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("MARTHA_BIND", "10.0.0.2:4000")]));
        assert_eq!(config.server.host, "10.0.0.2");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn should_prefer_rust_log_over_martha_log() {
        let mut config = Config::default();
        config.apply_overrides(env(&[
            ("MARTHA_LOG", "warn"),
            ("RUST_LOG", "debug"),
            ("MARTHA_DATABASE_URL", "sqlite::memory:"),
        ]));
        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.database_url(), "sqlite::memory:");
    }
}
