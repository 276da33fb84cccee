//! `tracing` setup with a filter that can be swapped at runtime.
//!
//! The filter from `marthad.toml` / `RUST_LOG` is the base. The controller's
//! log level (`POST /api/log-level`, persisted `log_level`) replaces the
//! base's default level and keeps its per-target directives.

use martha_app::ports::LogLevelControl;
use martha_domain::config::LogLevel;
use martha_domain::error::MarthaError;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, reload};

/// Used when the configured filter does not parse.
pub const FALLBACK_FILTER: &str = "info";

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Install the global subscriber and return the handle that changes its level.
pub fn init(filter: &str) -> ReloadLogControl {
    let (filter_layer, handle) = reload::Layer::new(base_filter(filter));
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .init();
    ReloadLogControl::new(handle, filter)
}

fn base_filter(filter: &str) -> EnvFilter {
    EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?} ({err}), using {FALLBACK_FILTER:?}");
        EnvFilter::new(FALLBACK_FILTER)
    })
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
    }
}

/// Filter for `level` on top of `base`.
fn filter_for(base: &str, level: LogLevel) -> EnvFilter {
    base_filter(base).add_directive(level_filter(level).into())
}

/// [`LogLevelControl`] backed by a `tracing_subscriber` reload handle.
#[derive(Clone)]
pub struct ReloadLogControl {
    handle: FilterHandle,
    base: String,
}

impl ReloadLogControl {
    #[must_use]
    pub fn new(handle: FilterHandle, base: &str) -> Self {
        Self {
            handle,
            base: base.to_string(),
        }
    }
}

impl LogLevelControl for ReloadLogControl {
    fn set_level(&self, level: LogLevel) -> Result<(), MarthaError> {
        self.handle
            .reload(filter_for(&self.base, level))
            .map_err(|err| MarthaError::Host(Box::new(err)))?;
        tracing::info!(%level, "log level changed");
        Ok(())
    }
}
