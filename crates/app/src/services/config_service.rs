//! Config service: load, validate, persist and announce the controller
//! configuration.

use tokio::sync::watch;

use martha_domain::config::{ConfigPatch, ControllerConfig};
use martha_domain::error::MarthaError;

use crate::ports::ConfigRepository;

/// Owns the active configuration. Every accepted change is saved first, then
/// pushed to the subscribers.
pub struct ConfigService<R> {
    repo: R,
    current: watch::Sender<ControllerConfig>,
}

impl<R: ConfigRepository> ConfigService<R> {
    pub fn new(repo: R) -> Self {
        let (current, _) = watch::channel(ControllerConfig::default());
        Self { repo, current }
    }

    /// Load the stored configuration, or store the defaults on first boot.
    ///
    /// # Errors
    ///
    /// Returns a storage error, or a validation error when the stored
    /// configuration is no longer valid.
    pub async fn begin(&self) -> Result<ControllerConfig, MarthaError> {
        let config = match self.repo.load().await? {
            Some(config) => {
                config.validate()?;
                tracing::info!("configuration loaded");
                config
            }
            None => {
                let config = ControllerConfig::default();
                self.repo.save(&config).await?;
                tracing::info!("no stored configuration, defaults saved");
                config
            }
        };
        self.current.send_replace(config.clone());
        Ok(config)
    }

    #[must_use]
    pub fn get(&self) -> ControllerConfig {
        self.current.borrow().clone()
    }

    /// Merge `patch` into the active configuration.
    ///
    /// # Errors
    ///
    /// Returns [`MarthaError::Validation`] without touching storage when the
    /// result is invalid, or a storage error if saving fails.
    pub async fn update(&self, patch: ConfigPatch) -> Result<ControllerConfig, MarthaError> {
        let next = patch.apply(&self.get())?;
        self.repo.save(&next).await?;
        self.current.send_replace(next.clone());
        tracing::info!("configuration updated");
        Ok(next)
    }

    /// Receiver that wakes on every accepted change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ControllerConfig> {
        self.current.subscribe()
    }
}
