//! Periodic tasks driving the controller.
//!
//! Five tasks share one shutdown signal:
//! - sensor poll every [`Periods::sensor_ms`]
//! - control tick every [`Periods::control_ms`]
//! - live snapshot broadcast every [`Periods::broadcast_ms`]
//! - config watcher, pushing accepted changes into the controller and logger
//! - watchdog, forcing every relay off when the control tick stalls

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};

use martha_domain::config::ControllerConfig;
use martha_domain::relay::RelaySource;
use martha_domain::time::Millis;

use crate::broadcaster::{BROADCAST_PERIOD_MS, Broadcaster};
use crate::ports::{Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware};
use crate::services::config_service::ConfigService;
use crate::services::controller::Controller;

/// Stall threshold of the control tick.
pub const WATCHDOG_TIMEOUT_MS: Millis = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periods {
    pub sensor_ms: Millis,
    pub control_ms: Millis,
    pub broadcast_ms: Millis,
    pub watchdog_timeout_ms: Millis,
}

impl Default for Periods {
    fn default() -> Self {
        Self {
            sensor_ms: 2_000,
            control_ms: 1_000,
            broadcast_ms: BROADCAST_PERIOD_MS,
            watchdog_timeout_ms: WATCHDOG_TIMEOUT_MS,
        }
    }
}

/// Everything the background tasks need.
pub struct Runtime<H, L, P, C, R, LC> {
    pub controller: Arc<Controller<H, L, P, C>>,
    pub config_service: Arc<ConfigService<R>>,
    pub broadcaster: Arc<Broadcaster>,
    pub log_control: Arc<LC>,
    pub periods: Periods,
}

impl<H, L, P, C, R, LC> Runtime<H, L, P, C, R, LC>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    /// Spawn every task. They all return once `shutdown` flips to `true`.
    pub fn spawn(self, shutdown: &watch::Receiver<bool>) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        tasks.spawn(sensor_task(
            Arc::clone(&self.controller),
            self.periods.sensor_ms,
            shutdown.clone(),
        ));
        tasks.spawn(control_task(
            Arc::clone(&self.controller),
            self.periods.control_ms,
            shutdown.clone(),
        ));
        tasks.spawn(broadcast_task(
            Arc::clone(&self.controller),
            self.broadcaster,
            self.periods.broadcast_ms,
            shutdown.clone(),
        ));
        tasks.spawn(config_task(
            Arc::clone(&self.controller),
            self.config_service.subscribe(),
            self.log_control,
            shutdown.clone(),
        ));
        tasks.spawn(watchdog_task(
            self.controller,
            self.periods.watchdog_timeout_ms,
            shutdown.clone(),
        ));
        tasks
    }
}

fn ticker(period_ms: Millis) -> tokio::time::Interval {
    let mut ticker = interval(Duration::from_millis(period_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn sensor_task<H, L, P, C>(
    controller: Arc<Controller<H, L, P, C>>,
    period_ms: Millis,
    mut shutdown: watch::Receiver<bool>,
) where
    H: TentHardware + Send + Sync,
    L: RelayLogStore + Send + Sync,
    P: EventPublisher + Send + Sync,
    C: Clock + Send + Sync,
{
    tracing::info!(period_ms, "sensor task started");
    let mut ticker = ticker(period_ms);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        let now = controller.uptime_ms();
        if let Err(err) = controller.poll_sensors(now).await {
            tracing::warn!(error = %err, "sensor poll failed");
        }
    }
    tracing::debug!("sensor task stopped");
}

async fn control_task<H, L, P, C>(
    controller: Arc<Controller<H, L, P, C>>,
    period_ms: Millis,
    mut shutdown: watch::Receiver<bool>,
) where
    H: TentHardware + Send + Sync,
    L: RelayLogStore + Send + Sync,
    P: EventPublisher + Send + Sync,
    C: Clock + Send + Sync,
{
    tracing::info!(period_ms, "control task started");
    let mut ticker = ticker(period_ms);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        let now = controller.uptime_ms();
        if let Err(err) = controller.tick(now).await {
            tracing::error!(error = %err, "control tick failed");
        }
    }
    tracing::debug!("control task stopped");
}

async fn broadcast_task<H, L, P, C>(
    controller: Arc<Controller<H, L, P, C>>,
    broadcaster: Arc<Broadcaster>,
    period_ms: Millis,
    mut shutdown: watch::Receiver<bool>,
) where
    H: TentHardware + Send + Sync,
    L: RelayLogStore + Send + Sync,
    P: EventPublisher + Send + Sync,
    C: Clock + Send + Sync,
{
    let mut ticker = ticker(period_ms);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        let status = controller.status().await;
        let clients = broadcaster.broadcast(&status);
        tracing::trace!(clients, "snapshot broadcast");
    }
    tracing::debug!("broadcast task stopped");
}

async fn config_task<H, L, P, C, LC>(
    controller: Arc<Controller<H, L, P, C>>,
    mut configs: watch::Receiver<ControllerConfig>,
    log_control: Arc<LC>,
    mut shutdown: watch::Receiver<bool>,
) where
    H: TentHardware + Send + Sync,
    L: RelayLogStore + Send + Sync,
    P: EventPublisher + Send + Sync,
    C: Clock + Send + Sync,
    LC: LogLevelControl + Send + Sync,
{
    let mut log_level = configs.borrow().log_level;
    loop {
        tokio::select! {
            changed = configs.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = shutdown.changed() => break,
        }
        let config = configs.borrow_and_update().clone();
        if let Err(err) = controller.apply_config(&config).await {
            tracing::error!(error = %err, "accepted configuration rejected by controller");
        }
        if config.log_level != log_level {
            log_level = config.log_level;
            if let Err(err) = log_control.set_level(log_level) {
                tracing::warn!(error = %err, level = %log_level, "failed to change log level");
            }
        }
    }
    tracing::debug!("config task stopped");
}

fn stalled(now: Millis, last_tick: Millis, timeout_ms: Millis) -> bool {
    now.saturating_sub(last_tick) > timeout_ms
}

async fn watchdog_task<H, L, P, C>(
    controller: Arc<Controller<H, L, P, C>>,
    timeout_ms: Millis,
    mut shutdown: watch::Receiver<bool>,
) where
    H: TentHardware + Send + Sync,
    L: RelayLogStore + Send + Sync,
    P: EventPublisher + Send + Sync,
    C: Clock + Send + Sync,
{
    let mut ticker = ticker(1_000);
    let mut tripped = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        let now = controller.uptime_ms();
        let last_tick = controller.last_tick_ms();
        if !stalled(now, last_tick, timeout_ms) {
            if tripped {
                tracing::info!("control task recovered");
            }
            tripped = false;
            continue;
        }
        if tripped {
            continue;
        }
        tripped = true;
        tracing::error!(
            now,
            last_tick,
            timeout_ms,
            "control task stalled, forcing relays off"
        );
        if let Err(err) = controller.force_all_off(RelaySource::Watchdog).await {
            tracing::error!(error = %err, "watchdog could not drive relays off");
        }
    }
    tracing::debug!("watchdog stopped");
}
