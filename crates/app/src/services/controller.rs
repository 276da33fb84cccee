//! Controller: the control task.
//!
//! Owns the relay bank, the four control loops, the water level average and
//! the latest sensor snapshot behind one async mutex. Time is passed in as
//! uptime milliseconds by the runtime; user commands read the [`Clock`].
//!
//! Every relay change the bank accepts is published on the relay event bus
//! and appended to the relay log store.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use martha_domain::config::ControllerConfig;
use martha_domain::control::LoopOutcome;
use martha_domain::control::co2::Co2Loop;
use martha_domain::control::humidity::HumidityLoop;
use martha_domain::control::pump::PumpLoop;
use martha_domain::control::timer::TimerScheduler;
use martha_domain::error::MarthaError;
use martha_domain::event::RelayEvent;
use martha_domain::relay::{
    CHANNEL_COUNT, RelayBank, RelayBankState, RelayChannel, RelayMask, RelaySource,
    RelayStateEntry, SetOutcome,
};
use martha_domain::sensor::{SensorSnapshot, TEMP_PROBE_COUNT};
use martha_domain::time::{Millis, now};
use martha_domain::vpd::vapour_pressure_deficit;
use martha_domain::water_level::WaterLevel;

use crate::ports::{Clock, EventPublisher, RelayLogStore, TentHardware};

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Air temperature assumed for VPD when the first probe has no reading.
const FALLBACK_TEMP_C: f32 = 22.0;

/// Point-in-time view of the controller, for the API and the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerStatus {
    pub uptime_ms: Millis,
    pub fw_version: &'static str,
    /// `None` until the first sensor poll.
    pub snapshot: Option<SensorSnapshot>,
    pub relays: [bool; CHANNEL_COUNT],
    pub mask: RelayMask,
    pub bank_state: RelayBankState,
    pub fogging: bool,
    pub flushing: bool,
    pub lights_on: bool,
    pub uvc_on: bool,
    pub probe_labels: [String; TEMP_PROBE_COUNT],
}

impl ControllerStatus {
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.bank_state == RelayBankState::Armed
    }

    #[must_use]
    pub fn is_manual_mode(&self) -> bool {
        self.bank_state == RelayBankState::ManualMode
    }

    #[must_use]
    pub fn relay(&self, channel: RelayChannel) -> bool {
        self.relays[channel.index()]
    }

    /// VPD from the first substrate probe and the first shelf, falling back
    /// to 22 °C and the RH aggregate. `0.0` without any humidity reading.
    #[must_use]
    pub fn vpd_kpa(&self) -> f32 {
        let Some(snapshot) = &self.snapshot else {
            return 0.0;
        };
        let probe = snapshot.temps[0];
        let temp_c = if probe.valid {
            probe.temp_c
        } else {
            FALLBACK_TEMP_C
        };
        let shelf = snapshot.rh[0];
        let rh = if shelf.valid {
            Some(shelf.rh_pct)
        } else {
            snapshot.rh_aggregate_pct
        };
        rh.map_or(0.0, |rh| vapour_pressure_deficit(temp_c, rh))
    }
}

struct ControlState {
    bank: RelayBank,
    humidity: HumidityLoop,
    co2: Co2Loop,
    pump: PumpLoop,
    timer: TimerScheduler,
    water: WaterLevel,
    snapshot: Option<SensorSnapshot>,
    config: ControllerConfig,
}

impl ControlState {
    fn new(boot_ms: Millis, config: &ControllerConfig) -> Self {
        Self {
            bank: RelayBank::new(boot_ms),
            humidity: HumidityLoop::new(config.rh_on_pct, config.rh_hysteresis),
            co2: configured_co2(config),
            pump: PumpLoop::new(config.water_low_pct, config.water_high_pct),
            timer: TimerScheduler::new(config.timer),
            water: WaterLevel::new(config.adc),
            snapshot: None,
            config: config.clone(),
        }
    }
}

fn configured_co2(config: &ControllerConfig) -> Co2Loop {
    let mut co2 = Co2Loop::default();
    if let Err(err) = co2.set_thresholds(config.co2_on_ppm, config.co2_off_ppm) {
        tracing::warn!(error = %err, "ignoring CO2 thresholds");
    }
    co2
}

/// Runs the tent. Generic over the hardware, relay log store, relay event
/// publisher and clock.
pub struct Controller<H, L, P, C> {
    hardware: H,
    log_store: L,
    publisher: P,
    clock: C,
    state: Mutex<ControlState>,
    last_tick_ms: AtomicU64,
}

impl<H, L, P, C> Controller<H, L, P, C>
where
    H: TentHardware + Send + Sync,
    L: RelayLogStore + Send + Sync,
    P: EventPublisher + Send + Sync,
    C: Clock + Send + Sync,
{
    /// Create a controller with every relay off and the boot lock engaged.
    pub fn new(hardware: H, log_store: L, publisher: P, clock: C, config: &ControllerConfig) -> Self {
        let boot_ms = clock.uptime_ms();
        Self {
            hardware,
            log_store,
            publisher,
            clock,
            state: Mutex::new(ControlState::new(boot_ms, config)),
            last_tick_ms: AtomicU64::new(boot_ms),
        }
    }

    /// Drive every output off. Call once before the control loop starts.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the relay driver fails.
    pub async fn begin(&self) -> Result<(), MarthaError> {
        let state = self.state.lock().await;
        self.hardware.apply(state.bank.outputs()).await?;
        drop(state);
        tracing::info!(
            boot_ms = self.clock.uptime_ms(),
            "relay bank initialised, all channels off"
        );
        Ok(())
    }

    /// Poll every sensor and the water level probe, then store the snapshot.
    ///
    /// On a failed read the previous snapshot is kept but aged, so its
    /// readings go invalid once stale.
    ///
    /// # Errors
    ///
    /// Returns the hardware error of the failed read.
    pub async fn poll_sensors(&self, now: Millis) -> Result<(), MarthaError> {
        let read = self.hardware.read(now).await;
        let sample = self.hardware.read_millivolts().await;

        let mut state = self.state.lock().await;
        let previous_ts = state.snapshot.map_or(0, |s| s.water_level_ts);
        let water_level_ts = match sample {
            Ok(Some(mv)) => {
                state.water.push_millivolts(mv);
                now
            }
            Ok(None) => previous_ts,
            Err(err) => {
                tracing::warn!(error = %err, "water level probe read failed");
                previous_ts
            }
        };
        let water_level_pct = state.water.level_percent();

        // the water average keeps filling even when the sensor bus fails
        let mut snapshot = match read {
            Ok(snapshot) => snapshot,
            Err(err) => {
                if let Some(previous) = state.snapshot.as_mut() {
                    previous.water_level_ts = water_level_ts;
                    if let Some(pct) = water_level_pct {
                        previous.water_level_pct = pct;
                        previous.water_level_valid = true;
                    }
                    previous.mark_stale(now);
                }
                return Err(err);
            }
        };

        snapshot.water_level_ts = water_level_ts;
        if let Some(pct) = water_level_pct {
            snapshot.water_level_pct = pct;
            snapshot.water_level_valid = true;
        }

        snapshot.mark_stale(now);
        snapshot.update_aggregates(state.config.rh_aggregation);
        tracing::trace!(
            rh = ?snapshot.rh_aggregate_pct,
            co2 = snapshot.co2.co2_ppm,
            water = snapshot.water_level_pct,
            "sensors polled"
        );
        state.snapshot = Some(snapshot);
        Ok(())
    }

    /// One control step: arm the bank when due, run the loops unless in
    /// manual mode, then write the outputs.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the relay driver fails.
    pub async fn tick(&self, now: Millis) -> Result<(), MarthaError> {
        let minute_of_day_at = self.clock.wall_clock();

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let was_armed = state.bank.state() != RelayBankState::BootLocked;
        state.bank.tick(now);
        if !was_armed && state.bank.is_armed() {
            tracing::info!(uptime_ms = now, "boot lock released, relays armed");
        }

        let mut changes = Vec::new();
        if !state.bank.is_manual_mode() {
            if let Some(snapshot) = state.snapshot {
                let outcome = state.humidity.tick(&snapshot, &mut state.bank, now);
                report("humidity", &outcome);
                changes.extend_from_slice(outcome.changes());

                let outcome = state.co2.tick(&snapshot, &mut state.bank, now);
                report("co2", &outcome);
                changes.extend_from_slice(outcome.changes());
            }

            let outcome = state.pump.tick(&state.water, &mut state.bank, now);
            report("pump", &outcome);
            changes.extend_from_slice(outcome.changes());

            let minute = minute_of_day_at.map(|at| state.config.timezone.minute_of_day(at));
            let timer = state.timer.tick(&mut state.bank, minute, now);
            report("lights", &timer.lights);
            report("uvc", &timer.uvc);
            changes.extend_from_slice(timer.lights.changes());
            changes.extend_from_slice(timer.uvc.changes());
        }

        // the driver write and the event order stay under the state lock
        let outputs = state.bank.outputs();
        self.hardware.apply(outputs).await?;
        self.last_tick_ms.store(now, Ordering::Relaxed);
        self.record(changes).await;
        drop(guard);
        Ok(())
    }

    /// Set a relay on behalf of the user.
    ///
    /// # Errors
    ///
    /// Returns [`MarthaError::Relay`] when the bank refuses (boot lock, UVC
    /// guard), or a hardware error from the relay driver.
    pub async fn set_relay(&self, channel: RelayChannel, on: bool) -> Result<SetOutcome, MarthaError> {
        let now = self.clock.uptime_ms();
        let mut state = self.state.lock().await;
        state.bank.tick(now);
        let outcome = match state.bank.set(channel, on, RelaySource::Api, now) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(%channel, on, error = %err, "relay command rejected");
                return Err(err.into());
            }
        };
        let outputs = state.bank.outputs();
        self.hardware.apply(outputs).await?;
        if let Some(entry) = outcome.changed() {
            tracing::info!(%channel, on, "relay set by user");
            self.record(vec![entry]).await;
        }
        drop(state);
        Ok(outcome)
    }

    /// Enter or leave manual mode.
    ///
    /// # Errors
    ///
    /// Returns [`MarthaError::Relay`] during the boot lock.
    pub async fn set_manual_mode(&self, enable: bool) -> Result<(), MarthaError> {
        let now = self.clock.uptime_ms();
        let mut state = self.state.lock().await;
        state.bank.tick(now);
        let was_manual = state.bank.is_manual_mode();
        state.bank.set_manual_mode(enable)?;
        if was_manual != enable {
            tracing::info!(
                manual = enable,
                "manual mode {}",
                if enable { "entered" } else { "left" }
            );
        }
        Ok(())
    }

    /// Push new thresholds, schedule and calibration into the loops.
    ///
    /// # Errors
    ///
    /// Returns [`MarthaError::Validation`] and changes nothing when `config`
    /// is invalid.
    pub async fn apply_config(&self, config: &ControllerConfig) -> Result<(), MarthaError> {
        config.validate()?;

        let mut state = self.state.lock().await;
        state
            .humidity
            .set_thresholds(config.rh_on_pct, config.rh_hysteresis);
        state
            .co2
            .set_thresholds(config.co2_on_ppm, config.co2_off_ppm)?;
        state
            .pump
            .set_thresholds(config.water_low_pct, config.water_high_pct);
        if *state.timer.config() != config.timer {
            state.timer.set_config(config.timer);
        }
        state.water.set_calibration(config.adc)?;
        if let Some(snapshot) = state.snapshot.as_mut() {
            snapshot.update_aggregates(config.rh_aggregation);
        }
        state.config = config.clone();
        tracing::info!(
            rh_on = config.rh_on_pct,
            co2_on = config.co2_on_ppm,
            co2_off = config.co2_off_ppm,
            lights_on = config.timer.lights_on_minute,
            lights_off = config.timer.lights_off_minute,
            "controller configuration applied"
        );
        Ok(())
    }

    /// Switch every relay off, bypassing all locks.
    ///
    /// # Errors
    ///
    /// Returns a hardware error if the relay driver fails.
    pub async fn force_all_off(&self, source: RelaySource) -> Result<(), MarthaError> {
        let now = self.clock.uptime_ms();
        let mut state = self.state.lock().await;
        let changes = state.bank.force_all_off(source, now);
        let outputs = state.bank.outputs();
        tracing::warn!(%source, switched = changes.len(), "all relays forced off");
        self.hardware.apply(outputs).await?;
        self.record(changes).await;
        drop(state);
        Ok(())
    }

    pub async fn status(&self) -> ControllerStatus {
        let state = self.state.lock().await;
        let bank = &state.bank;
        ControllerStatus {
            uptime_ms: self.clock.uptime_ms(),
            fw_version: FW_VERSION,
            snapshot: state.snapshot,
            relays: RelayChannel::ALL.map(|ch| bank.get(ch)),
            mask: bank.mask(),
            bank_state: bank.state(),
            fogging: HumidityLoop::is_fogging(bank),
            flushing: Co2Loop::is_flushing(bank),
            lights_on: bank.get(RelayChannel::Lights),
            uvc_on: bank.get(RelayChannel::Uvc),
            probe_labels: state.config.probe_labels.clone(),
        }
    }

    /// In-memory change log of the relay bank, oldest first.
    pub async fn relay_log(&self) -> Vec<RelayStateEntry> {
        self.state.lock().await.bank.log().copied().collect()
    }

    /// Persisted relay changes, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the relay log store.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<RelayEvent>, MarthaError> {
        self.log_store.recent(limit).await
    }

    /// Uptime of the last completed [`tick`](Self::tick).
    pub fn last_tick_ms(&self) -> Millis {
        self.last_tick_ms.load(Ordering::Relaxed)
    }

    pub fn uptime_ms(&self) -> Millis {
        self.clock.uptime_ms()
    }

    async fn record(&self, changes: Vec<RelayStateEntry>) {
        for entry in changes {
            let recorded_at = self.clock.wall_clock().unwrap_or_else(now);
            let event = RelayEvent::from_entry(entry, recorded_at);
            if let Err(err) = self.publisher.publish(event.clone()).await {
                tracing::warn!(error = %err, "failed to publish relay event");
            }
            if let Err(err) = self.log_store.append(event).await {
                tracing::error!(error = %err, channel = %entry.channel, "failed to persist relay event");
            }
        }
    }
}

fn report(control: &'static str, outcome: &LoopOutcome) {
    match outcome {
        LoopOutcome::Switched(changes) => {
            for change in changes {
                tracing::info!(
                    control,
                    channel = %change.channel,
                    on = change.state,
                    "relay switched"
                );
            }
        }
        LoopOutcome::Rejected(err) => {
            tracing::debug!(control, error = %err, "relay change refused, will retry");
        }
        LoopOutcome::NoData => {
            tracing::warn!(control, "no valid input, holding relay state");
        }
        LoopOutcome::CoolingDown => {
            tracing::debug!(control, "change wanted, cooldown active");
        }
        LoopOutcome::Steady => {}
    }
}
