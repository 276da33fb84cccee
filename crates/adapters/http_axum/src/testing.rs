//! Stub ports and a wired [`AppState`] for handler tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use martha_app::broadcaster::Broadcaster;
use martha_app::event_bus::InProcessEventBus;
use martha_app::ports::{
    Clock, ConfigRepository, LogLevelControl, RelayDriver, RelayLogStore, SensorSource,
    WaterLevelProbe,
};
use martha_app::services::config_service::ConfigService;
use martha_app::services::controller::Controller;
use martha_domain::config::{ControllerConfig, LogLevel};
use martha_domain::error::MarthaError;
use martha_domain::event::RelayEvent;
use martha_domain::relay::PinOutputs;
use martha_domain::sensor::{Co2Reading, RhReading, SensorSnapshot, TempProbeReading};
use martha_domain::time::{Millis, Timestamp};

use crate::state::AppState;

/// Tent reporting a fixed, healthy climate.
pub struct StubTent;

impl SensorSource for StubTent {
    async fn read(&self, now: Millis) -> Result<SensorSnapshot, MarthaError> {
        let shelf = RhReading {
            rh_pct: 86.0,
            temp_c: 21.5,
            valid: true,
            timestamp_ms: now,
        };
        let probe = TempProbeReading {
            temp_c: 23.0,
            valid: true,
            timestamp_ms: now,
        };
        Ok(SensorSnapshot {
            rh: [shelf; 3],
            co2: Co2Reading {
                co2_ppm: 640.0,
                temp_c: 21.0,
                rh_pct: 86.0,
                valid: true,
                timestamp_ms: now,
            },
            temps: [probe; 5],
            ..SensorSnapshot::default()
        })
    }
}

impl WaterLevelProbe for StubTent {
    async fn read_millivolts(&self) -> Result<Option<u32>, MarthaError> {
        Ok(Some(1_650))
    }
}

impl RelayDriver for StubTent {
    async fn apply(&self, _outputs: PinOutputs) -> Result<(), MarthaError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct StubLog {
    events: Mutex<Vec<RelayEvent>>,
}

impl RelayLogStore for StubLog {
    async fn append(&self, event: RelayEvent) -> Result<(), MarthaError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RelayEvent>, MarthaError> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().rev().take(limit).cloned().collect())
    }
}

pub struct StubClock {
    uptime: Arc<AtomicU64>,
}

impl Clock for StubClock {
    fn uptime_ms(&self) -> Millis {
        self.uptime.load(Ordering::Relaxed)
    }

    fn wall_clock(&self) -> Option<Timestamp> {
        None
    }
}

#[derive(Default)]
pub struct StubConfigRepo {
    stored: Mutex<Option<ControllerConfig>>,
}

impl ConfigRepository for StubConfigRepo {
    async fn load(&self) -> Result<Option<ControllerConfig>, MarthaError> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, config: &ControllerConfig) -> Result<(), MarthaError> {
        *self.stored.lock().unwrap() = Some(config.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct StubLogControl {
    pub levels: Mutex<Vec<LogLevel>>,
}

impl LogLevelControl for StubLogControl {
    fn set_level(&self, level: LogLevel) -> Result<(), MarthaError> {
        self.levels.lock().unwrap().push(level);
        Ok(())
    }
}

pub type TestState = AppState<
    StubTent,
    StubLog,
    Arc<InProcessEventBus<RelayEvent>>,
    StubClock,
    StubConfigRepo,
    StubLogControl,
>;

pub struct Fixture {
    pub state: TestState,
    uptime: Arc<AtomicU64>,
}

impl Fixture {
    /// A freshly booted controller: boot locked, no sensor data yet.
    pub async fn new() -> Self {
        let uptime = Arc::new(AtomicU64::new(0));
        let relay_events = Arc::new(InProcessEventBus::new(16));
        let config_service = Arc::new(ConfigService::new(StubConfigRepo::default()));
        let config = config_service.begin().await.unwrap();
        let controller = Arc::new(Controller::new(
            StubTent,
            StubLog::default(),
            Arc::clone(&relay_events),
            StubClock {
                uptime: Arc::clone(&uptime),
            },
            &config,
        ));
        controller.begin().await.unwrap();

        let state = AppState::from_arcs(
            controller,
            config_service,
            Arc::new(Broadcaster::new(8)),
            relay_events,
            Arc::new(StubLogControl::default()),
        );
        Self { state, uptime }
    }

    /// Move past the boot lock and run one control tick.
    pub async fn armed() -> Self {
        let fixture = Self::new().await;
        fixture.advance_to(6_000).await;
        fixture
    }

    pub async fn advance_to(&self, ms: Millis) {
        self.uptime.store(ms, Ordering::Relaxed);
        self.state.controller.tick(ms).await.unwrap();
    }

    pub async fn poll(&self) {
        let now = self.uptime.load(Ordering::Relaxed);
        self.state.controller.poll_sensors(now).await.unwrap();
    }

    pub fn router(&self) -> Router {
        crate::router::build(self.state.clone())
    }
}

/// Send one request through the router and collect the whole body.
pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    content_type: &str,
    body: &str,
) -> (StatusCode, Bytes) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", content_type)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes)
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Bytes) {
    send(app, "GET", uri, "text/plain", "").await
}

pub async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = send(app, "POST", uri, "application/json", body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, bytes) = get(app, uri).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}
