//! Dashboard page: readings, relays, timer and charts.

use std::fmt::Write as _;

use askama::Template;
use axum::extract::State;
use axum::response::{Html, IntoResponse, Response};

use martha_app::broadcaster::{HistoryPoint, SnapshotHistory};
use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};
use martha_app::services::controller::ControllerStatus;
use martha_domain::config::ControllerConfig;
use martha_domain::relay::{RelayChannel, RelayStateEntry};
use martha_domain::time::Millis;

use crate::state::AppState;

pub const CO2_ALARM_PPM: f32 = 950.0;
pub const RH_ALARM_PCT: f32 = 80.0;
pub const WATER_ALARM_PCT: f32 = 20.0;

const REFRESH_SECONDS: u32 = 5;
const RECENT_CHANGES: usize = 10;
const CHART_WIDTH: f32 = 600.0;
const CHART_HEIGHT: f32 = 120.0;
const NO_READING: &str = "--";

/// One headline reading.
pub struct Tile {
    pub label: &'static str,
    pub value: String,
    pub alarm: bool,
}

pub struct ShelfRow {
    pub name: String,
    pub rh: String,
    pub temp: String,
}

pub struct ProbeRow {
    pub label: String,
    pub temp: String,
}

pub struct RelayTile {
    pub name: &'static str,
    pub on: bool,
    /// Buttons only work in manual mode.
    pub locked: bool,
}

pub struct TimerForm {
    pub lights_on: String,
    pub lights_off: String,
    pub uvc_on_min: u16,
    pub uvc_off_min: u16,
}

/// Polylines of one series; a missing reading splits the line.
pub struct Chart {
    pub title: &'static str,
    pub segments: Vec<String>,
    pub low: String,
    pub high: String,
}

pub struct ChangeRow {
    pub at: String,
    pub channel: &'static str,
    pub state: bool,
    pub source: &'static str,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub refresh_seconds: u32,
    pub fw_version: &'static str,
    pub uptime: String,
    pub mode: &'static str,
    pub armed: bool,
    pub manual_mode: bool,
    pub tiles: Vec<Tile>,
    pub shelves: Vec<ShelfRow>,
    pub probes: Vec<ProbeRow>,
    pub relays: Vec<RelayTile>,
    pub timer: TimerForm,
    pub charts: Vec<Chart>,
    pub changes: Vec<ChangeRow>,
}

impl IntoResponse for DashboardTemplate {
    fn into_response(self) -> Response {
        Html(self.to_string()).into_response()
    }
}

impl DashboardTemplate {
    #[must_use]
    pub fn new(
        status: &ControllerStatus,
        config: &ControllerConfig,
        history: &SnapshotHistory,
        log: &[RelayStateEntry],
    ) -> Self {
        let mode = if status.is_manual_mode() {
            "MANUAL"
        } else if status.is_armed() {
            "AUTO"
        } else {
            "BOOT LOCK"
        };
        let points: Vec<HistoryPoint> = history.points().copied().collect();

        Self {
            refresh_seconds: REFRESH_SECONDS,
            fw_version: status.fw_version,
            uptime: format_uptime(status.uptime_ms),
            mode,
            armed: status.is_armed(),
            manual_mode: status.is_manual_mode(),
            tiles: tiles(status),
            shelves: shelves(status),
            probes: probes(status),
            relays: RelayChannel::ALL
                .into_iter()
                .map(|channel| RelayTile {
                    name: channel.name(),
                    on: status.relay(channel),
                    locked: !status.is_manual_mode(),
                })
                .collect(),
            timer: TimerForm {
                lights_on: format_minute_of_day(config.timer.lights_on_minute),
                lights_off: format_minute_of_day(config.timer.lights_off_minute),
                uvc_on_min: config.timer.uvc_on_min,
                uvc_off_min: config.timer.uvc_off_min,
            },
            charts: vec![
                chart("CO2 (ppm)", &points, |p| p.co2),
                chart("RH (%)", &points, |p| p.rh),
            ],
            changes: log
                .iter()
                .rev()
                .take(RECENT_CHANGES)
                .map(|entry| ChangeRow {
                    at: format_uptime(entry.timestamp_ms),
                    channel: entry.channel.name(),
                    state: entry.state,
                    source: entry.source.as_str(),
                })
                .collect(),
        }
    }
}

/// `GET /`: the dashboard.
pub async fn index<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
) -> DashboardTemplate
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    let status = state.controller.status().await;
    let log = state.controller.relay_log().await;
    DashboardTemplate::new(
        &status,
        &state.config_service.get(),
        &state.broadcaster.history(),
        &log,
    )
}

fn tiles(status: &ControllerStatus) -> Vec<Tile> {
    let snapshot = status.snapshot.unwrap_or_default();
    let co2 = snapshot.co2.valid.then_some(snapshot.co2.co2_ppm);
    let rh = snapshot.rh_aggregate_pct;
    let water = snapshot
        .water_level_valid
        .then_some(snapshot.water_level_pct);
    let vpd = snapshot.any_rh_valid().then(|| status.vpd_kpa());

    vec![
        Tile {
            label: "CO2",
            value: co2.map_or_else(|| NO_READING.to_string(), |v| format!("{v:.0} ppm")),
            alarm: co2.is_some_and(|v| v > CO2_ALARM_PPM),
        },
        Tile {
            label: "RH",
            value: rh.map_or_else(|| NO_READING.to_string(), |v| format!("{v:.1} %")),
            alarm: rh.is_some_and(|v| v < RH_ALARM_PCT),
        },
        Tile {
            label: "Water",
            value: water.map_or_else(|| NO_READING.to_string(), |v| format!("{v:.0} %")),
            alarm: water.is_some_and(|v| v < WATER_ALARM_PCT),
        },
        Tile {
            label: "VPD",
            value: vpd.map_or_else(|| NO_READING.to_string(), |v| format!("{v:.2} kPa")),
            alarm: false,
        },
    ]
}

fn shelves(status: &ControllerStatus) -> Vec<ShelfRow> {
    let snapshot = status.snapshot.unwrap_or_default();
    snapshot
        .rh
        .iter()
        .enumerate()
        .map(|(index, reading)| ShelfRow {
            name: format!("Shelf {}", index + 1),
            rh: if reading.valid {
                format!("{:.1} %", reading.rh_pct)
            } else {
                NO_READING.to_string()
            },
            temp: if reading.valid {
                format!("{:.1} °C", reading.temp_c)
            } else {
                NO_READING.to_string()
            },
        })
        .collect()
}

fn probes(status: &ControllerStatus) -> Vec<ProbeRow> {
    let snapshot = status.snapshot.unwrap_or_default();
    snapshot
        .temps
        .iter()
        .zip(status.probe_labels.iter())
        .map(|(probe, label)| ProbeRow {
            label: label.clone(),
            temp: if probe.valid {
                format!("{:.1} °C", probe.temp_c)
            } else {
                NO_READING.to_string()
            },
        })
        .collect()
}

/// `Hh Mm Ss`.
#[must_use]
pub fn format_uptime(uptime_ms: Millis) -> String {
    let secs = uptime_ms / 1_000;
    format!("{}h {}m {}s", secs / 3_600, secs % 3_600 / 60, secs % 60)
}

#[must_use]
pub fn format_minute_of_day(minute: u16) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

/// Parse `HH:MM` into a minute of the day.
#[must_use]
pub fn parse_minute_of_day(raw: &str) -> Option<u16> {
    let (hours, minutes) = raw.trim().split_once(':')?;
    let hours: u16 = hours.parse().ok()?;
    let minutes: u16 = minutes.parse().ok()?;
    (hours < 24 && minutes < 60).then_some(hours * 60 + minutes)
}

#[allow(clippy::cast_precision_loss)]
fn chart(
    title: &'static str,
    points: &[HistoryPoint],
    value: impl Fn(&HistoryPoint) -> Option<f32>,
) -> Chart {
    let values = points.iter().filter_map(&value);
    let low = values.clone().reduce(f32::min);
    let high = values.reduce(f32::max);
    let (Some(low), Some(high)) = (low, high) else {
        return Chart {
            title,
            segments: Vec::new(),
            low: NO_READING.to_string(),
            high: NO_READING.to_string(),
        };
    };

    let span = if high - low < f32::EPSILON {
        1.0
    } else {
        high - low
    };
    let last_index = points.len().saturating_sub(1).max(1) as f32;

    let mut segments = Vec::new();
    let mut current = String::new();
    for (index, point) in points.iter().enumerate() {
        if let Some(v) = value(point) {
            let x = index as f32 / last_index * CHART_WIDTH;
            let y = CHART_HEIGHT - (v - low) / span * CHART_HEIGHT;
            if !current.is_empty() {
                current.push(' ');
            }
            let _ = write!(current, "{x:.1},{y:.1}");
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }

    Chart {
        title,
        segments,
        low: format!("{low:.0}"),
        high: format!("{high:.0}"),
    }
}
