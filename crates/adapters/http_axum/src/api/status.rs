//! `GET /api/status`: one document with every reading and relay.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};
use martha_app::services::controller::ControllerStatus;
use martha_domain::relay::RelayChannel;
use martha_domain::time::Millis;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Co2Body {
    pub ppm: f32,
    pub temp: f32,
    pub rh: f32,
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct ShelfBody {
    pub rh: f32,
    pub temp: f32,
    pub valid: bool,
}

#[derive(Debug, Serialize)]
pub struct ProbeBody {
    pub label: String,
    pub temp: f32,
    pub valid: bool,
}

/// Relay states keyed by channel name, next to the bank flags.
#[derive(Debug, Serialize)]
pub struct RelaysBody {
    #[serde(flatten)]
    pub channels: BTreeMap<&'static str, bool>,
    pub armed: bool,
    pub manual_mode: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
    /// `false` until the first sensor poll succeeded.
    pub ok: bool,
    pub uptime: Millis,
    pub fw_ver: &'static str,
    pub co2: Co2Body,
    pub rh: Vec<ShelfBody>,
    pub rh_aggregate: Option<f32>,
    pub temps: Vec<ProbeBody>,
    pub water_pct: f32,
    pub water_valid: bool,
    pub relays: RelaysBody,
    pub vpd: f32,
}

impl From<ControllerStatus> for StatusBody {
    fn from(status: ControllerStatus) -> Self {
        let snapshot = status.snapshot.unwrap_or_default();
        let vpd = status.vpd_kpa();
        Self {
            ok: status.snapshot.is_some(),
            uptime: status.uptime_ms,
            fw_ver: status.fw_version,
            co2: Co2Body {
                ppm: snapshot.co2.co2_ppm,
                temp: snapshot.co2.temp_c,
                rh: snapshot.co2.rh_pct,
                valid: snapshot.co2.valid,
            },
            rh: snapshot
                .rh
                .iter()
                .map(|r| ShelfBody {
                    rh: r.rh_pct,
                    temp: r.temp_c,
                    valid: r.valid,
                })
                .collect(),
            rh_aggregate: snapshot.rh_aggregate_pct,
            temps: snapshot
                .temps
                .iter()
                .zip(status.probe_labels.iter())
                .map(|(probe, label)| ProbeBody {
                    label: label.clone(),
                    temp: probe.temp_c,
                    valid: probe.valid,
                })
                .collect(),
            water_pct: snapshot.water_level_pct,
            water_valid: snapshot.water_level_valid,
            relays: RelaysBody {
                channels: RelayChannel::ALL
                    .into_iter()
                    .map(|ch| (ch.name(), status.relay(ch)))
                    .collect(),
                armed: status.is_armed(),
                manual_mode: status.is_manual_mode(),
            },
            vpd,
        }
    }
}

/// `GET /api/status`
pub async fn get<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
) -> Json<StatusBody>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    Json(StatusBody::from(state.controller.status().await))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::testing::{Fixture, get_json};

    #[tokio::test]
    async fn should_report_not_ok_before_first_poll() {
        let fixture = Fixture::new().await;

        let (status, json) = get_json(fixture.router(), "/api/status").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], false);
        assert_eq!(json["relays"]["armed"], false);
        assert_eq!(json["relays"]["Fogger"], false);
        assert_eq!(json["rh_aggregate"], serde_json::Value::Null);
        assert_eq!(json["fw_ver"], martha_app::services::controller::FW_VERSION);
    }

    #[tokio::test]
    async fn should_report_readings_after_poll() {
        let fixture = Fixture::armed().await;
        fixture.poll().await;

        let (_, json) = get_json(fixture.router(), "/api/status").await;

        assert_eq!(json["ok"], true);
        assert_eq!(json["uptime"], 6_000);
        assert_eq!(json["co2"]["ppm"], 640.0);
        assert_eq!(json["rh"].as_array().unwrap().len(), 3);
        assert_eq!(json["rh"][2]["rh"], 86.0);
        assert_eq!(json["rh_aggregate"], 86.0);
        assert_eq!(json["temps"][0]["label"], "Shelf1");
        assert_eq!(json["temps"][4]["temp"], 23.0);
        // one probe sample is not enough for a level
        assert_eq!(json["water_valid"], false);
        assert_eq!(json["relays"]["armed"], true);
        assert_eq!(json["relays"]["UVC"], false);
        assert!(json["vpd"].as_f64().unwrap() > 0.0);
    }
}
