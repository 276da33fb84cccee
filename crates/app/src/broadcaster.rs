//! Live snapshot feed for WebSocket clients and the dashboard charts.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

use martha_domain::relay::RelayMask;
use martha_domain::sensor::{RH_SHELF_COUNT, TEMP_PROBE_COUNT};
use martha_domain::time::Millis;

use crate::event_bus::InProcessEventBus;
use crate::services::controller::ControllerStatus;

/// Period between two snapshots.
pub const BROADCAST_PERIOD_MS: Millis = 2_000;

/// 30 minutes of history at one point per broadcast.
pub const HISTORY_POINTS: usize = 900;

/// The document pushed to every WebSocket client.
///
/// Field names are kept short, the feed runs every two seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveSnapshot {
    /// Uptime in milliseconds.
    pub t: Millis,
    pub co2: f32,
    /// RH aggregate, `null` without a valid shelf.
    pub rh_a: Option<f32>,
    pub rh: [f32; RH_SHELF_COUNT],
    pub tp: [f32; TEMP_PROBE_COUNT],
    pub wl: f32,
    pub rl: RelayMask,
    pub am: bool,
    pub mm: bool,
    pub vpd: f32,
}

impl From<&ControllerStatus> for LiveSnapshot {
    fn from(status: &ControllerStatus) -> Self {
        let snapshot = status.snapshot.unwrap_or_default();
        Self {
            t: status.uptime_ms,
            co2: snapshot.co2.co2_ppm,
            rh_a: snapshot.rh_aggregate_pct,
            rh: snapshot.rh.map(|r| r.rh_pct),
            tp: snapshot.temps.map(|p| p.temp_c),
            wl: snapshot.water_level_pct,
            rl: status.mask,
            am: status.is_armed(),
            mm: status.is_manual_mode(),
            vpd: status.vpd_kpa(),
        }
    }
}

/// One chart sample. Missing readings are `None` so charts can leave gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub t: Millis,
    pub co2: Option<f32>,
    pub rh: Option<f32>,
}

/// Ring buffer of the last [`HISTORY_POINTS`] snapshots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotHistory {
    points: VecDeque<HistoryPoint>,
}

impl SnapshotHistory {
    pub fn push(&mut self, status: &ControllerStatus) {
        let snapshot = status.snapshot.unwrap_or_default();
        if self.points.len() == HISTORY_POINTS {
            self.points.pop_front();
        }
        self.points.push_back(HistoryPoint {
            t: status.uptime_ms,
            co2: snapshot.co2.valid.then_some(snapshot.co2.co2_ppm),
            rh: snapshot.rh_aggregate_pct,
        });
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Oldest first.
    pub fn points(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }
}

/// Fans snapshots out to subscribers and keeps the chart history.
pub struct Broadcaster {
    bus: InProcessEventBus<LiveSnapshot>,
    history: Mutex<SnapshotHistory>,
}

impl Broadcaster {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            bus: InProcessEventBus::new(capacity),
            history: Mutex::new(SnapshotHistory::default()),
        }
    }

    /// Record `status` in the history and push it to the clients.
    ///
    /// Returns how many clients got the snapshot. Nothing is serialized or
    /// sent when nobody listens.
    pub fn broadcast(&self, status: &ControllerStatus) -> usize {
        self.lock_history().push(status);
        if self.bus.receiver_count() == 0 {
            return 0;
        }
        self.bus.send(LiveSnapshot::from(status))
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LiveSnapshot> {
        self.bus.subscribe()
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.bus.receiver_count()
    }

    #[must_use]
    pub fn history(&self) -> SnapshotHistory {
        self.lock_history().clone()
    }

    fn lock_history(&self) -> MutexGuard<'_, SnapshotHistory> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use martha_domain::relay::{CHANNEL_COUNT, RelayBankState};
    use martha_domain::sensor::{Co2Reading, RhReading, SensorSnapshot};

    fn status(uptime_ms: Millis) -> ControllerStatus {
        let mut snapshot = SensorSnapshot {
            co2: Co2Reading {
                co2_ppm: 812.0,
                valid: true,
                ..Co2Reading::default()
            },
            water_level_pct: 64.0,
            ..SensorSnapshot::default()
        };
        snapshot.rh[1] = RhReading {
            rh_pct: 88.5,
            temp_c: 21.0,
            valid: true,
            timestamp_ms: uptime_ms,
        };
        snapshot.rh_aggregate_pct = Some(88.5);
        ControllerStatus {
            uptime_ms,
            fw_version: "test",
            snapshot: Some(snapshot),
            relays: [false; CHANNEL_COUNT],
            mask: RelayMask(0b0010_0001),
            bank_state: RelayBankState::Armed,
            fogging: true,
            flushing: false,
            lights_on: true,
            uvc_on: false,
            probe_labels: Default::default(),
        }
    }

    #[test]
    fn should_serialize_with_short_field_names() {
        let json = serde_json::to_value(LiveSnapshot::from(&status(4_000))).unwrap();
        assert_eq!(json["t"], 4_000);
        assert_eq!(json["co2"], 812.0);
        assert_eq!(json["rh_a"], 88.5);
        assert_eq!(json["rh"][1], 88.5);
        assert_eq!(json["tp"].as_array().unwrap().len(), 5);
        assert_eq!(json["wl"], 64.0);
        assert_eq!(json["rl"], 33);
        assert_eq!(json["am"], true);
        assert_eq!(json["mm"], false);
    }

    #[test]
    fn should_send_null_aggregate_before_first_poll() {
        let mut empty = status(0);
        empty.snapshot = None;
        let json = serde_json::to_value(LiveSnapshot::from(&empty)).unwrap();
        assert!(json["rh_a"].is_null());
        assert_eq!(json["vpd"], 0.0);
    }

    #[tokio::test]
    async fn should_deliver_snapshot_to_every_client() {
        let broadcaster = Broadcaster::new(8);
        let mut first = broadcaster.subscribe();
        let mut second = broadcaster.subscribe();

        assert_eq!(broadcaster.broadcast(&status(2_000)), 2);

        assert_eq!(first.recv().await.unwrap().t, 2_000);
        assert_eq!(second.recv().await.unwrap().t, 2_000);
    }

    #[test]
    fn should_record_history_without_clients() {
        let broadcaster = Broadcaster::new(8);
        assert_eq!(broadcaster.broadcast(&status(2_000)), 0);
        assert_eq!(broadcaster.client_count(), 0);

        let history = broadcaster.history();
        assert_eq!(history.len(), 1);
        let point = history.points().next().unwrap();
        assert_eq!(point.co2, Some(812.0));
        assert_eq!(point.rh, Some(88.5));
    }

    #[test]
    fn should_drop_oldest_point_when_history_full() {
        let mut history = SnapshotHistory::default();
        for i in 0..=HISTORY_POINTS as Millis {
            history.push(&status(i * BROADCAST_PERIOD_MS));
        }
        assert_eq!(history.len(), HISTORY_POINTS);
        assert_eq!(history.points().next().unwrap().t, BROADCAST_PERIOD_MS);
    }
}
