//! `GET /api/history`: the chart ring buffer.

use axum::Json;
use axum::extract::State;

use martha_app::broadcaster::SnapshotHistory;
use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};

use crate::state::AppState;

/// `GET /api/history`: CO2 and RH points, oldest first.
pub async fn get<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
) -> Json<SnapshotHistory>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    Json(state.broadcaster.history())
}
