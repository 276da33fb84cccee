//! Relay commands and the relay change log.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};
use martha_domain::event::RelayEvent;
use martha_domain::relay::RelayChannel;

use super::Ack;
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_LOG_LIMIT: usize = 32;
const MAX_LOG_LIMIT: usize = 500;

#[derive(Deserialize)]
pub struct SetRelayRequest {
    pub state: bool,
}

#[derive(Deserialize)]
pub struct ManualModeRequest {
    pub manual: bool,
}

#[derive(Deserialize)]
pub struct LogQuery {
    pub limit: Option<usize>,
}

/// `POST /api/relay/{channel}/set` with `{"state": bool}`.
///
/// `channel` is a name (any case) or an index `0..=7`.
pub async fn set<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
    Path(channel): Path<String>,
    body: Bytes,
) -> Result<Json<Ack>, ApiError>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    let Ok(channel) = channel.parse::<RelayChannel>() else {
        return Err(ApiError::NotFound("unknown channel"));
    };
    let request: SetRelayRequest = super::parse_body(&body, "expected {state: bool}")?;

    state.controller.set_relay(channel, request.state).await?;
    Ok(Json(Ack::OK))
}

/// `POST /api/relay/manual` with `{"manual": bool}`.
pub async fn set_manual<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
    body: Bytes,
) -> Result<Json<Ack>, ApiError>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    let request: ManualModeRequest = super::parse_body(&body, "expected {manual: bool}")?;
    state.controller.set_manual_mode(request.manual).await?;
    Ok(Json(Ack::OK))
}

/// `GET /api/relay/log?limit=N`: persisted relay changes, newest first.
pub async fn log<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<RelayEvent>>, ApiError>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .min(MAX_LOG_LIMIT);
    let events = state.controller.recent_events(limit).await?;
    Ok(Json(events))
}
