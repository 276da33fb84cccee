//! `POST /api/log-level`: change log verbosity until the next restart.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};
use martha_domain::config::LogLevel;

use super::Ack;
use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/log-level` with `{"level": 0-3}` (error, warn, info, debug).
///
/// Not persisted; the configured level is restored on restart.
pub async fn set<H, L, P, C, R, LC>(
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
    const EXPECTED: &str = "expected {level: 0-3}";

    let document: serde_json::Value = super::parse_body(&body, EXPECTED)?;
    let code = document
        .get("level")
        .and_then(serde_json::Value::as_i64)
        .ok_or(ApiError::BadRequest(EXPECTED))?;
    let level = u8::try_from(code)
        .ok()
        .and_then(|code| LogLevel::try_from(code).ok())
        .ok_or(ApiError::BadRequest("level must be 0-3"))?;

    state.log_control.set_level(level)?;
    tracing::info!(%level, "log level changed");
    Ok(Json(Ack::OK))
}
