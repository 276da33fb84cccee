//! `GET/POST /api/config`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};
use martha_domain::config::{ConfigPatch, ControllerConfig};
use martha_domain::error::{MarthaError, ValidationError};

use super::Ack;
use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/config`. The WiFi password is never exported.
pub async fn get<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
) -> Json<ControllerConfig>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    Json(state.config_service.get())
}

/// `POST /api/config` with any subset of the configuration fields.
///
/// Unparsable JSON is a 400. A well-formed document whose values do not
/// fit (wrong types, out of range, inverted thresholds) is a 422.
pub async fn update<H, L, P, C, R, LC>(
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
    let document: serde_json::Value = super::parse_body(&body, "invalid JSON")?;
    let patch: ConfigPatch = serde_json::from_value(document).map_err(|err| {
        tracing::debug!(error = %err, "config patch does not fit the schema");
        ApiError::Domain(MarthaError::Validation(ValidationError::Malformed(
            err.to_string(),
        )))
    })?;

    state.config_service.update(patch).await?;
    Ok(Json(Ack::OK))
}
