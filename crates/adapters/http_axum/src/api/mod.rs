//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod config;
pub mod history;
#[allow(clippy::missing_errors_doc)]
pub mod log_level;
#[allow(clippy::missing_errors_doc)]
pub mod relay;
pub mod sse;
pub mod status;

use axum::Router;
use axum::body::Bytes;
use axum::routing::{get, post};
use serde::Serialize;
use serde::de::DeserializeOwned;

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};

use crate::error::ApiError;
use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<H, L, P, C, R, LC>() -> Router<AppState<H, L, P, C, R, LC>>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    Router::new()
        .route("/status", get(status::get::<H, L, P, C, R, LC>))
        .route(
            "/config",
            get(config::get::<H, L, P, C, R, LC>).post(config::update::<H, L, P, C, R, LC>),
        )
        // Relays
        .route("/relay/manual", post(relay::set_manual::<H, L, P, C, R, LC>))
        .route("/relay/log", get(relay::log::<H, L, P, C, R, LC>))
        .route("/relay/events", get(sse::stream::<H, L, P, C, R, LC>))
        .route("/relay/{channel}/set", post(relay::set::<H, L, P, C, R, LC>))
        .route("/log-level", post(log_level::set::<H, L, P, C, R, LC>))
        .route("/history", get(history::get::<H, L, P, C, R, LC>))
}

/// Acknowledgement body of every accepted command.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub const OK: Self = Self { ok: true };
}

/// Parse a command body, answering `message` with a 400 when it is not
/// JSON or not the expected shape.
pub(crate) fn parse_body<T: DeserializeOwned>(
    body: &Bytes,
    message: &'static str,
) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|err| {
        tracing::debug!(error = %err, "rejected request body");
        ApiError::BadRequest(message)
    })
}
