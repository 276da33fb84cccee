//! Server-side rendered HTML dashboard (no JavaScript).

#[allow(clippy::missing_errors_doc)]
pub mod actions;
pub mod home;

use askama::Template;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};
use martha_domain::error::MarthaError;

use crate::error::status_of;
use crate::state::AppState;

/// Build the dashboard sub-router.
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
        .route("/", get(home::index::<H, L, P, C, R, LC>))
        .route("/relay/{channel}", post(actions::set_relay::<H, L, P, C, R, LC>))
        .route("/manual", post(actions::set_manual::<H, L, P, C, R, LC>))
        .route("/timer", post(actions::set_timer::<H, L, P, C, R, LC>))
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    code: u16,
    message: String,
}

/// A dashboard action that could not be carried out, rendered as a page
/// with a link back.
#[derive(Debug)]
pub enum DashboardError {
    Domain(MarthaError),
    BadForm(&'static str),
}

impl From<MarthaError> for DashboardError {
    fn from(err: MarthaError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadForm(message) => (StatusCode::BAD_REQUEST, message.to_string()),
            Self::Domain(err) => {
                let status = status_of(&err);
                if status.is_server_error() {
                    tracing::error!(error = ?err, "dashboard action failed");
                }
                let message = match &err {
                    MarthaError::Validation(inner) => inner.to_string(),
                    MarthaError::NotFound(inner) => inner.to_string(),
                    MarthaError::Relay(inner) => inner.to_string(),
                    MarthaError::Storage(_) | MarthaError::Hardware(_) | MarthaError::Host(_) => {
                        err.to_string()
                    }
                };
                (status, message)
            }
        };
        let page = ErrorTemplate {
            code: status.as_u16(),
            message,
        };
        (status, Html(page.to_string())).into_response()
    }
}
