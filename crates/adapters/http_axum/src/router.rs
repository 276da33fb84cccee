//! Axum router assembly.

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};

use crate::state::AppState;

/// Build the top-level axum [`Router`].
///
/// API routes under `/api`, the live feed at `/ws` and the dashboard at `/`.
/// Includes a [`TraceLayer`] that logs each HTTP request/response at the
/// `DEBUG` level using the `tracing` ecosystem.
pub fn build<H, L, P, C, R, LC>(state: AppState<H, L, P, C, R, LC>) -> Router
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/ws", get(crate::ws::upgrade::<H, L, P, C, R, LC>))
        .nest("/api", crate::api::routes())
        .merge(crate::dashboard::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::testing::{Fixture, get};

    #[tokio::test]
    async fn should_return_ok_when_health_check_called() {
        let fixture = Fixture::new().await;

        let (status, body) = get(fixture.router(), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn should_return_404_for_unknown_path() {
        let fixture = Fixture::new().await;

        let (status, _) = get(fixture.router(), "/api/nothing-here").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
