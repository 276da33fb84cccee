//! Server-Sent Events (SSE) stream of relay changes.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};

use crate::state::AppState;

/// `GET /api/relay/events`: one `relay` event per accepted relay change.
///
/// Subscribes to the relay event bus and sends each change as a JSON
/// `data:` frame until the client disconnects.
pub async fn stream<H, L, P, C, R, LC>(
    State(state): State<AppState<H, L, P, C, R, LC>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    let event_rx = state.relay_events.subscribe();
    let event_stream = BroadcastStream::new(event_rx).filter_map(|result| match result {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default().event("relay").data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize relay event for SSE stream");
                None
            }
        },
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some relay events were dropped");
            None
        }
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}
