//! `/ws`: live snapshot feed.
//!
//! Every client gets the current snapshot on connect, then one per
//! broadcast. Client messages are read only to notice the close.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use martha_app::broadcaster::LiveSnapshot;
use martha_app::ports::{
    Clock, ConfigRepository, EventPublisher, LogLevelControl, RelayLogStore, TentHardware,
};
use martha_domain::id::ClientId;

use crate::state::AppState;

/// `GET /ws`: upgrade and start pushing snapshots.
pub async fn upgrade<H, L, P, C, R, LC>(
    ws: WebSocketUpgrade,
    State(state): State<AppState<H, L, P, C, R, LC>>,
) -> Response
where
    H: TentHardware + Send + Sync + 'static,
    L: RelayLogStore + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
    R: ConfigRepository + Send + Sync + 'static,
    LC: LogLevelControl + Send + Sync + 'static,
{
    let snapshots = state.broadcaster.subscribe();
    let current = LiveSnapshot::from(&state.controller.status().await);
    let client_id = ClientId::new();

    ws.on_upgrade(move |socket| serve_client(socket, snapshots, current, client_id))
}

async fn serve_client(
    mut socket: WebSocket,
    mut snapshots: broadcast::Receiver<LiveSnapshot>,
    current: LiveSnapshot,
    client_id: ClientId,
) {
    tracing::info!(%client_id, "live feed client connected");

    if send_snapshot(&mut socket, &current).await {
        loop {
            tokio::select! {
                received = snapshots.recv() => match received {
                    Ok(snapshot) => {
                        if !send_snapshot(&mut socket, &snapshot).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(%client_id, skipped, "live feed client lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {
                        tracing::trace!(%client_id, "ignoring client message");
                    }
                },
            }
        }
    }

    tracing::info!(%client_id, "live feed client disconnected");
}

/// `false` once the client is gone.
async fn send_snapshot(socket: &mut WebSocket, snapshot: &LiveSnapshot) -> bool {
    let Some(text) = encode(snapshot) else {
        return true;
    };
    match socket.send(Message::Text(text.into())).await {
        Ok(()) => true,
        Err(err) => {
            tracing::debug!(error = %err, "live feed send failed");
            false
        }
    }
}

fn encode(snapshot: &LiveSnapshot) -> Option<String> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialize live snapshot");
            None
        }
    }
}
