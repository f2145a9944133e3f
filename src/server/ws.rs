//! Status WebSocket: one connection per viewer and stream key.
//!
//! The server pushes JSON [`StatusSnapshot`](crate::broadcast::StatusSnapshot)
//! text frames: one on connect, then one per broadcast tick while the stream
//! is live. Client messages are ignored apart from ping and close.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::broadcast::StatusSnapshot;
use crate::registry::StreamKey;

use super::routes::AppState;

/// WebSocket upgrade handler
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state, key))
}

/// Handle a single status connection.
pub async fn handle_ws(socket: WebSocket, state: AppState, raw_key: String) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // A malformed key can never go live; answer once and keep the socket idle
    let key = match StreamKey::parse(&raw_key) {
        Ok(key) => key,
        Err(e) => {
            debug!(key = %raw_key, error = %e, "Status socket for invalid key");
            if let Some(msg) = encode(&StatusSnapshot::offline(Utc::now())) {
                let _ = ws_tx.send(msg).await;
            }
            while let Some(Ok(msg)) = ws_rx.next().await {
                if matches!(msg, Message::Close(_)) {
                    break;
                }
            }
            return;
        }
    };

    let (handle, mut rx) = state.broadcaster.new_handle();
    let id = handle.id();
    state.broadcaster.subscribe(&key, handle).await;

    loop {
        tokio::select! {
            // Forward snapshots from the broadcaster
            snapshot = rx.recv() => {
                let Some(snapshot) = snapshot else { break };
                let Some(msg) = encode(&snapshot) else { continue };
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                    }
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    state.broadcaster.unsubscribe(&key, id);
    debug!(stream = %key, subscriber = id, "Status socket closed");
}

fn encode(snapshot: &StatusSnapshot) -> Option<Message> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!(error = %e, "Failed to encode status snapshot");
            None
        }
    }
}
