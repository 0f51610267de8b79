use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::protocol::{self, ClientRequest, ServerMessage};
use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager` and
/// managed by two tasks (sender + receiver).
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Routes inbound frames to the dispatcher on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.ws_manager.add(conn_id.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_frame(&state, &conn_id, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_msg) => {
                // Binary / Ping -- axum answers pings itself.
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: remove connection and abort sender task.
    let removed = state.ws_manager.remove(&conn_id).await;
    send_task.abort();
    let connected_secs = removed
        .map(|conn| (chrono::Utc::now() - conn.connected_at).num_seconds())
        .unwrap_or_default();
    tracing::info!(conn_id = %conn_id, connected_secs, "WebSocket disconnected");
}

/// Decode one inbound text frame and route it to the dispatcher.
///
/// Bad frames are logged and dropped without closing the connection, so a
/// misbehaving client cannot take the display down with it.
async fn handle_frame(state: &AppState, conn_id: &str, raw: &str) {
    let reply = match protocol::parse_client_frame(raw) {
        Ok(ClientRequest::Submit { payload, priority }) => {
            let kind = payload.kind();
            match state.dispatcher.submit(payload, priority) {
                Ok(id) => {
                    tracing::info!(
                        conn_id = %conn_id,
                        kind = %kind,
                        priority = %priority,
                        id = %id,
                        "Submission accepted",
                    );
                    Some(ServerMessage::ack(id))
                }
                Err(e) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Submission dropped");
                    None
                }
            }
        }
        Ok(ClientRequest::Stop) => match state.dispatcher.stop_all() {
            Ok(()) => {
                tracing::info!(conn_id = %conn_id, "Stop requested");
                Some(ServerMessage::ack_control())
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, error = %e, "Stop dropped");
                None
            }
        },
        Ok(ClientRequest::Hello) => {
            tracing::debug!(conn_id = %conn_id, "Hello probe");
            Some(ServerMessage::ack_control())
        }
        Err(e) => {
            tracing::warn!(conn_id = %conn_id, error = %e, raw = %raw, "Unknown or malformed frame");
            None
        }
    };

    if let Some(message) = reply {
        state
            .ws_manager
            .send_to(conn_id, Message::Text(message.to_json().into()))
            .await;
    }
}
