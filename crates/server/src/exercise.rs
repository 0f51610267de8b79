//! Self-driving exercise mode (`--dry-run`).
//!
//! Connects to the server's own WebSocket endpoint and keeps the display
//! fed: one random job up front, then a burst of one to four more every
//! time the display reports idle. Useful for soak-testing a build without
//! pointing a real client at it.

use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use rand::prelude::*;
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Reconnection delay after a WebSocket failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Job kinds worth cycling through on an unattended display.
const EXERCISE_KINDS: [&str; 5] = ["text", "animation", "rain", "perlin", "emoji"];

/// Phrases for the text jobs.
const EXERCISE_TEXTS: [&str; 4] = ["hello", "marquee", "all systems go", "42"];

/// Run the exercise loop indefinitely.
///
/// Reconnects with a fixed delay if the connection drops, so the display
/// keeps cycling even across transient failures.
pub async fn run(port: u16) {
    let url = format!("ws://127.0.0.1:{port}/ws");

    loop {
        tracing::info!(url = %url, "Connecting exerciser");

        match connect_async(&url).await {
            Ok((ws_stream, _response)) => {
                tracing::info!("Exerciser connected");
                run_session(ws_stream).await;
                tracing::warn!("Exerciser session ended, reconnecting");
            }
            Err(e) => {
                tracing::error!(error = %e, "Exerciser connection failed");
            }
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

/// Drive a single session: prime the display with one job, then answer
/// every idle frame with a fresh burst.
async fn run_session(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
) {
    let (mut sink, mut stream) = ws_stream.split();

    if send_random_job(&mut sink).await.is_err() {
        return;
    }

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if !is_idle_frame(&text) {
                    continue;
                }
                let burst = rand::rng().random_range(1..=4);
                tracing::info!(burst, "Display idle, queueing more work");
                for _ in 0..burst {
                    if send_random_job(&mut sink).await.is_err() {
                        return;
                    }
                }
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {
                // Handled automatically by tungstenite.
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "Server closed exerciser socket");
                break;
            }
            Ok(_) => {
                // Binary / Frame -- ignore.
            }
            Err(e) => {
                tracing::error!(error = %e, "Exerciser receive error");
                break;
            }
        }
    }
}

/// Pick a random submission frame.
fn random_job_frame() -> (&'static str, serde_json::Value) {
    let mut rng = rand::rng();
    let kind = *EXERCISE_KINDS
        .choose(&mut rng)
        .expect("kind list is non-empty");
    let frame = match kind {
        "text" => {
            let text = *EXERCISE_TEXTS
                .choose(&mut rng)
                .expect("text list is non-empty");
            json!({"type": "text", "data": {"text": text}})
        }
        _ => json!({"type": kind, "data": {}}),
    };
    (kind, frame)
}

/// Send one random submission frame.
async fn send_random_job<S>(sink: &mut S) -> Result<(), tokio_tungstenite::tungstenite::Error>
where
    S: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let (kind, frame) = random_job_frame();
    tracing::info!(kind, "Submitting exercise job");
    sink.send(Message::Text(frame.to_string())).await
}

/// True when the frame is the server's idle notification.
fn is_idle_frame(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|frame| frame.get("type").and_then(|t| t.as_str()).map(|t| t == "idle"))
        .unwrap_or(false)
}
