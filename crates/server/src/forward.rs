//! Bridges dispatcher events onto the WebSocket fan-out.

use std::sync::Arc;

use axum::extract::ws::Message;
use marquee_events::{DisplayEvent, EventKind};
use tokio::sync::broadcast;

use crate::protocol::ServerMessage;
use crate::ws::WsManager;

/// Forwards display events to connected WebSocket clients.
///
/// Clients only ever hear about the idle transition; per-job telemetry
/// stays in the logs. The idle frame is what tells a client it may now
/// submit opportunistic low-priority work.
pub struct EventForwarder {
    ws_manager: Arc<WsManager>,
}

impl EventForwarder {
    /// Create a forwarder that fans out to the given connection manager.
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the forwarding loop.
    ///
    /// Subscribes to the event bus via `receiver` and exits when the bus
    /// is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<DisplayEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => self.forward(&event).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event forwarder lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, forwarder shutting down");
                    break;
                }
            }
        }
    }

    async fn forward(&self, event: &DisplayEvent) {
        if let EventKind::Idle = event.kind {
            let frame = ServerMessage::idle().to_json();
            self.ws_manager.broadcast(Message::Text(frame.into())).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use assert_matches::assert_matches;
    use marquee_core::{JobId, JobKind};
    use marquee_events::EventBus;

    async fn next_text(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Message>) -> String {
        let msg = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("channel closed");
        assert_matches!(msg, Message::Text(text) => text.to_string())
    }

    #[tokio::test]
    async fn idle_events_reach_every_connection() {
        let ws_manager = Arc::new(WsManager::new());
        let mut rx_a = ws_manager.add("a".into()).await;
        let mut rx_b = ws_manager.add("b".into()).await;

        let bus = EventBus::default();
        let receiver = bus.subscribe();
        tokio::spawn(EventForwarder::new(ws_manager.clone()).run(receiver));

        bus.publish(DisplayEvent::idle());

        for rx in [&mut rx_a, &mut rx_b] {
            let text = next_text(rx).await;
            let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(frame["type"], "idle");
        }
    }

    #[tokio::test]
    async fn job_events_stay_out_of_the_fan_out() {
        let ws_manager = Arc::new(WsManager::new());
        let mut rx = ws_manager.add("a".into()).await;

        let bus = EventBus::default();
        let receiver = bus.subscribe();
        tokio::spawn(EventForwarder::new(ws_manager.clone()).run(receiver));

        // Broadcast order is preserved, so if the first frame the client
        // sees is the idle one, the job events were filtered out.
        let id = JobId::new();
        bus.publish(DisplayEvent::job_started(id, JobKind::Rain));
        bus.publish(DisplayEvent::job_completed(id, JobKind::Rain));
        bus.publish(DisplayEvent::idle());

        let text = next_text(&mut rx).await;
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(frame["type"], "idle");
    }
}
