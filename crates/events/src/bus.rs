//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the fan-out hub for [`DisplayEvent`]s. It is designed to
//! be shared via `Arc<EventBus>` across the application.

use chrono::{DateTime, Utc};
use marquee_core::{JobId, JobKind};
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// DisplayEvent
// ---------------------------------------------------------------------------

/// Why a job left the queue without ever running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropReason {
    /// Evicted to make room when the queue was at capacity.
    Overflow,
    /// A low-priority submission arrived while the display was busy.
    LowPriorityBusy,
    /// Discarded by an interrupt or an explicit stop.
    Interrupted,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Overflow => "overflow",
            DropReason::LowPriorityBusy => "low-priority-busy",
            DropReason::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the dispatcher reports about the display lifecycle.
///
/// A closed union: consumers can match exhaustively and the compiler flags
/// every site when a new lifecycle stage is added.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    /// A job took the display slot.
    JobStarted { id: JobId, kind: JobKind },
    /// The in-flight job settled successfully (including an early stop).
    JobCompleted { id: JobId, kind: JobKind },
    /// The in-flight job settled with a render failure.
    JobFailed {
        id: JobId,
        kind: JobKind,
        error: String,
    },
    /// A pending job was removed without running.
    JobDropped {
        id: JobId,
        kind: JobKind,
        reason: DropReason,
    },
    /// The queue drained and the display slot is free. Published exactly
    /// once per busy-to-idle transition.
    Idle,
}

/// A timestamped lifecycle event.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayEvent {
    /// When the event was published (UTC).
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl DisplayEvent {
    fn new(kind: EventKind) -> Self {
        Self {
            at: Utc::now(),
            kind,
        }
    }

    pub fn job_started(id: JobId, kind: JobKind) -> Self {
        Self::new(EventKind::JobStarted { id, kind })
    }

    pub fn job_completed(id: JobId, kind: JobKind) -> Self {
        Self::new(EventKind::JobCompleted { id, kind })
    }

    pub fn job_failed(id: JobId, kind: JobKind, error: impl Into<String>) -> Self {
        Self::new(EventKind::JobFailed {
            id,
            kind,
            error: error.into(),
        })
    }

    pub fn job_dropped(id: JobId, kind: JobKind, reason: DropReason) -> Self {
        Self::new(EventKind::JobDropped { id, kind, reason })
    }

    pub fn idle() -> Self {
        Self::new(EventKind::Idle)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`DisplayEvent`].
///
/// # Usage
///
/// ```rust
/// use marquee_events::{DisplayEvent, EventBus};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(DisplayEvent::idle());
/// ```
pub struct EventBus {
    sender: broadcast::Sender<DisplayEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// publishing never blocks the dispatch loop.
    pub fn publish(&self, event: DisplayEvent) {
        // Ignore the SendError -- it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<DisplayEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let id = JobId::new();
        bus.publish(DisplayEvent::job_started(id, JobKind::Text));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(
            received.kind,
            EventKind::JobStarted {
                id,
                kind: JobKind::Text
            }
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DisplayEvent::idle());

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.kind, EventKind::Idle);
        assert_eq!(e2.kind, EventKind::Idle);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers -- this must not panic.
        bus.publish(DisplayEvent::idle());
    }

    #[test]
    fn drop_reasons_use_kebab_case_labels() {
        assert_eq!(DropReason::Overflow.as_str(), "overflow");
        assert_eq!(DropReason::LowPriorityBusy.as_str(), "low-priority-busy");
        assert_eq!(DropReason::Interrupted.as_str(), "interrupted");

        let json = serde_json::to_value(DropReason::LowPriorityBusy).unwrap();
        assert_eq!(json, serde_json::json!("low-priority-busy"));
    }

    #[test]
    fn events_serialize_with_a_tag_and_timestamp() {
        let id = JobId::new();
        let event = DisplayEvent::job_dropped(id, JobKind::Emoji, DropReason::Overflow);
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "job_dropped");
        assert_eq!(json["kind"], "emoji");
        assert_eq!(json["reason"], "overflow");
        assert!(json["at"].is_string());
    }
}
