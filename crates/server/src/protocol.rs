//! Wire protocol for the display WebSocket.
//!
//! Clients talk JSON text frames shaped as `{"type": "...", "data": {...}}`.
//! Submission frames reuse the job kind as the `type` tag and carry the
//! kind's options (plus an optional `priority`) in `data`. Control frames
//! are `stop` / `cancel` (clear the queue, stop the current job) and
//! `hello` (liveness probe).

use marquee_core::{JobId, JobPayload, Priority};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Incoming frame envelope. `data` is optional on the wire.
#[derive(Debug, Deserialize)]
struct Envelope {
    r#type: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A decoded client request.
#[derive(Debug)]
pub enum ClientRequest {
    /// Queue a job for display.
    Submit {
        payload: JobPayload,
        priority: Priority,
    },
    /// Clear pending jobs and cooperatively stop the in-flight one.
    Stop,
    /// Liveness probe; acknowledged and otherwise ignored.
    Hello,
}

/// Ways an incoming frame can be rejected. Rejected frames are logged and
/// dropped; they never close the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame was not a JSON object with a string `type` tag.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The `type` tag named no known submission or control, or `data` did
    /// not decode as that kind's options.
    #[error("unusable frame type {kind:?}: {source}")]
    UnknownType {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode one client text frame.
pub fn parse_client_frame(text: &str) -> Result<ClientRequest, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    // Treat `"data": null` like a missing `data`.
    let data = match envelope.data {
        serde_json::Value::Null => json!({}),
        other => other,
    };

    match envelope.r#type.as_str() {
        "stop" | "cancel" => Ok(ClientRequest::Stop),
        "hello" => Ok(ClientRequest::Hello),
        kind => {
            let priority = lenient_priority(&data);
            let payload: JobPayload = serde_json::from_value(json!({
                "kind": kind,
                "options": data,
            }))
            .map_err(|source| ProtocolError::UnknownType {
                kind: kind.to_string(),
                source,
            })?;
            Ok(ClientRequest::Submit { payload, priority })
        }
    }
}

/// Read `data.priority`, falling back to normal for anything unrecognized.
///
/// The dispatcher is strict about priority values; the wire layer forgives
/// them so a misspelled priority still shows the submission instead of
/// swallowing it.
fn lenient_priority(data: &serde_json::Value) -> Priority {
    let Some(value) = data.get("priority") else {
        return Priority::default();
    };
    match value.as_str() {
        Some(raw) => raw.parse().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Unrecognized priority, treating as normal");
            Priority::Normal
        }),
        None => {
            tracing::warn!(raw = %value, "Non-string priority, treating as normal");
            Priority::Normal
        }
    }
}

/// Outgoing frame. Serialized as `{"type": "...", "data": {...}}` to mirror
/// the incoming envelope shape.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    /// A request was admitted, not completed. Submission acks carry the id
    /// the job was queued under; control acks have no id.
    Ack {
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<JobId>,
    },
    /// The queue drained and the display went idle.
    Idle {},
}

impl ServerMessage {
    /// Acknowledge an accepted submission.
    pub fn ack(id: JobId) -> Self {
        Self::Ack {
            status: "ok",
            id: Some(id),
        }
    }

    /// Acknowledge a control frame.
    pub fn ack_control() -> Self {
        Self::Ack {
            status: "ok",
            id: None,
        }
    }

    /// Announce the idle transition.
    pub fn idle() -> Self {
        Self::Idle {}
    }

    /// Render to a JSON text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage is always serialisable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use marquee_core::JobKind;

    #[test]
    fn text_submission_decodes_options() {
        let req = parse_client_frame(r#"{"type":"text","data":{"text":"hi"}}"#).unwrap();
        assert_matches!(req, ClientRequest::Submit { payload, priority } => {
            assert_matches!(payload, JobPayload::Text(opts) => assert_eq!(opts.text, "hi"));
            assert_eq!(priority, Priority::Normal);
        });
    }

    #[test]
    fn submission_without_data_uses_defaults() {
        let req = parse_client_frame(r#"{"type":"rain"}"#).unwrap();
        assert_matches!(req, ClientRequest::Submit { payload, priority } => {
            assert_eq!(payload.kind(), JobKind::Rain);
            assert_eq!(priority, Priority::Normal);
        });
    }

    #[test]
    fn null_data_is_treated_as_empty() {
        let req = parse_client_frame(r#"{"type":"perlin","data":null}"#).unwrap();
        assert_matches!(req, ClientRequest::Submit { payload, .. } => {
            assert_eq!(payload.kind(), JobKind::Perlin);
        });
    }

    #[test]
    fn priority_is_read_from_data() {
        let req =
            parse_client_frame(r#"{"type":"emoji","data":{"id":12,"priority":"high"}}"#).unwrap();
        assert_matches!(req, ClientRequest::Submit { priority, .. } => {
            assert_eq!(priority, Priority::High);
        });
    }

    #[test]
    fn bang_is_an_interrupt_alias() {
        let req = parse_client_frame(r#"{"type":"text","data":{"text":"x","priority":"!"}}"#)
            .unwrap();
        assert_matches!(req, ClientRequest::Submit { priority, .. } => {
            assert_eq!(priority, Priority::Interrupt);
        });
    }

    #[test]
    fn unrecognized_priority_falls_back_to_normal() {
        let req = parse_client_frame(r#"{"type":"text","data":{"priority":"urgent"}}"#).unwrap();
        assert_matches!(req, ClientRequest::Submit { priority, .. } => {
            assert_eq!(priority, Priority::Normal);
        });
    }

    #[test]
    fn non_string_priority_falls_back_to_normal() {
        let req = parse_client_frame(r#"{"type":"text","data":{"priority":3}}"#).unwrap();
        assert_matches!(req, ClientRequest::Submit { priority, .. } => {
            assert_eq!(priority, Priority::Normal);
        });
    }

    #[test]
    fn stop_and_cancel_are_synonyms() {
        assert_matches!(
            parse_client_frame(r#"{"type":"stop"}"#).unwrap(),
            ClientRequest::Stop
        );
        assert_matches!(
            parse_client_frame(r#"{"type":"cancel","data":{}}"#).unwrap(),
            ClientRequest::Stop
        );
    }

    #[test]
    fn hello_is_a_probe() {
        assert_matches!(
            parse_client_frame(r#"{"type":"hello"}"#).unwrap(),
            ClientRequest::Hello
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = parse_client_frame(r#"{"type":"fireworks","data":{}}"#).unwrap_err();
        assert_matches!(err, ProtocolError::UnknownType { kind, .. } => {
            assert_eq!(kind, "fireworks");
        });
    }

    #[test]
    fn mistyped_options_are_rejected() {
        let err = parse_client_frame(r#"{"type":"text","data":{"text":42}}"#).unwrap_err();
        assert_matches!(err, ProtocolError::UnknownType { kind, .. } => {
            assert_eq!(kind, "text");
        });
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert_matches!(
            parse_client_frame("not json").unwrap_err(),
            ProtocolError::Malformed(_)
        );
        assert_matches!(
            parse_client_frame(r#"{"data":{}}"#).unwrap_err(),
            ProtocolError::Malformed(_)
        );
    }

    #[test]
    fn ack_frames_have_the_envelope_shape() {
        let id = JobId::new();
        let frame: serde_json::Value =
            serde_json::from_str(&ServerMessage::ack(id).to_json()).unwrap();
        assert_eq!(frame, json!({"type": "ack", "data": {"status": "ok", "id": id}}));

        let frame: serde_json::Value =
            serde_json::from_str(&ServerMessage::ack_control().to_json()).unwrap();
        assert_eq!(frame, json!({"type": "ack", "data": {"status": "ok"}}));
    }

    #[test]
    fn idle_frame_carries_empty_data() {
        let frame: serde_json::Value =
            serde_json::from_str(&ServerMessage::idle().to_json()).unwrap();
        assert_eq!(frame, json!({"type": "idle", "data": {}}));
    }
}
