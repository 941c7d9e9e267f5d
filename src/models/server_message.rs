use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use super::topic::Topic;

/// Server-to-client messages.
///
/// State pushes carry their payload as raw JSON: the cache layer owns
/// normalization and tolerates partial or malformed payloads, so the
/// transport does not impose a schema on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Device pairing snapshot push.
    DeviceState {
        #[serde(default)]
        state: JsonValue,
    },

    /// Noise-cancellation snapshot push.
    NcState {
        #[serde(default)]
        state: JsonValue,
    },

    /// Accent-conversion snapshot push.
    AcState {
        #[serde(default)]
        state: JsonValue,
    },

    /// Call-status push.
    InCallState {
        #[serde(default)]
        state: JsonValue,
    },

    /// Server-reported error, not tied to any request.
    Error { code: String, message: String },

    /// Reply to a ping.
    Pong {},

    /// Acknowledgement of a client request.
    Ack {
        /// Echo of the request's id.
        request_id: u64,
        /// Whether the request was accepted.
        success: bool,
        /// For subscribe requests: the topics actually registered
        /// (possibly a subset of what was asked for).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subscribed: Option<Vec<Topic>>,
        /// Optional server-side failure description.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ServerMessage {
    /// The kind tag of this message, used to key handler registrations.
    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::DeviceState { .. } => MessageKind::DeviceState,
            ServerMessage::NcState { .. } => MessageKind::NcState,
            ServerMessage::AcState { .. } => MessageKind::AcState,
            ServerMessage::InCallState { .. } => MessageKind::InCallState,
            ServerMessage::Error { .. } => MessageKind::Error,
            ServerMessage::Pong {} => MessageKind::Pong,
            ServerMessage::Ack { .. } => MessageKind::Ack,
        }
    }
}

/// Kind tag for [`ServerMessage`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    DeviceState,
    NcState,
    AcState,
    InCallState,
    Error,
    Pong,
    Ack,
}

impl MessageKind {
    /// The wire name of this message kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::DeviceState => "device_state",
            MessageKind::NcState => "nc_state",
            MessageKind::AcState => "ac_state",
            MessageKind::InCallState => "in_call_state",
            MessageKind::Error => "error",
            MessageKind::Pong => "pong",
            MessageKind::Ack => "ack",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
