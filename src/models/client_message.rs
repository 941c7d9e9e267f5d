use serde::{Deserialize, Serialize};

use super::topic::Topic;

/// Client-to-server request messages.
///
/// Every request carries a `request_id`; the service echoes it in the
/// matching [`ack`](super::ServerMessage::Ack).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request the current device pairing snapshot.
    GetDeviceState { request_id: u64 },

    /// Request the current noise-cancellation snapshot.
    GetNcState { request_id: u64 },

    /// Request the current accent-conversion snapshot.
    GetAcState { request_id: u64 },

    /// Request the current call status.
    GetInCallState { request_id: u64 },

    /// Subscribe to push updates for the given topics.
    ///
    /// The service may confirm only a subset; the ack's `subscribed`
    /// field lists what was actually registered.
    Subscribe {
        request_id: u64,
        topics: Vec<Topic>,
    },

    /// Unsubscribe from push updates for the given topics.
    Unsubscribe {
        request_id: u64,
        topics: Vec<Topic>,
    },

    /// Liveness probe.
    Ping { request_id: u64 },
}

impl ClientMessage {
    /// The request id carried by this message.
    pub fn request_id(&self) -> u64 {
        match self {
            ClientMessage::GetDeviceState { request_id }
            | ClientMessage::GetNcState { request_id }
            | ClientMessage::GetAcState { request_id }
            | ClientMessage::GetInCallState { request_id }
            | ClientMessage::Subscribe { request_id, .. }
            | ClientMessage::Unsubscribe { request_id, .. }
            | ClientMessage::Ping { request_id } => *request_id,
        }
    }
}
