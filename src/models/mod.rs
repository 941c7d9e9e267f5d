//! Data models for the sona-link client.
//!
//! Wire message enums, connection configuration and status, and the
//! canonical per-domain state snapshots.

pub mod ack_response;
pub mod channel;
pub mod client_message;
pub mod connection_options;
pub mod connection_status;
pub mod device_state;
pub mod error_detail;
pub mod feature_state;
pub mod in_call_state;
pub mod server_message;
pub mod topic;

#[cfg(test)]
mod tests;

pub use ack_response::AckResponse;
pub use channel::Channel;
pub use client_message::ClientMessage;
pub use connection_options::{ConnectionOptions, DEFAULT_HOST, DEFAULT_PORTS};
pub use connection_status::ConnectionStatus;
pub use device_state::{DeviceSlot, DeviceState};
pub use error_detail::ErrorDetail;
pub use feature_state::{FeatureState, Toggle};
pub use in_call_state::InCallState;
pub use server_message::{MessageKind, ServerMessage};
pub use topic::Topic;

/// Current time in millis since the Unix epoch.
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Read an `updatedAt` timestamp from a payload entry, defaulting to the
/// current time when absent or not a number. Accepts both `updatedAt`
/// (wire format) and `updated_at`.
pub(crate) fn read_updated_at(entry: &serde_json::Map<String, serde_json::Value>) -> u64 {
    entry
        .get("updatedAt")
        .or_else(|| entry.get("updated_at"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or_else(now_ms)
}
