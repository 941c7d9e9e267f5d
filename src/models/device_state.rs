use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Result, SonaLinkError};

use super::{read_updated_at, now_ms};

/// Paired-device snapshot covering both audio channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Pairing slot for the capture side.
    pub microphone: DeviceSlot,

    /// Pairing slot for the render side.
    pub speaker: DeviceSlot,
}

/// One channel's pairing slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSlot {
    /// Physical-device info exactly as reported by the service;
    /// `None` when no device is paired on this channel.
    pub device: Option<JsonValue>,

    /// Milliseconds since the Unix epoch of the last update to this slot.
    pub updated_at: u64,
}

impl DeviceSlot {
    /// An empty slot stamped with the current time.
    pub fn none() -> Self {
        Self {
            device: None,
            updated_at: now_ms(),
        }
    }

    fn from_raw(raw: Option<&JsonValue>) -> Self {
        match raw.and_then(JsonValue::as_object) {
            Some(entry) => Self {
                device: entry.get("device").filter(|v| !v.is_null()).cloned(),
                updated_at: read_updated_at(entry),
            },
            // Absent or malformed channel entry: no device present.
            None => Self::none(),
        }
    }
}

impl DeviceState {
    /// Normalize a raw payload into a canonical snapshot.
    ///
    /// The payload must be a JSON object; each channel entry is optional
    /// and an absent (or null) entry normalizes to "no device paired".
    pub fn from_raw(raw: &JsonValue) -> Result<Self> {
        let map = raw.as_object().ok_or_else(|| {
            SonaLinkError::InvalidMessage("device state payload is not an object".into())
        })?;
        Ok(Self {
            microphone: DeviceSlot::from_raw(map.get("microphone")),
            speaker: DeviceSlot::from_raw(map.get("speaker")),
        })
    }

    /// Value-only comparison against another snapshot.
    ///
    /// Any difference anywhere inside either channel's device object
    /// counts as a change; `updated_at` never does.
    pub fn same_devices(&self, other: &Self) -> bool {
        self.microphone.device == other.microphone.device
            && self.speaker.device == other.speaker.device
    }
}
