use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Result, SonaLinkError};

use super::{read_updated_at, now_ms, Channel};

/// On/off state of one voice feature (noise cancellation or accent
/// conversion) across both audio channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureState {
    /// Feature toggle for the capture side.
    pub microphone: Toggle,

    /// Feature toggle for the render side.
    pub speaker: Toggle,
}

/// One channel's feature toggle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toggle {
    /// Whether the feature is currently enabled on this channel.
    pub enabled: bool,

    /// Milliseconds since the Unix epoch of the last update.
    pub updated_at: u64,
}

impl Toggle {
    /// A disabled toggle stamped with the current time.
    pub fn off() -> Self {
        Self {
            enabled: false,
            updated_at: now_ms(),
        }
    }

    fn from_raw(raw: Option<&JsonValue>) -> Self {
        match raw.and_then(JsonValue::as_object) {
            Some(entry) => Self {
                enabled: entry
                    .get("enabled")
                    .and_then(JsonValue::as_bool)
                    .unwrap_or(false),
                updated_at: read_updated_at(entry),
            },
            None => Self::off(),
        }
    }
}

impl FeatureState {
    /// Normalize a raw payload into a canonical snapshot.
    ///
    /// The payload must be a JSON object; a missing channel entry or a
    /// missing `enabled` flag normalizes to "disabled".
    pub fn from_raw(raw: &JsonValue) -> Result<Self> {
        let map = raw.as_object().ok_or_else(|| {
            SonaLinkError::InvalidMessage("feature state payload is not an object".into())
        })?;
        Ok(Self {
            microphone: Toggle::from_raw(map.get("microphone")),
            speaker: Toggle::from_raw(map.get("speaker")),
        })
    }

    /// Value-only comparison: per-channel `enabled` flags, timestamps
    /// never participate.
    pub fn same_values(&self, other: &Self) -> bool {
        self.microphone.enabled == other.microphone.enabled
            && self.speaker.enabled == other.speaker.enabled
    }

    /// Whether the feature is enabled on the given channel.
    pub fn enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Microphone => self.microphone.enabled,
            Channel::Speaker => self.speaker.enabled,
        }
    }
}
