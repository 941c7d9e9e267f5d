use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Result, SonaLinkError};

use super::read_updated_at;

/// Whether the user is currently in a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InCallState {
    /// `true` while a call is active.
    pub active: bool,

    /// Milliseconds since the Unix epoch of the last update.
    pub updated_at: u64,
}

impl InCallState {
    /// Normalize a raw payload into a canonical snapshot.
    ///
    /// The payload must be a JSON object; a missing `active` flag
    /// normalizes to `false`.
    pub fn from_raw(raw: &JsonValue) -> Result<Self> {
        let map = raw.as_object().ok_or_else(|| {
            SonaLinkError::InvalidMessage("in-call state payload is not an object".into())
        })?;
        Ok(Self {
            active: map
                .get("active")
                .and_then(JsonValue::as_bool)
                .unwrap_or(false),
            updated_at: read_updated_at(map),
        })
    }

    /// Value-only comparison: the `active` flag, never the timestamp.
    pub fn same_values(&self, other: &Self) -> bool {
        self.active == other.active
    }
}
