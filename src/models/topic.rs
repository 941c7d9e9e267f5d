use serde::{Deserialize, Serialize};
use std::fmt;

/// Named subscription channels, one per tracked state domain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Topic {
    /// Device pairing updates (`device_state` pushes).
    #[serde(rename = "devices")]
    Devices,
    /// Noise-cancellation updates (`nc_state` pushes).
    #[serde(rename = "nc")]
    NoiseCancellation,
    /// Accent-conversion updates (`ac_state` pushes).
    #[serde(rename = "ac")]
    AccentConversion,
    /// Call-status updates (`in_call_state` pushes).
    #[serde(rename = "in_call")]
    InCall,
}

impl Topic {
    /// All four topics, in wire order.
    pub const ALL: [Topic; 4] = [
        Topic::Devices,
        Topic::NoiseCancellation,
        Topic::AccentConversion,
        Topic::InCall,
    ];

    /// The wire name of this topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Devices => "devices",
            Topic::NoiseCancellation => "nc",
            Topic::AccentConversion => "ac",
            Topic::InCall => "in_call",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
