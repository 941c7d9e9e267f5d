use serde::{Deserialize, Serialize};
use std::fmt;

/// The two audio channels the service tracks independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Capture side (the user's microphone).
    Microphone,
    /// Render side (the user's speaker or headset).
    Speaker,
}

impl Channel {
    /// Both channels, in wire order.
    pub const ALL: [Channel; 2] = [Channel::Microphone, Channel::Speaker];

    /// The JSON key this channel uses in state payloads.
    pub fn key(&self) -> &'static str {
        match self {
            Channel::Microphone => "microphone",
            Channel::Speaker => "speaker",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
