use serde::{Deserialize, Serialize};
use std::fmt;

use super::error_detail::ErrorDetail;

/// Snapshot of the connection lifecycle.
///
/// At most one of `connected` / `connecting` is `true`; both are `false`
/// at rest (disconnected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    /// A connection to the service is established.
    pub connected: bool,

    /// A connection attempt (or a scheduled reconnect) is in flight.
    pub connecting: bool,

    /// The port the established connection uses, when connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// The failure that produced this status, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ConnectionStatus {
    /// Status at rest, no error.
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            connecting: false,
            port: None,
            error: None,
        }
    }

    /// An attempt is in flight.
    pub(crate) fn connecting() -> Self {
        Self {
            connected: false,
            connecting: true,
            port: None,
            error: None,
        }
    }

    /// Established on the given port.
    pub(crate) fn connected(port: u16) -> Self {
        Self {
            connected: true,
            connecting: false,
            port: Some(port),
            error: None,
        }
    }

    /// Terminal failure: at rest with an error attached.
    pub(crate) fn failed(detail: ErrorDetail) -> Self {
        Self {
            connected: false,
            connecting: false,
            port: None,
            error: Some(detail),
        }
    }
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.connected {
            match self.port {
                Some(port) => write!(f, "connected(port={})", port),
                None => write!(f, "connected"),
            }
        } else if self.connecting {
            write!(f, "connecting")
        } else {
            match &self.error {
                Some(detail) => write!(f, "disconnected({})", detail.code),
                None => write!(f, "disconnected"),
            }
        }
    }
}
