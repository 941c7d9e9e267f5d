//! Error types for the sona-link client.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SonaLinkError>;

/// Errors surfaced by the sona-link client.
#[derive(Debug, Error)]
pub enum SonaLinkError {
    /// No configured port accepted a connection and no more specific
    /// failure was captured along the way.
    #[error("service unreachable: {0}")]
    ServiceUnreachable(String),

    /// The service (or the transport on its behalf) refused the
    /// connection: TCP refusal, a server-initiated close, or reconnect
    /// exhaustion.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Connecting or waiting for an acknowledgement exceeded its bound.
    #[error("connection timeout: {0}")]
    ConnectionTimeout(String),

    /// An inbound payload could not be parsed or normalized.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The client was misconfigured (builder-time failures).
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Fallback for failures that fit no other kind.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SonaLinkError {
    /// Stable machine-readable code for this error kind, used in status
    /// updates and diagnostic events.
    pub fn code(&self) -> &'static str {
        match self {
            SonaLinkError::ServiceUnreachable(_) => "SERVICE_UNREACHABLE",
            SonaLinkError::ConnectionRefused(_) => "CONNECTION_REFUSED",
            SonaLinkError::ConnectionTimeout(_) => "CONNECTION_TIMEOUT",
            SonaLinkError::InvalidMessage(_) => "INVALID_MESSAGE",
            SonaLinkError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            SonaLinkError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }
}

impl From<serde_json::Error> for SonaLinkError {
    fn from(e: serde_json::Error) -> Self {
        SonaLinkError::InvalidMessage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            SonaLinkError::ServiceUnreachable("x".into()).code(),
            "SERVICE_UNREACHABLE"
        );
        assert_eq!(
            SonaLinkError::ConnectionTimeout("x".into()).code(),
            "CONNECTION_TIMEOUT"
        );
        assert_eq!(
            SonaLinkError::InvalidMessage("x".into()).code(),
            "INVALID_MESSAGE"
        );
    }

    #[test]
    fn test_display_includes_context() {
        let err = SonaLinkError::ConnectionRefused("closed by server".into());
        assert_eq!(err.to_string(), "connection refused: closed by server");
    }
}
