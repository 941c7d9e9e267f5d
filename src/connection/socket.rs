//! Low-level WebSocket helpers: endpoint URLs, bounded connects, and
//! frame parsing.

use std::io::ErrorKind;
use std::time::Duration;

use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, error::Error as WsError},
};

use crate::error::{Result, SonaLinkError};
use crate::models::{ClientMessage, ServerMessage};
use crate::timeouts::SonaLinkTimeouts;

pub(crate) type WebSocketStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Control-channel URL for one port candidate.
pub(crate) fn service_url(host: &str, port: u16) -> String {
    format!("ws://{}:{}/ws", host, port)
}

/// Open a WebSocket to one port candidate within the given bound.
///
/// A zero timeout disables the bound. On failure the in-flight handshake
/// is dropped entirely; nothing survives for the next candidate.
pub(crate) async fn connect_port(
    host: &str,
    port: u16,
    connection_timeout: Duration,
) -> Result<WebSocketStream> {
    let url = service_url(host, port);
    let request = url.as_str().into_client_request().map_err(|e| {
        SonaLinkError::ConfigurationError(format!("invalid endpoint {}: {}", url, e))
    })?;

    let connect_result = if SonaLinkTimeouts::is_no_timeout(connection_timeout) {
        connect_async(request).await
    } else {
        match tokio::time::timeout(connection_timeout, connect_async(request)).await {
            Ok(result) => result,
            Err(_) => {
                return Err(SonaLinkError::ConnectionTimeout(format!(
                    "port {} did not accept within {:?}",
                    port, connection_timeout
                )))
            }
        }
    };

    match connect_result {
        Ok((stream, _response)) => Ok(stream),
        Err(e) => Err(classify_connect_error(port, e)),
    }
}

fn classify_connect_error(port: u16, e: WsError) -> SonaLinkError {
    match e {
        WsError::Io(io) if io.kind() == ErrorKind::ConnectionRefused => {
            SonaLinkError::ConnectionRefused(format!("port {}: {}", port, io))
        }
        WsError::Io(io) if io.kind() == ErrorKind::TimedOut => {
            SonaLinkError::ConnectionTimeout(format!("port {}: {}", port, io))
        }
        other => SonaLinkError::Unknown(format!("port {}: {}", port, other)),
    }
}

/// Parse one inbound text frame.
pub(crate) fn parse_message(raw: &str) -> Result<ServerMessage> {
    serde_json::from_str(raw)
        .map_err(|e| SonaLinkError::InvalidMessage(format!("unparseable frame: {}", e)))
}

/// Serialize one outbound request.
pub(crate) fn encode_message(message: &ClientMessage) -> Result<String> {
    serde_json::to_string(message)
        .map_err(|e| SonaLinkError::InvalidMessage(format!("unserializable request: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_url_shape() {
        assert_eq!(service_url("127.0.0.1", 50190), "ws://127.0.0.1:50190/ws");
    }

    #[test]
    fn test_parse_message_rejects_garbage() {
        assert!(matches!(
            parse_message("not json"),
            Err(SonaLinkError::InvalidMessage(_))
        ));
        assert!(matches!(
            parse_message(r#"{"type":"no_such_message"}"#),
            Err(SonaLinkError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_parse_message_accepts_known_kinds() {
        assert!(parse_message(r#"{"type":"pong"}"#).is_ok());
        assert!(parse_message(r#"{"type":"device_state","state":{}}"#).is_ok());
    }
}
