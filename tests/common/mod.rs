#![allow(dead_code)]
//! In-process mock of the Sona service for integration tests.
//!
//! Binds an ephemeral port and speaks the real wire protocol: parses
//! client requests, replies through a per-test responder, and can push
//! unsolicited messages or kill the connection to simulate losses.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use sona_link::{ClientMessage, ConnectionStatus, EventHandlers, ServerMessage};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;

pub type Responder = Arc<dyn Fn(&ClientMessage) -> Vec<ServerMessage> + Send + Sync>;

enum ConnCommand {
    Push(ServerMessage),
    /// Drop the TCP stream without a close handshake (network flap).
    DropAbrupt,
    /// Send a close frame first (server-initiated close).
    CloseGraceful,
}

pub struct MockService {
    pub port: u16,
    received: mpsc::UnboundedReceiver<ClientMessage>,
    command_tx: mpsc::UnboundedSender<ConnCommand>,
    connections: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl MockService {
    /// Bind an ephemeral port and serve consecutive connections with the
    /// given responder.
    pub async fn spawn(
        responder: impl Fn(&ClientMessage) -> Vec<ServerMessage> + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));
        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::new(responder),
            received_tx,
            command_rx,
            Arc::clone(&connections),
        ));
        Self {
            port,
            received,
            command_tx,
            connections,
            accept_task,
        }
    }

    /// Push an unsolicited message to the connected client.
    pub fn push(&self, message: ServerMessage) {
        self.command_tx.send(ConnCommand::Push(message)).unwrap();
    }

    /// Drop the current connection without a close handshake.
    pub fn drop_connection(&self) {
        self.command_tx.send(ConnCommand::DropAbrupt).unwrap();
    }

    /// Close the current connection with a proper close frame.
    pub fn close_connection(&self) {
        self.command_tx.send(ConnCommand::CloseGraceful).unwrap();
    }

    /// Number of connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next client→server message the service received.
    pub async fn next_received(&mut self) -> ClientMessage {
        tokio::time::timeout(Duration::from_secs(5), self.received.recv())
            .await
            .expect("timed out waiting for a client message")
            .expect("mock service stopped")
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    responder: Responder,
    received_tx: mpsc::UnboundedSender<ClientMessage>,
    mut command_rx: mpsc::UnboundedReceiver<ConnCommand>,
    connections: Arc<AtomicUsize>,
) {
    loop {
        let Ok((stream, _addr)) = listener.accept().await else {
            return;
        };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
            continue;
        };
        connections.fetch_add(1, Ordering::SeqCst);

        loop {
            tokio::select! {
                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let message: ClientMessage = serde_json::from_str(text.as_str())
                            .expect("mock service got an unparseable request");
                        let replies = responder(&message);
                        let _ = received_tx.send(message);
                        let mut failed = false;
                        for reply in replies {
                            let payload = serde_json::to_string(&reply).unwrap();
                            if ws.send(Message::Text(payload.into())).await.is_err() {
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                command = command_rx.recv() => match command {
                    Some(ConnCommand::Push(message)) => {
                        let payload = serde_json::to_string(&message).unwrap();
                        if ws.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(ConnCommand::DropAbrupt) => break,
                    Some(ConnCommand::CloseGraceful) => {
                        let _ = ws.close(None).await;
                        break;
                    }
                    None => return,
                },
            }
        }
        // The stream drops here; the next connection can be accepted.
    }
}

// ── Reply helpers ───────────────────────────────────────────────────────

pub fn ack_ok(request_id: u64) -> ServerMessage {
    ServerMessage::Ack {
        request_id,
        success: true,
        subscribed: None,
        message: None,
    }
}

pub fn ack_fail(request_id: u64, message: &str) -> ServerMessage {
    ServerMessage::Ack {
        request_id,
        success: false,
        subscribed: None,
        message: Some(message.to_string()),
    }
}

pub fn nc_push(mic: bool, speaker: bool) -> ServerMessage {
    ServerMessage::NcState {
        state: json!({
            "microphone": {"enabled": mic, "updatedAt": 1000},
            "speaker": {"enabled": speaker, "updatedAt": 1000}
        }),
    }
}

pub fn ac_push(mic: bool, speaker: bool) -> ServerMessage {
    ServerMessage::AcState {
        state: json!({
            "microphone": {"enabled": mic, "updatedAt": 1000},
            "speaker": {"enabled": speaker, "updatedAt": 1000}
        }),
    }
}

pub fn device_push(mic_device: Option<&str>) -> ServerMessage {
    let microphone = match mic_device {
        Some(id) => json!({"device": {"id": id, "name": "Arc Wireless"}, "updatedAt": 1000}),
        None => json!({"device": null, "updatedAt": 1000}),
    };
    ServerMessage::DeviceState {
        state: json!({
            "microphone": microphone,
            "speaker": {"device": null, "updatedAt": 1000}
        }),
    }
}

pub fn in_call_push(active: bool) -> ServerMessage {
    ServerMessage::InCallState {
        state: json!({"active": active, "updatedAt": 1000}),
    }
}

/// Responder that acks everything and answers get-state requests with a
/// canned push of the matching domain.
pub fn echo_responder(message: &ClientMessage) -> Vec<ServerMessage> {
    match message {
        ClientMessage::GetDeviceState { request_id } => {
            vec![ack_ok(*request_id), device_push(Some("hs-1"))]
        }
        ClientMessage::GetNcState { request_id } => {
            vec![ack_ok(*request_id), nc_push(true, false)]
        }
        ClientMessage::GetAcState { request_id } => {
            vec![ack_ok(*request_id), ac_push(false, true)]
        }
        ClientMessage::GetInCallState { request_id } => {
            vec![ack_ok(*request_id), in_call_push(false)]
        }
        ClientMessage::Subscribe {
            request_id, topics, ..
        } => vec![ServerMessage::Ack {
            request_id: *request_id,
            success: true,
            subscribed: Some(topics.clone()),
            message: None,
        }],
        ClientMessage::Unsubscribe { request_id, .. } | ClientMessage::Ping { request_id } => {
            vec![ack_ok(*request_id)]
        }
    }
}

// ── Test utilities ──────────────────────────────────────────────────────

/// Event handlers that record every status transition.
pub fn status_recorder() -> (EventHandlers, Arc<StdMutex<Vec<ConnectionStatus>>>) {
    let statuses = Arc::new(StdMutex::new(Vec::new()));
    let recorded = Arc::clone(&statuses);
    let handlers = EventHandlers::new().on_status_change(move |status| {
        recorded.lock().unwrap().push(status.clone());
    });
    (handlers, statuses)
}

/// A port with (almost certainly) nothing listening on it.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Poll a condition until it holds or a generous deadline expires.
pub async fn wait_for(description: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("timed out waiting for {}", description);
}
