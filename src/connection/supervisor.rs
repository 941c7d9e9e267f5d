//! Connection supervision for the service socket.
//!
//! A single background task exclusively owns the WebSocket and every
//! timer, so "at most one socket, at most one pending reconnect timer"
//! holds structurally. The task handles:
//!
//! - Port discovery: each connect cycle tries the configured ports in
//!   fixed order with a bounded per-attempt timeout
//! - Failure classification: refusals/timeouts aggregate to
//!   "service unreachable", server-initiated closes are terminal, other
//!   losses are transient
//! - Reconnection scheduling with exponential backoff and an optional
//!   attempt limit
//! - Request/acknowledgement correlation by `request_id`
//! - Forwarding raw inbound messages to registered handlers
//!
//! Every status transition is pushed through the status listeners in the
//! order it occurred; observers never poll.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, RwLock,
};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::tungstenite::{error::Error as WsError, protocol::Message};

use crate::connection::backoff::ReconnectState;
use crate::connection::registry::{ListenerGuard, MessageRegistry, StatusRegistry};
use crate::connection::socket::{self, WebSocketStream};
use crate::error::{Result, SonaLinkError};
use crate::event_handlers::{EventHandlers, HandlerId};
use crate::models::{
    AckResponse, ClientMessage, ConnectionOptions, ConnectionStatus, ErrorDetail, MessageKind,
    ServerMessage,
};
use crate::timeouts::SonaLinkTimeouts;

// ── Commands ────────────────────────────────────────────────────────────

enum SupervisorCmd {
    Connect {
        result_tx: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        result_tx: oneshot::Sender<()>,
    },
    Request {
        message: ClientMessage,
        result_tx: oneshot::Sender<Result<AckResponse>>,
    },
    Shutdown,
}

type PendingAcks = HashMap<u64, oneshot::Sender<Result<AckResponse>>>;

// ── Public handle ───────────────────────────────────────────────────────

/// Handle to the background connection task.
pub(crate) struct ConnectionSupervisor {
    cmd_tx: mpsc::Sender<SupervisorCmd>,
    connected: Arc<AtomicBool>,
    status: Arc<RwLock<ConnectionStatus>>,
    messages: Arc<MessageRegistry>,
    status_listeners: Arc<StatusRegistry>,
    next_request_id: AtomicU64,
    _task: JoinHandle<()>,
}

impl ConnectionSupervisor {
    /// Spawn the background task. Must be called within a tokio runtime.
    pub fn new(
        options: ConnectionOptions,
        timeouts: SonaLinkTimeouts,
        event_handlers: EventHandlers,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let connected = Arc::new(AtomicBool::new(false));
        let status = Arc::new(RwLock::new(ConnectionStatus::disconnected()));
        let messages = Arc::new(MessageRegistry::new());
        let status_listeners = Arc::new(StatusRegistry::new());

        let shared = TaskShared {
            options,
            timeouts,
            event_handlers,
            connected: Arc::clone(&connected),
            status: Arc::clone(&status),
            messages: Arc::clone(&messages),
            status_listeners: Arc::clone(&status_listeners),
        };
        let task = tokio::spawn(supervisor_task(shared, cmd_rx));

        Self {
            cmd_tx,
            connected,
            status,
            messages,
            status_listeners,
            next_request_id: AtomicU64::new(0),
            _task: task,
        }
    }

    /// Manual connect. No-op when already connected; when a full cycle
    /// fails this either returns the classified failure (auto-reconnect
    /// off) or returns `Ok` with a reconnect timer armed (auto-reconnect
    /// on), never both.
    pub async fn connect(&self) -> Result<()> {
        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(SupervisorCmd::Connect { result_tx })
            .await
            .map_err(|_| task_not_running())?;
        result_rx.await.map_err(|_| task_not_running())?
    }

    /// Cancel any pending reconnect, close the socket, reset all
    /// connection state. Idempotent.
    pub async fn disconnect(&self) {
        let (result_tx, result_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(SupervisorCmd::Disconnect { result_tx })
            .await
            .is_ok()
        {
            let _ = result_rx.await;
        }
    }

    /// Current status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.status.read().unwrap().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Allocate the next request id.
    pub fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Send a request and return the channel its acknowledgement will
    /// arrive on. Fails immediately, with no network attempt, when not
    /// connected.
    pub async fn send_request(
        &self,
        message: ClientMessage,
    ) -> Result<oneshot::Receiver<Result<AckResponse>>> {
        if !self.is_connected() {
            return Err(SonaLinkError::ConnectionRefused(
                "not connected to the service".into(),
            ));
        }
        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(SupervisorCmd::Request { message, result_tx })
            .await
            .map_err(|_| task_not_running())?;
        Ok(result_rx)
    }

    /// Send a request and wait for its acknowledgement, bounded by
    /// `timeout`.
    pub async fn request(&self, message: ClientMessage, timeout: Duration) -> Result<AckResponse> {
        let result_rx = self.send_request(message).await?;
        match tokio::time::timeout(timeout, result_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(task_not_running()),
            Err(_) => Err(SonaLinkError::ConnectionTimeout(format!(
                "no acknowledgement within {:?}",
                timeout
            ))),
        }
    }

    /// Register a raw-message handler for the given kind.
    pub fn on_message(
        &self,
        kind: MessageKind,
        handler: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> HandlerId {
        self.messages.add(kind, handler)
    }

    /// Register a one-shot listener for the given kind. Dropping the
    /// guard removes the listener if the message never arrives.
    pub fn once_message(
        &self,
        kind: MessageKind,
    ) -> (ListenerGuard, oneshot::Receiver<ServerMessage>) {
        self.messages.once_channel(kind)
    }

    /// Remove a previously registered raw-message handler.
    pub fn off_message(&self, id: HandlerId) -> bool {
        self.messages.remove(id)
    }

    /// Register a status-transition listener.
    pub fn on_status_change(
        &self,
        handler: impl Fn(&ConnectionStatus) + Send + Sync + 'static,
    ) -> HandlerId {
        self.status_listeners.add(handler)
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        let _ = self.cmd_tx.try_send(SupervisorCmd::Shutdown);
    }
}

fn task_not_running() -> SonaLinkError {
    SonaLinkError::Unknown("connection task is not running".into())
}

// ── Background task ─────────────────────────────────────────────────────

/// State shared between the handle and the background task.
struct TaskShared {
    options: ConnectionOptions,
    timeouts: SonaLinkTimeouts,
    event_handlers: EventHandlers,
    connected: Arc<AtomicBool>,
    status: Arc<RwLock<ConnectionStatus>>,
    messages: Arc<MessageRegistry>,
    status_listeners: Arc<StatusRegistry>,
}

impl TaskShared {
    /// Store and broadcast a status transition. Identical consecutive
    /// snapshots are suppressed, which also makes `disconnect()`
    /// idempotent from the observer's point of view.
    fn publish_status(&self, status: ConnectionStatus) {
        {
            let mut current = self.status.write().unwrap();
            if *current == status {
                return;
            }
            *current = status.clone();
        }
        self.connected.store(status.connected, Ordering::SeqCst);
        log::debug!("[sona-link] status: {}", status);
        self.status_listeners.dispatch(&status);
    }

    /// Report a failure on the diagnostic side-channel.
    fn emit_diagnostic(&self, err: &SonaLinkError) {
        let detail = ErrorDetail::from(err);
        log::debug!("[sona-link] diagnostic: {}", detail);
        self.event_handlers.emit_error(&detail);
    }
}

enum LoopEvent {
    Cmd(Option<SupervisorCmd>),
    Frame(Option<std::result::Result<Message, WsError>>),
    ReconnectFire,
}

async fn supervisor_task(shared: TaskShared, mut cmd_rx: mpsc::Receiver<SupervisorCmd>) {
    let mut ws: Option<WebSocketStream> = None;
    let mut pending_acks: PendingAcks = HashMap::new();
    let mut reconnect = ReconnectState::from_options(&shared.options);
    let mut reconnect_at: Option<TokioInstant> = None;
    let mut shutdown = false;

    loop {
        if shutdown {
            if let Some(mut stream) = ws.take() {
                let _ = stream.close(None).await;
            }
            fail_pending(&mut pending_acks);
            shared.messages.clear();
            return;
        }

        let event = if let Some(stream) = ws.as_mut() {
            tokio::select! {
                cmd = cmd_rx.recv() => LoopEvent::Cmd(cmd),
                frame = stream.next() => LoopEvent::Frame(frame),
            }
        } else if let Some(deadline) = reconnect_at {
            tokio::select! {
                cmd = cmd_rx.recv() => LoopEvent::Cmd(cmd),
                () = tokio::time::sleep_until(deadline) => LoopEvent::ReconnectFire,
            }
        } else {
            LoopEvent::Cmd(cmd_rx.recv().await)
        };

        match event {
            LoopEvent::Cmd(None) | LoopEvent::Cmd(Some(SupervisorCmd::Shutdown)) => {
                shutdown = true;
            }

            LoopEvent::Cmd(Some(SupervisorCmd::Connect { result_tx })) => {
                if ws.is_some() {
                    // Already connected: no-op.
                    let _ = result_tx.send(Ok(()));
                    continue;
                }
                // A manual connect cancels any armed timer and starts a
                // fresh attempt count.
                reconnect_at = None;
                reconnect.reset();
                match run_connect_cycle(&shared, &mut ws).await {
                    Ok(()) => {
                        let _ = result_tx.send(Ok(()));
                    }
                    Err(err) => {
                        if shared.options.auto_reconnect {
                            // Scheduled, not raised, never both.
                            schedule_reconnect(&shared, &mut reconnect, &mut reconnect_at, &err);
                            let _ = result_tx.send(Ok(()));
                        } else {
                            shared.publish_status(ConnectionStatus::failed(ErrorDetail::from(
                                &err,
                            )));
                            let _ = result_tx.send(Err(err));
                        }
                    }
                }
            }

            LoopEvent::Cmd(Some(SupervisorCmd::Disconnect { result_tx })) => {
                reconnect_at = None;
                reconnect.reset();
                if let Some(mut stream) = ws.take() {
                    let _ = stream.close(None).await;
                }
                fail_pending(&mut pending_acks);
                shared.publish_status(ConnectionStatus::disconnected());
                let _ = result_tx.send(());
            }

            LoopEvent::Cmd(Some(SupervisorCmd::Request { message, result_tx })) => {
                let Some(stream) = ws.as_mut() else {
                    let _ = result_tx.send(Err(SonaLinkError::ConnectionRefused(
                        "not connected to the service".into(),
                    )));
                    continue;
                };
                match socket::encode_message(&message) {
                    Ok(payload) => match stream.send(Message::Text(payload.clone().into())).await {
                        Ok(()) => {
                            shared.event_handlers.emit_send(&payload);
                            pending_acks.insert(message.request_id(), result_tx);
                        }
                        Err(e) => {
                            // The read side will observe and classify the loss.
                            let _ = result_tx.send(Err(SonaLinkError::Unknown(format!(
                                "send failed: {}",
                                e
                            ))));
                        }
                    },
                    Err(err) => {
                        let _ = result_tx.send(Err(err));
                    }
                }
            }

            LoopEvent::ReconnectFire => {
                reconnect_at = None;
                match run_connect_cycle(&shared, &mut ws).await {
                    Ok(()) => reconnect.reset(),
                    Err(err) => {
                        schedule_reconnect(&shared, &mut reconnect, &mut reconnect_at, &err);
                    }
                }
            }

            LoopEvent::Frame(frame) => match frame {
                Some(Ok(Message::Text(text))) => {
                    shared.event_handlers.emit_receive(text.as_str());
                    match socket::parse_message(text.as_str()) {
                        Ok(message) => {
                            handle_server_message(message, &shared, &mut pending_acks);
                        }
                        Err(err) => shared.emit_diagnostic(&err),
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if let Some(stream) = ws.as_mut() {
                        let _ = stream.send(Message::Pong(payload)).await;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    // Remote-initiated close is terminal: the service told
                    // us to go away, retrying would only be refused again.
                    ws = None;
                    fail_pending(&mut pending_acks);
                    let reason = match frame {
                        Some(f) => format!(
                            "closed by service: {} (code {})",
                            f.reason,
                            u16::from(f.code)
                        ),
                        None => "closed by service".to_string(),
                    };
                    let err = SonaLinkError::ConnectionRefused(reason);
                    log::warn!("[sona-link] {}", err);
                    shared.emit_diagnostic(&err);
                    shared.publish_status(ConnectionStatus::failed(ErrorDetail::from(&err)));
                }
                Some(Ok(Message::Binary(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    ws = None;
                    fail_pending(&mut pending_acks);
                    handle_connection_loss(
                        &shared,
                        &mut reconnect,
                        &mut reconnect_at,
                        format!("transport error: {}", e),
                    );
                }
                None => {
                    ws = None;
                    fail_pending(&mut pending_acks);
                    handle_connection_loss(
                        &shared,
                        &mut reconnect,
                        &mut reconnect_at,
                        "stream ended".to_string(),
                    );
                }
            },
        }
    }
}

/// One full pass over the configured ports, in order.
///
/// On success installs the stream and publishes the single `connected`
/// status naming the winning port. On failure every per-port handle has
/// already been torn down; the returned error is the aggregate
/// classification.
async fn run_connect_cycle(
    shared: &TaskShared,
    ws: &mut Option<WebSocketStream>,
) -> Result<()> {
    shared.publish_status(ConnectionStatus::connecting());

    let mut specific_error: Option<SonaLinkError> = None;
    for &port in &shared.options.ports {
        log::debug!("[sona-link] trying {}:{}", shared.options.host, port);
        match socket::connect_port(&shared.options.host, port, shared.timeouts.connection_timeout)
            .await
        {
            Ok(stream) => {
                log::info!("[sona-link] connected to {}:{}", shared.options.host, port);
                *ws = Some(stream);
                shared.publish_status(ConnectionStatus::connected(port));
                return Ok(());
            }
            Err(err) => {
                log::debug!("[sona-link] port {} failed: {}", port, err);
                // Refusals and connect timeouts are the generic "nothing
                // there" signals; anything else is a more specific failure
                // worth surfacing over the aggregate.
                match err {
                    SonaLinkError::ConnectionRefused(_) | SonaLinkError::ConnectionTimeout(_) => {}
                    other => specific_error = Some(other),
                }
            }
        }
    }

    Err(specific_error.unwrap_or_else(|| {
        SonaLinkError::ServiceUnreachable(format!(
            "no service on {} ports {:?}",
            shared.options.host, shared.options.ports
        ))
    }))
}

/// Arm the next reconnect timer, or publish the terminal status once the
/// attempt limit is exhausted.
fn schedule_reconnect(
    shared: &TaskShared,
    reconnect: &mut ReconnectState,
    reconnect_at: &mut Option<TokioInstant>,
    err: &SonaLinkError,
) {
    match reconnect.next_delay() {
        Some(delay) => {
            log::info!(
                "[sona-link] reconnecting in {:?} (attempt {})",
                delay,
                reconnect.attempts()
            );
            shared.emit_diagnostic(err);
            shared.publish_status(ConnectionStatus::connecting());
            *reconnect_at = Some(TokioInstant::now() + delay);
        }
        None => {
            let exhausted =
                SonaLinkError::ConnectionRefused("max reconnect attempts reached".into());
            log::warn!("[sona-link] {}", exhausted);
            shared.publish_status(ConnectionStatus::failed(ErrorDetail::from(&exhausted)));
        }
    }
}

/// Classify a transient loss observed on the read side.
fn handle_connection_loss(
    shared: &TaskShared,
    reconnect: &mut ReconnectState,
    reconnect_at: &mut Option<TokioInstant>,
    reason: String,
) {
    let err = SonaLinkError::Unknown(format!("connection lost: {}", reason));
    log::warn!("[sona-link] {}", err);
    if shared.options.auto_reconnect {
        schedule_reconnect(shared, reconnect, reconnect_at, &err);
    } else {
        shared.emit_diagnostic(&err);
        shared.publish_status(ConnectionStatus::failed(ErrorDetail::from(&err)));
    }
}

/// Route one parsed inbound message: acks settle their pending request,
/// everything else goes to the raw-message handlers in registration
/// order. Server-reported errors additionally hit the diagnostic channel.
fn handle_server_message(message: ServerMessage, shared: &TaskShared, pending: &mut PendingAcks) {
    if let ServerMessage::Ack {
        request_id,
        success,
        ref subscribed,
        message: ref ack_message,
    } = message
    {
        match pending.remove(&request_id) {
            Some(result_tx) => {
                let _ = result_tx.send(Ok(AckResponse {
                    request_id,
                    success,
                    subscribed: subscribed.clone(),
                    message: ack_message.clone(),
                }));
            }
            None => log::debug!("[sona-link] unmatched ack for request {}", request_id),
        }
        return;
    }

    if let ServerMessage::Error { code, message: m } = &message {
        shared
            .event_handlers
            .emit_error(&ErrorDetail::new(code.clone(), m.clone()));
    }

    shared.messages.dispatch(&message);
}

/// Settle every in-flight request: the socket its acknowledgement would
/// have arrived on is gone.
fn fail_pending(pending: &mut PendingAcks) {
    for (_, result_tx) in pending.drain() {
        let _ = result_tx.send(Err(SonaLinkError::ConnectionRefused(
            "connection closed before acknowledgement".into(),
        )));
    }
}
