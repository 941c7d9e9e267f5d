//! Main Sona client with builder pattern.
//!
//! Composes the connection supervisor and the state cache, and owns the
//! two pieces that stitch them together: request/response calls that race
//! a server push against an acknowledgement, and the post-reconnect
//! recovery sequence (re-fetch all four domains, re-subscribe).

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::connection::ConnectionSupervisor;
use crate::error::{Result, SonaLinkError};
use crate::event_handlers::{EventHandlers, HandlerId};
use crate::models::{
    ClientMessage, ConnectionOptions, ConnectionStatus, DeviceState, ErrorDetail, FeatureState,
    InCallState, MessageKind, ServerMessage, Topic,
};
use crate::state::StateCache;
use crate::timeouts::SonaLinkTimeouts;

/// Bound on the `is_connected` settle polls the recovery sequence runs
/// before re-fetching state.
const RECOVERY_POLL_ATTEMPTS: usize = 10;

/// Client for the Sona desktop audio service.
///
/// Use [`SonaLinkClientBuilder`] to construct instances. The client is
/// cheap to clone; clones share one connection.
///
/// # Examples
///
/// ```rust,no_run
/// use sona_link::SonaLinkClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SonaLinkClient::builder().build()?;
/// client.connect().await?;
///
/// let devices = client.get_device_state().await?;
/// println!("microphone paired: {}", devices.microphone.device.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SonaLinkClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    supervisor: ConnectionSupervisor,
    cache: Arc<StateCache>,
    options: ConnectionOptions,
    timeouts: SonaLinkTimeouts,
    event_handlers: EventHandlers,
    /// Topics the service has confirmed; mutated only by successful
    /// subscribe/unsubscribe acknowledgements.
    subscriptions: Mutex<BTreeSet<Topic>>,
    recovery: Mutex<RecoveryState>,
}

/// Bookkeeping that distinguishes a first-ever connect from a
/// reconnection after a prior connected session.
#[derive(Default)]
struct RecoveryState {
    /// `connected` of the last observed status.
    last_connected: bool,
    /// A session was connected at least once.
    was_connected: bool,
    /// Armed on a connected→disconnected transition; the next connected
    /// transition runs the recovery sequence.
    reconnecting: bool,
    /// Confirmed topics stashed when the connection dropped.
    resubscribe_topics: Vec<Topic>,
}

enum StatusAction {
    Recover(Vec<Topic>),
    AutoSubscribe,
}

impl SonaLinkClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> SonaLinkClientBuilder {
        SonaLinkClientBuilder::new()
    }

    /// Connect to the service, probing the configured ports in order.
    ///
    /// No-op when already connected. With auto-reconnect disabled a
    /// failed full cycle is returned here; with auto-reconnect enabled
    /// this resolves `Ok` and retries continue in the background.
    pub async fn connect(&self) -> Result<()> {
        self.inner.supervisor.connect().await
    }

    /// Disconnect and reset local bookkeeping: the state cache, the
    /// confirmed topic set, and the recovery flags (the next connect is a
    /// first connect again). Idempotent.
    pub async fn disconnect(&self) {
        self.inner.supervisor.disconnect().await;
        self.inner.cache.reset();
        self.inner.subscriptions.lock().unwrap().clear();
        *self.inner.recovery.lock().unwrap() = RecoveryState::default();
    }

    /// Current connection status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.supervisor.status()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.supervisor.is_connected()
    }

    /// The locally cached state: plain reads and change-handler
    /// registration. Reads return the last known snapshots even while
    /// disconnected.
    pub fn cache(&self) -> &StateCache {
        &self.inner.cache
    }

    /// Fetch the current device pairing snapshot.
    pub async fn get_device_state(&self) -> Result<DeviceState> {
        self.inner.fetch_device_state().await
    }

    /// Fetch the current noise-cancellation snapshot.
    pub async fn get_nc_state(&self) -> Result<FeatureState> {
        self.inner.fetch_nc_state().await
    }

    /// Fetch the current accent-conversion snapshot.
    pub async fn get_ac_state(&self) -> Result<FeatureState> {
        self.inner.fetch_ac_state().await
    }

    /// Fetch the current call status.
    pub async fn get_in_call_state(&self) -> Result<InCallState> {
        self.inner.fetch_in_call_state().await
    }

    /// Subscribe to push updates for the given topics.
    ///
    /// Returns the topics the service confirmed, which may be a subset of
    /// what was requested; only confirmed topics join the local set. On
    /// failure the local set is untouched.
    pub async fn subscribe(&self, topics: Vec<Topic>) -> Result<Vec<Topic>> {
        self.inner.subscribe_topics(topics).await
    }

    /// Unsubscribe from push updates for the given topics.
    pub async fn unsubscribe(&self, topics: Vec<Topic>) -> Result<()> {
        self.inner.unsubscribe_topics(topics).await
    }

    /// Topics the client believes the service has confirmed.
    pub fn subscriptions(&self) -> Vec<Topic> {
        self.inner
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .copied()
            .collect()
    }

    /// Liveness probe against the service.
    pub async fn ping(&self) -> Result<()> {
        let request_id = self.inner.supervisor.next_request_id();
        let ack = self
            .inner
            .supervisor
            .request(
                ClientMessage::Ping { request_id },
                self.inner.timeouts.request_timeout,
            )
            .await?;
        if ack.success {
            Ok(())
        } else {
            Err(SonaLinkError::Unknown(
                ack.message.unwrap_or_else(|| "ping rejected".into()),
            ))
        }
    }

    /// Register a handler for raw inbound messages of the given kind.
    pub fn on_message(
        &self,
        kind: MessageKind,
        handler: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> HandlerId {
        self.inner.supervisor.on_message(kind, handler)
    }

    /// Remove a raw-message handler.
    pub fn off_message(&self, id: HandlerId) -> bool {
        self.inner.supervisor.off_message(id)
    }
}

impl ClientInner {
    // ── Request/response (race the push against the ack) ────────────────

    async fn fetch_device_state(&self) -> Result<DeviceState> {
        self.get_state(
            MessageKind::DeviceState,
            |request_id| ClientMessage::GetDeviceState { request_id },
            |cache| cache.get_device_state(),
        )
        .await
    }

    async fn fetch_nc_state(&self) -> Result<FeatureState> {
        self.get_state(
            MessageKind::NcState,
            |request_id| ClientMessage::GetNcState { request_id },
            |cache| cache.get_nc_state(),
        )
        .await
    }

    async fn fetch_ac_state(&self) -> Result<FeatureState> {
        self.get_state(
            MessageKind::AcState,
            |request_id| ClientMessage::GetAcState { request_id },
            |cache| cache.get_ac_state(),
        )
        .await
    }

    async fn fetch_in_call_state(&self) -> Result<InCallState> {
        self.get_state(
            MessageKind::InCallState,
            |request_id| ClientMessage::GetInCallState { request_id },
            |cache| cache.get_in_call_state(),
        )
        .await
    }

    /// The shared request/response primitive: register a one-shot
    /// listener for the domain's push, issue the request, and resolve
    /// with the cached snapshot as soon as the push lands or the ack
    /// arrives while the cache already holds a value, whichever is
    /// first. Exactly one outcome fires; the listener guard and the
    /// deadline are torn down together on every exit path.
    async fn get_state<T, Req, Read>(
        &self,
        kind: MessageKind,
        make_request: Req,
        read_cache: Read,
    ) -> Result<T>
    where
        T: Clone,
        Req: FnOnce(u64) -> ClientMessage,
        Read: Fn(&StateCache) -> Option<T>,
    {
        if !self.supervisor.is_connected() {
            return Err(SonaLinkError::ConnectionRefused(
                "not connected to the service".into(),
            ));
        }

        // The push listener goes in before the request is sent, so a
        // fast push cannot slip between the two. The cache's own handler
        // was registered at build time and therefore runs first: by the
        // time this listener fires, the snapshot is stored. The guard
        // travels with the receiver and removes the listener on every
        // exit path.
        let mut waiter = self.supervisor.once_message(kind);

        let request_id = self.supervisor.next_request_id();
        let mut ack_rx = self.supervisor.send_request(make_request(request_id)).await?;
        let mut ack_pending = true;

        let deadline = tokio::time::sleep(self.timeouts.request_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                () = &mut deadline => {
                    return Err(SonaLinkError::ConnectionTimeout(format!(
                        "no {} update within {:?}",
                        kind, self.timeouts.request_timeout
                    )));
                }
                push = &mut waiter.1 => {
                    let _ = push;
                    if let Some(value) = read_cache(&self.cache) {
                        return Ok(value);
                    }
                    // A malformed push left nothing cached; re-arm and
                    // keep waiting for a good one.
                    waiter = self.supervisor.once_message(kind);
                }
                ack = &mut ack_rx, if ack_pending => {
                    ack_pending = false;
                    match ack {
                        Ok(Ok(ack)) if ack.success => {
                            if let Some(value) = read_cache(&self.cache) {
                                return Ok(value);
                            }
                            // Acknowledged but nothing cached yet: the
                            // answer arrives as a push.
                        }
                        Ok(Ok(ack)) => {
                            return Err(SonaLinkError::Unknown(
                                ack.message.unwrap_or_else(|| "request rejected".into()),
                            ));
                        }
                        Ok(Err(err)) => return Err(err),
                        Err(_) => {
                            return Err(SonaLinkError::ConnectionRefused(
                                "connection closed before acknowledgement".into(),
                            ));
                        }
                    }
                }
            }
        }
    }

    // ── Subscriptions ───────────────────────────────────────────────────

    async fn subscribe_topics(&self, topics: Vec<Topic>) -> Result<Vec<Topic>> {
        let request_id = self.supervisor.next_request_id();
        let ack = self
            .supervisor
            .request(
                ClientMessage::Subscribe {
                    request_id,
                    topics: topics.clone(),
                },
                self.timeouts.subscribe_timeout,
            )
            .await?;
        if !ack.success {
            return Err(SonaLinkError::Unknown(
                ack.message
                    .unwrap_or_else(|| "subscribe rejected by service".into()),
            ));
        }

        // Only server-confirmed topics land in the local set; an ack
        // without an explicit list confirms everything requested.
        let confirmed = ack.subscribed.unwrap_or(topics);
        self.subscriptions
            .lock()
            .unwrap()
            .extend(confirmed.iter().copied());
        Ok(confirmed)
    }

    async fn unsubscribe_topics(&self, topics: Vec<Topic>) -> Result<()> {
        let request_id = self.supervisor.next_request_id();
        let ack = self
            .supervisor
            .request(
                ClientMessage::Unsubscribe {
                    request_id,
                    topics: topics.clone(),
                },
                self.timeouts.subscribe_timeout,
            )
            .await?;
        if !ack.success {
            return Err(SonaLinkError::Unknown(
                ack.message
                    .unwrap_or_else(|| "unsubscribe rejected by service".into()),
            ));
        }

        let mut subs = self.subscriptions.lock().unwrap();
        for topic in &topics {
            subs.remove(topic);
        }
        Ok(())
    }

    // ── Reconnection recovery ───────────────────────────────────────────

    /// Runs synchronously on every status transition, in transition
    /// order. Heavy work is spawned so the notification itself is never
    /// blocked.
    fn handle_status(self: &Arc<Self>, status: &ConnectionStatus) {
        let action = {
            let mut recovery = self.recovery.lock().unwrap();
            if recovery.last_connected && !status.connected {
                // The session dropped: stash the confirmed set (nothing
                // is confirmed anymore) and arm the recovery flag.
                recovery.last_connected = false;
                recovery.reconnecting = true;
                let mut subs = self.subscriptions.lock().unwrap();
                recovery.resubscribe_topics = subs.iter().copied().collect();
                subs.clear();
                None
            } else if !recovery.last_connected && status.connected {
                recovery.last_connected = true;
                let first_connect = !recovery.was_connected;
                recovery.was_connected = true;
                if recovery.reconnecting {
                    recovery.reconnecting = false;
                    Some(StatusAction::Recover(std::mem::take(
                        &mut recovery.resubscribe_topics,
                    )))
                } else if first_connect && self.options.auto_subscribe {
                    Some(StatusAction::AutoSubscribe)
                } else {
                    None
                }
            } else {
                None
            }
        };

        match action {
            Some(StatusAction::Recover(topics)) => {
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.run_recovery(topics).await });
            }
            Some(StatusAction::AutoSubscribe) => {
                let inner = Arc::clone(self);
                tokio::spawn(async move { inner.run_auto_subscribe().await });
            }
            None => {}
        }
    }

    /// Post-reconnect recovery: let the transport settle, re-fetch all
    /// four domains, re-subscribe the stashed topics (falling back to the
    /// configured auto-subscribe set). Entirely best-effort; failures are
    /// diagnostics, never connection failures.
    async fn run_recovery(self: Arc<Self>, stashed: Vec<Topic>) {
        log::info!("[sona-link] running post-reconnect recovery");

        for _ in 0..RECOVERY_POLL_ATTEMPTS {
            if self.supervisor.is_connected() {
                break;
            }
            tokio::time::sleep(self.timeouts.recovery_poll_interval).await;
        }

        if let Err(err) = self.fetch_device_state().await {
            self.diagnostic("device state refresh failed", &err);
        }
        if let Err(err) = self.fetch_nc_state().await {
            self.diagnostic("noise-cancellation refresh failed", &err);
        }
        if let Err(err) = self.fetch_ac_state().await {
            self.diagnostic("accent-conversion refresh failed", &err);
        }
        if let Err(err) = self.fetch_in_call_state().await {
            self.diagnostic("call status refresh failed", &err);
        }

        let topics = if stashed.is_empty() {
            self.options.auto_subscribe_topics.clone()
        } else {
            stashed
        };
        if topics.is_empty() {
            return;
        }
        match self.subscribe_topics(topics).await {
            Ok(confirmed) => log::info!("[sona-link] re-subscribed to {:?}", confirmed),
            Err(err) => self.diagnostic("re-subscribe failed", &err),
        }
    }

    async fn run_auto_subscribe(self: Arc<Self>) {
        let topics = self.options.auto_subscribe_topics.clone();
        if topics.is_empty() {
            return;
        }
        match self.subscribe_topics(topics).await {
            Ok(confirmed) => log::debug!("[sona-link] auto-subscribed to {:?}", confirmed),
            Err(err) => self.diagnostic("auto-subscribe failed", &err),
        }
    }

    fn diagnostic(&self, context: &str, err: &SonaLinkError) {
        let detail = ErrorDetail::from(err);
        log::warn!("[sona-link] {}: {}", context, detail);
        self.event_handlers.emit_error(&detail);
    }
}

/// Builder for configuring [`SonaLinkClient`] instances.
///
/// `build()` spawns the background connection task, so it must be called
/// from within a tokio runtime.
pub struct SonaLinkClientBuilder {
    options: ConnectionOptions,
    timeouts: SonaLinkTimeouts,
    event_handlers: EventHandlers,
}

impl Default for SonaLinkClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SonaLinkClientBuilder {
    fn new() -> Self {
        Self {
            options: ConnectionOptions::default(),
            timeouts: SonaLinkTimeouts::default(),
            event_handlers: EventHandlers::default(),
        }
    }

    /// Set the full connection options.
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the timeout configuration for all operations.
    pub fn timeouts(mut self, timeouts: SonaLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set the lifecycle event handlers.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Shorthand for overriding the service host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    /// Shorthand for overriding the port candidate list.
    pub fn ports(mut self, ports: Vec<u16>) -> Self {
        self.options.ports = ports;
        self
    }

    /// Shorthand for toggling automatic reconnection.
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.options.auto_reconnect = enabled;
        self
    }

    /// Shorthand for toggling auto-subscription on first connect.
    pub fn auto_subscribe(mut self, enabled: bool) -> Self {
        self.options.auto_subscribe = enabled;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<SonaLinkClient> {
        if self.options.ports.is_empty() {
            return Err(SonaLinkError::ConfigurationError(
                "at least one port candidate is required".into(),
            ));
        }
        if self.options.reconnect_backoff_factor < 1.0 {
            return Err(SonaLinkError::ConfigurationError(
                "reconnect backoff factor must be >= 1.0".into(),
            ));
        }

        let cache = Arc::new(StateCache::new(self.event_handlers.clone()));
        let supervisor = ConnectionSupervisor::new(
            self.options.clone(),
            self.timeouts.clone(),
            self.event_handlers.clone(),
        );
        wire_cache(&supervisor, &cache, &self.event_handlers);

        let inner = Arc::new(ClientInner {
            supervisor,
            cache,
            options: self.options,
            timeouts: self.timeouts,
            event_handlers: self.event_handlers.clone(),
            subscriptions: Mutex::new(BTreeSet::new()),
            recovery: Mutex::new(RecoveryState::default()),
        });

        // Internal bookkeeping first, then the user's callback, so the
        // recovery flags are current by the time the user observes a
        // transition.
        let weak = Arc::downgrade(&inner);
        inner.supervisor.on_status_change(move |status| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_status(status);
            }
        });
        let user_handlers = self.event_handlers;
        inner
            .supervisor
            .on_status_change(move |status| user_handlers.emit_status_change(status));

        Ok(SonaLinkClient { inner })
    }
}

/// Feed every state push through the cache. Registered at build time so
/// these handlers always run before any one-shot request listener.
fn wire_cache(
    supervisor: &ConnectionSupervisor,
    cache: &Arc<StateCache>,
    event_handlers: &EventHandlers,
) {
    for kind in [
        MessageKind::DeviceState,
        MessageKind::NcState,
        MessageKind::AcState,
        MessageKind::InCallState,
    ] {
        let cache = Arc::clone(cache);
        let handlers = event_handlers.clone();
        supervisor.on_message(kind, move |message| {
            let result = match message {
                ServerMessage::DeviceState { state } => {
                    cache.apply_device_state(state).map(|_| ())
                }
                ServerMessage::NcState { state } => cache.apply_nc_state(state).map(|_| ()),
                ServerMessage::AcState { state } => cache.apply_ac_state(state).map(|_| ()),
                ServerMessage::InCallState { state } => {
                    cache.apply_in_call_state(state).map(|_| ())
                }
                _ => Ok(()),
            };
            if let Err(err) = result {
                let detail = ErrorDetail::from(&err);
                log::warn!("[sona-link] dropped malformed push: {}", detail);
                handlers.emit_error(&detail);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_defaults() {
        let client = SonaLinkClient::builder().build();
        assert!(client.is_ok());
        let client = client.unwrap();
        assert!(!client.is_connected());
        assert!(client.subscriptions().is_empty());
        assert_eq!(client.status(), ConnectionStatus::disconnected());
    }

    #[tokio::test]
    async fn test_builder_rejects_empty_ports() {
        let result = SonaLinkClient::builder().ports(Vec::new()).build();
        assert!(matches!(
            result,
            Err(SonaLinkError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_builder_rejects_shrinking_backoff() {
        let result = SonaLinkClient::builder()
            .options(ConnectionOptions::new().with_reconnect_backoff_factor(0.5))
            .build();
        assert!(matches!(
            result,
            Err(SonaLinkError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_requests_fail_immediately_when_not_connected() {
        let client = SonaLinkClient::builder().build().unwrap();
        assert!(matches!(
            client.get_device_state().await,
            Err(SonaLinkError::ConnectionRefused(_))
        ));
        assert!(matches!(
            client.ping().await,
            Err(SonaLinkError::ConnectionRefused(_))
        ));
        assert!(matches!(
            client.subscribe(vec![Topic::Devices]).await,
            Err(SonaLinkError::ConnectionRefused(_))
        ));
    }

    #[tokio::test]
    async fn test_cache_reads_are_null_before_any_push() {
        let client = SonaLinkClient::builder().build().unwrap();
        assert!(client.cache().get_device_state().is_none());
        assert!(client.cache().get_nc_state().is_none());
        assert!(client.cache().get_ac_state().is_none());
        assert!(client.cache().get_in_call_state().is_none());
    }
}
