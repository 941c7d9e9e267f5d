//! Lifecycle event handlers for the sona-link client.
//!
//! Callback-based hooks for observing the client from the outside:
//!
//! - [`on_status_change`](EventHandlers::on_status_change): every
//!   connection-status transition, in the order it occurred
//! - [`on_error`](EventHandlers::on_error): diagnostic side-channel for
//!   failures that do not fail any particular call (malformed inbound
//!   payloads, panicking change handlers, recovery failures)
//! - [`on_receive`](EventHandlers::on_receive) /
//!   [`on_send`](EventHandlers::on_send): raw-frame debug hooks
//!
//! # Example
//!
//! ```rust
//! use sona_link::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_status_change(|status| {
//!         println!("status: {}", status);
//!     })
//!     .on_error(|detail| {
//!         eprintln!("diagnostic: [{}] {}", detail.code, detail.message);
//!     });
//! ```

use std::fmt;
use std::sync::Arc;

use crate::models::{ConnectionStatus, ErrorDetail};

/// Opaque identifier for a registered handler, used for removal.
///
/// Ids are unique within the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) u64);

/// Type alias for the status-change callback.
pub type OnStatusChangeCallback = Arc<dyn Fn(&ConnectionStatus) + Send + Sync>;

/// Type alias for the diagnostic error callback.
pub type OnErrorCallback = Arc<dyn Fn(&ErrorDetail) + Send + Sync>;

/// Type alias for the raw inbound-frame debug hook.
pub type OnReceiveCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Type alias for the raw outbound-frame debug hook.
pub type OnSendCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle event handlers.
///
/// All handlers are optional; register only what you need. Handlers are
/// `Send + Sync` so they can be invoked from the background connection
/// task.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_status_change: Option<OnStatusChangeCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_receive: Option<OnReceiveCallback>,
    pub(crate) on_send: Option<OnSendCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_status_change", &self.on_status_change.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_send", &self.on_send.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create a new empty `EventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback invoked on every connection-status transition.
    ///
    /// Transitions are delivered in the order they occur. Observers never
    /// need to poll [`status`](crate::SonaLinkClient::status).
    pub fn on_status_change(
        mut self,
        f: impl Fn(&ConnectionStatus) + Send + Sync + 'static,
    ) -> Self {
        self.on_status_change = Some(Arc::new(f));
        self
    }

    /// Register a callback for diagnostic errors.
    ///
    /// These never correspond to a failed call the caller could observe
    /// directly: malformed server payloads, a panicking change handler, a
    /// failed post-reconnect recovery step.
    pub fn on_error(mut self, f: impl Fn(&ErrorDetail) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Register a debug hook receiving every raw inbound frame before
    /// parsing. Not needed for normal operation.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Register a debug hook receiving every raw outbound frame.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any handler is registered.
    pub fn has_any(&self) -> bool {
        self.on_status_change.is_some()
            || self.on_error.is_some()
            || self.on_receive.is_some()
            || self.on_send.is_some()
    }

    // ---------------------------------------------------------------
    // Internal dispatch helpers
    // ---------------------------------------------------------------

    pub(crate) fn emit_status_change(&self, status: &ConnectionStatus) {
        if let Some(cb) = &self.on_status_change {
            cb(status);
        }
    }

    pub(crate) fn emit_error(&self, detail: &ErrorDetail) {
        if let Some(cb) = &self.on_error {
            cb(detail);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }

    pub(crate) fn emit_send(&self, raw: &str) {
        if let Some(cb) = &self.on_send {
            cb(raw);
        }
    }
}
