//! Per-instance handler tables for raw inbound messages and status
//! transitions.
//!
//! Every registry instance owns its own table keyed by event identifier,
//! with explicit add/remove/clear. Dispatch is synchronous and runs
//! handlers in registration order; a panicking handler is contained and
//! never prevents the remaining handlers from running.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::event_handlers::HandlerId;
use crate::models::{ConnectionStatus, MessageKind, ServerMessage};

type MessageHandler = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

struct Entry {
    id: u64,
    once: bool,
    handler: MessageHandler,
}

/// Ordered raw-message handlers keyed by message kind.
#[derive(Default)]
pub(crate) struct MessageRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<MessageKind, Vec<Entry>>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every message of the given kind.
    pub fn add(
        &self,
        kind: MessageKind,
        handler: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> HandlerId {
        self.add_entry(kind, false, Arc::new(handler))
    }

    /// Register a one-shot listener resolved through a oneshot channel.
    ///
    /// The entry is removed before the channel fires; dropping the guard
    /// removes it early if the message never arrives. This is the single
    /// race-a-timer-against-an-event primitive the request/response paths
    /// build on.
    pub fn once_channel(
        self: &Arc<Self>,
        kind: MessageKind,
    ) -> (ListenerGuard, oneshot::Receiver<ServerMessage>) {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let id = self.add_entry(
            kind,
            true,
            Arc::new(move |message: &ServerMessage| {
                if let Some(tx) = slot.lock().unwrap().take() {
                    let _ = tx.send(message.clone());
                }
            }),
        );
        (
            ListenerGuard {
                registry: Arc::clone(self),
                id,
            },
            rx,
        )
    }

    fn add_entry(&self, kind: MessageKind, once: bool, handler: MessageHandler) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(Entry { id, once, handler });
        HandlerId(id)
    }

    /// Remove a handler. Returns `false` when the id is unknown (already
    /// removed, or consumed by a one-shot dispatch).
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut entries = self.entries.lock().unwrap();
        for list in entries.values_mut() {
            if let Some(pos) = list.iter().position(|e| e.id == id.0) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove every registered handler.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Invoke all handlers registered for this message's kind, in
    /// registration order. One-shot entries are removed before their
    /// handler runs so they fire at most once on every path.
    pub fn dispatch(&self, message: &ServerMessage) {
        let kind = message.kind();
        let handlers: Vec<MessageHandler> = {
            let mut entries = self.entries.lock().unwrap();
            match entries.get_mut(&kind) {
                Some(list) => {
                    let snapshot = list.iter().map(|e| Arc::clone(&e.handler)).collect();
                    list.retain(|e| !e.once);
                    snapshot
                }
                None => return,
            }
        };
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                log::warn!("[sona-link] {} message handler panicked", kind);
            }
        }
    }
}

/// Removes its one-shot registry entry on drop, so an abandoned wait
/// (timeout, early return) never leaks a listener.
pub(crate) struct ListenerGuard {
    registry: Arc<MessageRegistry>,
    id: HandlerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

type StatusHandler = Arc<dyn Fn(&ConnectionStatus) + Send + Sync>;

/// Ordered status-transition listeners.
#[derive(Default)]
pub(crate) struct StatusRegistry {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, StatusHandler)>>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handler: impl Fn(&ConnectionStatus) + Send + Sync + 'static) -> HandlerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.lock().unwrap().push((id, Arc::new(handler)));
        HandlerId(id)
    }

    pub fn dispatch(&self, status: &ConnectionStatus) {
        let handlers: Vec<StatusHandler> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(status))).is_err() {
                log::warn!("[sona-link] status handler panicked");
            }
        }
    }
}
