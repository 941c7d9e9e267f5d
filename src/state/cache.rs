//! Locally cached service state with change detection.
//!
//! Owns the four independently tracked domains (device pairing, noise
//! cancellation, accent conversion, call status). For each inbound
//! payload the cache normalizes it into a canonical snapshot, stores it
//! unconditionally, and notifies that domain's change handlers only when
//! no prior snapshot existed or the stored value actually changed.
//! Comparison is by value (`updated_at` never participates), so replays
//! and timestamp-only refreshes are suppressed.
//!
//! The cache knows nothing about sockets: it consumes raw payloads and
//! plain reads return the last stored snapshot regardless of
//! connectivity.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::event_handlers::{EventHandlers, HandlerId};
use crate::models::{DeviceState, ErrorDetail, FeatureState, InCallState};

type ChangeHandler<T> = Arc<dyn Fn(&T) + Send + Sync>;
type HandlerList<T> = Mutex<Vec<(u64, ChangeHandler<T>)>>;

/// Cached snapshots of the four server-pushed state domains.
pub struct StateCache {
    devices: RwLock<Option<DeviceState>>,
    nc: RwLock<Option<FeatureState>>,
    ac: RwLock<Option<FeatureState>>,
    in_call: RwLock<Option<InCallState>>,

    next_handler_id: AtomicU64,
    device_handlers: HandlerList<DeviceState>,
    nc_handlers: HandlerList<FeatureState>,
    ac_handlers: HandlerList<FeatureState>,
    in_call_handlers: HandlerList<InCallState>,

    /// Diagnostic side-channel for contained handler panics.
    event_handlers: EventHandlers,
}

impl StateCache {
    pub(crate) fn new(event_handlers: EventHandlers) -> Self {
        Self {
            devices: RwLock::new(None),
            nc: RwLock::new(None),
            ac: RwLock::new(None),
            in_call: RwLock::new(None),
            next_handler_id: AtomicU64::new(0),
            device_handlers: Mutex::new(Vec::new()),
            nc_handlers: Mutex::new(Vec::new()),
            ac_handlers: Mutex::new(Vec::new()),
            in_call_handlers: Mutex::new(Vec::new()),
            event_handlers,
        }
    }

    // ── Apply (normalize, store, maybe notify) ──────────────────────────

    /// Apply a raw device-state payload. Returns whether a change
    /// notification was fired.
    pub fn apply_device_state(&self, raw: &JsonValue) -> Result<bool> {
        let next = DeviceState::from_raw(raw)?;
        let changed = {
            let mut slot = self.devices.write().unwrap();
            let changed = match slot.as_ref() {
                Some(prev) => !prev.same_devices(&next),
                None => true,
            };
            *slot = Some(next.clone());
            changed
        };
        if changed {
            self.dispatch(&self.device_handlers, &next, "device");
        }
        Ok(changed)
    }

    /// Apply a raw noise-cancellation payload.
    pub fn apply_nc_state(&self, raw: &JsonValue) -> Result<bool> {
        Self::apply_feature(&self.nc, raw).map(|(changed, next)| {
            if changed {
                self.dispatch(&self.nc_handlers, &next, "noise-cancellation");
            }
            changed
        })
    }

    /// Apply a raw accent-conversion payload.
    pub fn apply_ac_state(&self, raw: &JsonValue) -> Result<bool> {
        Self::apply_feature(&self.ac, raw).map(|(changed, next)| {
            if changed {
                self.dispatch(&self.ac_handlers, &next, "accent-conversion");
            }
            changed
        })
    }

    /// Apply a raw call-status payload.
    pub fn apply_in_call_state(&self, raw: &JsonValue) -> Result<bool> {
        let next = InCallState::from_raw(raw)?;
        let changed = {
            let mut slot = self.in_call.write().unwrap();
            let changed = match slot.as_ref() {
                Some(prev) => !prev.same_values(&next),
                None => true,
            };
            *slot = Some(next.clone());
            changed
        };
        if changed {
            self.dispatch(&self.in_call_handlers, &next, "in-call");
        }
        Ok(changed)
    }

    fn apply_feature(
        slot: &RwLock<Option<FeatureState>>,
        raw: &JsonValue,
    ) -> Result<(bool, FeatureState)> {
        let next = FeatureState::from_raw(raw)?;
        let mut guard = slot.write().unwrap();
        let changed = match guard.as_ref() {
            Some(prev) => !prev.same_values(&next),
            None => true,
        };
        *guard = Some(next.clone());
        Ok((changed, next))
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Last stored device snapshot, or `None` if never received.
    pub fn get_device_state(&self) -> Option<DeviceState> {
        self.devices.read().unwrap().clone()
    }

    /// Last stored noise-cancellation snapshot.
    pub fn get_nc_state(&self) -> Option<FeatureState> {
        self.nc.read().unwrap().clone()
    }

    /// Last stored accent-conversion snapshot.
    pub fn get_ac_state(&self) -> Option<FeatureState> {
        self.ac.read().unwrap().clone()
    }

    /// Last stored call-status snapshot.
    pub fn get_in_call_state(&self) -> Option<InCallState> {
        self.in_call.read().unwrap().clone()
    }

    /// Drop all four snapshots. The next payload for each domain fires a
    /// change notification again.
    pub(crate) fn reset(&self) {
        *self.devices.write().unwrap() = None;
        *self.nc.write().unwrap() = None;
        *self.ac.write().unwrap() = None;
        *self.in_call.write().unwrap() = None;
    }

    // ── Change-handler registry ─────────────────────────────────────────

    /// Register a device-change handler.
    pub fn on_device_change(&self, f: impl Fn(&DeviceState) + Send + Sync + 'static) -> HandlerId {
        self.add(&self.device_handlers, Arc::new(f))
    }

    /// Register a noise-cancellation change handler.
    pub fn on_nc_change(&self, f: impl Fn(&FeatureState) + Send + Sync + 'static) -> HandlerId {
        self.add(&self.nc_handlers, Arc::new(f))
    }

    /// Register an accent-conversion change handler.
    pub fn on_ac_change(&self, f: impl Fn(&FeatureState) + Send + Sync + 'static) -> HandlerId {
        self.add(&self.ac_handlers, Arc::new(f))
    }

    /// Register a call-status change handler.
    pub fn on_in_call_change(
        &self,
        f: impl Fn(&InCallState) + Send + Sync + 'static,
    ) -> HandlerId {
        self.add(&self.in_call_handlers, Arc::new(f))
    }

    /// Remove a change handler from whichever domain it was registered
    /// on. Returns `false` when the id is unknown.
    pub fn remove_change_handler(&self, id: HandlerId) -> bool {
        Self::remove_from(&self.device_handlers, id)
            || Self::remove_from(&self.nc_handlers, id)
            || Self::remove_from(&self.ac_handlers, id)
            || Self::remove_from(&self.in_call_handlers, id)
    }

    /// Remove every registered change handler.
    pub fn clear_change_handlers(&self) {
        self.device_handlers.lock().unwrap().clear();
        self.nc_handlers.lock().unwrap().clear();
        self.ac_handlers.lock().unwrap().clear();
        self.in_call_handlers.lock().unwrap().clear();
    }

    fn add<T>(&self, list: &HandlerList<T>, handler: ChangeHandler<T>) -> HandlerId {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed) + 1;
        list.lock().unwrap().push((id, handler));
        HandlerId(id)
    }

    fn remove_from<T>(list: &HandlerList<T>, id: HandlerId) -> bool {
        let mut list = list.lock().unwrap();
        match list.iter().position(|(entry_id, _)| HandlerId(*entry_id) == id) {
            Some(pos) => {
                list.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Notify a domain's handlers synchronously, in registration order.
    /// A panicking handler is contained and reported as a diagnostic; the
    /// remaining handlers still run.
    fn dispatch<T>(&self, list: &HandlerList<T>, value: &T, domain: &str) {
        let handlers: Vec<ChangeHandler<T>> = list
            .lock()
            .unwrap()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(value))).is_err() {
                let detail = ErrorDetail::new(
                    "UNKNOWN_ERROR",
                    format!("{} change handler panicked", domain),
                );
                log::warn!("[sona-link] {}", detail);
                self.event_handlers.emit_error(&detail);
            }
        }
    }
}
