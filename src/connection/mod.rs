//! Connection management for the service socket.
//!
//! This module contains:
//! - [`supervisor`]: the background task that owns the socket lifecycle
//!   (port discovery, bounded connects, failure classification,
//!   reconnection scheduling, request/ack correlation)
//! - [`socket`]: low-level WebSocket helpers (URLs, bounded connect,
//!   frame parsing)
//! - [`registry`]: per-instance handler tables for raw messages and
//!   status transitions
//! - [`backoff`]: reconnect attempt counting and exponential backoff

pub(crate) mod backoff;
pub(crate) mod registry;
pub(crate) mod socket;
pub(crate) mod supervisor;

pub(crate) use registry::ListenerGuard;
pub(crate) use supervisor::ConnectionSupervisor;
