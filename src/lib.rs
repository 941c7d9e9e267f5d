//! Rust client SDK for the Sona desktop audio service.
//!
//! Sona runs as a local service and pushes four independently tracked
//! state domains to connected clients: device pairing, noise
//! cancellation, accent conversion, and call status. This crate keeps a
//! resilient connection to that service (probing its fixed port
//! candidates in order, reconnecting with exponential backoff) and
//! mirrors the pushed state into a local cache that only notifies
//! observers when a value actually changed.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sona_link::{EventHandlers, SonaLinkClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SonaLinkClient::builder()
//!         .event_handlers(EventHandlers::new().on_status_change(|status| {
//!             println!("status: {}", status);
//!         }))
//!         .build()?;
//!
//!     client.connect().await?;
//!
//!     client.cache().on_in_call_change(|state| {
//!         println!("in call: {}", state.active);
//!     });
//!
//!     let nc = client.get_nc_state().await?;
//!     println!("nc on mic: {}", nc.microphone.enabled);
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Connection supervision**: a background task exclusively owns the
//!   socket and every timer: port discovery, bounded connects, failure
//!   classification, exponential-backoff reconnection, request/ack
//!   correlation
//! - **State cache**: normalizes possibly-partial payloads into
//!   canonical snapshots and suppresses no-op updates by value
//!   comparison; reads return the last known state even while
//!   disconnected
//! - **Client facade**: request/response calls that race a server push
//!   against its acknowledgement, subscription bookkeeping, and the
//!   post-reconnect recovery sequence (re-fetch + re-subscribe)

pub mod client;
pub mod error;
pub mod event_handlers;
pub mod models;
pub mod state;
pub mod timeouts;

mod connection;

pub use client::{SonaLinkClient, SonaLinkClientBuilder};
pub use error::{Result, SonaLinkError};
pub use event_handlers::{EventHandlers, HandlerId};
pub use models::{
    AckResponse, Channel, ClientMessage, ConnectionOptions, ConnectionStatus, DeviceSlot,
    DeviceState, ErrorDetail, FeatureState, InCallState, MessageKind, ServerMessage, Toggle,
    Topic,
};
pub use state::StateCache;
pub use timeouts::{SonaLinkTimeouts, SonaLinkTimeoutsBuilder};
