//! WebSocket client for the appointment hub.
//!
//! Provides typed wire messages, the connect handshake, exponential
//! backoff reconnection, and [`HubConnection`] -- the live channel that
//! carries lock/unlock/confirm commands and delivers slot push events.

pub mod client;
pub mod connection;
pub mod messages;
pub mod reconnect;

pub use client::{HubClient, HubClientError};
pub use connection::HubConnection;
pub use reconnect::ReconnectConfig;
