//! WebSocket handshake for the appointment hub.
//!
//! [`HubClient`] holds the hub endpoint; call [`HubClient::connect`]
//! to establish a live [`HubSocket`] authenticated with the caller's
//! bearer token.

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// The raw WebSocket stream type used throughout the hub layer.
pub type HubStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Configuration handle for the appointment hub endpoint.
#[derive(Debug, Clone)]
pub struct HubClient {
    hub_url: String,
}

/// A freshly established hub connection, before any day is joined.
pub struct HubSocket {
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: HubStream,
}

impl HubClient {
    /// Create a new client targeting the hub endpoint.
    ///
    /// * `hub_url` - WebSocket URL, e.g. `wss://host/hubs/appointments`.
    pub fn new(hub_url: String) -> Self {
        Self { hub_url }
    }

    /// Hub endpoint URL.
    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }

    /// Connect to the hub.
    ///
    /// The bearer token rides as an `access_token` query parameter, the
    /// conventional carrier for WebSocket handshakes where headers are
    /// not reliably available.
    pub async fn connect(&self, token: &str) -> Result<HubSocket, HubClientError> {
        let url = format!("{}?access_token={}", self.hub_url, token);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            HubClientError::Connection(format!(
                "Failed to connect to appointment hub at {}: {e}",
                self.hub_url
            ))
        })?;

        tracing::info!("Connected to appointment hub at {}", self.hub_url);

        Ok(HubSocket { ws_stream })
    }
}

/// Errors from the hub handshake.
#[derive(Debug, thiserror::Error)]
pub enum HubClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
