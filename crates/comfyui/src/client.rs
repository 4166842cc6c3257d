//! WebSocket client for a ComfyUI instance.
//!
//! [`ComfyUIClient`] holds the WebSocket base URL. Each call to
//! [`ComfyUIClient::connect`] registers a fresh `clientId`, under which
//! ComfyUI pushes progress for the prompts submitted with that id.

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type ComfyUISocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct ComfyUIClient {
    ws_url: String,
}

/// A live WebSocket connection to a ComfyUI instance.
pub struct ComfyUIConnection {
    /// Id sent during the handshake; submit prompts with the same id.
    pub client_id: String,
    pub ws_stream: ComfyUISocket,
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}

impl ComfyUIClient {
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_url: String) -> Self {
        Self {
            ws_url: ws_url.trim_end_matches('/').to_string(),
        }
    }

    /// Derive the WebSocket base from an HTTP base URL.
    pub fn from_http_url(api_url: &str) -> Self {
        Self::new(ws_url_from_http(api_url))
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    pub async fn connect(&self) -> Result<ComfyUIConnection, ComfyUIClientError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ComfyUIClientError::Connection(format!(
                "Failed to connect to ComfyUI at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(client_id = %client_id, "Connected to ComfyUI at {}", self.ws_url);

        Ok(ComfyUIConnection {
            client_id,
            ws_stream,
        })
    }
}

/// `http://` becomes `ws://` and `https://` becomes `wss://`.
pub fn ws_url_from_http(api_url: &str) -> String {
    let url = api_url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
