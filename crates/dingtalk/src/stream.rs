//! Stream-mode ingress.
//!
//! DingTalk delivers bot messages over a long-lived WebSocket instead of
//! inbound HTTP callbacks. [`StreamClient::run`] opens a gateway ticket,
//! connects, answers every frame, and reconnects with backoff whenever
//! the socket drops, until the [`CancellationToken`] fires.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use sdbot_core::ingress::ChatbotHandler;
use sdbot_core::IncomingMessage;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::frames::{AckFrame, FrameType, StreamFrame, BOT_MESSAGE_TOPIC, TOPIC_DISCONNECT, TOPIC_PING};
use crate::reconnect::{connect_with_backoff, ReconnectConfig};
use crate::{Credentials, Endpoints};

pub type StreamSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const USER_AGENT: &str = concat!("sdbot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),

    #[error("Gateway returned HTTP {status}: {body}")]
    GatewayStatus { status: u16, body: String },

    #[error("Invalid stream endpoint: {0}")]
    Endpoint(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

/// Response of `gateway/connections/open`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionTicket {
    pub endpoint: String,
    pub ticket: String,
}

/// What the session loop should do after handling one frame.
#[derive(Debug, PartialEq)]
pub enum FrameAction {
    Reply(AckFrame),
    Reconnect,
    Ignore,
}

enum SessionEnd {
    Cancelled,
    Closed,
}

pub struct StreamClient {
    http: reqwest::Client,
    credentials: Credentials,
    endpoints: Endpoints,
    reconnect: ReconnectConfig,
}

impl StreamClient {
    pub fn new(
        credentials: Credentials,
        endpoints: Endpoints,
        timeout: Duration,
    ) -> Result<Self, StreamError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            credentials,
            endpoints,
            reconnect: ReconnectConfig::default(),
        })
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Request a connection ticket for bot-message callbacks and all events.
    pub async fn open_connection(&self) -> Result<ConnectionTicket, StreamError> {
        let body = serde_json::json!({
            "clientId": self.credentials.client_id,
            "clientSecret": self.credentials.client_secret,
            "subscriptions": [
                {"type": "EVENT", "topic": "*"},
                {"type": "CALLBACK", "topic": BOT_MESSAGE_TOPIC},
            ],
            "ua": USER_AGENT,
            "localIp": "",
        });

        let response = self
            .http
            .post(format!("{}/v1.0/gateway/connections/open", self.endpoints.api_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::GatewayStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Open a ticket and connect the WebSocket.
    pub async fn connect(&self) -> Result<StreamSocket, StreamError> {
        let ticket = self.open_connection().await?;
        let url = reqwest::Url::parse_with_params(&ticket.endpoint, &[("ticket", &ticket.ticket)])
            .map_err(|e| StreamError::Endpoint(format!("{}: {e}", ticket.endpoint)))?;

        let (socket, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| StreamError::WebSocket(e.to_string()))?;

        tracing::info!(endpoint = %ticket.endpoint, "Stream WebSocket connected");
        Ok(socket)
    }

    /// Serve the Stream session until `cancel` fires.
    pub async fn run<H: ChatbotHandler>(&self, handler: &mut H, cancel: &CancellationToken) {
        loop {
            let Some(socket) = connect_with_backoff(self, &self.reconnect, cancel).await else {
                return;
            };

            match session(socket, handler, cancel).await {
                SessionEnd::Cancelled => {
                    tracing::info!("Stream session stopped");
                    return;
                }
                SessionEnd::Closed => {
                    tracing::warn!("Stream session closed, reconnecting");
                }
            }
        }
    }
}

async fn session<H: ChatbotHandler>(
    socket: StreamSocket,
    handler: &mut H,
    cancel: &CancellationToken,
) -> SessionEnd {
    let (mut sink, mut source) = socket.split();

    loop {
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Cancelled;
            }
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Stream closed by server");
                    return SessionEnd::Closed;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Stream read failed");
                    return SessionEnd::Closed;
                }
                None => return SessionEnd::Closed,
            },
        };

        match handle_frame(handler, &text).await {
            FrameAction::Reply(ack) => {
                if let Err(e) = sink.send(Message::Text(ack.to_json())).await {
                    tracing::warn!(error = %e, "Failed to send ack");
                    return SessionEnd::Closed;
                }
            }
            FrameAction::Reconnect => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Closed;
            }
            FrameAction::Ignore => {}
        }
    }
}

/// Decide the response to one text frame, running the handler for
/// bot-message callbacks.
///
/// Callbacks are always acknowledged, even when their payload cannot be
/// parsed, so the gateway does not redeliver them.
pub async fn handle_frame<H: ChatbotHandler>(handler: &mut H, text: &str) -> FrameAction {
    let frame = match StreamFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable stream frame");
            return FrameAction::Ignore;
        }
    };

    match frame.kind {
        FrameType::System => match frame.topic() {
            Some(TOPIC_PING) => FrameAction::Reply(AckFrame::ping(&frame)),
            Some(TOPIC_DISCONNECT) => {
                tracing::info!("Gateway requested disconnect");
                FrameAction::Reconnect
            }
            topic => {
                tracing::debug!(?topic, "Ignoring system frame");
                FrameAction::Ignore
            }
        },
        FrameType::Event => {
            tracing::debug!(topic = ?frame.topic(), "Event received");
            FrameAction::Reply(AckFrame::event(&frame))
        }
        FrameType::Callback if frame.topic() == Some(BOT_MESSAGE_TOPIC) => {
            match IncomingMessage::from_json(&frame.data) {
                Ok(message) => {
                    let ack = handler.process(message).await;
                    FrameAction::Reply(AckFrame::callback(&frame, ack.code, &ack.message))
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = ?frame.message_id(),
                        error = %e,
                        "Unparseable bot message, acknowledging anyway",
                    );
                    FrameAction::Reply(AckFrame::callback(&frame, AckFrame::STATUS_OK, "OK"))
                }
            }
        }
        FrameType::Callback => {
            tracing::warn!(topic = ?frame.topic(), "Unhandled callback topic");
            FrameAction::Reply(AckFrame::callback(&frame, AckFrame::STATUS_OK, "OK"))
        }
        FrameType::Unknown => {
            tracing::debug!("Ignoring frame of unknown type");
            FrameAction::Ignore
        }
    }
}
