//! Seam to the chat platform's outbound API.

use async_trait::async_trait;

use crate::card_key::CardKey;
use crate::message::IncomingMessage;

/// Platform-neutral body of a reply card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardContent {
    /// Progress label (`"42%"`) while the job is running, `None` once done.
    pub progress: Option<String>,
    pub prompt: String,
    /// Media ids in display order.
    pub images: Vec<String>,
    pub elapsed_secs: f64,
}

/// Outbound operations the reply pipeline needs from the chat platform.
///
/// Implementations must bound every call with a timeout.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Upload PNG bytes and return the platform media id.
    async fn upload_image(&self, png: Vec<u8>) -> Result<String, PlatformError>;

    /// Create the card addressed by `key` in the message's conversation.
    async fn send_card(
        &self,
        key: &CardKey,
        card: &CardContent,
        message: &IncomingMessage,
    ) -> Result<(), PlatformError>;

    /// Replace the content of an existing card.
    async fn update_card(&self, key: &CardKey, card: &CardContent) -> Result<(), PlatformError>;

    /// Post a markdown message through the message's session webhook.
    async fn send_markdown(
        &self,
        title: &str,
        text: &str,
        message: &IncomingMessage,
    ) -> Result<(), PlatformError>;
}

/// Errors from outbound platform calls.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// HTTP 401. The cached access token has been discarded.
    #[error("Unauthorized (access token reset)")]
    Unauthorized,

    /// HTTP 403, e.g. the robot lacks interactive-card permission.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any other non-2xx status.
    #[error("Platform returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A 2xx response carrying an application error code.
    #[error("Platform error {code}: {message}")]
    Api { code: i64, message: String },

    /// Network, DNS, TLS or timeout failure.
    #[error("Request failed: {0}")]
    Request(String),

    /// No access token could be obtained.
    #[error("Access token unavailable: {0}")]
    Token(String),
}
