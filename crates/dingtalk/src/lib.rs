//! DingTalk OpenAPI client and Stream-mode ingress.
//!
//! [`api::DingTalkApi`] implements the outbound
//! [`ChatPlatform`](sdbot_core::platform::ChatPlatform) seam (token
//! cache, media upload, interactive cards, session-webhook markdown).
//! [`stream::StreamClient`] keeps the inbound WebSocket session alive and
//! feeds bot-message callbacks to a
//! [`ChatbotHandler`](sdbot_core::ingress::ChatbotHandler).

pub mod api;
pub mod card;
pub mod frames;
pub mod reconnect;
pub mod stream;
pub mod token;

/// Default OpenAPI base URL.
pub const DEFAULT_API_URL: &str = "https://api.dingtalk.com";

/// Default legacy OpenAPI base URL, still required for media upload.
pub const DEFAULT_OAPI_URL: &str = "https://oapi.dingtalk.com";

/// App credentials issued by the DingTalk developer console.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Base URLs of the two DingTalk API generations.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub api_url: String,
    pub oapi_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            oapi_url: DEFAULT_OAPI_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Point both API generations at one base URL (mock servers).
    pub fn single(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            api_url: base.clone(),
            oapi_url: base,
        }
    }
}

pub use api::{DingTalkApi, DingTalkApiError};
pub use stream::{StreamClient, StreamError};
