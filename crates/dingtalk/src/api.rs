//! DingTalk OpenAPI client.
//!
//! [`DingTalkApi`] wraps the handful of endpoints the bot needs and maps
//! their failures onto [`PlatformError`] for the reply pipeline. Every
//! request shares one [`reqwest::Client`] with a request timeout.

use std::time::Duration;

use async_trait::async_trait;
use sdbot_core::platform::{CardContent, ChatPlatform, PlatformError};
use sdbot_core::{CardKey, IncomingMessage};
use serde::Deserialize;

use crate::card::{self, CARD_TEMPLATE_ID};
use crate::token::AccessTokenCache;
use crate::{Credentials, Endpoints};

/// Header carrying the access token on new-style OpenAPI calls.
pub const ACCESS_TOKEN_HEADER: &str = "x-acs-dingtalk-access-token";

/// Default timeout for a single outbound request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DingTalkApiError {
    /// The HTTP request itself failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// HTTP 401. The cached token has already been discarded.
    #[error("Unauthorized")]
    Unauthorized,

    /// HTTP 403.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Any other non-2xx status.
    #[error("DingTalk API error ({status}): {body}")]
    Status { status: u16, body: String },

    /// A 2xx legacy response with a non-zero `errcode`.
    #[error("DingTalk error {code}: {message}")]
    Api { code: i64, message: String },

    /// Fetching the access token failed.
    #[error("Access token request failed: {0}")]
    Token(String),
}

impl From<DingTalkApiError> for PlatformError {
    fn from(e: DingTalkApiError) -> Self {
        match e {
            DingTalkApiError::Request(e) => PlatformError::Request(e.to_string()),
            DingTalkApiError::Unauthorized => PlatformError::Unauthorized,
            DingTalkApiError::Forbidden(body) => PlatformError::PermissionDenied(body),
            DingTalkApiError::Status { status, body } => PlatformError::Status { status, body },
            DingTalkApiError::Api { code, message } => PlatformError::Api { code, message },
            DingTalkApiError::Token(msg) => PlatformError::Token(msg),
        }
    }
}

/// Legacy `media/upload` response.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
    #[serde(default)]
    media_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct DingTalkApi {
    client: reqwest::Client,
    endpoints: Endpoints,
    tokens: AccessTokenCache,
}

impl DingTalkApi {
    pub fn new(
        credentials: Credentials,
        endpoints: Endpoints,
        timeout: Duration,
    ) -> Result<Self, DingTalkApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, credentials, endpoints))
    }

    /// Build on an existing client (shared connection pool).
    pub fn with_client(client: reqwest::Client, credentials: Credentials, endpoints: Endpoints) -> Self {
        let tokens = AccessTokenCache::new(client.clone(), &endpoints.api_url, credentials);
        Self {
            client,
            endpoints,
            tokens,
        }
    }

    /// Upload PNG bytes as an image and return its media id.
    pub async fn upload_media(&self, png: Vec<u8>) -> Result<String, DingTalkApiError> {
        let token = self.tokens.get().await?;
        let part = reqwest::multipart::Part::bytes(png)
            .file_name("image.png")
            .mime_str("image/png")?;
        let form = reqwest::multipart::Form::new().part("media", part);

        let response = self
            .client
            .post(format!("{}/media/upload", self.endpoints.oapi_url))
            .query(&[("access_token", token.as_str()), ("type", "image")])
            .multipart(form)
            .send()
            .await?;

        let upload: UploadResponse = self.ensure_success(response).await?.json().await?;
        if upload.errcode != 0 {
            return Err(DingTalkApiError::Api {
                code: upload.errcode,
                message: upload.errmsg,
            });
        }
        upload.media_id.ok_or_else(|| DingTalkApiError::Api {
            code: 0,
            message: "upload response has no media_id".to_string(),
        })
    }

    /// Create an interactive card in the message's conversation,
    /// at-mentioning the sender.
    pub async fn send_interactive_card(
        &self,
        key: &CardKey,
        card: &CardContent,
        message: &IncomingMessage,
    ) -> Result<(), DingTalkApiError> {
        let token = self.tokens.get().await?;
        let at_users = serde_json::json!([{
            "nickName": message.sender_nick,
            "userId": message.sender_staff_id,
        }]);
        let body = serde_json::json!({
            "cardTemplateId": CARD_TEMPLATE_ID,
            "openConversationId": message.conversation_id,
            "cardBizId": key.as_str(),
            "robotCode": message.robot_code,
            "cardData": card::render(card).to_string(),
            "sendOptions": {
                "atUserListJson": at_users.to_string(),
            },
        });

        let response = self
            .client
            .post(format!(
                "{}/v1.0/im/v1.0/robot/interactiveCards/send",
                self.endpoints.api_url
            ))
            .header(ACCESS_TOKEN_HEADER, token)
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response).await?;
        Ok(())
    }

    /// Replace the data of the card addressed by `key`.
    pub async fn update_interactive_card(
        &self,
        key: &CardKey,
        card: &CardContent,
    ) -> Result<(), DingTalkApiError> {
        let token = self.tokens.get().await?;
        let body = serde_json::json!({
            "cardBizId": key.as_str(),
            "cardData": card::render(card).to_string(),
        });

        let response = self
            .client
            .put(format!("{}/v1.0/im/robots/interactiveCards", self.endpoints.api_url))
            .header(ACCESS_TOKEN_HEADER, token)
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response).await?;
        Ok(())
    }

    /// Post markdown through the message's session webhook. The webhook
    /// is pre-authorized, so no token is attached.
    pub async fn send_session_markdown(
        &self,
        title: &str,
        text: &str,
        message: &IncomingMessage,
    ) -> Result<(), DingTalkApiError> {
        let body = serde_json::json!({
            "msgtype": "markdown",
            "markdown": {
                "title": title,
                "text": text,
            },
            "at": {
                "atUserIds": [message.sender_staff_id],
            },
        });

        let response = self
            .client
            .post(&message.session_webhook)
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response).await?;
        Ok(())
    }

    // ---- private helpers ----

    /// Map non-2xx statuses to errors. A 401 also discards the cached
    /// token so the next call fetches a fresh one.
    async fn ensure_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, DingTalkApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        match status.as_u16() {
            401 => {
                tracing::warn!(body = %body, "DingTalk rejected access token");
                self.tokens.reset().await;
                Err(DingTalkApiError::Unauthorized)
            }
            403 => Err(DingTalkApiError::Forbidden(body)),
            status => Err(DingTalkApiError::Status { status, body }),
        }
    }
}

#[async_trait]
impl ChatPlatform for DingTalkApi {
    async fn upload_image(&self, png: Vec<u8>) -> Result<String, PlatformError> {
        Ok(self.upload_media(png).await?)
    }

    async fn send_card(
        &self,
        key: &CardKey,
        card: &CardContent,
        message: &IncomingMessage,
    ) -> Result<(), PlatformError> {
        self.send_interactive_card(key, card, message)
            .await
            .map_err(|e| {
                tracing::error!(card_key = %key, error = %e, "Send card failed");
                e.into()
            })
    }

    async fn update_card(&self, key: &CardKey, card: &CardContent) -> Result<(), PlatformError> {
        self.update_interactive_card(key, card).await.map_err(|e| {
            tracing::error!(card_key = %key, error = %e, "Update card failed");
            e.into()
        })
    }

    async fn send_markdown(
        &self,
        title: &str,
        text: &str,
        message: &IncomingMessage,
    ) -> Result<(), PlatformError> {
        self.send_session_markdown(title, text, message)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Reply markdown failed");
                e.into()
            })
    }
}
