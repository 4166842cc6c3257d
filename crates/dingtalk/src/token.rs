//! Access-token cache.
//!
//! DingTalk access tokens live for two hours. [`AccessTokenCache`] fetches
//! one on first use and reuses it until shortly before it expires. A 401
//! from any API call should be followed by [`AccessTokenCache::reset`] so
//! the next call fetches a fresh token.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use crate::api::DingTalkApiError;
use crate::Credentials;

/// Tokens are considered stale this long before their stated expiry.
pub const EXPIRY_MARGIN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds.
    expire_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

pub struct AccessTokenCache {
    client: reqwest::Client,
    url: String,
    credentials: Credentials,
    cached: Mutex<Option<CachedToken>>,
}

impl AccessTokenCache {
    pub fn new(client: reqwest::Client, api_url: &str, credentials: Credentials) -> Self {
        Self {
            client,
            url: format!("{api_url}/v1.0/oauth2/accessToken"),
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Return the cached token, fetching a new one when missing or stale.
    ///
    /// The lock is held across the fetch so concurrent callers share one
    /// refresh.
    pub async fn get(&self) -> Result<String, DingTalkApiError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Discard the cached token.
    pub async fn reset(&self) {
        if self.cached.lock().await.take().is_some() {
            tracing::info!("Access token discarded");
        }
    }

    async fn fetch(&self) -> Result<CachedToken, DingTalkApiError> {
        let body = serde_json::json!({
            "appKey": self.credentials.client_id,
            "appSecret": self.credentials.client_secret,
        });

        let response = self.client.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(DingTalkApiError::Token(format!("HTTP {}: {body}", status.as_u16())));
        }

        let token: TokenResponse = response.json().await?;
        let lifetime = Duration::from_secs(token.expire_in).saturating_sub(EXPIRY_MARGIN);
        tracing::info!(expire_in = token.expire_in, "Access token refreshed");

        Ok(CachedToken {
            value: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}
