//! Exponential-backoff reconnection for the Stream session.
//!
//! Each attempt opens a fresh gateway ticket and WebSocket. Attempts
//! continue with growing delays until one succeeds or the
//! [`CancellationToken`] fires.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::stream::{StreamClient, StreamSocket};

pub struct ReconnectConfig {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Next delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Connect to the Stream gateway, retrying with backoff.
///
/// Returns `None` if `cancel` fires before a connection succeeds.
pub async fn connect_with_backoff(
    client: &StreamClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<StreamSocket> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Stream connect cancelled");
                return None;
            }
            result = client.connect() => {
                match result {
                    Ok(socket) => {
                        tracing::info!(attempt, "Connected to DingTalk Stream");
                        return Some(socket);
                    }
                    Err(e) => {
                        tracing::warn!(
                            attempt,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Stream connect failed",
                        );
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Credentials, Endpoints};

    #[test]
    fn backoff_sequence_caps_at_thirty_seconds() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    #[test]
    fn custom_multiplier_and_cap() {
        let config = ReconnectConfig {
            multiplier: 3.0,
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(2), &config), Duration::from_secs(6));
        assert_eq!(next_delay(Duration::from_secs(6), &config), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_connecting() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = StreamClient::new(
            Credentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
            Endpoints::single("http://127.0.0.1:9"),
            Duration::from_secs(1),
        )
        .unwrap();

        let socket = connect_with_backoff(&client, &ReconnectConfig::default(), &cancel).await;
        assert!(socket.is_none());
    }
}
