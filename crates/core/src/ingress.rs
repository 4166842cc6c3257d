//! Seam between the inbound transport and the job router.

use async_trait::async_trait;

use crate::message::IncomingMessage;

/// Acknowledgement returned to the platform for one callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// HTTP-style status code (`200` on success).
    pub code: u16,
    pub message: String,
}

impl Ack {
    pub const STATUS_OK: u16 = 200;

    pub fn ok() -> Self {
        Self {
            code: Self::STATUS_OK,
            message: "OK".to_string(),
        }
    }
}

/// Handles bot-message callbacks delivered by the ingress loop.
#[async_trait]
pub trait ChatbotHandler: Send {
    async fn process(&mut self, message: IncomingMessage) -> Ack;
}
