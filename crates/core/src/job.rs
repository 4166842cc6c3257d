//! Units of work and the values they produce.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use uuid::Uuid;

use crate::message::IncomingMessage;

/// Identifier used to correlate log lines for one job.
pub type JobId = Uuid;

/// One request to generate images from a chat prompt.
///
/// Owned by the queue while pending and by the worker while running.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub message: IncomingMessage,
    pub created_at: DateTime<Utc>,
    pub image_count: u32,
}

impl Job {
    pub fn new(message: IncomingMessage, image_count: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            created_at: Utc::now(),
            image_count,
        }
    }

    pub fn prompt(&self) -> &str {
        self.message.prompt()
    }
}

/// A progress notification derived from one engine step callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub step: i64,
    pub total_steps: i64,
    /// Always within `0..=100`.
    pub percent: u8,
    pub elapsed_secs: f64,
    pub image_count: u32,
    /// `true` for the first update of a job (card creation).
    pub is_new: bool,
}

impl ProgressUpdate {
    /// Human-readable progress label, e.g. `"42%"`.
    pub fn label(&self) -> String {
        format!("{}%", self.percent)
    }
}

/// Terminal value of a successful job.
#[derive(Debug, Clone)]
pub struct CompletedResult {
    pub images: Vec<DynamicImage>,
    pub elapsed_secs: f64,
    pub message: IncomingMessage,
}
