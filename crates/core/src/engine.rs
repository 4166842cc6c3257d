//! Seam to the image generation engine.
//!
//! The engine is expensive to construct and not safe to share, so the
//! trait takes `&mut self`: whoever owns the value is the only caller.

use async_trait::async_trait;
use image::DynamicImage;

/// Parameters of one generation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub steps: u32,
    pub image_count: u32,
}

/// Receives step callbacks while the engine runs.
///
/// Called zero or more times per run, in increasing step order, on the
/// engine owner's task. Implementations must return quickly.
#[async_trait]
pub trait StepObserver: Send {
    async fn on_step(&mut self, step: i64, total_steps: i64);
}

/// An image generation backend.
#[async_trait]
pub trait GenerationEngine: Send {
    /// Run the model for `request`, reporting steps to `observer`, and
    /// return the images in generation order.
    async fn generate(
        &mut self,
        request: &GenerationRequest,
        observer: &mut dyn StepObserver,
    ) -> Result<Vec<DynamicImage>, EngineError>;

    /// Bring the engine back to a usable state after an abandoned run.
    async fn reset(&mut self);
}

/// Errors reported by a [`GenerationEngine`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The backend could not be reached or the connection dropped.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    /// The backend accepted the run but failed while executing it.
    #[error("Generation failed: {0}")]
    Execution(String),

    /// Fewer images came back than were requested.
    #[error("Not enough images: expected {expected}, got {actual}")]
    InsufficientImages { expected: u32, actual: usize },

    /// The run exceeded the configured deadline and was abandoned.
    #[error("Generation timed out after {0}s")]
    Timeout(u64),

    /// An output image could not be decoded.
    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}
