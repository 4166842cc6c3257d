//! ComfyUI-backed generation engine.
//!
//! [`engine::ComfyUIEngine`] implements
//! [`GenerationEngine`](sdbot_core::engine::GenerationEngine): it submits a
//! txt2img workflow over REST, follows step progress on the WebSocket,
//! then downloads and decodes the saved images.

pub mod api;
pub mod client;
pub mod engine;
pub mod messages;
pub mod workflow;

pub use engine::ComfyUIEngine;
pub use workflow::WorkflowSettings;
