//! Domain types and seams shared by every sdbot crate.
//!
//! Nothing in here performs I/O. The pipeline, the DingTalk client and
//! the ComfyUI engine all meet through the types and traits below:
//!
//! - [`message::IncomingMessage`] and [`job::Job`] — what flows through
//!   the queue.
//! - [`card_key::CardKey`] — stable identity of the reply card.
//! - [`engine::GenerationEngine`] / [`platform::ChatPlatform`] /
//!   [`ingress::ChatbotHandler`] — the async seams to the outside world.

pub mod card_key;
pub mod engine;
pub mod error;
pub mod imaging;
pub mod ingress;
pub mod job;
pub mod message;
pub mod modes;
pub mod platform;
pub mod progress;

pub use card_key::CardKey;
pub use error::CoreError;
pub use job::{CompletedResult, Job, JobId, ProgressUpdate};
pub use message::IncomingMessage;
