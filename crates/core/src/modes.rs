//! Startup-time mode selection.
//!
//! Both enums are parsed once from configuration; the pipeline picks its
//! strategy from them at construction time.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// How results are presented in the chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplyMode {
    /// Updatable interactive card, falls back to markdown on 403.
    #[default]
    Card,
    /// A single markdown message with a merged image.
    Markdown,
}

/// Where a job runs relative to the ingress context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Enqueue and let the dedicated worker task run it.
    #[default]
    Async,
    /// Run the job inline before acknowledging the message.
    Sync,
}

/// Valid textual values for [`ReplyMode`].
pub const VALID_REPLY_MODES: &[&str] = &["card", "markdown"];

/// Valid textual values for [`DispatchMode`].
pub const VALID_DISPATCH_MODES: &[&str] = &["async", "sync"];

impl FromStr for ReplyMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(Self::Card),
            "markdown" => Ok(Self::Markdown),
            other => Err(CoreError::Validation(format!(
                "Invalid reply mode '{other}'. Must be one of: {}",
                VALID_REPLY_MODES.join(", ")
            ))),
        }
    }
}

impl FromStr for DispatchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "async" => Ok(Self::Async),
            "sync" => Ok(Self::Sync),
            other => Err(CoreError::Validation(format!(
                "Invalid dispatch mode '{other}'. Must be one of: {}",
                VALID_DISPATCH_MODES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for ReplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Card => "card",
            Self::Markdown => "markdown",
        })
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Async => "async",
            Self::Sync => "sync",
        })
    }
}
