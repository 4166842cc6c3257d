//! Reply rendering and delivery.
//!
//! [`ReplyComposer`] turns progress updates and completed results into
//! platform calls. The presentation mode is fixed at construction:
//!
//! - [`ReplyMode::Card`] creates one interactive card per job and keeps
//!   updating it. If the platform refuses the card with a permission
//!   error the result is re-sent once as markdown.
//! - [`ReplyMode::Markdown`] merges the images into one picture and posts
//!   a single markdown message. Progress is only logged.

use std::sync::Arc;

use sdbot_core::imaging::{encode_png, merge_images};
use sdbot_core::modes::ReplyMode;
use sdbot_core::platform::{CardContent, ChatPlatform, PlatformError};
use sdbot_core::{CardKey, CompletedResult, CoreError, IncomingMessage, ProgressUpdate};

/// Media id of the placeholder shown in each image slot while running.
pub const PROGRESS_MEDIA_ID: &str = "@lALPDeC2-ctyLH_NAgDNAgA";

/// Title used for markdown replies.
pub const REPLY_TITLE: &str = "Stable Diffusion Bot";

/// How a completed result reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Card,
    Markdown,
    /// The card was refused and the markdown fallback succeeded.
    MarkdownFallback,
}

/// Errors from composing or sending a final reply.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("Result contains no images")]
    NoImages,

    #[error("Cannot merge {0} images into one reply")]
    UnsupportedImageCount(usize),

    #[error(transparent)]
    Encode(#[from] CoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Renders replies and sends them through a [`ChatPlatform`].
pub struct ReplyComposer {
    mode: ReplyMode,
    platform: Arc<dyn ChatPlatform>,
}

impl ReplyComposer {
    pub fn new(mode: ReplyMode, platform: Arc<dyn ChatPlatform>) -> Self {
        Self { mode, platform }
    }

    pub fn mode(&self) -> ReplyMode {
        self.mode
    }

    /// Show an intermediate progress state.
    ///
    /// In card mode `update.is_new` selects create versus update; every
    /// call for one message targets the same [`CardKey`].
    pub async fn reply_progress(
        &self,
        update: &ProgressUpdate,
        message: &IncomingMessage,
    ) -> Result<(), PlatformError> {
        tracing::info!(
            progress = %update.label(),
            elapsed_secs = update.elapsed_secs,
            conversation_type = %message.conversation_type,
            conversation_id = %message.conversation_id,
            is_new = update.is_new,
            "Generation progress",
        );

        if self.mode == ReplyMode::Markdown {
            return Ok(());
        }

        let key = CardKey::derive(message);
        let card = CardContent {
            progress: Some(update.label()),
            prompt: message.prompt().to_string(),
            images: vec![PROGRESS_MEDIA_ID.to_string(); update.image_count as usize],
            elapsed_secs: update.elapsed_secs,
        };

        if update.is_new {
            self.platform.send_card(&key, &card, message).await
        } else {
            self.platform.update_card(&key, &card).await
        }
    }

    /// Deliver a completed result.
    ///
    /// `card_may_exist` tells card mode whether a progress card for this
    /// message may already exist, so it updates rather than creates.
    pub async fn reply(
        &self,
        result: &CompletedResult,
        card_may_exist: bool,
    ) -> Result<Delivery, ReplyError> {
        if result.images.is_empty() {
            tracing::error!("Empty image list, nothing to reply");
            return Err(ReplyError::NoImages);
        }

        match self.mode {
            ReplyMode::Markdown => {
                self.reply_markdown(result).await?;
                Ok(Delivery::Markdown)
            }
            ReplyMode::Card => self.reply_card(result, card_may_exist).await,
        }
    }

    async fn reply_card(
        &self,
        result: &CompletedResult,
        card_may_exist: bool,
    ) -> Result<Delivery, ReplyError> {
        let mut media_ids = Vec::with_capacity(result.images.len());
        for image in &result.images {
            let png = encode_png(image)?;
            media_ids.push(self.platform.upload_image(png).await?);
        }

        let key = CardKey::derive(&result.message);
        let card = CardContent {
            progress: None,
            prompt: result.message.prompt().to_string(),
            images: media_ids,
            elapsed_secs: result.elapsed_secs,
        };

        let sent = if card_may_exist {
            self.platform.update_card(&key, &card).await
        } else {
            self.platform.send_card(&key, &card, &result.message).await
        };

        match sent {
            Ok(()) => Ok(Delivery::Card),
            Err(PlatformError::PermissionDenied(reason)) => {
                tracing::warn!(
                    card_key = %key,
                    reason = %reason,
                    "Card refused, downgrading reply to markdown",
                );
                self.reply_markdown(result).await?;
                Ok(Delivery::MarkdownFallback)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reply_markdown(&self, result: &CompletedResult) -> Result<(), ReplyError> {
        let merged = merge_images(&result.images)
            .ok_or(ReplyError::UnsupportedImageCount(result.images.len()))?;
        let png = encode_png(&merged)?;
        let media_id = self.platform.upload_image(png).await?;
        tracing::info!(media_id = %media_id, "Merged image uploaded");

        let text = markdown_text(result.message.prompt(), &media_id, result.elapsed_secs);
        self.platform
            .send_markdown(REPLY_TITLE, &text, &result.message)
            .await?;
        Ok(())
    }
}

/// Markdown body of a final reply.
pub fn markdown_text(prompt: &str, media_id: &str, elapsed_secs: f64) -> String {
    format!(
        "#### Prompt: {prompt}\n\n\
         ![image]({media_id})\n\n\
         > cost {elapsed_secs:.3}s\n\
         > \n\
         > Powered by Stable Diffusion\n"
    )
}
