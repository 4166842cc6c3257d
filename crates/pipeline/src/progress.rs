//! Engine step callbacks to visible progress.
//!
//! One [`ProgressReporter`] lives for exactly one job. The first update it
//! emits creates the card and every later update targets that same card.
//! The terminal reply updates the card only if its create may have gone
//! through, and creates it otherwise. Reporting is best effort: failed
//! sends are logged and generation carries on.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sdbot_core::engine::StepObserver;
use sdbot_core::platform::PlatformError;
use sdbot_core::progress::step_percent;
use sdbot_core::{CompletedResult, IncomingMessage, ProgressUpdate};

use crate::composer::{Delivery, ReplyComposer, ReplyError};

pub struct ProgressReporter<'a> {
    composer: &'a ReplyComposer,
    message: &'a IncomingMessage,
    image_count: u32,
    started: Instant,
    min_interval: Duration,
    /// A create has been attempted, so later ticks update.
    card_requested: bool,
    /// The terminal reply updates rather than creates.
    card_may_exist: bool,
    last_percent: Option<u8>,
    last_emit: Option<Instant>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(
        composer: &'a ReplyComposer,
        message: &'a IncomingMessage,
        image_count: u32,
        started: Instant,
    ) -> Self {
        Self {
            composer,
            message,
            image_count,
            started,
            min_interval: Duration::ZERO,
            card_requested: false,
            card_may_exist: false,
            last_percent: None,
            last_emit: None,
        }
    }

    /// Skip non-final updates arriving sooner than `interval` after the
    /// previous one.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Handle one `(step, total_steps)` callback from the engine.
    pub async fn report(&mut self, step: i64, total_steps: i64) {
        let Some(percent) = step_percent(step, total_steps) else {
            tracing::debug!(step, total_steps, "Ignoring out-of-range progress callback");
            return;
        };

        if self.last_percent.is_some_and(|last| percent < last) {
            return;
        }
        if let Some(last_emit) = self.last_emit {
            if percent < 100 && last_emit.elapsed() < self.min_interval {
                return;
            }
        }

        let update = ProgressUpdate {
            step,
            total_steps,
            percent,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
            image_count: self.image_count,
            is_new: !self.card_requested,
        };
        self.card_requested = true;
        self.last_percent = Some(percent);
        self.last_emit = Some(Instant::now());

        let sent = self.composer.reply_progress(&update, self.message).await;
        // A create that failed in transit may still have landed.
        match &sent {
            Ok(()) => self.card_may_exist = true,
            Err(PlatformError::Request(_)) if update.is_new => self.card_may_exist = true,
            Err(_) => {}
        }
        if let Err(e) = sent {
            tracing::warn!(
                percent,
                is_new = update.is_new,
                error = %e,
                "Failed to send progress update",
            );
        }
    }

    /// Hand the completed result to the composer as the terminal update.
    pub async fn finish(self, result: &CompletedResult) -> Result<Delivery, ReplyError> {
        self.composer.reply(result, self.card_may_exist).await
    }
}

#[async_trait]
impl StepObserver for ProgressReporter<'_> {
    async fn on_step(&mut self, step: i64, total_steps: i64) {
        self.report(step, total_steps).await;
    }
}
