//! Shared fakes for pipeline integration tests.
//!
//! [`FakePlatform`] records every outbound call; [`ScriptedEngine`] plays
//! back a fixed sequence of step callbacks and returns blank images.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use sdbot_core::engine::{EngineError, GenerationEngine, GenerationRequest, StepObserver};
use sdbot_core::modes::ReplyMode;
use sdbot_core::platform::{CardContent, ChatPlatform, PlatformError};
use sdbot_core::{CardKey, IncomingMessage, Job};
use sdbot_pipeline::ReplyComposer;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload { bytes: Vec<u8> },
    SendCard { key: String, message_id: String, card: CardContent },
    UpdateCard { key: String, card: CardContent },
    Markdown { title: String, text: String, message_id: String },
}

#[derive(Default)]
pub struct FakePlatform {
    calls: Mutex<Vec<Call>>,
    deny_cards: bool,
    /// Returned by the next `send_card`, then cleared.
    next_send_error: Mutex<Option<PlatformError>>,
    created: Mutex<HashSet<String>>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A platform whose robot lacks interactive-card permission.
    pub fn denying_cards() -> Arc<Self> {
        Arc::new(Self {
            deny_cards: true,
            ..Default::default()
        })
    }

    /// A platform whose first card create fails with `error`.
    pub fn failing_first_card(error: PlatformError) -> Arc<Self> {
        Arc::new(Self {
            next_send_error: Mutex::new(Some(error)),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn markdown_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Markdown { .. }))
            .count()
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        calls.len()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn upload_image(&self, png: Vec<u8>) -> Result<String, PlatformError> {
        let n = self.record(Call::Upload { bytes: png });
        Ok(format!("@media-{n}"))
    }

    async fn send_card(
        &self,
        key: &CardKey,
        card: &CardContent,
        message: &IncomingMessage,
    ) -> Result<(), PlatformError> {
        self.record(Call::SendCard {
            key: key.to_string(),
            message_id: message.message_id.clone(),
            card: card.clone(),
        });
        if self.deny_cards {
            return Err(PlatformError::PermissionDenied("no card permission".into()));
        }
        if let Some(error) = self.next_send_error.lock().unwrap().take() {
            return Err(error);
        }
        self.created.lock().unwrap().insert(key.to_string());
        Ok(())
    }

    async fn update_card(&self, key: &CardKey, card: &CardContent) -> Result<(), PlatformError> {
        self.record(Call::UpdateCard {
            key: key.to_string(),
            card: card.clone(),
        });
        if self.deny_cards {
            return Err(PlatformError::PermissionDenied("no card permission".into()));
        }
        if !self.created.lock().unwrap().contains(&key.to_string()) {
            return Err(PlatformError::Status {
                status: 400,
                body: "card not found".into(),
            });
        }
        Ok(())
    }

    async fn send_markdown(
        &self,
        title: &str,
        text: &str,
        message: &IncomingMessage,
    ) -> Result<(), PlatformError> {
        self.record(Call::Markdown {
            title: title.to_string(),
            text: text.to_string(),
            message_id: message.message_id.clone(),
        });
        Ok(())
    }
}

pub fn composer(mode: ReplyMode, platform: &Arc<FakePlatform>) -> ReplyComposer {
    let platform: Arc<dyn ChatPlatform> = platform.clone();
    ReplyComposer::new(mode, platform)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct ScriptedEngine {
    pub steps: Vec<(i64, i64)>,
    pub images: usize,
    pub size: (u32, u32),
    pub fail_with: Option<String>,
    pub stall: Option<Duration>,
    pub prompts: Arc<Mutex<Vec<String>>>,
    pub resets: Arc<Mutex<u32>>,
}

impl ScriptedEngine {
    pub fn new(steps: Vec<(i64, i64)>, images: usize) -> Self {
        Self {
            steps,
            images,
            size: (512, 512),
            fail_with: None,
            stall: None,
            prompts: Arc::default(),
            resets: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::new(Vec::new(), 0)
        }
    }

    pub fn stalling(duration: Duration) -> Self {
        Self {
            stall: Some(duration),
            ..Self::new(vec![(0, 50)], 1)
        }
    }
}

#[async_trait]
impl GenerationEngine for ScriptedEngine {
    async fn generate(
        &mut self,
        request: &GenerationRequest,
        observer: &mut dyn StepObserver,
    ) -> Result<Vec<DynamicImage>, EngineError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        for &(step, total) in &self.steps {
            observer.on_step(step, total).await;
        }
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if let Some(message) = &self.fail_with {
            return Err(EngineError::Execution(message.clone()));
        }
        let (w, h) = self.size;
        Ok((0..self.images)
            .map(|_| DynamicImage::new_rgb8(w, h))
            .collect())
    }

    async fn reset(&mut self) {
        *self.resets.lock().unwrap() += 1;
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub fn message(id: &str, text: &str) -> IncomingMessage {
    IncomingMessage {
        sender_id: "sender-1".into(),
        sender_corp_id: "corp-1".into(),
        sender_staff_id: "staff-1".into(),
        sender_nick: "Alice".into(),
        conversation_id: "conv-1".into(),
        conversation_type: "2".into(),
        message_id: id.into(),
        robot_code: "robot-1".into(),
        session_webhook: "https://example.invalid/session".into(),
        text: sdbot_core::message::TextContent {
            content: text.into(),
        },
    }
}

pub fn job(id: &str, text: &str, image_count: u32) -> Job {
    Job::new(message(id, text), image_count)
}

pub fn progress_labels(calls: &[Call]) -> Vec<Option<String>> {
    calls
        .iter()
        .filter_map(|c| match c {
            Call::SendCard { card, .. } | Call::UpdateCard { card, .. } => {
                Some(card.progress.clone())
            }
            _ => None,
        })
        .collect()
}
