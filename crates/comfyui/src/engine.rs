//! [`GenerationEngine`] backed by a ComfyUI server.
//!
//! One WebSocket connection is kept between jobs and reopened lazily
//! after it drops. A run submits the workflow, relays `progress` frames
//! for its prompt to the observer, waits for the prompt to finish, then
//! downloads every saved image.

use async_trait::async_trait;
use futures::StreamExt;
use image::DynamicImage;
use sdbot_core::engine::{EngineError, GenerationEngine, GenerationRequest, StepObserver};
use tokio_tungstenite::tungstenite::Message;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::client::{ComfyUIClient, ComfyUIClientError, ComfyUIConnection};
use crate::messages::{parse_message, ComfyUIMessage};
use crate::workflow::{self, WorkflowSettings};

pub struct ComfyUIEngine {
    api: ComfyUIApi,
    client: ComfyUIClient,
    settings: WorkflowSettings,
    connection: Option<ComfyUIConnection>,
}

impl ComfyUIEngine {
    pub fn new(api: ComfyUIApi, client: ComfyUIClient, settings: WorkflowSettings) -> Self {
        Self {
            api,
            client,
            settings,
            connection: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    async fn ensure_connected(&mut self) -> Result<&mut ComfyUIConnection, ComfyUIClientError> {
        if self.connection.is_none() {
            self.connection = Some(self.client.connect().await?);
        }
        self.connection
            .as_mut()
            .ok_or_else(|| ComfyUIClientError::Connection("connection unavailable".to_string()))
    }

    async fn download(&self, prompt_id: &str) -> Result<Vec<DynamicImage>, EngineError> {
        let outputs = self.api.output_images(prompt_id).await.map_err(api_error)?;
        let mut images = Vec::with_capacity(outputs.len());
        for output in &outputs {
            let bytes = self.api.view(output).await.map_err(api_error)?;
            images.push(image::load_from_memory(&bytes)?);
        }
        Ok(images)
    }
}

/// Follow the socket until `prompt_id` finishes.
///
/// `Err(EngineError::Unavailable)` means the socket is gone and must be
/// reopened.
async fn follow_prompt(
    connection: &mut ComfyUIConnection,
    prompt_id: &str,
    observer: &mut dyn StepObserver,
) -> Result<(), EngineError> {
    while let Some(frame) = connection.ws_stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(frame)) => {
                tracing::warn!(?frame, "ComfyUI WebSocket closed");
                break;
            }
            // Binary frames are latent previews.
            Ok(_) => continue,
            Err(e) => {
                return Err(EngineError::Unavailable(format!("WebSocket receive error: {e}")));
            }
        };

        let Ok(message) = parse_message(&text) else {
            tracing::trace!("Ignoring unmodelled ComfyUI message");
            continue;
        };
        if !message.concerns(prompt_id) {
            continue;
        }

        match message {
            ComfyUIMessage::Progress(progress) => {
                observer.on_step(progress.value, progress.max).await;
            }
            ComfyUIMessage::Executing(executing) if executing.node.is_none() => {
                return Ok(());
            }
            ComfyUIMessage::ExecutionError(error) => {
                return Err(EngineError::Execution(format!(
                    "{} in node {}: {}",
                    error.exception_type,
                    error.node_id.as_deref().unwrap_or("?"),
                    error.exception_message,
                )));
            }
            _ => {}
        }
    }

    Err(EngineError::Unavailable("WebSocket stream ended".to_string()))
}

fn api_error(e: ComfyUIApiError) -> EngineError {
    match e {
        // The server understood the request and rejected the workflow.
        ComfyUIApiError::ApiError { status, body } if (400..500).contains(&status) => {
            EngineError::Execution(format!("ComfyUI rejected request ({status}): {body}"))
        }
        e => EngineError::Unavailable(e.to_string()),
    }
}

#[async_trait]
impl GenerationEngine for ComfyUIEngine {
    async fn generate(
        &mut self,
        request: &GenerationRequest,
        observer: &mut dyn StepObserver,
    ) -> Result<Vec<DynamicImage>, EngineError> {
        let seed = u64::from(rand::random::<u32>());
        let graph = workflow::txt2img(
            &self.settings,
            &request.prompt,
            request.steps,
            request.image_count,
            seed,
        );

        let connection = self
            .ensure_connected()
            .await
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        let client_id = connection.client_id.clone();

        let submitted = self
            .api
            .submit_workflow(&graph, &client_id)
            .await
            .map_err(api_error)?;
        tracing::info!(
            prompt_id = %submitted.prompt_id,
            queue_number = submitted.number,
            seed,
            "Workflow submitted to ComfyUI",
        );

        let Some(connection) = self.connection.as_mut() else {
            return Err(EngineError::Unavailable("connection lost".to_string()));
        };
        if let Err(e) = follow_prompt(connection, &submitted.prompt_id, observer).await {
            if matches!(e, EngineError::Unavailable(_)) {
                self.connection = None;
            }
            return Err(e);
        }

        let images = self.download(&submitted.prompt_id).await?;
        tracing::info!(
            prompt_id = %submitted.prompt_id,
            count = images.len(),
            "Generated images downloaded",
        );
        Ok(images)
    }

    async fn reset(&mut self) {
        if let Err(e) = self.api.interrupt().await {
            tracing::warn!(error = %e, "ComfyUI interrupt failed");
        }
        if self.connection.take().is_some() {
            tracing::info!("ComfyUI connection dropped after reset");
        }
    }
}
