//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps workflow submission, interruption, history retrieval and output
//! download using [`reqwest`].

use serde::Deserialize;

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by `POST /prompt` after queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
}

/// One saved output file as listed in the history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputImage {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// `output`, `temp` or `input`.
    #[serde(rename = "type", default = "default_folder_type")]
    pub folder_type: String,
}

fn default_folder_type() -> String {
    "output".to_string()
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The history has no entry for the prompt.
    #[error("No history for prompt {0}")]
    MissingHistory(String),
}

impl ComfyUIApi {
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Queue a workflow. Progress for it is pushed to the WebSocket
    /// registered under `client_id`.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Interrupt whatever is executing right now.
    pub async fn interrupt(&self) -> Result<(), ComfyUIApiError> {
        let response = self
            .client
            .post(format!("{}/interrupt", self.api_url))
            .send()
            .await?;

        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Saved images of a finished prompt, in node then batch order.
    pub async fn output_images(&self, prompt_id: &str) -> Result<Vec<OutputImage>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .send()
            .await?;

        let history: serde_json::Value = Self::parse_response(response).await?;
        let entry = history
            .get(prompt_id)
            .ok_or_else(|| ComfyUIApiError::MissingHistory(prompt_id.to_string()))?;
        Ok(collect_output_images(entry))
    }

    /// Download one output file.
    pub async fn view(&self, image: &OutputImage) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.folder_type.as_str()),
            ])
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Walk `outputs.<node>.images[]` of one history entry. Nodes are visited
/// in ascending numeric id order so results are deterministic.
fn collect_output_images(entry: &serde_json::Value) -> Vec<OutputImage> {
    let Some(outputs) = entry.get("outputs").and_then(|o| o.as_object()) else {
        return Vec::new();
    };

    let mut nodes: Vec<(&String, &serde_json::Value)> = outputs.iter().collect();
    nodes.sort_by_key(|(id, _)| id.parse::<u64>().unwrap_or(u64::MAX));

    nodes
        .into_iter()
        .filter_map(|(_, output)| output.get("images").and_then(|i| i.as_array()))
        .flatten()
        .filter_map(|image| serde_json::from_value::<OutputImage>(image.clone()).ok())
        .filter(|image| image.folder_type == "output")
        .collect()
}
