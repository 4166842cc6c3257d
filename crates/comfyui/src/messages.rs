//! ComfyUI WebSocket message types and parser.
//!
//! ComfyUI sends JSON messages over WebSocket with the shape
//! `{"type": "<kind>", "data": {...}}`. Only the kinds the engine acts on
//! are modelled; anything else fails to parse and is skipped by callers.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ComfyUIMessage {
    /// Server status broadcast (queue depth).
    #[serde(rename = "status")]
    Status(StatusData),

    /// A prompt has started executing.
    #[serde(rename = "execution_start")]
    ExecutionStart(PromptRef),

    /// A node is executing, or the prompt finished when `node` is `None`.
    #[serde(rename = "executing")]
    Executing(ExecutingData),

    /// Step progress of a sampling node.
    #[serde(rename = "progress")]
    Progress(ProgressData),

    #[serde(rename = "execution_error")]
    ExecutionError(ErrorData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusData {
    pub status: QueueStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatus {
    pub exec_info: ExecInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecInfo {
    pub queue_remaining: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptRef {
    pub prompt_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutingData {
    pub node: Option<String>,
    /// Absent on older servers.
    #[serde(default)]
    pub prompt_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProgressData {
    pub value: i64,
    pub max: i64,
    #[serde(default)]
    pub prompt_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorData {
    pub prompt_id: String,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub exception_message: String,
    #[serde(default)]
    pub exception_type: String,
}

impl ComfyUIMessage {
    /// Whether this message concerns `prompt_id`. Messages without a
    /// prompt id are attributed to the running prompt.
    pub fn concerns(&self, prompt_id: &str) -> bool {
        let id = match self {
            Self::Status(_) => return false,
            Self::ExecutionStart(data) => Some(&data.prompt_id),
            Self::Executing(data) => data.prompt_id.as_ref(),
            Self::Progress(data) => data.prompt_id.as_ref(),
            Self::ExecutionError(data) => Some(&data.prompt_id),
        };
        id.map_or(true, |id| id == prompt_id)
    }
}

/// Parse a ComfyUI WebSocket text message.
///
/// Returns `Err` for malformed JSON or message kinds not modelled here.
pub fn parse_message(text: &str) -> Result<ComfyUIMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parse_status_message() {
        let json = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":3}},"sid":"abc"}}"#;
        let msg = parse_message(json).unwrap();
        assert_matches!(msg, ComfyUIMessage::Status(data) if data.status.exec_info.queue_remaining == 3);
    }

    #[test]
    fn parse_progress_with_prompt_id() {
        let json = r#"{"type":"progress","data":{"value":5,"max":20,"prompt_id":"p-1","node":"3"}}"#;
        let msg = parse_message(json).unwrap();
        assert!(msg.concerns("p-1"));
        assert!(!msg.concerns("p-2"));
        assert_matches!(msg, ComfyUIMessage::Progress(ProgressData { value: 5, max: 20, .. }));
    }

    #[test]
    fn progress_without_prompt_id_concerns_everyone() {
        let msg = parse_message(r#"{"type":"progress","data":{"value":1,"max":2}}"#).unwrap();
        assert!(msg.concerns("anything"));
    }

    #[test]
    fn parse_executing_finished() {
        let json = r#"{"type":"executing","data":{"node":null,"prompt_id":"xyz"}}"#;
        let msg = parse_message(json).unwrap();
        assert_matches!(msg, ComfyUIMessage::Executing(ExecutingData { node: None, .. }));
    }

    #[test]
    fn parse_execution_error_message() {
        let json = r#"{"type":"execution_error","data":{"prompt_id":"abc","node_id":"5","exception_message":"out of memory","exception_type":"RuntimeError"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ComfyUIMessage::ExecutionError(data) => {
                assert_eq!(data.node_id.as_deref(), Some("5"));
                assert_eq!(data.exception_message, "out of memory");
                assert_eq!(data.exception_type, "RuntimeError");
            }
            other => panic!("Expected ExecutionError, got {other:?}"),
        }
    }

    #[test]
    fn status_never_concerns_a_prompt() {
        let json = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":0}}}}"#;
        assert!(!parse_message(json).unwrap().concerns("p-1"));
    }

    #[test]
    fn unmodelled_type_returns_error() {
        assert!(parse_message(r#"{"type":"executed","data":{}}"#).is_err());
        assert!(parse_message("not json at all").is_err());
    }
}
