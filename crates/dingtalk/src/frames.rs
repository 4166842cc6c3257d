//! Stream-mode wire frames.
//!
//! The gateway pushes JSON frames of the shape
//! `{"specVersion", "type", "headers": {...}, "data": "<json string>"}`
//! and expects one acknowledgement frame per message.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Topic of bot-message callbacks.
pub const BOT_MESSAGE_TOPIC: &str = "/v1.0/im/bot/messages/get";

pub const TOPIC_PING: &str = "ping";
pub const TOPIC_DISCONNECT: &str = "disconnect";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameType {
    System,
    Event,
    Callback,
    #[serde(other)]
    Unknown,
}

/// One inbound frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamFrame {
    #[serde(default)]
    pub spec_version: String,
    #[serde(rename = "type")]
    pub kind: FrameType,
    /// Kept raw so ping acks can echo them unchanged.
    #[serde(default)]
    pub headers: Map<String, Value>,
    #[serde(default)]
    pub data: String,
}

impl StreamFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn topic(&self) -> Option<&str> {
        self.header("topic")
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header("messageId")
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(Value::as_str)
    }
}

/// Acknowledgement sent back for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AckFrame {
    pub code: u16,
    pub headers: Map<String, Value>,
    pub message: String,
    pub data: String,
}

impl AckFrame {
    pub const STATUS_OK: u16 = 200;

    /// Echo a SYSTEM ping.
    pub fn ping(frame: &StreamFrame) -> Self {
        Self {
            code: Self::STATUS_OK,
            headers: frame.headers.clone(),
            message: "OK".to_string(),
            data: frame.data.clone(),
        }
    }

    /// Acknowledge an EVENT frame.
    pub fn event(frame: &StreamFrame) -> Self {
        let data = serde_json::json!({"status": "SUCCESS", "message": "success"});
        Self::reply(frame, Self::STATUS_OK, "OK", data.to_string())
    }

    /// Acknowledge a CALLBACK frame with the handler's status.
    pub fn callback(frame: &StreamFrame, code: u16, message: &str) -> Self {
        let data = serde_json::json!({"response": message});
        Self::reply(frame, code, message, data.to_string())
    }

    pub fn to_json(&self) -> String {
        // Only strings, numbers and JSON maps: serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    fn reply(frame: &StreamFrame, code: u16, message: &str, data: String) -> Self {
        let mut headers = Map::new();
        headers.insert("contentType".into(), Value::from("application/json"));
        if let Some(id) = frame.message_id() {
            headers.insert("messageId".into(), Value::from(id));
        }
        Self {
            code,
            headers,
            message: message.to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const PING: &str = r#"{
        "specVersion": "1.0",
        "type": "SYSTEM",
        "headers": {"topic": "ping", "messageId": "m-1", "contentType": "application/json", "time": "1690000000000"},
        "data": "{\"opaque\":\"abc\"}"
    }"#;

    #[test]
    fn parses_system_ping() {
        let frame = StreamFrame::parse(PING).unwrap();
        assert_eq!(frame.kind, FrameType::System);
        assert_eq!(frame.topic(), Some(TOPIC_PING));
        assert_eq!(frame.message_id(), Some("m-1"));
        assert_eq!(frame.spec_version, "1.0");
    }

    #[test]
    fn ping_ack_echoes_headers_and_data() {
        let frame = StreamFrame::parse(PING).unwrap();
        let ack = AckFrame::ping(&frame);
        assert_eq!(ack.code, 200);
        assert_eq!(ack.headers, frame.headers);
        assert_eq!(ack.data, "{\"opaque\":\"abc\"}");
    }

    #[test]
    fn unknown_frame_type_is_tolerated() {
        let frame = StreamFrame::parse(r#"{"type":"HEARTBEAT"}"#).unwrap();
        assert_matches!(frame.kind, FrameType::Unknown);
        assert!(frame.topic().is_none());
        assert!(frame.data.is_empty());
    }

    #[test]
    fn event_ack_reports_success() {
        let frame = StreamFrame::parse(
            r#"{"type":"EVENT","headers":{"topic":"chat_update","messageId":"e-7"},"data":"{}"}"#,
        )
        .unwrap();
        let ack: Value = serde_json::from_str(&AckFrame::event(&frame).to_json()).unwrap();

        assert_eq!(ack["code"], 200);
        assert_eq!(ack["headers"]["messageId"], "e-7");
        assert_eq!(ack["headers"]["contentType"], "application/json");
        let data: Value = serde_json::from_str(ack["data"].as_str().unwrap()).unwrap();
        assert_eq!(data, serde_json::json!({"status": "SUCCESS", "message": "success"}));
    }

    #[test]
    fn callback_ack_wraps_response() {
        let frame = StreamFrame::parse(
            r#"{"type":"CALLBACK","headers":{"topic":"/v1.0/im/bot/messages/get","messageId":"c-1"},"data":"{}"}"#,
        )
        .unwrap();
        let ack = AckFrame::callback(&frame, 200, "OK");
        assert_eq!(ack.message, "OK");
        assert_eq!(ack.data, r#"{"response":"OK"}"#);
        assert_eq!(ack.headers["messageId"], "c-1");
    }
}
