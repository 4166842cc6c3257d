//! Inbound chat-bot message as delivered by the DingTalk callback.

use serde::{Deserialize, Serialize};

/// Text body of a chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub content: String,
}

/// One inbound chat event. Never mutated after parsing.
///
/// Field names follow the callback JSON (`senderId`, `msgId`, ...);
/// everything except the identity fields is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    #[serde(default)]
    pub sender_id: String,
    #[serde(default)]
    pub sender_corp_id: String,
    /// Staff id used for at-mentions.
    #[serde(default)]
    pub sender_staff_id: String,
    #[serde(default)]
    pub sender_nick: String,
    #[serde(default)]
    pub conversation_id: String,
    /// `"1"` for a one-to-one chat, `"2"` for a group.
    #[serde(default)]
    pub conversation_type: String,
    #[serde(rename = "msgId", default)]
    pub message_id: String,
    #[serde(default)]
    pub robot_code: String,
    /// Pre-authorized reply URL scoped to this message.
    #[serde(default)]
    pub session_webhook: String,
    #[serde(default)]
    pub text: TextContent,
}

impl IncomingMessage {
    /// Parse the `data` payload of a bot-message callback.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    /// The generation prompt: the message text with surrounding
    /// whitespace removed.
    pub fn prompt(&self) -> &str {
        self.text.content.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_callback_payload() {
        let json = r#"{
            "conversationId": "cid123",
            "chatbotCorpId": "ding-corp",
            "msgId": "msg-1",
            "senderNick": "Alice",
            "senderStaffId": "staff-9",
            "senderCorpId": "corp-1",
            "conversationType": "2",
            "senderId": "$:LWCP_v1:$abc",
            "sessionWebhook": "https://oapi.dingtalk.com/robot/sendBySession?session=x",
            "robotCode": "robot-7",
            "msgtype": "text",
            "text": {"content": "  a red fox \n"}
        }"#;
        let msg = IncomingMessage::from_json(json).unwrap();
        assert_eq!(msg.conversation_id, "cid123");
        assert_eq!(msg.message_id, "msg-1");
        assert_eq!(msg.sender_staff_id, "staff-9");
        assert_eq!(msg.conversation_type, "2");
        assert_eq!(msg.robot_code, "robot-7");
        assert_eq!(msg.prompt(), "a red fox");
    }

    #[test]
    fn missing_text_yields_empty_prompt() {
        let msg = IncomingMessage::from_json(r#"{"msgId":"m"}"#).unwrap();
        assert_eq!(msg.prompt(), "");
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(IncomingMessage::from_json("[1,2]").is_err());
    }
}
