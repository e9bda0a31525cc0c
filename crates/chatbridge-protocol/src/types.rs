//! Conversation types shared by the host and the injected script.

use serde::{Deserialize, Serialize};

/// Reply reconstructed from the latest segment of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReply {
    pub message: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
    #[serde(rename = "isDone")]
    pub is_done: bool,
}

/// Caller-supplied continuation of an existing conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOptions {
    #[serde(default, rename = "conversationId", skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// ID of the previous turn; becomes the new turn's parent.
    #[serde(default, rename = "messageId", skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl SendOptions {
    /// Continue after `reply`.
    pub fn after(reply: &ParsedReply) -> Self {
        Self {
            conversation_id: Some(reply.conversation_id.clone()),
            message_id: Some(reply.message_id.clone()),
        }
    }
}

/// IDs allocated for one outgoing turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnIds {
    /// Parent of the new turn.
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "newMessageId")]
    pub new_message_id: String,
}

impl TurnIds {
    /// Allocate a fresh turn. Without a parent a random one is used, which the
    /// backend treats as the root of a new thread.
    pub fn allocate(parent: Option<&str>) -> Self {
        Self {
            message_id: parent
                .map(str::to_string)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            new_message_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Arguments of the page-side `sendGptMessage` call.
#[derive(Debug, Clone, Serialize)]
pub struct StreamCommand {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    pub message: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
    #[serde(rename = "newMessageId")]
    pub new_message_id: String,
    #[serde(rename = "conversationId", skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Milliseconds.
    pub timeout: u64,
}
