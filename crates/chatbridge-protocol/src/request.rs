//! Prompt request contract of the chat backend.

use chatbridge_core::Endpoints;
use serde::Serialize;

use crate::types::TurnIds;

pub const ASSISTANT_APP_ID: &str = "";
pub const REQUESTED_WITH: &str = "com.chatgpt3auth";

/// Headers for a host-side (direct) prompt request.
pub fn conversation_headers(
    endpoints: &Endpoints,
    credential: &str,
    user_agent: &str,
) -> Vec<(&'static str, String)> {
    vec![
        ("accept", "application/json".into()),
        ("x-openai-assistant-app-id", ASSISTANT_APP_ID.into()),
        ("authorization", credential.into()),
        ("content-type", "application/json".into()),
        ("origin", endpoints.host.clone()),
        ("referer", endpoints.chat_page.clone()),
        ("sec-fetch-mode", "cors".into()),
        ("sec-fetch-site", "same-origin".into()),
        ("x-requested-with", REQUESTED_WITH.into()),
        ("user-agent", user_agent.into()),
    ]
}

/// Headers the injected script sends from inside the page. The credential is
/// added there per call and the page supplies its own user agent.
pub fn streamed_header_template(endpoints: &Endpoints) -> serde_json::Map<String, serde_json::Value> {
    let mut headers = serde_json::Map::new();
    for (name, value) in conversation_headers(endpoints, "", "") {
        match name {
            "authorization" | "user-agent" => continue,
            "accept" => {
                headers.insert(name.into(), "text/event-stream".into());
            }
            _ => {
                headers.insert(name.into(), value.into());
            }
        }
    }
    headers
}

/// JSON body of `POST <prompt endpoint>`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationRequest {
    pub action: &'static str,
    pub messages: Vec<PromptMessage>,
    pub model: String,
    pub parent_message_id: String,
    /// Absent on the first turn, which starts a new thread.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub id: String,
    pub role: &'static str,
    pub content: PromptContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptContent {
    pub content_type: &'static str,
    pub parts: Vec<String>,
}

impl ConversationRequest {
    pub fn new(
        message: &str,
        turn: &TurnIds,
        conversation_id: Option<&str>,
        model: &str,
    ) -> Self {
        Self {
            action: "next",
            messages: vec![PromptMessage {
                id: turn.new_message_id.clone(),
                role: "user",
                content: PromptContent {
                    content_type: "text",
                    parts: vec![message.to_string()],
                },
            }],
            model: model.to_string(),
            parent_message_id: turn.message_id.clone(),
            conversation_id: conversation_id.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn turn() -> TurnIds {
        TurnIds {
            message_id: "parent".into(),
            new_message_id: "child".into(),
        }
    }

    #[test]
    fn test_first_turn_body_omits_conversation() {
        let body = ConversationRequest::new("Hello", &turn(), None, "text-davinci-002-render");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "action": "next",
                "messages": [{
                    "id": "child",
                    "role": "user",
                    "content": {"content_type": "text", "parts": ["Hello"]},
                }],
                "model": "text-davinci-002-render",
                "parent_message_id": "parent",
            })
        );
    }

    #[test]
    fn test_follow_up_body_carries_conversation() {
        let body = ConversationRequest::new("More", &turn(), Some("c1"), "m");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["conversation_id"], "c1");
    }

    #[test]
    fn test_direct_headers_carry_credential() {
        let endpoints = Endpoints::new("https://chat.example.com");
        let headers = conversation_headers(&endpoints, "Bearer T1", "agent");
        let get = |key: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("authorization"), Some("Bearer T1"));
        assert_eq!(get("origin"), Some("https://chat.example.com"));
        assert_eq!(get("referer"), Some("https://chat.example.com/chat"));
        assert_eq!(get("accept"), Some("application/json"));
        assert_eq!(get("user-agent"), Some("agent"));
    }

    #[test]
    fn test_streamed_template_has_no_credential() {
        let headers = streamed_header_template(&Endpoints::default());
        assert!(!headers.contains_key("authorization"));
        assert!(!headers.contains_key("user-agent"));
        assert_eq!(headers["accept"], "text/event-stream");
        assert_eq!(headers["x-requested-with"], REQUESTED_WITH);
    }
}
