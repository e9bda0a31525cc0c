//! Envelopes posted by the page over the bridge channel.
//!
//! Wire shape is `{"type": KIND, "payload": ...}`. Anything that does not
//! decode into a known kind with a matching payload is dropped.

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub const REQUEST_INTERCEPTED_CONFIG: &str = "REQUEST_INTERCEPTED_CONFIG";
pub const RAW_ACCUMULATED_RESPONSE: &str = "RAW_ACCUMULATED_RESPONSE";
pub const STREAM_ERROR: &str = "STREAM_ERROR";
pub const CHAT_GPT_FULL_CAPACITY: &str = "CHAT_GPT_FULL_CAPACITY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Config of a fetch the page is about to issue.
    RequestInterceptedConfig { headers: Vec<(String, String)> },
    /// Accumulated text of the streamed prompt response.
    RawAccumulatedResponse { text: String },
    StreamError {
        status: u16,
        status_text: Option<String>,
    },
    /// The provider shows its "at capacity" notice instead of the login page.
    FullCapacity,
}

#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl Envelope {
    /// Decode one posted message. `None` means the message was dropped.
    pub fn decode(data: &str) -> Option<Self> {
        let raw: RawEnvelope = match serde_json::from_str(data) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Dropping unparseable envelope: {}", e);
                return None;
            }
        };

        let envelope = match raw.kind.as_str() {
            REQUEST_INTERCEPTED_CONFIG => Some(Envelope::RequestInterceptedConfig {
                headers: header_pairs(raw.payload.get("headers")),
            }),
            RAW_ACCUMULATED_RESPONSE => raw
                .payload
                .as_str()
                .map(|text| Envelope::RawAccumulatedResponse {
                    text: text.to_string(),
                }),
            STREAM_ERROR => raw
                .payload
                .get("status")
                .and_then(Value::as_u64)
                .and_then(|s| u16::try_from(s).ok())
                .map(|status| Envelope::StreamError {
                    status,
                    status_text: raw
                        .payload
                        .get("statusText")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                }),
            CHAT_GPT_FULL_CAPACITY => Some(Envelope::FullCapacity),
            _ => None,
        };

        if envelope.is_none() {
            debug!("Dropping envelope of kind {} with mismatched payload", raw.kind);
        }
        envelope
    }

    /// Serialize back to the wire shape the page posts.
    pub fn encode(&self) -> String {
        let value = match self {
            Envelope::RequestInterceptedConfig { headers } => {
                let map: serde_json::Map<String, Value> = headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                json!({"type": REQUEST_INTERCEPTED_CONFIG, "payload": {"headers": map}})
            }
            Envelope::RawAccumulatedResponse { text } => {
                json!({"type": RAW_ACCUMULATED_RESPONSE, "payload": text})
            }
            Envelope::StreamError {
                status,
                status_text,
            } => {
                let mut payload = json!({"status": status});
                if let Some(text) = status_text {
                    payload["statusText"] = json!(text);
                }
                json!({"type": STREAM_ERROR, "payload": payload})
            }
            Envelope::FullCapacity => json!({"type": CHAT_GPT_FULL_CAPACITY}),
        };
        value.to_string()
    }

    /// Authorization value of an intercepted request, if it carried one.
    pub fn authorization(&self) -> Option<&str> {
        match self {
            Envelope::RequestInterceptedConfig { headers } => headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
                .map(|(_, value)| value.as_str())
                .filter(|value| !value.is_empty()),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::RequestInterceptedConfig { .. } => REQUEST_INTERCEPTED_CONFIG,
            Envelope::RawAccumulatedResponse { .. } => RAW_ACCUMULATED_RESPONSE,
            Envelope::StreamError { .. } => STREAM_ERROR,
            Envelope::FullCapacity => CHAT_GPT_FULL_CAPACITY,
        }
    }
}

/// Fetch accepts headers as a record or as `[name, value]` pairs.
fn header_pairs(headers: Option<&Value>) -> Vec<(String, String)> {
    match headers {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|pair| {
                let name = pair.get(0)?.as_str()?;
                let value = pair.get(1)?.as_str()?;
                Some((name.to_string(), value.to_string()))
            })
            .collect(),
        _ => Vec::new(),
    }
}
