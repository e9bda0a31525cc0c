//! Parser for the prompt endpoint's `text/event-stream` body.
//!
//! The backend streams cumulative snapshots: every `data: ` segment carries
//! the whole reply so far, so only the last well-formed segment matters.

use chatbridge_core::{Error, Result};
use serde::Deserialize;

use crate::types::ParsedReply;

pub const DATA_DELIMITER: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Deserialize)]
struct Segment {
    message: SegmentMessage,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Deserialize)]
struct SegmentMessage {
    id: String,
    content: SegmentContent,
    #[serde(default)]
    end_turn: Option<bool>,
}

#[derive(Deserialize)]
struct SegmentContent {
    #[serde(default)]
    parts: Vec<serde_json::Value>,
}

/// Parse the accumulated raw text of a streamed response.
///
/// Returns `Error::Parse` when no meaningful segment is present (for example
/// a payload holding only the `[DONE]` sentinel) or the last one is malformed.
/// Streaming callers treat that as "no data yet".
pub fn parse_streamed_response(raw: &str) -> Result<ParsedReply> {
    let last = raw
        .split(DATA_DELIMITER)
        .map(|chunk| chunk.replace('\n', ""))
        .filter(|chunk| !chunk.is_empty() && chunk != DONE_SENTINEL)
        .last()
        .ok_or_else(|| Error::Parse("no data segments in response".into()))?;

    let segment: Segment =
        serde_json::from_str(&last).map_err(|e| Error::Parse(e.to_string()))?;

    let message = match segment.message.content.parts.first() {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => return Err(Error::Parse("message has no content parts".into())),
    };

    Ok(ParsedReply {
        message,
        message_id: segment.message.id,
        conversation_id: segment.conversation_id.unwrap_or_default(),
        is_done: segment.message.end_turn == Some(true),
    })
}
