//! Bridge protocol — everything that crosses the host/page boundary.
//!
//! Covers the envelopes the page posts back to the host, the scripts the
//! host injects into the page, the prompt request contract of the chat
//! backend, and the parser for its cumulative event-stream responses.

pub mod envelope;
pub mod parser;
pub mod request;
pub mod script;
pub mod types;

pub use envelope::Envelope;
pub use parser::parse_streamed_response;
pub use request::{conversation_headers, streamed_header_template, ConversationRequest};
pub use types::*;
