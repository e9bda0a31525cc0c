//! Facade request types.

use chatbridge_core::Error;
use chatbridge_protocol::{ParsedReply, SendOptions};

pub type ReplyCallback = Box<dyn Fn(ParsedReply) + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(Error) + Send + Sync>;

/// A streamed prompt. `on_accumulated_response` is required; sending
/// without it is rejected before anything reaches the page.
pub struct StreamRequest {
    pub message: String,
    pub options: SendOptions,
    pub on_accumulated_response: Option<ReplyCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl StreamRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            options: SendOptions::default(),
            on_accumulated_response: None,
            on_error: None,
        }
    }

    pub fn options(mut self, options: SendOptions) -> Self {
        self.options = options;
        self
    }

    /// Called with the latest reply each time the stream advances. Every
    /// call supersedes the previous one.
    pub fn on_accumulated_response(
        mut self,
        callback: impl Fn(ParsedReply) + Send + Sync + 'static,
    ) -> Self {
        self.on_accumulated_response = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(Error) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("message", &self.message)
            .field("options", &self.options)
            .field("on_accumulated_response", &self.on_accumulated_response.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
