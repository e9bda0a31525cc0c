//! Request coordinator — direct and streamed prompt requests.
//!
//! Direct requests run on the host and return the full reply. Streamed
//! requests are handed to the page's `sendGptMessage`, which reuses the
//! page's cookies and reports progress as envelopes; their timeout is
//! enforced inside the page and comes back as `STREAM_ERROR{408}`.

use std::sync::Arc;
use std::time::Duration;

use chatbridge_browser::Session;
use chatbridge_core::{BridgeConfig, Error, Result};
use chatbridge_protocol::{
    conversation_headers, parse_streamed_response, script, ConversationRequest, ParsedReply,
    SendOptions, StreamCommand, TurnIds,
};
use reqwest::Client;
use tracing::{debug, warn};

pub struct Coordinator {
    client: Client,
    session: Arc<Session>,
    model: String,
    user_agent: String,
    request_timeout: Duration,
    streamed_request_timeout: Duration,
}

impl Coordinator {
    pub fn new(config: &BridgeConfig, session: Arc<Session>) -> Self {
        Self {
            client: Client::new(),
            session,
            model: config.model.clone(),
            user_agent: config.user_agent.clone(),
            request_timeout: config.request_timeout(),
            streamed_request_timeout: config.streamed_request_timeout(),
        }
    }

    /// Send a prompt from the host and wait for the complete reply.
    pub async fn send_direct(&self, message: &str, options: &SendOptions) -> Result<ParsedReply> {
        self.send_direct_with_timeout(message, options, self.request_timeout)
            .await
    }

    pub async fn send_direct_with_timeout(
        &self,
        message: &str,
        options: &SendOptions,
        timeout: Duration,
    ) -> Result<ParsedReply> {
        let turn = TurnIds::allocate(options.message_id.as_deref());
        let body = ConversationRequest::new(
            message,
            &turn,
            options.conversation_id.as_deref(),
            &self.model,
        );
        let endpoints = self.session.endpoints();
        let credential = self.session.credential();

        let mut request = self.client.post(&endpoints.prompt_endpoint);
        for (name, value) in conversation_headers(endpoints, &credential, &self.user_agent) {
            request = request.header(name, value);
        }
        let request = request.json(&body);

        debug!("Direct prompt, parent {}", turn.message_id);

        // Dropping the exchange on timeout aborts the underlying request.
        let outcome = match tokio::time::timeout(timeout, exchange(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Direct prompt timed out after {:?}", timeout);
                Err(Error::Timeout)
            }
        };

        if let Err(e) = &outcome {
            self.session.recover_from_request(e, &credential).await;
        }
        outcome
    }

    /// Ask the page to send a prompt and stream the reply back over the
    /// bridge. Returns the IDs allocated for the turn.
    pub async fn send_streamed(&self, message: &str, options: &SendOptions) -> Result<TurnIds> {
        let turn = TurnIds::allocate(options.message_id.as_deref());
        let command = StreamCommand {
            access_token: self.session.credential(),
            message: message.to_string(),
            message_id: turn.message_id.clone(),
            new_message_id: turn.new_message_id.clone(),
            conversation_id: options.conversation_id.clone(),
            timeout: self.streamed_request_timeout.as_millis() as u64,
        };

        debug!("Streamed prompt, parent {}", turn.message_id);
        self.session
            .channel()
            .command(&script::send_message_script(&command))
            .await?;
        Ok(turn)
    }
}

async fn exchange(request: reqwest::RequestBuilder) -> Result<ParsedReply> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(Error::from_status(status.as_u16()));
    }

    let text = response
        .text()
        .await
        .map_err(|e| Error::Network(e.to_string()))?;
    parse_streamed_response(&text)
}
