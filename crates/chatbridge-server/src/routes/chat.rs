//! App-facing routes — session control and prompts.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chatbridge_browser::SessionSnapshot;
use chatbridge_chat::StreamRequest;
use chatbridge_core::Error;
use chatbridge_protocol::{ParsedReply, SendOptions, TurnIds};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use super::json_event;
use crate::state::AppState;

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(get_status))
        .route("/login", post(login))
        .route("/dismiss", post(dismiss))
        .route("/flush", post(flush))
        .route("/messages", post(send_message))
        .route("/messages/stream", post(stream_message))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: String,
    #[serde(flatten)]
    pub options: SendOptions,
}

#[derive(Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    session: SessionSnapshot,
    #[serde(rename = "shellsAttached")]
    shells_attached: usize,
}

/// One event of a relayed streamed reply.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RelayEvent {
    /// IDs allocated for the turn; always first.
    Turn(TurnIds),
    Reply(ParsedReply),
    Error {
        error: String,
        #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl RelayEvent {
    fn from_error(error: &Error) -> Self {
        RelayEvent::Error {
            error: error.to_string(),
            status_code: error.status_code(),
        }
    }

    fn is_final(&self) -> bool {
        match self {
            RelayEvent::Turn(_) => false,
            RelayEvent::Reply(reply) => reply.is_done,
            RelayEvent::Error { .. } => true,
        }
    }
}

// ---------------------------------------------------------------
// Session
// ---------------------------------------------------------------

fn status_response(state: &AppState) -> Json<StatusResponse> {
    Json(StatusResponse {
        session: state.chat.snapshot(),
        shells_attached: state.relay.shell_count(),
    })
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    status_response(&state)
}

async fn login(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.chat.login().await;
    status_response(&state)
}

async fn dismiss(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.chat.dismiss().await;
    status_response(&state)
}

async fn flush(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    state.chat.flush().await;
    status_response(&state)
}

// ---------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------

/// HTTP status a failed prompt is reported with.
fn error_status(error: &Error) -> StatusCode {
    let code = error.status_code().unwrap_or(match error {
        Error::Programmer(_) => 400,
        Error::Network(_) | Error::Surface(_) => 502,
        _ => 500,
    });
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> impl IntoResponse {
    match state.chat.send_message_await(&req.message, &req.options).await {
        Ok(reply) => (StatusCode::OK, Json(serde_json::json!(reply))),
        Err(e) => {
            let status = error_status(&e);
            (
                status,
                Json(serde_json::json!({
                    "error": e.to_string(),
                    "statusCode": status.as_u16(),
                })),
            )
        }
    }
}

async fn stream_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequest>,
) -> Sse<SseStream> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let reply_tx = tx.clone();
    let request = StreamRequest::new(req.message)
        .options(req.options)
        .on_accumulated_response(move |reply| {
            let _ = reply_tx.send(RelayEvent::Reply(reply));
        })
        .on_error(move |e| {
            let _ = tx.send(RelayEvent::from_error(&e));
        });

    let started = state.chat.send_message_stream(request).await;

    let stream: SseStream = Box::pin(async_stream::stream! {
        let turn = match started {
            Ok(turn) => turn,
            Err(e) => {
                yield Ok::<_, Infallible>(json_event("error", &RelayEvent::from_error(&e)));
                return;
            }
        };
        yield Ok(json_event("turn", &RelayEvent::Turn(turn)));

        // Ends early if a newer streamed send replaces this one's handlers.
        while let Some(event) = rx.recv().await {
            let last = event.is_final();
            let name = if matches!(event, RelayEvent::Error { .. }) { "error" } else { "reply" };
            yield Ok(json_event(name, &event));
            if last {
                break;
            }
        }
        debug!("Relayed stream closed");
    });

    Sse::new(stream)
}
