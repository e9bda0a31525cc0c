//! Shell-facing routes: the bootstrap script, the command stream, and the
//! event inbox of the relayed browser surface.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chatbridge_browser::SurfaceEvent;
use futures::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use super::json_event;
use crate::state::AppState;

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bridge/script", get(get_script))
        .route("/bridge/commands", get(command_stream))
        .route("/bridge/events", post(post_event))
}

/// Script the shell must evaluate at document start on every page load.
async fn get_script(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript; charset=utf-8")],
        state.chat.bootstrap_script().to_string(),
    )
}

async fn command_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<KeepAliveStream<SseStream>> {
    let rx = state.relay.subscribe();
    info!("Browser shell attached ({} total)", state.relay.shell_count());

    let stream: SseStream = Box::pin(BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(command) => Some(Ok(json_event("command", &command))),
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            warn!("Browser shell lagged, {} command(s) dropped", missed);
            None
        }
    }));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn post_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<SurfaceEvent>,
) -> StatusCode {
    if state.events.send(event) {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::build_router;
    use crate::routes::test_support::*;
    use axum::body::Body;
    use axum::http::Request;
    use chatbridge_browser::{BrowserSurface, SessionStatus, Visibility};
    use chatbridge_protocol::Envelope;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_is_served_as_javascript() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state("https://chat.example.com", dir.path()).await;
        let app = build_router(state);

        let response = call(
            &app,
            Request::get("/api/bridge/script").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/javascript"));
        let script = body_text(response).await;
        assert!(script.contains("window.sendGptMessage"));
        assert!(script.contains("https://chat.example.com/backend-api/conversation"));
    }

    #[tokio::test]
    async fn test_commands_stream_to_attached_shell() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state("https://chat.example.com", dir.path()).await;
        let app = build_router(state.clone());

        let response = call(
            &app,
            Request::get("/api/bridge/commands").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.relay.shell_count(), 1);

        state.relay.reload().await.unwrap();

        let mut frames = response.into_body().into_data_stream();
        let frame = futures::StreamExt::next(&mut frames).await.unwrap().unwrap();
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.contains("event: command"));
        assert!(text.contains(r#"{"type":"reload"}"#));
    }

    #[tokio::test]
    async fn test_posted_events_drive_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state("https://chat.example.com", dir.path()).await;
        let app = build_router(state.clone());
        state.chat.login().await;
        assert_eq!(state.chat.status(), SessionStatus::GettingAuthToken);

        let envelope = Envelope::RequestInterceptedConfig {
            headers: vec![("Authorization".into(), "Bearer T1".into())],
        }
        .encode();
        let response = call(
            &app,
            post_json("/api/bridge/events", json!({"type": "message", "data": envelope})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(state.chat.status(), SessionStatus::Authenticated);
        assert_eq!(state.chat.visibility(), Visibility::Hidden);

        let stored = std::fs::read_to_string(dir.path().join("credential.json")).unwrap();
        assert!(stored.contains("Bearer T1"));
    }

    #[tokio::test]
    async fn test_malformed_event_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state("https://chat.example.com", dir.path()).await;
        let app = build_router(state);

        let response = call(
            &app,
            post_json("/api/bridge/events", json!({"type": "teleport"})),
        )
        .await;
        assert!(response.status().is_client_error());
    }
}
