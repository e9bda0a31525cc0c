//! End-to-end facade behaviour over a recording surface and a mock backend.

use std::sync::Arc;
use std::time::Duration;

use chatbridge_browser::{
    CredentialStore, EventSender, MemoryCredentialStore, RecordingSurface, SessionStatus,
    SurfaceEvent, Visibility,
};
use chatbridge_chat::{ChatGpt, StreamRequest};
use chatbridge_core::{BridgeConfig, Error};
use chatbridge_protocol::{Envelope, ParsedReply, SendOptions};
use tokio::sync::mpsc;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    chat: ChatGpt,
    sender: EventSender,
    surface: Arc<RecordingSurface>,
    store: Arc<MemoryCredentialStore>,
}

async fn harness(host_url: &str, stored: Option<&str>) -> Harness {
    let config = BridgeConfig {
        host_url: host_url.to_string(),
        theme_switcher_delay_ms: 1,
        capacity_recheck_delay_ms: 1,
        ..BridgeConfig::default()
    };
    let surface = Arc::new(RecordingSurface::new());
    let store = Arc::new(match stored {
        Some(value) => MemoryCredentialStore::with_value(value),
        None => MemoryCredentialStore::new(),
    });
    let (chat, sender) = ChatGpt::start(&config, surface.clone(), store.clone()).await;
    Harness {
        chat,
        sender,
        surface,
        store,
    }
}

fn segment(id: &str, text: &str, end_turn: bool) -> String {
    format!(
        "data: {{\"message\":{{\"id\":\"{}\",\"content\":{{\"parts\":[\"{}\"]}},\"end_turn\":{}}},\"conversation_id\":\"c1\"}}\n\n",
        id, text, end_turn
    )
}

fn raw(text: String) -> String {
    Envelope::RawAccumulatedResponse { text }.encode()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

#[tokio::test]
async fn direct_401_logs_out_and_returns_client_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), Some("T1")).await;
    let err = h
        .chat
        .send_message_await("Hello", &SendOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Client { status: 401, .. }));
    assert_eq!(h.chat.status(), SessionStatus::LoggedOut);
    assert_eq!(h.store.get().await.unwrap().as_deref(), Some(""));
}

#[tokio::test]
async fn direct_403_reloads_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), Some("T1")).await;
    let err = h
        .chat
        .send_message_await("Hello", &SendOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Client { status: 403, .. }));
    assert_eq!(h.surface.reload_count(), 1);
}

#[tokio::test]
async fn direct_reply_threads_into_next_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "{}{}data: [DONE]\n\n",
            segment("m0", "H", false),
            segment("m1", "Hi", true)
        )))
        .mount(&server)
        .await;

    let h = harness(&server.uri(), Some("T1")).await;
    let reply = h
        .chat
        .send_message_await("Hello", &SendOptions::default())
        .await
        .unwrap();
    assert_eq!(
        reply,
        ParsedReply {
            message: "Hi".into(),
            message_id: "m1".into(),
            conversation_id: "c1".into(),
            is_done: true,
        }
    );

    h.chat
        .send_message_await("Again", &SendOptions::after(&reply))
        .await
        .unwrap();
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(body["parent_message_id"], "m1");
    assert_eq!(body["conversation_id"], "c1");
}

#[tokio::test]
async fn streamed_turns_allocate_distinct_ids_and_thread_parent() {
    let h = harness("https://chat.example.com", Some("T1")).await;

    let first = h
        .chat
        .send_message_stream(StreamRequest::new("one").on_accumulated_response(|_| {}))
        .await
        .unwrap();
    let second = h
        .chat
        .send_message_stream(
            StreamRequest::new("two")
                .options(SendOptions {
                    conversation_id: Some("c1".into()),
                    message_id: Some(first.new_message_id.clone()),
                })
                .on_accumulated_response(|_| {}),
        )
        .await
        .unwrap();

    assert_ne!(first.new_message_id, second.new_message_id);
    assert_eq!(second.message_id, first.new_message_id);

    let scripts = h.surface.scripts();
    assert_eq!(scripts.len(), 2);
    assert!(scripts[1].contains(&format!("\"messageId\":\"{}\"", first.new_message_id)));
    assert!(scripts[1].contains("\"conversationId\":\"c1\""));
}

#[tokio::test]
async fn streamed_replies_supersede_and_skip_partial_payloads() {
    let h = harness("https://chat.example.com", Some("T1")).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    h.chat
        .send_message_stream(StreamRequest::new("Hello").on_accumulated_response(move |reply| {
            let _ = tx.send(reply);
        }))
        .await
        .unwrap();

    h.sender.post_message(raw(segment("m1", "H", false)));
    h.sender.post_message(raw("data: [DONE]\n".into()));
    h.sender.post_message("not an envelope");
    h.sender.post_message(raw(format!(
        "{}{}",
        segment("m1", "H", false),
        segment("m1", "Hi", true)
    )));

    let first = rx.recv().await.unwrap();
    assert_eq!(first.message, "H");
    assert!(!first.is_done);

    let last = rx.recv().await.unwrap();
    assert_eq!(last.message, "Hi");
    assert!(last.is_done);

    // Handlers are released after the final reply.
    h.sender.post_message(raw(segment("m1", "late", true)));
    settle().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn stream_error_401_logs_out_and_reaches_error_handler() {
    let h = harness("https://chat.example.com", Some("T1")).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    h.chat
        .send_message_stream(
            StreamRequest::new("Hello")
                .on_accumulated_response(|_| {})
                .on_error(move |e| {
                    let _ = tx.send(e);
                }),
        )
        .await
        .unwrap();

    h.sender.post_message(
        Envelope::StreamError {
            status: 401,
            status_text: Some("Unauthorized".into()),
        }
        .encode(),
    );

    let err = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(err, Error::Client { status: 401, .. }));
    assert_eq!(h.chat.status(), SessionStatus::LoggedOut);
}

#[tokio::test]
async fn stream_timeout_surfaces_as_timeout() {
    let h = harness("https://chat.example.com", Some("T1")).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    h.chat
        .send_message_stream(
            StreamRequest::new("Hello")
                .on_accumulated_response(|_| {})
                .on_error(move |e| {
                    let _ = tx.send(e);
                }),
        )
        .await
        .unwrap();
    h.sender.post_message(
        Envelope::StreamError {
            status: 408,
            status_text: Some("Request timed out".into()),
        }
        .encode(),
    );

    let err = rx.recv().await.unwrap();
    assert!(matches!(err, Error::Timeout));
    assert_eq!(h.chat.status(), SessionStatus::Authenticated);
}

#[tokio::test]
async fn stream_without_callback_fails_before_any_command() {
    let h = harness("https://chat.example.com", Some("T1")).await;
    let err = h
        .chat
        .send_message_stream(StreamRequest::new("Hello").on_error(|_| {}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Programmer(_)));
    assert!(h.surface.commands().is_empty());
}

#[tokio::test]
async fn login_captures_repeated_credential_once() {
    let h = harness("https://chat.example.com", None).await;
    assert_eq!(h.chat.status(), SessionStatus::LoggedOut);

    h.chat.login().await;
    assert_eq!(h.chat.status(), SessionStatus::GettingAuthToken);
    assert_eq!(h.chat.visibility(), Visibility::Visible);

    let intercepted = Envelope::RequestInterceptedConfig {
        headers: vec![("authorization".into(), "T1".into())],
    }
    .encode();
    h.sender.post_message(intercepted.clone());
    h.sender.post_message(intercepted);
    settle().await;

    assert_eq!(h.chat.status(), SessionStatus::Authenticated);
    assert_eq!(h.chat.visibility(), Visibility::Hidden);
    assert_eq!(h.store.get().await.unwrap().as_deref(), Some("T1"));
    let navigations = h
        .surface
        .scripts()
        .iter()
        .filter(|s| s.contains("window.location.replace"))
        .count();
    assert_eq!(navigations, 1);
}

#[tokio::test]
async fn dismiss_event_returns_to_logged_out() {
    let h = harness("https://chat.example.com", None).await;
    h.chat.login().await;

    h.sender.send(SurfaceEvent::Dismiss);
    settle().await;

    assert_eq!(h.chat.status(), SessionStatus::LoggedOut);
    assert_eq!(h.chat.visibility(), Visibility::Hidden);
}

#[tokio::test]
async fn flush_then_late_capture_is_ignored() {
    let h = harness("https://chat.example.com", Some("T1")).await;
    h.chat.flush().await;

    h.sender.post_message(
        Envelope::RequestInterceptedConfig {
            headers: vec![("Authorization".into(), "T1".into())],
        }
        .encode(),
    );
    settle().await;

    assert_eq!(h.chat.status(), SessionStatus::LoggedOut);
    assert!(!h.chat.snapshot().has_credential);
}
