//! API parity tests — validates that the JSON exchanged with the browser
//! shell and the host app keeps the field names both sides rely on.
//!
//! These tests serialize the shared types directly (no HTTP server needed).

use chatbridge_browser::{
    AppState, SessionSnapshot, SessionStatus, SurfaceCommand, SurfaceEvent, Transition,
    Visibility,
};
use chatbridge_protocol::{Envelope, ParsedReply, SendOptions, TurnIds};

/// Events the shell posts to `/api/bridge/events`.
#[test]
fn test_shell_event_shapes() {
    let cases = [
        (
            r#"{"type":"message","data":"{\"type\":\"CHAT_GPT_FULL_CAPACITY\"}"}"#,
            SurfaceEvent::Message {
                data: r#"{"type":"CHAT_GPT_FULL_CAPACITY"}"#.into(),
            },
        ),
        (
            r#"{"type":"load","url":"https://chat.openai.com/auth/login","loading":false}"#,
            SurfaceEvent::Load {
                url: "https://chat.openai.com/auth/login".into(),
                loading: false,
            },
        ),
        (r#"{"type":"contextTerminated"}"#, SurfaceEvent::ContextTerminated),
        (
            r#"{"type":"appStateChange","state":"background"}"#,
            SurfaceEvent::AppStateChange {
                state: AppState::Background,
            },
        ),
        (r#"{"type":"dismiss"}"#, SurfaceEvent::Dismiss),
    ];

    for (json, expected) in cases {
        let event: SurfaceEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, expected, "{}", json);
    }
}

/// Commands streamed to the shell from `/api/bridge/commands`.
#[test]
fn test_shell_command_shapes() {
    let navigate = serde_json::to_value(SurfaceCommand::Navigate {
        url: "https://chat.openai.com/chat".into(),
    })
    .unwrap();
    assert_eq!(navigate["type"], "navigate");
    assert!(navigate["url"].is_string());

    let evaluate = serde_json::to_value(SurfaceCommand::Evaluate {
        source: "true;".into(),
    })
    .unwrap();
    assert_eq!(evaluate["type"], "evaluate");
    assert_eq!(evaluate["source"], "true;");

    let animate = serde_json::to_value(SurfaceCommand::Animate {
        transition: Transition::Hide,
    })
    .unwrap();
    assert_eq!(animate["type"], "animate");
    assert_eq!(animate["transition"], "hide");
}

/// `/api/status` is the session snapshot.
#[test]
fn test_status_shape() {
    let snapshot = SessionSnapshot {
        status: SessionStatus::Authenticated,
        visibility: Visibility::Hidden,
        has_credential: true,
        authenticated_at: Some("2026-01-01T00:00:00+00:00".into()),
        epoch: 3,
        capacity_retries: 0,
    };
    let json = serde_json::to_value(&snapshot).unwrap();

    assert_eq!(json["status"], "authenticated");
    assert_eq!(json["visibility"], "hidden");
    assert!(json["hasCredential"].is_boolean());
    assert!(json["authenticatedAt"].is_string());
    assert!(json["epoch"].is_number());
    assert!(json["capacityRetries"].is_number());

    let logged_out = SessionSnapshot {
        status: SessionStatus::LoggedOut,
        has_credential: false,
        authenticated_at: None,
        ..snapshot
    };
    let json = serde_json::to_value(&logged_out).unwrap();
    assert_eq!(json["status"], "logged-out");
    assert!(json.get("authenticatedAt").is_none());
}

/// Replies and turn IDs returned to the app, and the options it sends.
#[test]
fn test_message_shapes() {
    let reply = ParsedReply {
        message: "Hi".into(),
        message_id: "m1".into(),
        conversation_id: "c1".into(),
        is_done: false,
    };
    let json = serde_json::to_value(&reply).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "message": "Hi",
            "messageId": "m1",
            "conversationId": "c1",
            "isDone": false,
        })
    );

    let turn = serde_json::to_value(TurnIds::allocate(Some("m1"))).unwrap();
    assert_eq!(turn["messageId"], "m1");
    assert!(turn["newMessageId"].is_string());

    let options: SendOptions =
        serde_json::from_str(r#"{"conversationId":"c1","messageId":"m1"}"#).unwrap();
    assert_eq!(options, SendOptions::after(&reply));

    let first_turn: SendOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(first_turn, SendOptions::default());
}

/// Envelopes posted by the injected script.
#[test]
fn test_envelope_shapes() {
    let error = Envelope::decode(
        r#"{"type":"STREAM_ERROR","payload":{"status":408,"statusText":"Request timed out"}}"#,
    )
    .unwrap();
    assert_eq!(
        error,
        Envelope::StreamError {
            status: 408,
            status_text: Some("Request timed out".into()),
        }
    );

    let raw = Envelope::decode(r#"{"type":"RAW_ACCUMULATED_RESPONSE","payload":"data: x"}"#)
        .unwrap();
    assert_eq!(
        raw,
        Envelope::RawAccumulatedResponse {
            text: "data: x".into()
        }
    );

    assert!(Envelope::decode(r#"{"type":"UNKNOWN"}"#).is_none());
}
