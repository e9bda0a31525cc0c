//! Session types — status, visibility, surface commands and events.

use chatbridge_core::Error;
use chatbridge_protocol::ParsedReply;
use serde::{Deserialize, Serialize};

/// Authentication status of the embedded session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Stored credential not loaded yet.
    #[serde(rename = "initializing")]
    Initializing,
    /// Login overlay shown, waiting for the page to reveal a credential.
    #[serde(rename = "getting_auth_token")]
    GettingAuthToken,
    #[serde(rename = "logged-out")]
    LoggedOut,
    #[serde(rename = "authenticated")]
    Authenticated,
}

impl SessionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::GettingAuthToken => "getting_auth_token",
            Self::LoggedOut => "logged-out",
            Self::Authenticated => "authenticated",
        }
    }

    /// States in which an intercepted credential is accepted.
    pub fn accepts_credential(&self) -> bool {
        matches!(self, Self::GettingAuthToken | Self::Authenticated)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Whether the embedded surface is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Hidden,
    /// Transient; always resolves to `Hidden` or `Visible`.
    Animating,
    Visible,
}

/// Direction of an overlay animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Show,
    Hide,
}

/// Host application lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    Active,
    Background,
    Inactive,
}

/// Command the host issues to the browser surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SurfaceCommand {
    Navigate { url: String },
    Reload,
    Evaluate { source: String },
    Animate { transition: Transition },
}

/// Event the browser surface reports to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SurfaceEvent {
    /// Raw string posted by the page (an envelope, possibly malformed).
    Message { data: String },
    NavigationStateChange { url: String, loading: bool },
    Load { url: String, loading: bool },
    /// The page's content process died.
    ContextTerminated,
    AppStateChange { state: AppState },
    /// User closed the overlay (back navigation or close button).
    Dismiss,
}

/// Result of an envelope that belongs to the outstanding streamed request.
#[derive(Debug)]
pub enum StreamUpdate {
    Reply(ParsedReply),
    Failed(Error),
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub visibility: Visibility,
    #[serde(rename = "hasCredential")]
    pub has_credential: bool,
    #[serde(skip_serializing_if = "Option::is_none", rename = "authenticatedAt")]
    pub authenticated_at: Option<String>,
    pub epoch: u64,
    #[serde(rename = "capacityRetries")]
    pub capacity_retries: u32,
}
