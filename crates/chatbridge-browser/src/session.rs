//! Session state machine — credential, status, visibility, recovery.
//!
//! All mutable session state sits behind one lock and is owned here; the
//! facade and the request coordinator reach it through an `Arc<Session>`.
//! Every transition that starts a new logical session (login, flush,
//! credential expiry) bumps `epoch`, and delayed work scheduled under an
//! older epoch is discarded.

use std::sync::Arc;
use std::time::Duration;

use chatbridge_core::{BridgeConfig, Endpoints, Error};
use chatbridge_protocol::{parse_streamed_response, script, Envelope};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::channel::BridgeChannel;
use crate::store::CredentialStore;
use crate::surface::BrowserSurface;
use crate::types::*;

struct SessionState {
    status: SessionStatus,
    visibility: Visibility,
    /// Target of the animation in flight, if any.
    pending: Option<Visibility>,
    /// Empty when no credential is held.
    credential: String,
    authenticated_at: Option<String>,
    epoch: u64,
    capacity_retries: u32,
    /// Login completed on the page before its credential was intercepted.
    awaiting_capture: bool,
}

pub struct Session {
    endpoints: Endpoints,
    theme_switcher_delay: Duration,
    capacity_recheck_delay: Duration,
    capacity_retry_limit: Option<u32>,
    channel: BridgeChannel,
    store: Arc<dyn CredentialStore>,
    state: RwLock<SessionState>,
    /// Serializes credential writes so the last write is the current value.
    persist_lock: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn new(
        config: &BridgeConfig,
        surface: Arc<dyn BrowserSurface>,
        store: Arc<dyn CredentialStore>,
    ) -> Arc<Self> {
        Arc::new(Self {
            endpoints: config.endpoints(),
            theme_switcher_delay: config.theme_switcher_delay(),
            capacity_recheck_delay: config.capacity_recheck_delay(),
            capacity_retry_limit: config.capacity_retry_limit,
            channel: BridgeChannel::new(surface),
            store,
            state: RwLock::new(SessionState {
                status: SessionStatus::Initializing,
                visibility: Visibility::Hidden,
                pending: None,
                credential: String::new(),
                authenticated_at: None,
                epoch: 0,
                capacity_retries: 0,
                awaiting_capture: false,
            }),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn status(&self) -> SessionStatus {
        self.state.read().status
    }

    pub fn visibility(&self) -> Visibility {
        self.state.read().visibility
    }

    /// Current credential; empty when none is held.
    pub fn credential(&self) -> String {
        self.state.read().credential.clone()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn channel(&self) -> &BridgeChannel {
        &self.channel
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read();
        SessionSnapshot {
            status: state.status,
            visibility: state.visibility,
            has_credential: !state.credential.is_empty(),
            authenticated_at: state.authenticated_at.clone(),
            epoch: state.epoch,
            capacity_retries: state.capacity_retries,
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state.read().epoch == epoch
    }

    // ---------------------------------------------------------------
    // Credential lifecycle
    // ---------------------------------------------------------------

    /// Leave `Initializing` with whatever the store holds.
    pub async fn load_credential(&self) -> SessionStatus {
        let stored = match self.store.get().await {
            Ok(value) => value.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to load stored credential: {}", e);
                String::new()
            }
        };

        let mut state = self.state.write();
        if state.status != SessionStatus::Initializing {
            return state.status;
        }
        if stored.is_empty() {
            state.status = SessionStatus::LoggedOut;
        } else {
            state.status = SessionStatus::Authenticated;
            state.credential = stored;
        }
        info!("Session loaded: {}", state.status);
        state.status
    }

    /// Adopt a credential seen on an intercepted request. Returns whether it
    /// was taken.
    pub async fn capture_credential(self: &Arc<Self>, token: &str) -> bool {
        {
            let mut state = self.state.write();
            if !state.status.accepts_credential() && !state.awaiting_capture {
                debug!("Ignoring intercepted credential while {}", state.status);
                return false;
            }
            if token.is_empty() || state.credential == token {
                return false;
            }
            state.awaiting_capture = false;
            state.credential = token.to_string();
            state.status = SessionStatus::Authenticated;
            state.authenticated_at = Some(chrono::Utc::now().to_rfc3339());
            state.capacity_retries = 0;
        }
        info!("Captured new credential");

        // The request that carried the credential must not finish on the page.
        self.navigate_to_login().await;
        self.persist_credential().await;

        let session = Arc::clone(self);
        tokio::spawn(async move { session.hide().await });
        true
    }

    /// Drop the credential on explicit request.
    pub async fn flush(&self) {
        self.clear_credential("flushed").await;
    }

    /// Drop the credential after the backend rejected it.
    pub async fn invalidate_credential(&self) {
        self.clear_credential("expired").await;
    }

    /// Drop the credential after the backend rejected it, unless it was
    /// already replaced since `used` was read. Returns whether it was dropped.
    pub async fn invalidate_credential_if(&self, used: &str) -> bool {
        {
            let mut state = self.state.write();
            if used.is_empty() || state.credential != used {
                debug!("Rejected credential already replaced, keeping current one");
                return false;
            }
            Self::log_out(&mut state);
        }
        info!("Credential expired, session logged out");
        self.persist_credential().await;
        true
    }

    async fn clear_credential(&self, reason: &str) {
        Self::log_out(&mut self.state.write());
        info!("Credential {}, session logged out", reason);
        self.persist_credential().await;
    }

    fn log_out(state: &mut SessionState) {
        state.credential.clear();
        state.authenticated_at = None;
        state.status = SessionStatus::LoggedOut;
        state.awaiting_capture = false;
        state.epoch += 1;
    }

    async fn persist_credential(&self) {
        let _guard = self.persist_lock.lock().await;
        let current = self.state.read().credential.clone();
        if let Err(e) = self.store.set(&current).await {
            warn!("Failed to persist credential: {}", e);
        }
    }

    /// Local recovery for a failed prompt request. The caller still sees
    /// the error.
    pub async fn recover_from(&self, error: &Error) {
        if error.is_credential_expired() {
            self.invalidate_credential().await;
        } else if error.is_session_expired() {
            info!("Provider session expired, reloading browser session");
            self.reload().await;
        }
    }

    /// Recovery for a failed request that was sent with `used_credential`.
    /// A rejection only expires the credential if it is still the one held.
    pub async fn recover_from_request(&self, error: &Error, used_credential: &str) {
        if error.is_credential_expired() {
            self.invalidate_credential_if(used_credential).await;
        } else {
            self.recover_from(error).await;
        }
    }

    // ---------------------------------------------------------------
    // Overlay
    // ---------------------------------------------------------------

    /// Show the login overlay. No-op unless logged out.
    pub async fn login(self: &Arc<Self>) {
        {
            let mut state = self.state.write();
            if state.status != SessionStatus::LoggedOut {
                debug!("Login ignored while {}", state.status);
                return;
            }
            state.status = SessionStatus::GettingAuthToken;
            state.awaiting_capture = false;
            state.epoch += 1;
        }
        info!("Login requested, showing browser session");
        self.show().await;
    }

    /// Close the overlay without completing login. Returns `false` if it
    /// was not shown.
    pub async fn dismiss(self: &Arc<Self>) -> bool {
        if !self.mark_dismissed() {
            return false;
        }
        self.hide().await;
        true
    }

    fn mark_dismissed(&self) -> bool {
        let mut state = self.state.write();
        if state.visibility == Visibility::Hidden && state.pending.is_none() {
            return false;
        }
        if state.status == SessionStatus::GettingAuthToken {
            state.status = SessionStatus::LoggedOut;
            state.epoch += 1;
        }
        state.awaiting_capture = false;
        info!("Browser session dismissed");
        true
    }

    /// The page reached the chat after login. Without a credential yet the
    /// session falls back to `LoggedOut`, still taking the first
    /// interception the chat page makes.
    fn mark_login_completed(&self) {
        let mut state = self.state.write();
        if state.status == SessionStatus::GettingAuthToken {
            state.status = SessionStatus::LoggedOut;
            state.awaiting_capture = true;
            state.epoch += 1;
            info!("Login completed before a credential was captured");
        }
    }

    async fn show(self: &Arc<Self>) {
        if !self.begin_transition(Visibility::Visible) {
            return;
        }
        if let Err(e) = self.channel.animate(Transition::Show).await {
            warn!("Show animation failed: {}", e);
        }
        if self.finish_transition(Visibility::Visible) {
            // The provider may be serving its overload page instead of login.
            self.check_full_capacity().await;
        }
    }

    pub async fn hide(&self) {
        if !self.begin_transition(Visibility::Hidden) {
            return;
        }
        if let Err(e) = self.channel.animate(Transition::Hide).await {
            warn!("Hide animation failed: {}", e);
        }
        self.finish_transition(Visibility::Hidden);
    }

    fn begin_transition(&self, target: Visibility) -> bool {
        let mut state = self.state.write();
        let settled = state.pending.is_none() && state.visibility == target;
        if settled || state.pending == Some(target) {
            return false;
        }
        state.visibility = Visibility::Animating;
        state.pending = Some(target);
        true
    }

    /// Settle an animation unless a newer one superseded it.
    fn finish_transition(&self, target: Visibility) -> bool {
        let mut state = self.state.write();
        if state.pending != Some(target) {
            return false;
        }
        state.pending = None;
        state.visibility = target;
        if target == Visibility::Hidden {
            state.capacity_retries = 0;
        }
        debug!("Browser session {:?}", target);
        true
    }

    // ---------------------------------------------------------------
    // Page commands
    // ---------------------------------------------------------------

    pub async fn reload(&self) {
        if let Err(e) = self.channel.reload().await {
            warn!("Failed to reload browser session: {}", e);
        }
    }

    pub async fn navigate_to_login(&self) {
        let source = script::navigate_script(&self.endpoints.login_page);
        if let Err(e) = self.channel.command(&source).await {
            warn!("Failed to navigate to login page: {}", e);
        }
    }

    pub async fn check_full_capacity(&self) {
        if let Err(e) = self
            .channel
            .command(&script::check_full_capacity_script())
            .await
        {
            warn!("Failed to probe for capacity notice: {}", e);
        }
    }

    /// Reload, wait, and probe again. Returns `false` once the retry limit
    /// is exhausted.
    pub fn schedule_capacity_retry(self: &Arc<Self>) -> bool {
        let epoch = {
            let mut state = self.state.write();
            if let Some(limit) = self.capacity_retry_limit {
                if state.capacity_retries >= limit {
                    warn!("Chat service still at capacity after {} retries", limit);
                    return false;
                }
            }
            state.capacity_retries += 1;
            info!(
                "Chat service at capacity, retry {} in {:?}",
                state.capacity_retries, self.capacity_recheck_delay
            );
            state.epoch
        };

        let session = Arc::clone(self);
        tokio::spawn(async move {
            session.reload().await;
            tokio::time::sleep(session.capacity_recheck_delay).await;
            if session.is_current(epoch) && session.visibility() == Visibility::Visible {
                session.check_full_capacity().await;
            }
        });
        true
    }

    fn schedule_theme_switcher_removal(self: &Arc<Self>) {
        let epoch = self.state.read().epoch;
        let session = Arc::clone(self);
        tokio::spawn(async move {
            // The affordance is not rendered yet when the load event fires.
            tokio::time::sleep(session.theme_switcher_delay).await;
            if !session.is_current(epoch) || session.visibility() != Visibility::Visible {
                return;
            }
            if let Err(e) = session
                .channel
                .command(&script::remove_theme_switcher_script())
                .await
            {
                warn!("Failed to remove theme switcher: {}", e);
            }
        });
    }

    // ---------------------------------------------------------------
    // Inbound events
    // ---------------------------------------------------------------

    /// Apply one surface event. Envelopes that belong to the outstanding
    /// streamed request come back as a `StreamUpdate`.
    pub async fn handle_event(self: &Arc<Self>, event: SurfaceEvent) -> Option<StreamUpdate> {
        match event {
            SurfaceEvent::Message { data } => {
                let envelope = Envelope::decode(&data)?;
                self.handle_envelope(envelope).await
            }
            SurfaceEvent::NavigationStateChange { url, loading } => {
                if loading
                    && url.starts_with(&self.endpoints.chat_page)
                    && self.visibility() == Visibility::Visible
                {
                    info!("Login completed, hiding browser session");
                    self.mark_login_completed();
                    let session = Arc::clone(self);
                    tokio::spawn(async move { session.hide().await });
                }
                None
            }
            SurfaceEvent::Load { url, loading } => {
                if !loading
                    && url.starts_with(&self.endpoints.login_page)
                    && self.visibility() == Visibility::Visible
                {
                    self.schedule_theme_switcher_removal();
                }
                None
            }
            SurfaceEvent::ContextTerminated => {
                warn!("Browser content process terminated, reloading");
                self.reload().await;
                None
            }
            SurfaceEvent::AppStateChange { state } => {
                if state == AppState::Active && self.visibility() == Visibility::Hidden {
                    // Refresh the provider's cookies after backgrounding.
                    self.reload().await;
                }
                None
            }
            SurfaceEvent::Dismiss => {
                if self.mark_dismissed() {
                    let session = Arc::clone(self);
                    tokio::spawn(async move { session.hide().await });
                }
                None
            }
        }
    }

    pub async fn handle_envelope(self: &Arc<Self>, envelope: Envelope) -> Option<StreamUpdate> {
        debug!("Bridge envelope {}", envelope.kind());
        match envelope {
            Envelope::RequestInterceptedConfig { .. } => {
                if let Some(token) = envelope.authorization() {
                    let token = token.to_string();
                    self.capture_credential(&token).await;
                }
                None
            }
            Envelope::RawAccumulatedResponse { text } => match parse_streamed_response(&text) {
                Ok(reply) => Some(StreamUpdate::Reply(reply)),
                Err(e) => {
                    debug!("Skipping partial stream payload: {}", e);
                    None
                }
            },
            Envelope::StreamError { status, .. } => {
                let error = Error::from_status(status);
                self.recover_from(&error).await;
                Some(StreamUpdate::Failed(error))
            }
            Envelope::FullCapacity => {
                if self.visibility() == Visibility::Visible {
                    self.schedule_capacity_retry();
                }
                None
            }
        }
    }
}
