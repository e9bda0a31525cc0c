//! Shared application state.

use std::sync::Arc;

use chatbridge_browser::{EventSender, FileCredentialStore};
use chatbridge_chat::ChatGpt;
use chatbridge_core::BridgeConfig;

use crate::relay::RelaySurface;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: BridgeConfig,
    pub chat: ChatGpt,
    /// Page → host half of the bridge, fed by the shell.
    pub events: EventSender,
    pub relay: Arc<RelaySurface>,
}

impl AppState {
    pub async fn new(config: BridgeConfig) -> Self {
        let relay = Arc::new(RelaySurface::new(config.animation_duration()));
        let store = Arc::new(FileCredentialStore::new(&config.credential_file));
        let (chat, events) = ChatGpt::start(&config, relay.clone(), store).await;

        Self {
            config,
            chat,
            events,
            relay,
        }
    }
}
