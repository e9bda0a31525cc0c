//! Bridge channel between the host and the page.
//!
//! Host → page: evaluate generated script snippets on the surface.
//! Page → host: posted strings and surface lifecycle events, delivered in
//! posting order to a single inbox. Nothing correlates a command with a
//! later envelope; the receiver infers it from envelope kind and status.

use std::sync::Arc;

use chatbridge_core::Result;
use tokio::sync::mpsc;
use tracing::debug;

use crate::surface::BrowserSurface;
use crate::types::{SurfaceEvent, Transition};

/// Create the page → host half of the channel.
pub fn event_channel() -> (EventSender, EventInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventInbox { rx })
}

/// Handed to whatever hosts the page so it can report back.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<SurfaceEvent>,
}

impl EventSender {
    /// Returns `false` once the receiving session is gone.
    pub fn send(&self, event: SurfaceEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Forward a raw string posted by the page.
    pub fn post_message(&self, data: impl Into<String>) -> bool {
        self.send(SurfaceEvent::Message { data: data.into() })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct EventInbox {
    rx: mpsc::UnboundedReceiver<SurfaceEvent>,
}

impl EventInbox {
    pub async fn recv(&mut self) -> Option<SurfaceEvent> {
        self.rx.recv().await
    }
}

/// Host → page half of the channel.
#[derive(Clone)]
pub struct BridgeChannel {
    surface: Arc<dyn BrowserSurface>,
}

impl BridgeChannel {
    pub fn new(surface: Arc<dyn BrowserSurface>) -> Self {
        Self { surface }
    }

    /// Evaluate a generated snippet in the page.
    pub async fn command(&self, script: &str) -> Result<()> {
        debug!("Bridge command ({} bytes)", script.len());
        self.surface.evaluate_script(script).await
    }

    pub async fn reload(&self) -> Result<()> {
        self.surface.reload().await
    }

    pub async fn animate(&self, transition: Transition) -> Result<()> {
        self.surface.animate(transition).await
    }
}
