//! Host-side control surface of the embedded browser.

use async_trait::async_trait;
use chatbridge_core::Result;
use parking_lot::Mutex;

use crate::types::{SurfaceCommand, Transition};

/// Whatever actually hosts the page: a native webview, a relayed shell, a
/// headless browser. Events flow back separately through an `EventSender`.
#[async_trait]
pub trait BrowserSurface: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Reload the page from scratch.
    async fn reload(&self) -> Result<()>;

    /// Evaluate a script in the page context. Fire-and-forget: results only
    /// come back as posted envelopes.
    async fn evaluate_script(&self, source: &str) -> Result<()>;

    /// Move the overlay on or off screen; resolves when the animation ends.
    async fn animate(&self, transition: Transition) -> Result<()>;
}

/// Surface that only records what it was asked to do.
#[derive(Default)]
pub struct RecordingSurface {
    commands: Mutex<Vec<SurfaceCommand>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<SurfaceCommand> {
        self.commands.lock().clone()
    }

    /// Scripts evaluated so far, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                SurfaceCommand::Evaluate { source } => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn reload_count(&self) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::Reload))
            .count()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    fn record(&self, command: SurfaceCommand) {
        self.commands.lock().push(command);
    }
}

#[async_trait]
impl BrowserSurface for RecordingSurface {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.record(SurfaceCommand::Navigate { url: url.into() });
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.record(SurfaceCommand::Reload);
        Ok(())
    }

    async fn evaluate_script(&self, source: &str) -> Result<()> {
        self.record(SurfaceCommand::Evaluate {
            source: source.into(),
        });
        Ok(())
    }

    async fn animate(&self, transition: Transition) -> Result<()> {
        self.record(SurfaceCommand::Animate { transition });
        Ok(())
    }
}
