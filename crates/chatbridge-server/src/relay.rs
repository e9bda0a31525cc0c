//! Browser surface relayed to an external shell over HTTP.
//!
//! The shell (a native webview host) subscribes to the command stream,
//! applies each command to its page, and posts page events back through
//! `/api/bridge/events`.

use std::time::Duration;

use async_trait::async_trait;
use chatbridge_browser::{BrowserSurface, SurfaceCommand, Transition};
use chatbridge_core::{Error, Result};
use tokio::sync::broadcast;
use tracing::debug;

const COMMAND_BUFFER: usize = 64;

pub struct RelaySurface {
    tx: broadcast::Sender<SurfaceCommand>,
    animation_duration: Duration,
}

impl RelaySurface {
    pub fn new(animation_duration: Duration) -> Self {
        let (tx, _) = broadcast::channel(COMMAND_BUFFER);
        Self {
            tx,
            animation_duration,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SurfaceCommand> {
        self.tx.subscribe()
    }

    pub fn shell_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn relay(&self, command: SurfaceCommand) -> Result<()> {
        self.tx
            .send(command)
            .map(|shells| debug!("Relayed surface command to {} shell(s)", shells))
            .map_err(|_| Error::Surface("no browser shell attached".into()))
    }
}

#[async_trait]
impl BrowserSurface for RelaySurface {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.relay(SurfaceCommand::Navigate { url: url.into() })
    }

    async fn reload(&self) -> Result<()> {
        self.relay(SurfaceCommand::Reload)
    }

    async fn evaluate_script(&self, source: &str) -> Result<()> {
        self.relay(SurfaceCommand::Evaluate {
            source: source.into(),
        })
    }

    /// The shell runs the animation itself; this resolves once it would
    /// have finished.
    async fn animate(&self, transition: Transition) -> Result<()> {
        let relayed = self.relay(SurfaceCommand::Animate { transition });
        tokio::time::sleep(self.animation_duration).await;
        relayed
    }
}
