//! `ChatGpt` — the public facade.
//!
//! One actor task drains the surface's event inbox in posting order, feeds
//! each event to the session, and forwards stream updates to whichever
//! handlers the most recent streamed send registered.

use std::sync::Arc;

use chatbridge_browser::{
    event_channel, BrowserSurface, CredentialStore, EventInbox, EventSender, Session,
    SessionSnapshot, SessionStatus, StreamUpdate, Visibility,
};
use chatbridge_core::{BridgeConfig, Error, Result};
use chatbridge_protocol::{script, ParsedReply, SendOptions, TurnIds};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;
use crate::types::{ErrorCallback, ReplyCallback, StreamRequest};

struct StreamHandlers {
    on_reply: ReplyCallback,
    on_error: Option<ErrorCallback>,
}

/// Handlers of the outstanding streamed request. Replaced wholesale by
/// every new streamed send.
type HandlerSlot = Arc<RwLock<Option<Arc<StreamHandlers>>>>;

struct Inner {
    session: Arc<Session>,
    coordinator: Coordinator,
    bootstrap: String,
    handlers: HandlerSlot,
    actor: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct ChatGpt {
    inner: Arc<Inner>,
}

impl ChatGpt {
    /// Load the stored credential and start the event actor. The returned
    /// sender belongs to whatever hosts the page; it must also install
    /// [`ChatGpt::bootstrap_script`] into every document it loads.
    pub async fn start(
        config: &BridgeConfig,
        surface: Arc<dyn BrowserSurface>,
        store: Arc<dyn CredentialStore>,
    ) -> (Self, EventSender) {
        let session = Session::new(config, surface, store);
        session.load_credential().await;

        let (sender, inbox) = event_channel();
        let handlers: HandlerSlot = Arc::new(RwLock::new(None));
        let actor = tokio::spawn(run_actor(session.clone(), handlers.clone(), inbox));

        let inner = Inner {
            coordinator: Coordinator::new(config, session.clone()),
            bootstrap: script::bootstrap_script(session.endpoints(), &config.model),
            session,
            handlers,
            actor: Mutex::new(Some(actor)),
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            sender,
        )
    }

    // ---------------------------------------------------------------
    // Session
    // ---------------------------------------------------------------

    /// Show the login overlay. No-op unless logged out.
    pub async fn login(&self) {
        self.inner.session.login().await;
    }

    /// Forget the credential. The next prompt needs a fresh login.
    pub async fn flush(&self) {
        self.inner.session.flush().await;
    }

    /// Close the overlay as if the user backed out of it.
    pub async fn dismiss(&self) -> bool {
        self.inner.session.dismiss().await
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.session.status()
    }

    pub fn visibility(&self) -> Visibility {
        self.inner.session.visibility()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.snapshot()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    /// Script the embedder evaluates at document start.
    pub fn bootstrap_script(&self) -> &str {
        &self.inner.bootstrap
    }

    // ---------------------------------------------------------------
    // Prompts
    // ---------------------------------------------------------------

    /// Send a prompt and wait for the complete reply.
    pub async fn send_message_await(
        &self,
        message: &str,
        options: &SendOptions,
    ) -> Result<ParsedReply> {
        self.inner.coordinator.send_direct(message, options).await
    }

    /// Send a prompt whose reply is streamed back through the request's
    /// callbacks. Replaces the handlers of any stream still in flight.
    pub async fn send_message_stream(&self, request: StreamRequest) -> Result<TurnIds> {
        let StreamRequest {
            message,
            options,
            on_accumulated_response,
            on_error,
        } = request;

        let on_reply = on_accumulated_response.ok_or_else(|| {
            Error::Programmer("send_message_stream requires on_accumulated_response".into())
        })?;

        let handlers = Arc::new(StreamHandlers { on_reply, on_error });
        *self.inner.handlers.write() = Some(handlers.clone());

        match self.inner.coordinator.send_streamed(&message, &options).await {
            Ok(turn) => Ok(turn),
            Err(e) => {
                clear_if_current(&self.inner.handlers, &handlers);
                Err(e)
            }
        }
    }

    /// Stop the event actor. Events posted afterwards are dropped.
    pub fn shutdown(&self) {
        if let Some(actor) = self.inner.actor.lock().take() {
            actor.abort();
            info!("Chat bridge stopped");
        }
    }
}

async fn run_actor(session: Arc<Session>, handlers: HandlerSlot, mut inbox: EventInbox) {
    while let Some(event) = inbox.recv().await {
        if let Some(update) = session.handle_event(event).await {
            dispatch(&handlers, update);
        }
    }
    debug!("Event inbox closed, actor exiting");
}

fn dispatch(slot: &HandlerSlot, update: StreamUpdate) {
    // Clone out of the lock so a callback may start the next stream.
    let Some(handlers) = slot.read().clone() else {
        debug!("Stream update with no registered handler");
        return;
    };

    match update {
        StreamUpdate::Reply(reply) => {
            let done = reply.is_done;
            (handlers.on_reply)(reply);
            if done {
                clear_if_current(slot, &handlers);
            }
        }
        StreamUpdate::Failed(error) => {
            match &handlers.on_error {
                Some(on_error) => on_error(error),
                None => warn!("Streamed prompt failed: {}", error),
            }
            clear_if_current(slot, &handlers);
        }
    }
}

fn clear_if_current(slot: &HandlerSlot, handlers: &Arc<StreamHandlers>) {
    let mut current = slot.write();
    if current
        .as_ref()
        .is_some_and(|registered| Arc::ptr_eq(registered, handlers))
    {
        *current = None;
    }
}
