//! Embedded browser session — bridge channel, credential store, lifecycle.
//!
//! Drives a hidden browser surface hosting the chat provider's page,
//! harvests the bearer credential from the page's own requests, and keeps
//! the session recoverable across expiry, overload and context loss.

pub mod channel;
pub mod session;
pub mod store;
pub mod surface;
pub mod types;

pub use channel::{event_channel, BridgeChannel, EventInbox, EventSender};
pub use session::Session;
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use surface::{BrowserSurface, RecordingSurface};
pub use types::*;
