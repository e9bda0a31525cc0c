//! Chat bridge facade — direct and streamed prompts over a browser session.
//!
//! Direct prompts go out from the host with `reqwest`; streamed prompts are
//! performed by the page itself and relayed back as cumulative snapshots.

pub mod client;
pub mod coordinator;
pub mod types;

pub use client::ChatGpt;
pub use coordinator::Coordinator;
pub use types::*;
