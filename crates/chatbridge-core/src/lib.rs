//! chatbridge core — error taxonomy, configuration, service endpoints.

pub mod config;
pub mod error;

pub use config::{BridgeConfig, Endpoints};
pub use error::{Error, Result};
