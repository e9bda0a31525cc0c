//! HTTP route handlers — app-facing chat API and shell-facing bridge relay.

pub mod bridge;
pub mod chat;

use std::sync::Arc;

use axum::response::sse::Event;
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(chat::routes())
        .merge(bridge::routes())
}

/// SSE event carrying `value` as JSON.
pub(crate) fn json_event(name: &'static str, value: &impl Serialize) -> Event {
    match serde_json::to_string(value) {
        Ok(data) => Event::default().event(name).data(data),
        Err(e) => {
            warn!("Failed to encode {} event: {}", name, e);
            Event::default().comment("encoding error")
        }
    }
}
