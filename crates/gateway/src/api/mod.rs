//! HTTP surface of the gateway: session creation and transport attachment.

pub mod response;
pub mod sessions;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::config::Config;
use crate::relay::ShellConnector;
use crate::session::SessionRegistry;

pub use response::Envelope;

/// Shared state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Canonical store of live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Opens remote-shell channels for new sessions.
    pub connector: Arc<dyn ShellConnector>,
    /// Effective gateway configuration.
    pub config: Arc<Config>,
}

/// Builds the gateway router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/terminal", post(sessions::create_session))
        .route("/v1/ws", get(sessions::attach_session))
        .with_state(state)
}
