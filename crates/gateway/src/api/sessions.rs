//! Session creation endpoint and WebSocket attachment.
//!
//! `POST /v1/terminal` registers a pending session and launches its relay
//! driver, returning the session id immediately; it does not wait for the
//! client to attach or for the remote process. `GET /v1/ws` upgrades to a
//! WebSocket and runs the bind handshake on the new connection.

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::response::Envelope;
use super::AppState;
use crate::relay::{HostTarget, RelayDriver, RelaySettings};
use crate::session::{bind_transport, generate_session_id, SessionError, SessionHandle};
use crate::transport::ws::WsTransport;
use crate::transport::Transport;

/// Body of a session creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    /// Target host name or address.
    #[serde(default)]
    pub ip: String,
    /// Login user.
    #[serde(default)]
    pub username: String,
    /// Login password.
    #[serde(default)]
    pub password: String,
    /// SSH port; 0 or absent selects the configured default.
    #[serde(default)]
    pub port: u16,
}

/// Payload of a successful creation response.
#[derive(Debug, Serialize)]
pub struct SessionCreated {
    /// The opaque session id the client binds with.
    pub id: String,
}

/// Why a creation request was rejected.
#[derive(Debug)]
pub enum CreateError {
    /// ip, username or password missing: the caller's fault.
    MissingFields,
    /// Id generation or registration failed.
    Session(SessionError),
}

/// `POST /v1/terminal`
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Response {
    match launch_session(&state, request) {
        Ok(created) => Json(Envelope::ok(created)).into_response(),
        Err(CreateError::MissingFields) => (
            StatusCode::BAD_REQUEST,
            Json(Envelope::fail("ip, username and password are required")),
        )
            .into_response(),
        Err(CreateError::Session(e)) => {
            tracing::error!(error = %e, "failed to create session");
            Json(Envelope::fail(e.to_string())).into_response()
        }
    }
}

/// Validates the request, registers a pending session and spawns its relay
/// driver. Returns the new session id without waiting for anything else.
pub fn launch_session(
    state: &AppState,
    request: CreateSessionRequest,
) -> Result<SessionCreated, CreateError> {
    if request.ip.is_empty() || request.username.is_empty() || request.password.is_empty() {
        return Err(CreateError::MissingFields);
    }

    let port = if request.port == 0 {
        state.config.ssh.default_port
    } else {
        request.port
    };

    let id = generate_session_id().map_err(CreateError::Session)?;
    let (handle, bound) = SessionHandle::new(id.clone());
    state
        .registry
        .create(Arc::clone(&handle))
        .map_err(CreateError::Session)?;

    let target = HostTarget {
        host: request.ip,
        port,
        username: request.username,
        password: request.password,
    };

    let driver = RelayDriver::new(
        Arc::clone(&state.registry),
        Arc::clone(&state.connector),
        RelaySettings::from(state.config.as_ref()),
    );
    tokio::spawn(driver.run(target, handle, bound));

    tracing::info!(session_id = %id, "session created");
    Ok(SessionCreated { id })
}

/// `GET /v1/ws`
pub async fn attach_session(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Runs the bind handshake on a freshly upgraded socket. On success the
/// transport lives on inside the session handle; on failure it is dropped
/// here, which closes the connection.
async fn handle_socket(state: AppState, socket: WebSocket) {
    let transport: Arc<dyn Transport> = Arc::new(WsTransport::new(socket));

    match bind_transport(&state.registry, transport).await {
        Ok(handle) => tracing::debug!(session_id = %handle.id(), "client attached"),
        Err(e) => tracing::warn!(error = %e, "bind handshake failed, dropping connection"),
    }
}
