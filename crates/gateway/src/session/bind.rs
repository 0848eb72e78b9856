//! The bind handshake: matching an inbound transport connection to a
//! previously registered, still-unbound session.
//!
//! The first frame on a new connection must be a `bind` message carrying the
//! session id returned by the creation endpoint. Nothing is sent back on
//! success; the transport simply goes live for the relay phase.

use std::sync::Arc;

use protocol::{Op, ProtocolError, TermMessage};
use thiserror::Error;

use super::handle::SessionHandle;
use super::registry::SessionRegistry;
use crate::transport::{Transport, TransportError};

/// Reasons a bind handshake can fail. All of them abort the handshake and
/// drop the connection without touching registry state.
#[derive(Debug, Error)]
pub enum BindError {
    /// The connection failed before delivering a first frame.
    #[error("transport error during bind: {0}")]
    Transport(TransportError),

    /// The first frame was not a valid control message.
    #[error(transparent)]
    Protocol(ProtocolError),

    /// The first frame was a valid message but not a `bind`.
    #[error("expected a bind message, got {0:?}")]
    UnexpectedOp(Op),

    /// No pending session exists under the requested id.
    #[error("unknown session id: {0}")]
    UnknownSession(String),

    /// The session already has a transport; the first bind stays intact.
    #[error("session {0} is already bound")]
    AlreadyBound(String),
}

/// Runs the bind handshake for a freshly accepted transport connection.
///
/// On success the transport is owned by the returned handle and the bind
/// signal has been fired; the caller has nothing further to do. On failure
/// the caller should drop the transport.
pub async fn bind_transport(
    registry: &SessionRegistry,
    transport: Arc<dyn Transport>,
) -> Result<Arc<SessionHandle>, BindError> {
    let frame = transport.recv().await.map_err(BindError::Transport)?;

    let msg = TermMessage::from_json(&frame).map_err(BindError::Protocol)?;
    if msg.op != Op::Bind {
        return Err(BindError::UnexpectedOp(msg.op));
    }

    let handle = registry
        .get(&msg.session_id)
        .ok_or_else(|| BindError::UnknownSession(msg.session_id.clone()))?;

    handle
        .attach(transport)
        .map_err(|_| BindError::AlreadyBound(msg.session_id.clone()))?;

    tracing::info!(session_id = %handle.id(), "transport bound to session");
    Ok(handle)
}
