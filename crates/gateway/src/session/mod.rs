//! Session management: registry, per-session handles, and the bind handshake.
//!
//! A session is created by the HTTP endpoint before any client transport
//! exists, waits in the registry as *pending*, becomes *bound* when a
//! transport attaches via the bind handshake, and is *closed* when the relay
//! driver reports the session's outcome to the registry.

pub mod bind;
pub mod handle;
pub mod registry;

use protocol::{Op, ProtocolError};
use rand::RngCore;
use thiserror::Error;

use crate::transport::TransportError;

pub use bind::{bind_transport, BindError};
pub use handle::{BoundSignal, InputChunk, PtySize, SessionHandle};
pub use registry::SessionRegistry;

/// Errors from session handles and the registry.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The client transport failed or closed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The client sent a recognized op that is not valid on a bound session.
    #[error("unexpected {0:?} message on a bound session")]
    UnexpectedOp(Op),

    /// A second transport tried to attach to the same session.
    #[error("session {0} already has a transport attached")]
    AlreadyBound(String),

    /// An operation needed a transport but the session is still pending.
    #[error("session {0} has no transport attached")]
    NotBound(String),

    /// A session id collided on registration.
    #[error("session id {0} is already registered")]
    IdInUse(String),

    /// The system random source failed.
    #[error("failed to generate session id: {0}")]
    IdGeneration(String),
}

/// Generates an opaque, unguessable session id: 16 random bytes, hex-encoded.
///
/// This id correlates the HTTP creation request with the transport that
/// attaches later; it is the only secret protecting a pending session, so it
/// comes from the OS random source.
pub fn generate_session_id() -> Result<String, SessionError> {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| SessionError::IdGeneration(e.to_string()))?;
    Ok(hex::encode(bytes))
}
