//! Client transport abstraction.
//!
//! A transport is a persistent, message-framed, bidirectional connection to
//! one browser client. The gateway speaks the control-message protocol over
//! it (one JSON object per frame). The production implementation is a
//! WebSocket ([`ws::WsTransport`]); tests substitute an in-memory double.

pub mod ws;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a transport connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer closed the connection or it was torn down locally.
    #[error("transport closed")]
    Closed,

    /// The connection failed mid-flight.
    #[error("transport failure: {0}")]
    Failed(String),
}

/// Outcome reported to the client when its session ends.
///
/// Delivered inside the transport's close notification together with a
/// human-readable reason; an empty reason shows nothing to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationStatus {
    /// The remote process exited and the relay finished normally.
    CleanExit,
    /// The session failed: connector error, process failure, or transport loss.
    Failure,
}

impl TerminationStatus {
    /// Numeric code carried on the wire: 1 for a clean exit, 2 for a failure.
    pub fn code(self) -> u16 {
        match self {
            TerminationStatus::CleanExit => 1,
            TerminationStatus::Failure => 2,
        }
    }
}

/// One framed, duplexed client connection.
///
/// A transport is owned by exactly one session handle after bind and is
/// never reassigned. `recv` must only be called from one task at a time;
/// the relay machinery guarantees a single reader per connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Receives the next text frame.
    async fn recv(&self) -> Result<String, TransportError>;

    /// Sends a text frame.
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Closes the connection, delivering the termination status and reason
    /// to the client. Best-effort: failures are logged, not returned.
    async fn close(&self, status: TerminationStatus, reason: &str);
}
