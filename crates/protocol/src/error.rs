//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering encode and decode failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize a message.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Failed to deserialize a frame: malformed JSON, a missing `Op` field,
    /// or an operation code this protocol does not define.
    #[error("failed to decode message: {0}")]
    Decode(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
