//! Control-message definitions for Shellgate.
//!
//! This module defines the framed JSON protocol spoken between the browser
//! client and the gateway. Every frame is a single JSON object; the `Op`
//! field selects the operation and decides which other fields are meaningful.

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// End-of-transmission control byte (ASCII EOT, `^D`).
///
/// Written into the remote shell's input stream when the client transport is
/// lost, so the remote process observes end-of-input instead of hanging.
pub const END_OF_TRANSMISSION: u8 = 0x04;

/// Operation code of a control message.
///
/// `bind`, `stdin` and `resize` travel client-to-server; `stdout` and
/// `toast` travel server-to-client. Anything else is a protocol error and
/// is rejected at decode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    /// Attach this transport connection to a pending session.
    Bind,
    /// Keystrokes or paste buffer destined for the remote shell.
    Stdin,
    /// New terminal dimensions.
    Resize,
    /// Output produced by the remote process.
    Stdout,
    /// Out-of-band notice to be shown to the user.
    Toast,
}

/// A single control-message frame.
///
/// Wire field names are capitalized (`Op`, `Data`, `SessionID`, `Rows`,
/// `Cols`); fields not used by an operation are carried as their zero
/// values. Decoding tolerates absent fields except `Op`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermMessage {
    /// Operation code.
    #[serde(rename = "Op")]
    pub op: Op,

    /// Payload for `stdin`, `stdout` and `toast` frames.
    #[serde(rename = "Data", default)]
    pub data: String,

    /// Session id carried by `bind` frames.
    #[serde(rename = "SessionID", default)]
    pub session_id: String,

    /// Terminal rows carried by `resize` frames.
    #[serde(rename = "Rows", default)]
    pub rows: u16,

    /// Terminal columns carried by `resize` frames.
    #[serde(rename = "Cols", default)]
    pub cols: u16,
}

impl TermMessage {
    /// Creates a `bind` frame for the given session id.
    pub fn bind(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::empty(Op::Bind)
        }
    }

    /// Creates a `stdin` frame carrying input for the remote shell.
    pub fn stdin(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty(Op::Stdin)
        }
    }

    /// Creates a `resize` frame with new terminal dimensions.
    pub fn resize(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            ..Self::empty(Op::Resize)
        }
    }

    /// Creates a `stdout` frame carrying remote process output.
    pub fn stdout(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty(Op::Stdout)
        }
    }

    /// Creates a `toast` frame carrying a user-facing notice.
    pub fn toast(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty(Op::Toast)
        }
    }

    fn empty(op: Op) -> Self {
        Self {
            op,
            data: String::new(),
            session_id: String::new(),
            rows: 0,
            cols: 0,
        }
    }

    /// Serializes the message to a JSON frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Deserializes a message from a JSON frame.
    ///
    /// Fails on malformed JSON, a missing `Op` field, or an operation code
    /// this protocol does not define.
    pub fn from_json(frame: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(frame).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}
