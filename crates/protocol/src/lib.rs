//! # Shellgate Protocol Library
//!
//! This crate defines the control-message protocol spoken between browser
//! clients and the Shellgate gateway.
//!
//! ## Overview
//!
//! The transport is a persistent, message-framed, bidirectional connection
//! (a WebSocket in the gateway). Each frame carries one JSON object:
//!
//! | op     | direction        | fields used  | meaning                          |
//! |--------|------------------|--------------|----------------------------------|
//! | bind   | client to server | `SessionID`  | attach to a pending session      |
//! | stdin  | client to server | `Data`       | input for the remote shell       |
//! | resize | client to server | `Rows, Cols` | new terminal dimensions          |
//! | stdout | server to client | `Data`       | output from the remote process   |
//! | toast  | server to client | `Data`       | out-of-band user-facing notice   |
//!
//! ## Example
//!
//! ```rust
//! use protocol::TermMessage;
//!
//! let frame = TermMessage::stdout("hello").to_json().unwrap();
//! let decoded = TermMessage::from_json(&frame).unwrap();
//! assert_eq!(decoded.data, "hello");
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: frame schema and JSON codec
//! - [`error`]: error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{Op, TermMessage, END_OF_TRANSMISSION};
