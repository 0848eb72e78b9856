//! # Shellgate Gateway Library
//!
//! This crate implements the gateway that exposes remote SSH shells to
//! browser clients over a WebSocket transport.
//!
//! ## Overview
//!
//! A client POSTs host credentials to the creation endpoint and receives an
//! opaque session id. It then opens a WebSocket and sends a `bind` frame
//! carrying that id; from that point the gateway relays bytes and resize
//! events between the socket and an interactive shell on the remote host
//! until either side terminates.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        HTTP Router                           │
//! │   POST /v1/terminal            GET /v1/ws (upgrade)          │
//! └───────────┬──────────────────────────────┬───────────────────┘
//!             │ register pending             │ bind handshake
//!             v                              v
//! ┌──────────────────────┐        ┌─────────────────────────────┐
//! │   Session Registry   │<──────>│       Session Handle        │
//! │  id -> handle (RwLock)│        │ transport + resize events  │
//! └───────────┬──────────┘        └──────────────┬──────────────┘
//!             │ terminate                        │ byte source/sink
//!             v                                  v
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Relay Driver                          │
//! │   connect -> pty -> wire streams -> shell -> pump -> wait    │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │ ShellConnector
//!                                v
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    SSH connector (russh)                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: configuration loading, validation and defaults
//! - [`transport`]: client transport trait and the WebSocket implementation
//! - [`session`]: session registry, handles and the bind handshake
//! - [`relay`]: connector seam and the per-session relay driver
//! - [`ssh`]: russh-backed connector implementation
//! - [`api`]: axum router and handlers

pub mod api;
pub mod config;
pub mod relay;
pub mod session;
pub mod ssh;
pub mod transport;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::{Config, ConfigError};

// Re-export session types for convenience
pub use session::{
    bind_transport, generate_session_id, BindError, BoundSignal, InputChunk, PtySize,
    SessionError, SessionHandle, SessionRegistry,
};

// Re-export relay types for convenience
pub use relay::{
    ConnectorError, HostTarget, RelayDriver, RelayError, RelaySettings, ShellChannel,
    ShellConnector,
};

// Re-export transport types for convenience
pub use transport::{TerminationStatus, Transport, TransportError};

// Re-export ssh types for convenience
pub use ssh::{SshConnector, SshShellChannel};

// Re-export api types for convenience
pub use api::{router, AppState, Envelope};
