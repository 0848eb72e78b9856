//! The remote-shell connector seam.
//!
//! The relay driver never talks to SSH directly; it goes through these
//! traits. The production implementation lives in [`crate::ssh`]; tests
//! substitute scripted doubles.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::SessionHandle;

/// Where and as whom to open the remote shell.
#[derive(Clone, PartialEq, Eq)]
pub struct HostTarget {
    /// Host name or address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl std::fmt::Debug for HostTarget {
    // Credentials stay out of logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Failures reported by the connector and its channels.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// TCP or SSH-level connection failure.
    #[error("connection to {host}:{port} failed: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    /// The TCP connect did not complete within the configured timeout.
    #[error("connecting to {host}:{port} timed out")]
    ConnectTimeout { host: String, port: u16 },

    /// The server rejected the supplied credentials.
    #[error("authentication rejected for user {0}")]
    AuthRejected(String),

    /// Any other SSH protocol failure.
    #[error("ssh error: {0}")]
    Ssh(String),

    /// The channel ended without reporting a process exit.
    #[error("channel closed before the process exited")]
    ChannelClosed,

    /// The remote process exited with a non-zero status.
    #[error("process exited with status {0}")]
    ProcessExited(u32),

    /// The remote process was terminated by a signal.
    #[error("process terminated by signal {0}")]
    ProcessSignaled(String),

    /// The client transport stopped producing input.
    #[error("client connection lost: {0}")]
    Input(String),

    /// Process output could not be delivered to the client.
    #[error("client connection lost while writing output: {0}")]
    Output(String),

    /// `wait` was called before the channel's streams were wired.
    #[error("channel streams were not wired before wait")]
    StreamsNotSet,
}

/// Opens authenticated remote-shell channels.
#[async_trait]
pub trait ShellConnector: Send + Sync {
    /// Connects and authenticates against the target, returning a channel
    /// ready for PTY allocation.
    async fn connect(&self, target: &HostTarget) -> Result<Arc<dyn ShellChannel>, ConnectorError>;
}

/// One remote-shell channel.
///
/// Driven in order: `request_pty`, `set_streams`, `start_shell`, then `wait`
/// runs the byte relay until the remote process exits or a stream fails.
/// `window_change` may be called concurrently with `wait` from the resize
/// pump. `close` releases the underlying connection and is always called,
/// regardless of outcome.
#[async_trait]
pub trait ShellChannel: Send + Sync {
    /// Requests a pseudo-terminal with the given type and geometry.
    async fn request_pty(&self, term: &str, rows: u16, cols: u16) -> Result<(), ConnectorError>;

    /// Wires the session handle as the channel's input source and
    /// output/error sink.
    fn set_streams(&self, handle: Arc<SessionHandle>);

    /// Requests interactive shell execution.
    async fn start_shell(&self) -> Result<(), ConnectorError>;

    /// Propagates new terminal dimensions to the remote side.
    async fn window_change(&self, rows: u16, cols: u16) -> Result<(), ConnectorError>;

    /// Relays bytes both ways until the remote process exits or a stream
    /// fails. A clean zero exit returns `Ok`; everything else is an error
    /// carrying the user-visible reason.
    async fn wait(&self) -> Result<(), ConnectorError>;

    /// Releases the channel and its connection. Best-effort.
    async fn close(&self);
}
