//! SSH implementation of the remote-shell connector.
//!
//! Built on `russh`: a TCP connection is upgraded to an authenticated SSH
//! session, a session channel is opened, and the channel is driven by the
//! relay machinery through the [`ShellChannel`](crate::relay::ShellChannel)
//! trait.

pub mod channel;
pub mod client;

pub use channel::SshShellChannel;
pub use client::SshConnector;

use crate::relay::ConnectorError;

impl From<russh::Error> for ConnectorError {
    fn from(err: russh::Error) -> Self {
        ConnectorError::Ssh(err.to_string())
    }
}
