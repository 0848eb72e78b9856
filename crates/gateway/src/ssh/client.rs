//! SSH connection establishment and authentication.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::keys::key::PublicKey;
use tokio::net::TcpStream;

use super::channel::SshShellChannel;
use crate::config::SshConfig;
use crate::relay::{ConnectorError, HostTarget, ShellChannel, ShellConnector};

/// russh event handler for the gateway's client side.
pub struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = ConnectorError;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // Targets are supplied per request by the caller; there is no
        // persistent known-hosts store to check against.
        tracing::warn!("accepting server host key without verification");
        Ok(true)
    }
}

/// Opens authenticated SSH sessions with password login.
pub struct SshConnector {
    connect_timeout: Duration,
}

impl SshConnector {
    /// Creates a connector with the configured TCP connect timeout.
    pub fn new(config: &SshConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
        }
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn connect(&self, target: &HostTarget) -> Result<Arc<dyn ShellChannel>, ConnectorError> {
        tracing::info!(
            host = %target.host,
            port = target.port,
            user = %target.username,
            "connecting to remote shell"
        );

        let tcp = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await
        .map_err(|_| ConnectorError::ConnectTimeout {
            host: target.host.clone(),
            port: target.port,
        })?
        .map_err(|e| ConnectorError::Connect {
            host: target.host.clone(),
            port: target.port,
            reason: e.to_string(),
        })?;

        let config = Arc::new(client::Config::default());
        let mut session = client::connect_stream(config, tcp, ClientHandler).await?;

        let authenticated = session
            .authenticate_password(&target.username, &target.password)
            .await?;
        if !authenticated {
            return Err(ConnectorError::AuthRejected(target.username.clone()));
        }

        tracing::debug!(host = %target.host, user = %target.username, "ssh authentication succeeded");

        let channel = session.channel_open_session().await?;
        Ok(Arc::new(SshShellChannel::new(session, channel)))
    }
}
