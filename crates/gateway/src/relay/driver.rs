//! The relay driver: owns one session's lifetime after bind.
//!
//! A driver task is spawned by the creation endpoint, concurrently with the
//! bind handshake. It waits on the bind signal, opens the remote-shell
//! channel, wires the session handle in as the channel's streams, pumps
//! resize events in a nested task, waits for the remote process, and always
//! converges on the same teardown path: resize terminator, pump join,
//! channel release, registry terminate.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use super::connector::{ConnectorError, HostTarget, ShellChannel, ShellConnector};
use crate::config::Config;
use crate::session::{BoundSignal, SessionHandle, SessionRegistry};
use crate::transport::TerminationStatus;

/// Reason shown to the client when the remote process exits cleanly.
const REASON_PROCESS_EXITED: &str = "Process exited";

/// Reason shown to the client when no transport attached in time.
const REASON_BIND_TIMEOUT: &str = "timed out waiting for a client to attach";

/// A relay failure, carrying the phase it happened in. The display text is
/// what the client sees as the close reason.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to connect: {0}")]
    Connect(ConnectorError),

    #[error("failed to allocate a pseudo-terminal: {0}")]
    Pty(ConnectorError),

    #[error("failed to start the remote shell: {0}")]
    Shell(ConnectorError),

    #[error(transparent)]
    Wait(ConnectorError),
}

/// Relay tuning taken from the gateway configuration.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// How long a pending session may wait for a bind; `None` waits forever.
    pub bind_timeout: Option<Duration>,
    /// Terminal type requested for the remote PTY.
    pub term: String,
    /// Initial PTY rows.
    pub term_rows: u16,
    /// Initial PTY columns.
    pub term_cols: u16,
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            bind_timeout: config.session.bind_timeout(),
            term: config.session.term.clone(),
            term_rows: config.session.term_rows,
            term_cols: config.session.term_cols,
        }
    }
}

/// Drives one session from bind to teardown.
pub struct RelayDriver {
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn ShellConnector>,
    settings: RelaySettings,
}

impl RelayDriver {
    /// Creates a driver bound to the shared registry and connector.
    pub fn new(
        registry: Arc<SessionRegistry>,
        connector: Arc<dyn ShellConnector>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            registry,
            connector,
            settings,
        }
    }

    /// Runs the session to completion.
    ///
    /// Every exit path ends in `SessionRegistry::terminate`, which removes
    /// the session and closes its transport; neither the resize pump nor the
    /// remote channel survives this call.
    pub async fn run(self, target: HostTarget, handle: Arc<SessionHandle>, bound: BoundSignal) {
        let id = handle.id().to_string();

        tracing::debug!(
            session_id = %id,
            host = %target.host,
            port = target.port,
            "relay driver waiting for bind"
        );

        if !self.await_bind(bound).await {
            tracing::warn!(session_id = %id, "no client attached in time, discarding session");
            handle.push_resize_terminator();
            self.registry
                .terminate(&id, TerminationStatus::Failure, REASON_BIND_TIMEOUT)
                .await;
            return;
        }

        let mut channel: Option<Arc<dyn ShellChannel>> = None;
        let mut pump: Option<JoinHandle<()>> = None;
        let result = self
            .relay(&target, &handle, &mut channel, &mut pump)
            .await;

        // Teardown. The terminator goes out only after the wait step has
        // resolved, so legitimate late resize events are never truncated;
        // it releases the pump, which is joined before the channel goes.
        handle.push_resize_terminator();
        if let Some(pump) = pump {
            let _ = pump.await;
        }
        if let Some(channel) = channel {
            channel.close().await;
        }

        match result {
            Ok(()) => {
                tracing::info!(session_id = %id, "remote process exited");
                self.registry
                    .terminate(&id, TerminationStatus::CleanExit, REASON_PROCESS_EXITED)
                    .await;
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "relay failed");
                self.registry
                    .terminate(&id, TerminationStatus::Failure, &e.to_string())
                    .await;
            }
        }
    }

    /// Waits for the bind signal, bounded by the configured timeout.
    /// Returns false on timeout or if the signal can no longer fire.
    async fn await_bind(&self, bound: BoundSignal) -> bool {
        match self.settings.bind_timeout {
            Some(limit) => matches!(tokio::time::timeout(limit, bound).await, Ok(Ok(()))),
            None => bound.await.is_ok(),
        }
    }

    /// Steps 1-6: connect, PTY, wire streams, shell, pump, wait.
    ///
    /// The channel and pump escape through the out-slots so the teardown in
    /// [`run`](Self::run) can release them on every path, including the ones
    /// where this function bails early.
    async fn relay(
        &self,
        target: &HostTarget,
        handle: &Arc<SessionHandle>,
        channel_slot: &mut Option<Arc<dyn ShellChannel>>,
        pump_slot: &mut Option<JoinHandle<()>>,
    ) -> Result<(), RelayError> {
        let channel = self
            .connector
            .connect(target)
            .await
            .map_err(RelayError::Connect)?;
        *channel_slot = Some(Arc::clone(&channel));

        channel
            .request_pty(
                &self.settings.term,
                self.settings.term_rows,
                self.settings.term_cols,
            )
            .await
            .map_err(RelayError::Pty)?;

        channel.set_streams(Arc::clone(handle));

        channel.start_shell().await.map_err(RelayError::Shell)?;

        *pump_slot = Some(spawn_resize_pump(Arc::clone(handle), Arc::clone(&channel)));

        channel.wait().await.map_err(RelayError::Wait)
    }
}

/// Spawns the per-session resize pump.
///
/// The pump forwards every size event to the remote channel and exits only
/// on the terminator, so it can never block process-exit detection and never
/// outlives teardown.
fn spawn_resize_pump(
    handle: Arc<SessionHandle>,
    channel: Arc<dyn ShellChannel>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(size) = handle.next_resize().await {
            if let Err(e) = channel.window_change(size.rows, size.cols).await {
                // The channel may already be winding down; resize loss at
                // that point is harmless.
                tracing::debug!(
                    session_id = %handle.id(),
                    error = %e,
                    "window change not delivered"
                );
            }
        }
        tracing::debug!(session_id = %handle.id(), "resize pump finished");
    })
}
