//! The SSH session channel, driven as a [`ShellChannel`].
//!
//! `wait` owns the underlying `russh` channel for the whole relay phase and
//! multiplexes three event sources in one loop: input chunks pulled from the
//! session handle, resize events queued by `window_change`, and channel
//! messages from the remote side. Everything else on the wrapper is a thin
//! forwarder that never holds a lock across the relay.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use russh::client::{Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect, Pty};

use super::client::ClientHandler;
use crate::relay::{ConnectorError, ShellChannel};
use crate::session::{InputChunk, PtySize, SessionHandle};

/// Terminal modes requested with the PTY: local echo on, 14.4k baud in both
/// directions.
const TERMINAL_MODES: [(Pty, u32); 3] = [
    (Pty::ECHO, 1),
    (Pty::TTY_OP_ISPEED, 14400),
    (Pty::TTY_OP_OSPEED, 14400),
];

/// How the remote process ended.
enum Exit {
    Code(u32),
    Signal(String),
}

/// A `russh` session channel plus the plumbing `wait` needs.
pub struct SshShellChannel {
    session: tokio::sync::Mutex<Option<Handle<ClientHandler>>>,
    channel: tokio::sync::Mutex<Option<Channel<Msg>>>,
    streams: Mutex<Option<Arc<SessionHandle>>>,
    resize_tx: tokio::sync::mpsc::UnboundedSender<PtySize>,
    resize_rx: tokio::sync::Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<PtySize>>>,
}

impl SshShellChannel {
    /// Wraps a freshly opened session channel.
    pub fn new(session: Handle<ClientHandler>, channel: Channel<Msg>) -> Self {
        let (resize_tx, resize_rx) = tokio::sync::mpsc::unbounded_channel();
        Self {
            session: tokio::sync::Mutex::new(Some(session)),
            channel: tokio::sync::Mutex::new(Some(channel)),
            streams: Mutex::new(None),
            resize_tx,
            resize_rx: tokio::sync::Mutex::new(Some(resize_rx)),
        }
    }
}

#[async_trait]
impl ShellChannel for SshShellChannel {
    async fn request_pty(&self, term: &str, rows: u16, cols: u16) -> Result<(), ConnectorError> {
        let guard = self.channel.lock().await;
        let channel = guard.as_ref().ok_or(ConnectorError::ChannelClosed)?;
        channel
            .request_pty(
                false,
                term,
                u32::from(cols),
                u32::from(rows),
                0,
                0,
                &TERMINAL_MODES,
            )
            .await?;
        Ok(())
    }

    fn set_streams(&self, handle: Arc<SessionHandle>) {
        *self.streams.lock().unwrap() = Some(handle);
    }

    async fn start_shell(&self) -> Result<(), ConnectorError> {
        let guard = self.channel.lock().await;
        let channel = guard.as_ref().ok_or(ConnectorError::ChannelClosed)?;
        channel.request_shell(false).await?;
        Ok(())
    }

    async fn window_change(&self, rows: u16, cols: u16) -> Result<(), ConnectorError> {
        // Resizes are queued and applied by the relay loop in `wait`, which
        // exclusively owns the channel while it runs.
        self.resize_tx
            .send(PtySize { rows, cols })
            .map_err(|_| ConnectorError::ChannelClosed)
    }

    async fn wait(&self) -> Result<(), ConnectorError> {
        let mut channel = self
            .channel
            .lock()
            .await
            .take()
            .ok_or(ConnectorError::ChannelClosed)?;
        let mut resize_rx = self
            .resize_rx
            .lock()
            .await
            .take()
            .ok_or(ConnectorError::ChannelClosed)?;
        let streams = self
            .streams
            .lock()
            .unwrap()
            .clone()
            .ok_or(ConnectorError::StreamsNotSet)?;

        let mut exit: Option<Exit> = None;
        let mut input_open = true;
        let mut input_error: Option<String> = None;

        loop {
            tokio::select! {
                chunk = streams.next_input(), if input_open => match chunk {
                    InputChunk::Data(data) => {
                        if !data.is_empty() {
                            channel.data(&data[..]).await?;
                        }
                    }
                    InputChunk::Closed { trailing, error } => {
                        // Deliver the end-of-transmission byte and EOF so
                        // the remote process observes end-of-input instead
                        // of hanging on a dead client.
                        input_open = false;
                        input_error = Some(error.to_string());
                        let _ = channel.data(&trailing[..]).await;
                        let _ = channel.eof().await;
                    }
                },
                Some(size) = resize_rx.recv() => {
                    let _ = channel
                        .window_change(u32::from(size.cols), u32::from(size.rows), 0, 0)
                        .await;
                }
                msg = channel.wait() => match msg {
                    Some(ChannelMsg::Data { data }) => {
                        streams
                            .write_output(&data)
                            .await
                            .map_err(|e| ConnectorError::Output(e.to_string()))?;
                    }
                    Some(ChannelMsg::ExtendedData { data, .. }) => {
                        streams
                            .write_output(&data)
                            .await
                            .map_err(|e| ConnectorError::Output(e.to_string()))?;
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        exit = Some(Exit::Code(exit_status));
                    }
                    Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                        exit = Some(Exit::Signal(format!("{signal_name:?}")));
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        // A lost client is a failure even when the EOT made the remote
        // shell exit cleanly.
        match (exit, input_error) {
            (Some(Exit::Code(0)), None) => Ok(()),
            (Some(Exit::Code(0)) | None, Some(err)) => Err(ConnectorError::Input(err)),
            (Some(Exit::Code(code)), _) => Err(ConnectorError::ProcessExited(code)),
            (Some(Exit::Signal(signal)), _) => Err(ConnectorError::ProcessSignaled(signal)),
            (None, None) => Err(ConnectorError::ChannelClosed),
        }
    }

    async fn close(&self) {
        if let Some(channel) = self.channel.lock().await.take() {
            let _ = channel.eof().await;
            let _ = channel.close().await;
        }

        if let Some(session) = self.session.lock().await.take() {
            let _ = session
                .disconnect(Disconnect::ByApplication, "session closed", "en")
                .await;
        }
    }
}
