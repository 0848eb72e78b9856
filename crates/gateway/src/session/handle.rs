//! Per-session state: the handle that adapts a framed client transport into
//! the byte-stream and resize-event interfaces the remote-shell driver uses.
//!
//! A handle moves through exactly three states:
//!
//! - *pending*: no transport, bind signal unfired
//! - *bound*: transport attached exactly once, bind signal fired exactly once
//! - *closed*: removed from the registry, transport closed
//!
//! The transition pending-to-bound happens at most once; pending-to-closed is
//! reachable when a session is terminated before any client ever attaches.

use std::sync::{Arc, Mutex, OnceLock};

use protocol::{Op, TermMessage, END_OF_TRANSMISSION};
use tokio::sync::{mpsc, oneshot};

use super::SessionError;
use crate::transport::{TerminationStatus, Transport};

/// Terminal dimensions reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtySize {
    /// Rows.
    pub rows: u16,
    /// Columns.
    pub cols: u16,
}

/// One-shot signal resolved when a transport attaches to the session.
///
/// Fired exactly once, by the first successful [`SessionHandle::attach`].
/// The receiving side errors if the handle is dropped unfired.
pub type BoundSignal = oneshot::Receiver<()>;

/// The next chunk of input pulled from the client transport.
#[derive(Debug)]
pub enum InputChunk {
    /// Bytes destined for the remote shell's input. Empty when the frame
    /// carried a resize event instead of keystrokes.
    Data(Vec<u8>),

    /// The transport can produce no more input. `trailing` carries the
    /// end-of-transmission byte so the remote process observes end-of-input
    /// instead of hanging on a dead connection.
    Closed {
        trailing: Vec<u8>,
        error: SessionError,
    },
}

/// The state of one relay session.
///
/// After bind the fields are effectively single-writer: only the relay
/// driver and the input adapter touch them, so no locking beyond the
/// individual primitives is needed.
pub struct SessionHandle {
    id: String,
    bound_tx: Mutex<Option<oneshot::Sender<()>>>,
    transport: OnceLock<Arc<dyn Transport>>,
    resize_tx: mpsc::UnboundedSender<Option<PtySize>>,
    resize_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Option<PtySize>>>,
}

impl SessionHandle {
    /// Creates a pending handle and the signal its relay driver waits on.
    pub fn new(id: impl Into<String>) -> (Arc<Self>, BoundSignal) {
        let (bound_tx, bound_rx) = oneshot::channel();
        let (resize_tx, resize_rx) = mpsc::unbounded_channel();

        let handle = Arc::new(Self {
            id: id.into(),
            bound_tx: Mutex::new(Some(bound_tx)),
            transport: OnceLock::new(),
            resize_tx,
            resize_rx: tokio::sync::Mutex::new(resize_rx),
        });

        (handle, bound_rx)
    }

    /// The session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether a transport has been attached.
    pub fn is_bound(&self) -> bool {
        self.transport.get().is_some()
    }

    /// Attaches the client transport and fires the bind signal.
    ///
    /// The transport is stored exactly once and never reassigned; a second
    /// attach fails without disturbing the first.
    pub fn attach(&self, transport: Arc<dyn Transport>) -> Result<(), SessionError> {
        self.transport
            .set(transport)
            .map_err(|_| SessionError::AlreadyBound(self.id.clone()))?;

        if let Some(tx) = self.bound_tx.lock().unwrap().take() {
            // The driver may already be gone (bind timeout); that loss is
            // handled by the registry entry disappearing, not here.
            let _ = tx.send(());
        }

        Ok(())
    }

    /// Pulls the next input chunk from the transport.
    ///
    /// A `stdin` frame yields its payload; a `resize` frame enqueues a size
    /// event and yields an empty chunk. Any receive failure, decode failure
    /// or unexpected op yields [`InputChunk::Closed`] whose trailing bytes
    /// are the end-of-transmission byte, exactly once per failure.
    pub async fn next_input(&self) -> InputChunk {
        let Some(transport) = self.transport.get() else {
            return InputChunk::Closed {
                trailing: vec![END_OF_TRANSMISSION],
                error: SessionError::NotBound(self.id.clone()),
            };
        };

        let frame = match transport.recv().await {
            Ok(frame) => frame,
            Err(e) => return Self::input_closed(e.into()),
        };

        let msg = match TermMessage::from_json(&frame) {
            Ok(msg) => msg,
            Err(e) => return Self::input_closed(e.into()),
        };

        match msg.op {
            Op::Stdin => InputChunk::Data(msg.data.into_bytes()),
            Op::Resize => {
                let size = PtySize {
                    rows: msg.rows,
                    cols: msg.cols,
                };
                // The receiver lives as long as the handle, so this only
                // fails after teardown, when the event is moot anyway.
                let _ = self.resize_tx.send(Some(size));
                InputChunk::Data(Vec::new())
            }
            other => Self::input_closed(SessionError::UnexpectedOp(other)),
        }
    }

    fn input_closed(error: SessionError) -> InputChunk {
        InputChunk::Closed {
            trailing: vec![END_OF_TRANSMISSION],
            error,
        }
    }

    /// Sends remote process output to the client as a `stdout` frame.
    pub async fn write_output(&self, data: &[u8]) -> Result<(), SessionError> {
        let msg = TermMessage::stdout(String::from_utf8_lossy(data));
        self.send_frame(msg).await
    }

    /// Sends an out-of-band user-facing notice as a `toast` frame.
    pub async fn toast(&self, text: &str) -> Result<(), SessionError> {
        self.send_frame(TermMessage::toast(text)).await
    }

    async fn send_frame(&self, msg: TermMessage) -> Result<(), SessionError> {
        let transport = self
            .transport
            .get()
            .ok_or_else(|| SessionError::NotBound(self.id.clone()))?;
        transport.send(msg.to_json()?).await?;
        Ok(())
    }

    /// Blocks until the next resize event, or returns `None` once the
    /// terminator has been enqueued and no further events will ever arrive.
    pub async fn next_resize(&self) -> Option<PtySize> {
        let mut rx = self.resize_rx.lock().await;
        rx.recv().await.flatten()
    }

    /// Enqueues the resize terminator, releasing any consumer blocked in
    /// [`next_resize`](Self::next_resize).
    ///
    /// Called once during teardown, after the wait step has resolved; no
    /// ordinary resize event may be sent after it.
    pub fn push_resize_terminator(&self) {
        let _ = self.resize_tx.send(None);
    }

    /// Closes the attached transport with the given status and reason.
    /// A no-op for a session that never got past pending.
    pub async fn close_transport(&self, status: TerminationStatus, reason: &str) {
        if let Some(transport) = self.transport.get() {
            transport.close(status, reason).await;
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("bound", &self.is_bound())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::MockTransport;
    use crate::transport::TransportError;

    fn bound_handle() -> (
        Arc<SessionHandle>,
        Arc<MockTransport>,
        tokio::sync::mpsc::UnboundedSender<Result<String, TransportError>>,
    ) {
        let (handle, _signal) = SessionHandle::new("s1");
        let (transport, tx) = MockTransport::new();
        handle.attach(transport.clone()).unwrap();
        (handle, transport, tx)
    }

    #[tokio::test]
    async fn test_attach_fires_bound_signal_once() {
        let (handle, signal) = SessionHandle::new("s1");
        let (transport, _tx) = MockTransport::new();

        assert!(!handle.is_bound());
        handle.attach(transport).unwrap();
        assert!(handle.is_bound());

        signal.await.expect("signal should fire");
    }

    #[tokio::test]
    async fn test_second_attach_fails() {
        let (handle, _signal) = SessionHandle::new("s1");
        let (first, _tx1) = MockTransport::new();
        let (second, _tx2) = MockTransport::new();

        handle.attach(first).unwrap();
        let result = handle.attach(second);
        assert!(matches!(result, Err(SessionError::AlreadyBound(_))));
    }

    #[tokio::test]
    async fn test_dropping_handle_errors_the_signal() {
        let (handle, signal) = SessionHandle::new("s1");
        drop(handle);
        assert!(signal.await.is_err());
    }

    #[tokio::test]
    async fn test_next_input_stdin_yields_payload() {
        let (handle, _transport, tx) = bound_handle();
        tx.send(Ok(TermMessage::stdin("ls\n").to_json().unwrap()))
            .unwrap();

        match handle.next_input().await {
            InputChunk::Data(data) => assert_eq!(data, b"ls\n"),
            other => panic!("expected data, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_next_input_resize_enqueues_event_and_yields_empty() {
        let (handle, _transport, tx) = bound_handle();
        tx.send(Ok(TermMessage::resize(40, 120).to_json().unwrap()))
            .unwrap();

        match handle.next_input().await {
            InputChunk::Data(data) => assert!(data.is_empty()),
            other => panic!("expected empty data, got {:?}", other),
        }

        assert_eq!(
            handle.next_resize().await,
            Some(PtySize {
                rows: 40,
                cols: 120
            })
        );
    }

    #[tokio::test]
    async fn test_next_input_transport_error_yields_eot_once() {
        let (handle, _transport, tx) = bound_handle();
        tx.send(Err(TransportError::Failed("reset".to_string())))
            .unwrap();

        match handle.next_input().await {
            InputChunk::Closed { trailing, error } => {
                assert_eq!(trailing, vec![END_OF_TRANSMISSION]);
                assert!(matches!(error, SessionError::Transport(_)));
            }
            other => panic!("expected closed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_next_input_decode_failure_yields_eot() {
        let (handle, _transport, tx) = bound_handle();
        tx.send(Ok("not json".to_string())).unwrap();

        match handle.next_input().await {
            InputChunk::Closed { trailing, error } => {
                assert_eq!(trailing, vec![END_OF_TRANSMISSION]);
                assert!(matches!(error, SessionError::Protocol(_)));
            }
            other => panic!("expected closed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_next_input_unexpected_op_yields_eot() {
        let (handle, _transport, tx) = bound_handle();
        tx.send(Ok(TermMessage::stdout("sneaky").to_json().unwrap()))
            .unwrap();

        match handle.next_input().await {
            InputChunk::Closed { trailing, error } => {
                assert_eq!(trailing, vec![END_OF_TRANSMISSION]);
                assert!(matches!(error, SessionError::UnexpectedOp(Op::Stdout)));
            }
            other => panic!("expected closed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_next_input_before_bind_yields_closed() {
        let (handle, _signal) = SessionHandle::new("s1");

        match handle.next_input().await {
            InputChunk::Closed { error, .. } => {
                assert!(matches!(error, SessionError::NotBound(_)))
            }
            other => panic!("expected closed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_output_sends_stdout_frame() {
        let (handle, transport, _tx) = bound_handle();
        handle.write_output(b"hello").await.unwrap();

        let sent = transport.sent_frames();
        assert_eq!(sent.len(), 1);
        let msg = TermMessage::from_json(&sent[0]).unwrap();
        assert_eq!(msg.op, Op::Stdout);
        assert_eq!(msg.data, "hello");
    }

    #[tokio::test]
    async fn test_toast_sends_toast_frame() {
        let (handle, transport, _tx) = bound_handle();
        handle.toast("heads up").await.unwrap();

        let msg = TermMessage::from_json(&transport.sent_frames()[0]).unwrap();
        assert_eq!(msg.op, Op::Toast);
        assert_eq!(msg.data, "heads up");
    }

    #[tokio::test]
    async fn test_write_output_on_pending_session_fails() {
        let (handle, _signal) = SessionHandle::new("s1");
        let result = handle.write_output(b"x").await;
        assert!(matches!(result, Err(SessionError::NotBound(_))));
    }

    #[tokio::test]
    async fn test_resize_events_ordered_then_terminator() {
        let (handle, _transport, tx) = bound_handle();
        tx.send(Ok(TermMessage::resize(24, 80).to_json().unwrap()))
            .unwrap();
        tx.send(Ok(TermMessage::resize(50, 200).to_json().unwrap()))
            .unwrap();

        let _ = handle.next_input().await;
        let _ = handle.next_input().await;
        handle.push_resize_terminator();

        assert_eq!(
            handle.next_resize().await,
            Some(PtySize { rows: 24, cols: 80 })
        );
        assert_eq!(
            handle.next_resize().await,
            Some(PtySize {
                rows: 50,
                cols: 200
            })
        );
        assert_eq!(handle.next_resize().await, None);
    }

    #[tokio::test]
    async fn test_close_transport_on_pending_session_is_noop() {
        let (handle, _signal) = SessionHandle::new("s1");
        // Must not panic or block.
        handle
            .close_transport(TerminationStatus::Failure, "gone")
            .await;
    }

    #[tokio::test]
    async fn test_close_transport_delivers_status_and_reason() {
        let (handle, transport, _tx) = bound_handle();
        handle
            .close_transport(TerminationStatus::CleanExit, "Process exited")
            .await;

        assert_eq!(
            transport.close_notification(),
            Some((TerminationStatus::CleanExit, "Process exited".to_string()))
        );
    }
}
