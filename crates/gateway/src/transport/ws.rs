//! WebSocket transport implementation.
//!
//! Wraps an accepted `axum` WebSocket as a [`Transport`]. The socket is
//! split into sink and stream halves so the relay can send output while a
//! receive is in flight; each half is guarded by its own async mutex.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;

use super::{TerminationStatus, Transport, TransportError};

/// Base for session close codes in the WebSocket private-use range
/// (4000-4999). The termination status code (1 or 2) is added to it.
const CLOSE_CODE_BASE: u16 = 4000;

/// A [`Transport`] over an accepted WebSocket connection.
pub struct WsTransport {
    sender: Mutex<SplitSink<WebSocket, Message>>,
    receiver: Mutex<SplitStream<WebSocket>>,
}

impl WsTransport {
    /// Wraps an upgraded WebSocket.
    pub fn new(socket: WebSocket) -> Self {
        let (sender, receiver) = socket.split();
        Self {
            sender: Mutex::new(sender),
            receiver: Mutex::new(receiver),
        }
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn recv(&self) -> Result<String, TransportError> {
        let mut receiver = self.receiver.lock().await;

        loop {
            match receiver.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Binary(_))) => {
                    return Err(TransportError::Failed(
                        "unexpected binary frame".to_string(),
                    ))
                }
                // Ping/pong are handled by the websocket layer; skip them.
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Err(TransportError::Closed),
                Some(Err(e)) => return Err(TransportError::Failed(e.to_string())),
            }
        }
    }

    async fn send(&self, frame: String) -> Result<(), TransportError> {
        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError::Failed(e.to_string()))
    }

    async fn close(&self, status: TerminationStatus, reason: &str) {
        let frame = CloseFrame {
            code: CLOSE_CODE_BASE + status.code(),
            reason: reason.to_string().into(),
        };

        let mut sender = self.sender.lock().await;
        if let Err(e) = sender.send(Message::Close(Some(frame))).await {
            tracing::debug!(error = %e, "failed to deliver close frame");
        }
    }
}
