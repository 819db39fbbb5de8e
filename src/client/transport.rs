//! Message-oriented transport beneath the session channel.
//!
//! [`Transport`] mirrors the browser socket model the backend was built
//! against: text frames in and out, errors reported separately from the
//! close that follows them. Tests plug in a scripted transport; production
//! uses [`WebSocketConnector`].

use std::fmt;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::config::Endpoint;
use crate::error::TransportError;

/// WebSocket close status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal, locally initiated closure.
    pub const NORMAL: CloseCode = CloseCode(1000);
    /// Close frame carried no status.
    pub const NO_STATUS: CloseCode = CloseCode(1005);
    /// Connection dropped without a close frame.
    pub const ABNORMAL: CloseCode = CloseCode(1006);

    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle events reported by an open transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// A text frame.
    Message(String),
    /// A socket failure. A `Closed` event follows.
    Error(TransportError),
    /// The connection is gone. No further events follow.
    Closed(CloseCode),
}

/// An open, bidirectional, message-oriented connection.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text frame.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Wait for the next lifecycle event.
    async fn recv(&mut self) -> TransportEvent;

    /// Close with the given code.
    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError>;
}

/// Opens transports to session endpoints.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    async fn open(&self, endpoint: &Endpoint) -> Result<Self::Transport, TransportError>;
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    type Transport = WebSocketTransport;

    async fn open(&self, endpoint: &Endpoint) -> Result<WebSocketTransport, TransportError> {
        let (stream, _) = tokio_tungstenite::connect_async(endpoint.as_str()).await?;
        Ok(WebSocketTransport {
            stream,
            failed: false,
        })
    }
}

/// A WebSocket connection to the session backend.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    failed: bool,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.failed {
            return Err(TransportError::Closed);
        }
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> TransportEvent {
        if self.failed {
            return TransportEvent::Closed(CloseCode::ABNORMAL);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Message(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|f| CloseCode(u16::from(f.code)))
                        .unwrap_or(CloseCode::NO_STATUS);
                    // Push out the queued close reply to finish the handshake.
                    if let Err(e) = self.stream.flush().await {
                        debug!(error = %e, "close reply not flushed");
                    }
                    return TransportEvent::Closed(code);
                }
                Some(Ok(other)) => {
                    // Control frames are answered by tungstenite itself.
                    debug!(kind = ?std::mem::discriminant(&other), "ignoring non-text frame");
                }
                Some(Err(e)) => {
                    self.failed = true;
                    return TransportEvent::Error(e.into());
                }
                None => {
                    self.failed = true;
                    return TransportEvent::Closed(CloseCode::ABNORMAL);
                }
            }
        }
    }

    async fn close(&mut self, code: CloseCode) -> Result<(), TransportError> {
        if self.failed {
            return Ok(());
        }
        let frame = CloseFrame {
            code: WsCloseCode::from(code.0),
            reason: Utf8Bytes::from_static("client disconnect"),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}
