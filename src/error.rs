//! Error types for the session client.

use thiserror::Error;

use crate::client::ConnectionState;

/// Errors returned when a session cannot be opened.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session code was empty.
    #[error("session code must not be empty")]
    MissingSessionCode,

    /// The player name was empty.
    #[error("player name must not be empty")]
    MissingPlayerName,

    /// A transport is already live for this channel.
    #[error("session channel is already {0}")]
    AlreadyConnected(ConnectionState),

    /// The transport could not be opened.
    #[error("failed to open session transport: {0}")]
    Transport(#[from] TransportError),
}

/// Errors raised by the underlying socket.
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket protocol or IO failure.
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The transport is already closed.
    #[error("transport is closed")]
    Closed,
}

/// Errors raised while decoding an inbound frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame was not valid JSON or did not match its declared type.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The frame had no `type` discriminator.
    #[error("frame has no `type` field")]
    MissingType,

    /// The `type` discriminator is outside the known set.
    #[error("unrecognized frame type `{0}`")]
    UnknownType(String),
}
