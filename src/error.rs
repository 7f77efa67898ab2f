//! Error types for roomrelay.

use thiserror::Error;

/// Common error type for roomrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The room identifier is unknown (or the room was closed).
    #[error("room {0} not found")]
    RoomNotFound(String),

    /// Inbound data could not be parsed as an envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A member's outbox is gone, i.e. its connection already ended.
    #[error("send to connection {0} failed: channel closed")]
    PeerSendFailure(String),

    /// A member's outbox is at capacity; the envelope was dropped.
    #[error("outbox of connection {0} is full")]
    OutboxFull(String),

    /// The operation is not valid in the connection's current state.
    #[error("invalid connection state: {0}")]
    InvalidState(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::MalformedEnvelope(e.to_string())
    }
}

/// Result type alias for roomrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
