//! Envelope types exchanged over a relay connection.
//!
//! Every frame is a JSON object carrying a `type` tag in SCREAMING_SNAKE_CASE
//! (`MESSAGE`, `NEW_MESSAGE`, `CLOSE_CHAT`, ...).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RelayError, Result};

/// Content broadcast when a member leaves a room.
pub const DEPARTURE_NOTICE: &str = "A user has left the chat.";

/// Message sent to a connection that targets an unknown room.
pub const ROOM_MISSING_MESSAGE: &str = "Chat room does not exist.";

/// Envelopes sent from a client to the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEnvelope {
    /// Broadcast `content` to the whole room.
    Message {
        /// Opaque payload (`null` when the client omitted it).
        content: Value,
    },
    /// Leave the room.
    Leave,
    /// Close the room for every member.
    CloseChat,
    /// A well-formed envelope whose tag the relay does not know.
    Unrecognized(String),
}

/// Raw shape of an inbound frame before the tag is resolved.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

impl ClientEnvelope {
    /// Parse an inbound text frame.
    ///
    /// Bad JSON or a missing `type` is a [`RelayError::MalformedEnvelope`]; an unknown
    /// tag parses successfully as [`ClientEnvelope::Unrecognized`].
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        Ok(match raw.kind.as_str() {
            "MESSAGE" => ClientEnvelope::Message {
                content: raw.content,
            },
            "LEAVE" => ClientEnvelope::Leave,
            "CLOSE_CHAT" => ClientEnvelope::CloseChat,
            _ => ClientEnvelope::Unrecognized(raw.kind),
        })
    }

    /// Wire tag of this envelope.
    pub fn tag(&self) -> &str {
        match self {
            ClientEnvelope::Message { .. } => "MESSAGE",
            ClientEnvelope::Leave => "LEAVE",
            ClientEnvelope::CloseChat => "CLOSE_CHAT",
            ClientEnvelope::Unrecognized(tag) => tag,
        }
    }
}

/// Envelopes sent from the relay to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEnvelope {
    /// The connection joined a room.
    Connected {
        /// Joined room.
        #[serde(rename = "roomId")]
        room_id: String,
    },
    /// The connection could not be served.
    Error {
        /// Human-readable reason.
        message: String,
    },
    /// A message broadcast to the room.
    NewMessage {
        /// Opaque payload.
        content: Value,
    },
    /// The room has been closed.
    ChatClosed,
}

impl ServerEnvelope {
    /// Create an error envelope.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(RelayError::from)
    }
}
