//! Response DTOs for the relay API.

use serde::Serialize;

use crate::chat::{Participants, RoomMessage};

/// Room created.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    /// Always true.
    pub success: bool,
    /// New room ID.
    pub room_id: String,
}

/// Room details and retained history.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomHistoryResponse {
    /// Always true.
    pub success: bool,
    /// Room ID.
    pub room_id: String,
    /// Parties recorded at creation.
    pub participants: Participants,
    /// Currently connected members.
    pub member_count: usize,
    /// Retained messages, oldest first.
    pub messages: Vec<RoomMessage>,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    /// Always true.
    pub success: bool,
    /// Human-readable result.
    pub message: String,
}

impl AckResponse {
    /// Create a successful acknowledgement.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
