//! Request DTOs for the relay API.

use serde::Deserialize;
use serde_json::Value;

use crate::chat::Participants;

/// Room creation request.
///
/// Accepts both the role names and the dispute-era field names
/// (`buyerId`, `sellerId`, `mediatorId`).
#[derive(Debug, Default, Deserialize)]
pub struct CreateRoomRequest {
    /// Party opening the room.
    #[serde(default, alias = "buyerId")]
    pub initiator: Option<String>,
    /// The other party.
    #[serde(default, alias = "sellerId")]
    pub counterparty: Option<String>,
    /// Overseeing party.
    #[serde(default, alias = "mediatorId")]
    pub mediator: Option<String>,
}

impl From<CreateRoomRequest> for Participants {
    fn from(req: CreateRoomRequest) -> Self {
        Participants {
            initiator: req.initiator,
            counterparty: req.counterparty,
            mediator: req.mediator,
        }
    }
}

/// Message submission request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Target room.
    pub room_id: String,
    /// Opaque payload.
    #[serde(default)]
    pub content: Value,
    /// Optional sender label, kept in the room history.
    #[serde(default)]
    pub sender: Option<String>,
}

/// Query parameters of the WebSocket endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    /// Room to join.
    pub room_id: Option<String>,
}
