//! Room handlers for the relay API.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::chat::RoomMessage;
use crate::RelayError;
use crate::web::dto::{
    AckResponse, CreateRoomRequest, CreateRoomResponse, RoomHistoryResponse, SendMessageRequest,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// POST /dispute - Create a room for three parties.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateRoomRequest>,
) -> Json<CreateRoomResponse> {
    let room = state.registry.create_room(req.into()).await;
    Json(CreateRoomResponse {
        success: true,
        room_id: room.id().to_string(),
    })
}

/// GET /chat/:room_id - Get room details and retained messages.
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomHistoryResponse>, ApiError> {
    let room = state.registry.require(&room_id).await?;

    Ok(Json(RoomHistoryResponse {
        success: true,
        room_id: room.id().to_string(),
        participants: room.participants().clone(),
        member_count: room.member_count().await,
        messages: room.history().await,
    }))
}

/// POST /chat/send - Broadcast a message without a WebSocket.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<AckResponse>, ApiError> {
    let room = state.registry.require(&req.room_id).await?;

    let message = match req.sender {
        Some(sender) => RoomMessage::from_sender(sender, req.content),
        None => RoomMessage::new(req.content),
    };
    let delivered = room.broadcast_message(message).await;
    tracing::debug!(room_id = %req.room_id, delivered, "Message submitted over HTTP");

    Ok(Json(AckResponse::ok("Message sent.")))
}

/// DELETE /chat/:room_id - Close a room and disconnect its members.
pub async fn close_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<AckResponse>, ApiError> {
    if !state.registry.close(&room_id).await {
        return Err(RelayError::RoomNotFound(room_id).into());
    }
    Ok(Json(AckResponse::ok("Chat room closed.")))
}
