//! Envelope dispatch.
//!
//! Routes an inbound envelope from a joined connection to the matching room or
//! registry operation. Holds no state of its own.

use super::connection::ConnectionId;
use super::envelope::ClientEnvelope;
use super::registry::RoomRegistry;

/// What a dispatched envelope did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Content was broadcast to this many members.
    Broadcast {
        /// Successful deliveries.
        delivered: usize,
    },
    /// The connection left its room.
    Left,
    /// The room was closed.
    Closed,
    /// The room no longer exists.
    RoomGone,
    /// The envelope type is unknown and was dropped.
    Ignored,
}

/// Dispatch an envelope received on `connection_id`, a member of `room_id`.
pub async fn dispatch(
    registry: &RoomRegistry,
    room_id: &str,
    connection_id: ConnectionId,
    envelope: ClientEnvelope,
) -> Dispatch {
    match envelope {
        ClientEnvelope::Message { content } => match registry.get(room_id).await {
            Some(room) => Dispatch::Broadcast {
                delivered: room.broadcast(content).await,
            },
            None => Dispatch::RoomGone,
        },
        ClientEnvelope::Leave => {
            registry.leave_room(room_id, connection_id).await;
            Dispatch::Left
        }
        ClientEnvelope::CloseChat => {
            if registry.close(room_id).await {
                tracing::info!(
                    room_id = %room_id,
                    connection_id = %connection_id,
                    "Room closed by member"
                );
                Dispatch::Closed
            } else {
                Dispatch::RoomGone
            }
        }
        ClientEnvelope::Unrecognized(tag) => {
            tracing::info!(
                room_id = %room_id,
                connection_id = %connection_id,
                "Unknown message type: {}",
                tag
            );
            Dispatch::Ignored
        }
    }
}
