//! Room registry for roomrelay.
//!
//! The registry is the process-wide directory of rooms. It is shared across all
//! connection tasks and HTTP handlers as an `Arc<RoomRegistry>`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::connection::ConnectionId;
use super::room::{Participants, Room, DEFAULT_HISTORY_LIMIT};
use crate::config::RoomsConfig;
use crate::{RelayError, Result};

/// Generate a room identifier shaped `room_<unix millis>_<8 hex chars>`.
fn generate_room_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("room_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}

/// Directory of live rooms.
pub struct RoomRegistry {
    /// Rooms indexed by ID.
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    /// Remove a room when its last member leaves.
    reap_empty: bool,
    /// History limit for new rooms.
    history_limit: usize,
}

impl RoomRegistry {
    /// Create a registry that keeps empty rooms.
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            reap_empty: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Create a registry from the `[rooms]` configuration.
    pub fn from_config(config: &RoomsConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            reap_empty: config.reap_empty,
            history_limit: config.history_limit,
        }
    }

    /// Create a room with a fresh identifier.
    pub async fn create_room(&self, participants: Participants) -> Arc<Room> {
        let mut rooms = self.rooms.write().await;

        let mut id = generate_room_id();
        while rooms.contains_key(&id) {
            id = generate_room_id();
        }

        let room = Arc::new(Room::with_history_limit(
            &id,
            participants,
            self.history_limit,
        ));
        rooms.insert(id.clone(), Arc::clone(&room));
        tracing::info!(room_id = %id, rooms = rooms.len(), "Room created");
        room
    }

    /// Get a room by ID.
    pub async fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Get a room by ID, failing with [`RelayError::RoomNotFound`] if it is unknown.
    pub async fn require(&self, room_id: &str) -> Result<Arc<Room>> {
        self.get(room_id)
            .await
            .ok_or_else(|| RelayError::RoomNotFound(room_id.to_string()))
    }

    /// Get the number of rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// List room IDs, sorted.
    pub async fn list_rooms(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rooms.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Remove a connection from a room.
    ///
    /// With reaping enabled, a room left empty is removed from the registry.
    /// Returns true if the connection was a member.
    pub async fn leave_room(&self, room_id: &str, connection_id: ConnectionId) -> bool {
        let Some(room) = self.get(room_id).await else {
            return false;
        };
        let removed = room.leave(connection_id).await;

        if self.reap_empty {
            let mut rooms = self.rooms.write().await;
            // Re-check under the write lock; someone may have joined meanwhile.
            if let Some(current) = rooms.get(room_id) {
                if Arc::ptr_eq(current, &room) && current.member_count().await == 0 {
                    rooms.remove(room_id);
                    drop(rooms);
                    room.close_and_notify().await;
                    tracing::info!(room_id = %room_id, "Reaped empty room");
                }
            }
        }

        removed
    }

    /// Close a room: notify and disconnect all members, then forget it.
    ///
    /// Returns false if the room did not exist.
    pub async fn close(&self, room_id: &str) -> bool {
        // Unregister first so no new connection can find it.
        let room = self.rooms.write().await.remove(room_id);
        match room {
            Some(room) => {
                room.close_and_notify().await;
                true
            }
            None => {
                tracing::debug!(room_id = %room_id, "Close requested for unknown room");
                false
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
