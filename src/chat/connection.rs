//! Relay connections.
//!
//! A [`Connection`] is one participant's channel into a room. Rooms never touch the
//! socket directly: they push [`Outbound`] items through a [`ConnectionHandle`], and
//! the task that owns the socket drains them from the connection's outbox.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use super::envelope::{ServerEnvelope, ROOM_MISSING_MESSAGE};
use super::registry::RoomRegistry;
use super::room::Room;
use crate::{RelayError, Result};

/// Maximum number of envelopes waiting in a connection's outbox.
///
/// One extra slot is kept free so a close request always fits.
pub const OUTBOX_CAPACITY: usize = 256;

/// Unique identifier of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, room existence not yet confirmed.
    Pending,
    /// Member of a room.
    Joined,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Pending => "pending",
            ConnectionState::Joined => "joined",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Item queued for delivery to a connection's socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Send an envelope.
    Envelope(ServerEnvelope),
    /// Close the socket.
    Close,
}

/// Sending side of a connection, held by the room it belongs to.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    /// Get the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an envelope without waiting.
    ///
    /// Fails with [`RelayError::OutboxFull`] when [`OUTBOX_CAPACITY`] envelopes are
    /// already waiting, and with [`RelayError::PeerSendFailure`] once the connection's
    /// task has gone away. The envelope is dropped in both cases.
    pub fn send(&self, envelope: ServerEnvelope) -> Result<()> {
        if self.sender.is_closed() {
            return Err(RelayError::PeerSendFailure(self.id.to_string()));
        }
        // Last slot is reserved for Close.
        if self.sender.capacity() <= 1 {
            return Err(RelayError::OutboxFull(self.id.to_string()));
        }
        self.sender
            .try_send(Outbound::Envelope(envelope))
            .map_err(|e| self.send_error(e))
    }

    /// Ask the connection to close its socket.
    ///
    /// Uses the reserved slot, so it succeeds even when the outbox is full of envelopes.
    pub fn close(&self) -> Result<()> {
        self.sender
            .try_send(Outbound::Close)
            .map_err(|e| self.send_error(e))
    }

    fn send_error(&self, err: TrySendError<Outbound>) -> RelayError {
        match err {
            TrySendError::Full(_) => RelayError::OutboxFull(self.id.to_string()),
            TrySendError::Closed(_) => RelayError::PeerSendFailure(self.id.to_string()),
        }
    }

    /// Whether the receiving side is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// One participant's channel into a room.
pub struct Connection {
    id: ConnectionId,
    room_id: Option<String>,
    state: ConnectionState,
    handle: ConnectionHandle,
    outbox: mpsc::Receiver<Outbound>,
}

impl Connection {
    /// Create a pending connection.
    pub fn new() -> Self {
        let id = ConnectionId::new();
        let (sender, outbox) = mpsc::channel(OUTBOX_CAPACITY + 1);
        Self {
            id,
            room_id: None,
            state: ConnectionState::Pending,
            handle: ConnectionHandle { id, sender },
            outbox,
        }
    }

    /// Get the connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Get the associated room ID.
    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// Get a sending handle for this connection.
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Resolve the target room and join it.
    ///
    /// On success the room queues `CONNECTED` and the connection is `Joined`. If the
    /// room is missing (or closed concurrently), an `ERROR` envelope and a close request
    /// are queued and the connection goes straight to `Closed`.
    ///
    /// A connection joins at most once; calling this again fails with
    /// [`RelayError::InvalidState`] and leaves the connection untouched.
    pub async fn join(
        &mut self,
        registry: &RoomRegistry,
        room_id: Option<&str>,
    ) -> Result<Arc<Room>> {
        if self.state != ConnectionState::Pending {
            return Err(RelayError::InvalidState(format!(
                "connection {} is {}, expected pending",
                self.id, self.state
            )));
        }

        let room = match room_id {
            Some(id) => registry.get(id).await,
            None => None,
        };
        let joined = match room {
            Some(room) => room.join(self.handle()).await.map(|_| room),
            None => Err(RelayError::RoomNotFound(
                room_id.unwrap_or_default().to_string(),
            )),
        };

        match joined {
            Ok(room) => {
                self.room_id = Some(room.id().to_string());
                self.state = ConnectionState::Joined;
                Ok(room)
            }
            Err(e) => {
                // Our own receiver is alive, so these cannot fail.
                let _ = self.handle.send(ServerEnvelope::error(ROOM_MISSING_MESSAGE));
                let _ = self.handle.close();
                self.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    /// Wait for the next item to deliver to the socket.
    pub async fn next_outbound(&mut self) -> Option<Outbound> {
        self.outbox.recv().await
    }

    /// Take an already queued item without waiting.
    pub fn try_next_outbound(&mut self) -> Option<Outbound> {
        self.outbox.try_recv().ok()
    }

    /// Mark the connection closed after the socket has been shut down locally.
    ///
    /// Only call this once the room no longer lists the connection: after an explicit
    /// leave, after the room drained its members on close, or after a failed join.
    pub fn mark_closed(&mut self) {
        self.state = ConnectionState::Closed;
    }

    /// Handle the underlying channel going away.
    ///
    /// A joined connection leaves its room first, which announces the departure.
    pub async fn disconnect(&mut self, registry: &RoomRegistry) {
        if self.state == ConnectionState::Joined {
            if let Some(room_id) = self.room_id.as_deref() {
                registry.leave_room(room_id, self.id).await;
            }
        }
        self.state = ConnectionState::Closed;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::room::Participants;
    use serde_json::json;

    #[test]
    fn test_connection_new_is_pending() {
        let conn = Connection::new();
        assert_eq!(conn.state(), ConnectionState::Pending);
        assert!(conn.room_id().is_none());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_connection_state_as_str() {
        assert_eq!(ConnectionState::Pending.as_str(), "pending");
        assert_eq!(ConnectionState::Joined.as_str(), "joined");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    #[tokio::test]
    async fn test_handle_send_delivers_to_outbox() {
        let mut conn = Connection::new();
        let handle = conn.handle();
        handle
            .send(ServerEnvelope::NewMessage {
                content: json!("hi"),
            })
            .unwrap();

        assert_eq!(
            conn.next_outbound().await,
            Some(Outbound::Envelope(ServerEnvelope::NewMessage {
                content: json!("hi")
            }))
        );
    }

    #[test]
    fn test_handle_send_after_drop_fails() {
        let conn = Connection::new();
        let handle = conn.handle();
        drop(conn);

        assert!(handle.is_closed());
        let result = handle.send(ServerEnvelope::ChatClosed);
        assert!(matches!(result, Err(RelayError::PeerSendFailure(_))));
        assert!(handle.close().is_err());
    }

    #[test]
    fn test_outbox_is_bounded() {
        let mut conn = Connection::new();
        let handle = conn.handle();

        let accepted = (0..OUTBOX_CAPACITY + 50)
            .filter(|i| {
                handle
                    .send(ServerEnvelope::NewMessage { content: json!(i) })
                    .is_ok()
            })
            .count();
        assert_eq!(accepted, OUTBOX_CAPACITY);

        let overflow = handle.send(ServerEnvelope::ChatClosed);
        assert!(matches!(overflow, Err(RelayError::OutboxFull(_))));

        // Close still fits in the reserved slot and arrives last.
        handle.close().unwrap();
        let mut items = Vec::new();
        while let Some(item) = conn.try_next_outbound() {
            items.push(item);
        }
        assert_eq!(items.len(), OUTBOX_CAPACITY + 1);
        assert_eq!(items.last(), Some(&Outbound::Close));
    }

    #[test]
    fn test_outbox_accepts_again_after_drain() {
        let mut conn = Connection::new();
        let handle = conn.handle();
        for i in 0..OUTBOX_CAPACITY {
            handle
                .send(ServerEnvelope::NewMessage { content: json!(i) })
                .unwrap();
        }
        assert!(handle.send(ServerEnvelope::ChatClosed).is_err());

        let _ = conn.try_next_outbound();

        handle.send(ServerEnvelope::ChatClosed).unwrap();
    }

    #[tokio::test]
    async fn test_join_existing_room() {
        let registry = RoomRegistry::new();
        let room = registry.create_room(Participants::default()).await;

        let mut conn = Connection::new();
        let joined = conn.join(&registry, Some(room.id())).await.unwrap();

        assert_eq!(joined.id(), room.id());
        assert_eq!(conn.state(), ConnectionState::Joined);
        assert_eq!(conn.room_id(), Some(room.id()));
        assert!(room.is_member(conn.id()).await);
        assert_eq!(
            conn.try_next_outbound(),
            Some(Outbound::Envelope(ServerEnvelope::Connected {
                room_id: room.id().to_string()
            }))
        );
    }

    #[tokio::test]
    async fn test_join_missing_room_sends_error_and_closes() {
        let registry = RoomRegistry::new();
        let mut conn = Connection::new();

        let result = conn.join(&registry, Some("room_missing")).await;

        assert!(matches!(result, Err(RelayError::RoomNotFound(_))));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(
            conn.try_next_outbound(),
            Some(Outbound::Envelope(ServerEnvelope::error(
                ROOM_MISSING_MESSAGE
            )))
        );
        assert_eq!(conn.try_next_outbound(), Some(Outbound::Close));
    }

    #[tokio::test]
    async fn test_join_without_room_id() {
        let registry = RoomRegistry::new();
        let mut conn = Connection::new();

        assert!(conn.join(&registry, None).await.is_err());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_join_twice_is_a_state_error() {
        let registry = RoomRegistry::new();
        let room = registry.create_room(Participants::default()).await;
        let mut conn = Connection::new();
        conn.join(&registry, Some(room.id())).await.unwrap();
        let _ = conn.try_next_outbound();

        let result = conn.join(&registry, Some(room.id())).await;

        assert!(matches!(result, Err(RelayError::InvalidState(_))));
        assert_eq!(conn.state(), ConnectionState::Joined);
        assert!(conn.try_next_outbound().is_none());
    }

    #[tokio::test]
    async fn test_join_closed_room_is_rejected() {
        let registry = RoomRegistry::new();
        let room = registry.create_room(Participants::default()).await;
        room.close_and_notify().await;

        let mut conn = Connection::new();
        // The room is still reachable through the Arc but no longer accepts members.
        let result = room.join(conn.handle()).await;
        assert!(result.is_err());
        assert_eq!(room.member_count().await, 0);
        assert!(conn.try_next_outbound().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_leaves_room() {
        let registry = RoomRegistry::new();
        let room = registry.create_room(Participants::default()).await;

        let mut conn = Connection::new();
        let mut peer = Connection::new();
        conn.join(&registry, Some(room.id())).await.unwrap();
        peer.join(&registry, Some(room.id())).await.unwrap();
        let _ = peer.try_next_outbound();

        conn.disconnect(&registry).await;

        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(room.member_count().await, 1);
        assert_eq!(
            peer.try_next_outbound(),
            Some(Outbound::Envelope(ServerEnvelope::NewMessage {
                content: json!(crate::chat::envelope::DEPARTURE_NOTICE)
            }))
        );
    }

    #[tokio::test]
    async fn test_disconnect_after_leave_announces_once() {
        let registry = RoomRegistry::new();
        let room = registry.create_room(Participants::default()).await;
        let mut conn = Connection::new();
        let mut peer = Connection::new();
        conn.join(&registry, Some(room.id())).await.unwrap();
        peer.join(&registry, Some(room.id())).await.unwrap();
        let _ = peer.try_next_outbound();

        // Explicit leave, then the socket is shut down locally.
        registry.leave_room(room.id(), conn.id()).await;
        conn.mark_closed();
        conn.disconnect(&registry).await;

        assert!(!room.is_member(conn.id()).await);
        assert_eq!(
            peer.try_next_outbound(),
            Some(Outbound::Envelope(ServerEnvelope::NewMessage {
                content: json!(crate::chat::envelope::DEPARTURE_NOTICE)
            }))
        );
        assert!(peer.try_next_outbound().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_after_room_close_is_silent() {
        let registry = RoomRegistry::new();
        let room = registry.create_room(Participants::default()).await;
        let mut conn = Connection::new();
        conn.join(&registry, Some(room.id())).await.unwrap();

        registry.close(room.id()).await;
        conn.mark_closed();
        conn.disconnect(&registry).await;

        assert!(!room.is_member(conn.id()).await);
        assert_eq!(room.member_count().await, 0);
        assert!(room.history().await.is_empty());
    }
}
