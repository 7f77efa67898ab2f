//! Room implementation for roomrelay.
//!
//! A room fans out envelopes to its members through their [`ConnectionHandle`]s.
//! All membership changes and broadcasts run under one per-room lock, so every member
//! sees the same order of a room's broadcasts.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use super::connection::{ConnectionHandle, ConnectionId};
use super::envelope::{ServerEnvelope, DEPARTURE_NOTICE};
use crate::{RelayError, Result};

/// Default number of broadcast messages kept per room.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// The three parties recorded when a room is created.
///
/// These are opaque labels; connecting clients are not checked against them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Participants {
    /// Party that opened the room (the buyer in a dispute).
    pub initiator: Option<String>,
    /// The other party (the seller in a dispute).
    pub counterparty: Option<String>,
    /// Third party overseeing the room.
    pub mediator: Option<String>,
}

impl Participants {
    /// Create a participant record.
    pub fn new(
        initiator: impl Into<String>,
        counterparty: impl Into<String>,
        mediator: impl Into<String>,
    ) -> Self {
        Self {
            initiator: Some(initiator.into()),
            counterparty: Some(counterparty.into()),
            mediator: Some(mediator.into()),
        }
    }
}

/// A message that was broadcast to a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    /// Sender label, if the submitter gave one.
    pub sender: Option<String>,
    /// Opaque payload.
    pub content: Value,
    /// Broadcast time.
    pub sent_at: DateTime<Utc>,
}

impl RoomMessage {
    /// Create an anonymous message.
    pub fn new(content: Value) -> Self {
        Self {
            sender: None,
            content,
            sent_at: Utc::now(),
        }
    }

    /// Create a message with a sender label.
    pub fn from_sender(sender: impl Into<String>, content: Value) -> Self {
        Self {
            sender: Some(sender.into()),
            content,
            sent_at: Utc::now(),
        }
    }

    /// Create the notice broadcast when a member leaves.
    pub fn departure() -> Self {
        Self::new(Value::String(DEPARTURE_NOTICE.to_string()))
    }
}

/// Mutable part of a room, guarded by the room lock.
struct RoomState {
    members: HashMap<ConnectionId, ConnectionHandle>,
    history: VecDeque<RoomMessage>,
    closed: bool,
}

/// A relay room.
pub struct Room {
    /// Room ID.
    id: String,
    /// Parties recorded at creation.
    participants: Participants,
    /// Creation timestamp.
    created_at: DateTime<Utc>,
    /// Maximum number of history entries.
    history_limit: usize,
    state: Mutex<RoomState>,
}

impl Room {
    /// Create a new room.
    pub fn new(id: impl Into<String>, participants: Participants) -> Self {
        Self::with_history_limit(id, participants, DEFAULT_HISTORY_LIMIT)
    }

    /// Create a new room keeping at most `history_limit` messages (0 keeps none).
    pub fn with_history_limit(
        id: impl Into<String>,
        participants: Participants,
        history_limit: usize,
    ) -> Self {
        Self {
            id: id.into(),
            participants,
            created_at: Utc::now(),
            history_limit,
            state: Mutex::new(RoomState {
                members: HashMap::new(),
                history: VecDeque::new(),
                closed: false,
            }),
        }
    }

    /// Get the room ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the recorded participants.
    pub fn participants(&self) -> &Participants {
        &self.participants
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the number of connected members.
    pub async fn member_count(&self) -> usize {
        self.state.lock().await.members.len()
    }

    /// Check if a connection is a member.
    pub async fn is_member(&self, connection_id: ConnectionId) -> bool {
        self.state.lock().await.members.contains_key(&connection_id)
    }

    /// Whether the room has been closed.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    /// Get the retained messages, oldest first.
    pub async fn history(&self) -> Vec<RoomMessage> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    /// Add a connection to the room and acknowledge it with `CONNECTED`.
    ///
    /// The acknowledgement is queued under the room lock, so it always precedes any
    /// broadcast the new member receives. Fails only if the room was already closed.
    pub async fn join(&self, handle: ConnectionHandle) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(RelayError::RoomNotFound(self.id.clone()));
        }

        let connection_id = handle.id();
        if let Err(e) = handle.send(ServerEnvelope::Connected {
            room_id: self.id.clone(),
        }) {
            tracing::debug!(room_id = %self.id, error = %e, "Joining connection already gone");
        }
        state.members.insert(connection_id, handle);
        tracing::info!(
            room_id = %self.id,
            connection_id = %connection_id,
            members = state.members.len(),
            "Connection joined room"
        );
        Ok(())
    }

    /// Broadcast anonymous content to every member.
    ///
    /// Returns the number of members the message was delivered to.
    pub async fn broadcast(&self, content: Value) -> usize {
        self.broadcast_message(RoomMessage::new(content)).await
    }

    /// Broadcast a message to every member as `NEW_MESSAGE`.
    ///
    /// A failed send to one member never stops delivery to the others.
    pub async fn broadcast_message(&self, message: RoomMessage) -> usize {
        let mut state = self.state.lock().await;
        if state.closed {
            return 0;
        }
        self.record(&mut state, message.clone());
        Self::fan_out(&self.id, &state, message.content)
    }

    /// Remove a connection and announce the departure to the remaining members.
    ///
    /// The notice is broadcast even when the connection was not a member, so a leave
    /// always produces exactly one departure broadcast. Returns true if a member was
    /// removed.
    pub async fn leave(&self, connection_id: ConnectionId) -> bool {
        let mut state = self.state.lock().await;
        if state.closed {
            return false;
        }

        let removed = state.members.remove(&connection_id).is_some();
        tracing::info!(
            room_id = %self.id,
            connection_id = %connection_id,
            removed,
            members = state.members.len(),
            "Connection left room"
        );
        self.announce_departure(&mut state);
        removed
    }

    /// Notify every member that the room is closed, then close their connections.
    ///
    /// Returns the number of members that were ejected. Running it on an already
    /// closed room does nothing.
    pub async fn close_and_notify(&self) -> usize {
        let mut state = self.state.lock().await;
        state.closed = true;

        let members: Vec<ConnectionHandle> = state.members.drain().map(|(_, h)| h).collect();
        for handle in &members {
            if let Err(e) = handle.send(ServerEnvelope::ChatClosed) {
                tracing::debug!(room_id = %self.id, error = %e, "Close notice not delivered");
            }
            // Close regardless of whether the notice went through.
            let _ = handle.close();
        }

        tracing::info!(room_id = %self.id, ejected = members.len(), "Room closed");
        members.len()
    }

    /// Broadcast the departure notice. Caller holds the room lock.
    fn announce_departure(&self, state: &mut RoomState) -> usize {
        let notice = RoomMessage::departure();
        self.record(state, notice.clone());
        Self::fan_out(&self.id, state, notice.content)
    }

    fn record(&self, state: &mut RoomState, message: RoomMessage) {
        if self.history_limit == 0 {
            return;
        }
        while state.history.len() >= self.history_limit {
            state.history.pop_front();
        }
        state.history.push_back(message);
    }

    fn fan_out(room_id: &str, state: &RoomState, content: Value) -> usize {
        let envelope = ServerEnvelope::NewMessage { content };
        let mut delivered = 0;
        for handle in state.members.values() {
            match handle.send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    // Dropped for this member only; a gone member's own task runs the
                    // disconnect path, a stalled one keeps what is already queued.
                    tracing::warn!(room_id = %room_id, error = %e, "Broadcast to member failed");
                }
            }
        }
        delivered
    }
}
