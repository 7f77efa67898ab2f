//! Chat relay core.
//!
//! This module provides the room relay:
//! - Envelopes exchanged with clients
//! - Connections and their lifecycle
//! - Rooms with broadcast fan-out
//! - The room registry and envelope dispatch

mod connection;
mod dispatch;
mod envelope;
mod registry;
mod room;

pub use connection::{
    Connection, ConnectionHandle, ConnectionId, ConnectionState, Outbound, OUTBOX_CAPACITY,
};
pub use dispatch::{dispatch, Dispatch};
pub use envelope::{ClientEnvelope, ServerEnvelope, DEPARTURE_NOTICE, ROOM_MISSING_MESSAGE};
pub use registry::RoomRegistry;
pub use room::{Participants, Room, RoomMessage, DEFAULT_HISTORY_LIMIT};
