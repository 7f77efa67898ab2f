//! roomrelay - a room-scoped message relay.
//!
//! Clients join a room over a WebSocket and every message a member sends is
//! broadcast to all current members of that room.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod web;

pub use chat::{
    dispatch, ClientEnvelope, Connection, ConnectionHandle, ConnectionId, ConnectionState,
    Dispatch, Outbound, Participants, Room, RoomMessage, RoomRegistry, ServerEnvelope,
};
pub use config::Config;
pub use error::{RelayError, Result};
pub use web::WebServer;
