//! WebSocket module for the relay.
//!
//! Clients connect to `/ws?roomId=...` and exchange JSON envelopes with their room.

pub mod chat;

pub use chat::relay_ws_handler;
