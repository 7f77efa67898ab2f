//! HTTP and WebSocket frontend for the relay.
//!
//! This module exposes room creation, room queries and message submission over
//! HTTP, plus the streaming `/ws` endpoint that drives relay connections.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
