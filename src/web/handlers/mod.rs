//! API handlers for the relay frontend.

pub mod rooms;

pub use rooms::*;

use std::sync::Arc;
use std::time::Duration;

use crate::chat::RoomRegistry;
use crate::config::Config;

/// Shared state for HTTP and WebSocket handlers.
pub struct AppState {
    /// Room directory.
    pub registry: Arc<RoomRegistry>,
    /// Close a WebSocket after this much inbound silence.
    pub idle_timeout: Option<Duration>,
}

impl AppState {
    /// Create state around an existing registry.
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self {
            registry,
            idle_timeout: None,
        }
    }

    /// Create state from configuration with a fresh registry.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(RoomRegistry::from_config(&config.rooms)))
            .with_idle_timeout_secs(config.server.idle_timeout_secs)
    }

    /// Set the WebSocket idle timeout (0 disables it).
    pub fn with_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }
}
