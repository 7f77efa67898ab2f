//! Router configuration for the relay.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{close_room, create_room, get_room, send_message, AppState};
use super::middleware::create_cors_layer;
use super::ws::relay_ws_handler;

/// Create the relay router: HTTP room API plus the `/ws` endpoint.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let chat_routes = Router::new()
        .route("/send", post(send_message))
        .route("/:room_id", get(get_room).delete(close_room));

    Router::new()
        .route("/dispute", post(create_room))
        .nest("/chat", chat_routes)
        .route("/ws", get(relay_ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::RoomRegistry;

    #[test]
    fn test_create_router() {
        let state = Arc::new(AppState::new(Arc::new(RoomRegistry::new())));
        let _router = create_router(state, &[]);
    }

    #[test]
    fn test_create_health_router() {
        let _router = create_health_router();
    }
}
