//! Relay WebSocket handler.
//!
//! Each upgraded socket is driven by one task that selects over inbound frames,
//! the connection outbox and the idle deadline.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;

use crate::chat::{dispatch, ClientEnvelope, Connection, Dispatch, Outbound};
use crate::RelayError;
use crate::web::dto::WsQuery;
use crate::web::handlers::AppState;

type WsSender = SplitSink<WebSocket, Message>;

/// WebSocket relay handler.
///
/// GET /ws?roomId={room_id}
pub async fn relay_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.room_id))
}

/// Why the session loop ended.
enum Exit {
    /// The server closed the socket (leave, room closure, failed join).
    Local,
    /// The peer went away, errored, or idled out.
    Remote,
}

/// Drive one relay connection until it closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, room_id: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let registry = state.registry.as_ref();

    let mut connection = Connection::new();
    let connection_id = connection.id();

    let room_id = match connection.join(registry, room_id.as_deref()).await {
        Ok(room) => room.id().to_string(),
        Err(e) => {
            tracing::debug!(connection_id = %connection_id, "WebSocket rejected: {}", e);
            // Flush ERROR and the close request.
            while let Some(item) = connection.try_next_outbound() {
                if deliver(&mut ws_sender, item).await.is_err() {
                    break;
                }
            }
            return;
        }
    };

    tracing::debug!(
        connection_id = %connection_id,
        room_id = %room_id,
        "WebSocket session started"
    );

    let mut deadline = state.idle_timeout.map(|d| Instant::now() + d);

    let exit = loop {
        tokio::select! {
            // Inbound frames
            frame = ws_receiver.next() => {
                let payload = match frame {
                    Some(Ok(Message::Text(text))) => Ok(text),
                    Some(Ok(Message::Binary(data))) => binary_text(data),
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %connection_id, "WebSocket closed by client");
                        break Exit::Remote;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        deadline = state.idle_timeout.map(|d| Instant::now() + d);
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break Exit::Remote;
                        }
                        continue;
                    }
                    Some(Ok(_)) => {
                        deadline = state.idle_timeout.map(|d| Instant::now() + d);
                        continue;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, "WebSocket error: {}", e);
                        break Exit::Remote;
                    }
                };

                deadline = state.idle_timeout.map(|d| Instant::now() + d);
                let Ok(envelope) = payload.and_then(|text| parse_inbound(&text)) else {
                    continue;
                };
                match dispatch(registry, &room_id, connection_id, envelope).await {
                    Dispatch::Left => {
                        connection.mark_closed();
                        let _ = deliver(&mut ws_sender, Outbound::Close).await;
                        break Exit::Local;
                    }
                    // A closed room queues CHAT_CLOSED and Close to us too.
                    Dispatch::Closed
                    | Dispatch::Broadcast { .. }
                    | Dispatch::RoomGone
                    | Dispatch::Ignored => {}
                }
            }

            // Envelopes queued by the room
            item = connection.next_outbound() => {
                let Some(item) = item else {
                    break Exit::Remote;
                };
                let closing = item == Outbound::Close;
                if deliver(&mut ws_sender, item).await.is_err() {
                    break Exit::Remote;
                }
                if closing {
                    connection.mark_closed();
                    break Exit::Local;
                }
            }

            _ = idle(deadline) => {
                tracing::info!(connection_id = %connection_id, "Closing idle WebSocket");
                let _ = deliver(&mut ws_sender, Outbound::Close).await;
                break Exit::Remote;
            }
        }
    };

    if matches!(exit, Exit::Remote) {
        connection.disconnect(registry).await;
    }
    tracing::debug!(
        connection_id = %connection_id,
        room_id = %room_id,
        state = %connection.state(),
        "WebSocket session ended"
    );
}

/// Parse an inbound text frame, logging and dropping malformed input.
fn parse_inbound(text: &str) -> crate::Result<ClientEnvelope> {
    ClientEnvelope::parse(text).map_err(|e| {
        tracing::debug!("Failed to parse client envelope: {}", e);
        e
    })
}

/// Decode a binary frame; clients may send envelopes as UTF-8 bytes.
fn binary_text(data: Vec<u8>) -> crate::Result<String> {
    String::from_utf8(data).map_err(|e| {
        tracing::debug!("Failed to decode binary frame: {}", e);
        RelayError::MalformedEnvelope(e.to_string())
    })
}

/// Write one outbound item to the socket.
async fn deliver(ws_sender: &mut WsSender, item: Outbound) -> Result<(), axum::Error> {
    match item {
        Outbound::Envelope(envelope) => match envelope.to_json() {
            Ok(json) => ws_sender.send(Message::Text(json.into())).await,
            Err(e) => {
                tracing::error!("Failed to encode envelope: {}", e);
                Ok(())
            }
        },
        Outbound::Close => ws_sender.send(Message::Close(None)).await,
    }
}

/// Resolve when the idle deadline passes; never resolves without one.
async fn idle(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
