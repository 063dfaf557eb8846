//! Real-time WebSocket API.
//!
//! - `/ws` - WebSocket session endpoint
//! - `/api/realtime/stats` - Relay statistics
//!
//! ## WebSocket Protocol
//!
//! Authenticate with `/ws?token=<bearer token>`. Each text frame a client
//! sends is one message:
//!
//! ```json
//! {"sender": "u1", "content": "hi", "attachment": "https://img/u1.png"}
//! ```
//!
//! `sender` and `attachment` are taken from the verified identity when a
//! token is given. Every frame the server sends is one stamped message:
//!
//! ```json
//! {"sender": "u1", "content": "hi", "timestamp": 1700000000000}
//! ```
//!
//! Liveness uses WebSocket ping/pong control frames; a client that misses a
//! probe is disconnected on the next heartbeat.

use axum::{
    extract::{
        ws::{Message as WsFrame, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use murmur_auth::Identity;
use murmur_realtime::{Outbound, Relay, RelayStats, SessionEvent, SessionState};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::api::AppState;

/// How long a closing session may spend writing its final frames.
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Query parameters for the WebSocket upgrade.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Bearer token.
    pub token: Option<String>,
}

/// Create the real-time API routes.
pub fn realtime_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/realtime/stats", get(get_stats))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    let identity = match state.authenticate(params.token.as_deref()).await {
        Ok(identity) => identity,
        Err(e) => {
            debug!(error = %e, "WebSocket upgrade rejected");
            return e.into_response();
        }
    };

    let relay = state.relay.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, relay, identity))
}

/// Encode an outbound frame. `None` means the frame is dropped.
fn encode(frame: &Outbound) -> Option<WsFrame> {
    match frame {
        Outbound::Message(message) => match serde_json::to_string(message.as_ref()) {
            Ok(json) => Some(WsFrame::Text(json.into())),
            Err(e) => {
                error!(error = %e, "Failed to encode message");
                None
            }
        },
        Outbound::Ping => Some(WsFrame::Ping(Bytes::new())),
        Outbound::Close => Some(WsFrame::Close(None)),
    }
}

/// Translate an inbound frame into a session event.
fn decode(frame: Result<WsFrame, axum::Error>) -> Option<SessionEvent> {
    match frame {
        Ok(WsFrame::Text(text)) => Some(SessionEvent::Frame(text.as_str().to_owned())),
        Ok(WsFrame::Pong(_)) => Some(SessionEvent::Pong),
        Ok(WsFrame::Close(_)) => Some(SessionEvent::Closed),
        // Pings are answered by the WebSocket layer.
        Ok(WsFrame::Ping(_)) => None,
        Ok(WsFrame::Binary(_)) => None,
        Err(e) => Some(SessionEvent::Failed(e.to_string())),
    }
}

/// Drive one WebSocket session.
async fn handle_socket(socket: WebSocket, relay: Arc<Relay>, identity: Option<Identity>) {
    let (connection, mut outbound) = match relay.sessions().on_connect(identity) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Failed to open session");
            return;
        }
    };
    let client_id = connection.id.clone();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Forward relay frames to the socket until closed.
    let send_client_id = client_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let closing = frame == Outbound::Close;
            if let Some(ws_frame) = encode(&frame) {
                if ws_sender.send(ws_frame).await.is_err() {
                    break;
                }
            }
            if closing {
                break;
            }
        }
        debug!(client_id = %send_client_id, "Send task ended");
    });

    let closed_by_peer = loop {
        tokio::select! {
            frame = ws_receiver.next() => {
                let event = match frame {
                    Some(frame) => match decode(frame) {
                        Some(event) => event,
                        None => continue,
                    },
                    None => SessionEvent::Closed,
                };
                if relay.sessions().handle(&connection, event) == SessionState::Closed {
                    break true;
                }
            }
            _ = &mut send_task => break false,
        }
    };

    relay.sessions().on_close(&client_id);
    if closed_by_peer {
        // on_close queued a Close frame; give the send task a moment to write it.
        if tokio::time::timeout(CLOSE_FLUSH_TIMEOUT, &mut send_task)
            .await
            .is_err()
        {
            send_task.abort();
        }
    }
}

/// Get relay statistics.
async fn get_stats(State(state): State<AppState>) -> Json<RelayStats> {
    Json(state.relay.stats())
}
