//! WebSocket push channel.
//!
//! Clients connect to `/ws` and receive JSON events:
//! - `{ "type": "connection_established", "message": ... }` on connect
//! - `{ "type": "opportunities_update", "count": ..., "opportunities": [...] }`
//!   once for the current snapshot, then after every refresh cycle

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use chrono::Utc;
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::routes::AppState;
use crate::types::DashboardEvent;

/// WebSocket upgrade handler at GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    // Subscribe before the snapshot so no cycle falls in between.
    let mut rx = state.events.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!(subscribers = state.events.receiver_count(), "WebSocket client connected");

    let greeting = DashboardEvent::ConnectionEstablished {
        message: format!("Connected to {}", state.info.name),
    };
    let latest = state.store.latest().await;
    let snapshot = DashboardEvent::update(&latest, state.info.broadcast_top_n, Utc::now().timestamp_millis());

    for event in [greeting, snapshot] {
        if send_event(&mut sender, &event).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(evt) => {
                    if send_event(&mut sender, &evt).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "WebSocket client lagged, skipped events");
                }
                Err(RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) if is_ping(&text) => {
                    if sender.send(Message::Text(pong_message())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("WebSocket client disconnected");
}

async fn send_event<S>(sender: &mut S, event: &DashboardEvent) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize event");
            return Ok(());
        }
    };
    sender.send(Message::Text(json)).await.map_err(|_| {
        debug!("WebSocket send failed, client gone");
    })
}

/// Accepts a bare `ping` or `{"type":"ping"}`.
fn is_ping(text: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case("ping") {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "ping"))
        .unwrap_or(false)
}

fn pong_message() -> String {
    serde_json::json!({ "type": "pong", "timestamp": Utc::now().timestamp_millis() }).to_string()
}
