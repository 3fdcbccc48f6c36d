use axum::{
    body::Bytes,
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use postpilot_core::config::HEARTBEAT_INTERVAL_SECS;
use postpilot_notify::PushChannel;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Axum handler: upgrades HTTP to WebSocket at GET /ws/notifications.
///
/// The token is checked after the upgrade so a rejected client sees a
/// 1008 close frame rather than a bare HTTP error.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_connection(socket, state, query.token))
}

/// Per-connection event loop: lives for the entire WS session.
async fn run_connection(socket: WebSocket, state: Arc<AppState>, token: Option<String>) {
    let (mut tx, mut rx) = socket.split();

    let claims = match token.as_deref().map(|t| state.tokens.verify(t)) {
        Some(Ok(claims)) => claims,
        Some(Err(e)) => {
            warn!("WS rejected: {e}");
            let _ = tx.send(policy_close("Invalid token")).await;
            return;
        }
        None => {
            warn!("WS rejected: missing token");
            let _ = tx.send(policy_close("Missing token")).await;
            return;
        }
    };
    let user_id = claims.uid;

    let (channel, mut outbound) = PushChannel::new(state.config.notifications.channel_capacity);
    let channel_id = state.registry.register(user_id, channel);
    info!(user_id, channel_id = %channel_id, "notification socket connected");

    let mut tick = tokio::time::interval(std::time::Duration::from_secs(HEARTBEAT_INTERVAL_SECS));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately.
    tick.tick().await;

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        debug!(user_id, len = text.len(), "ignoring inbound text");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(user_id, "WS read error: {e}");
                        break;
                    }
                    _ => {}
                }
            }

            frame = outbound.recv() => {
                // None once the registry has dropped this channel.
                let Some(payload) = frame else { break };
                if tx.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }

            _ = tick.tick() => {
                if tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.registry.unregister(user_id, channel_id);
    info!(user_id, channel_id = %channel_id, "notification socket closed");
}

fn policy_close(reason: &str) -> Message {
    Message::Close(Some(CloseFrame {
        code: close_code::POLICY,
        reason: reason.to_string().into(),
    }))
}
