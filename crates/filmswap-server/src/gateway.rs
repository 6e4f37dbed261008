use std::time::Duration;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use filmswap_types::ParticipantId;

use crate::AppState;
use crate::dispatcher::Dispatcher;

/// Server sends a Ping every 15 seconds. Two missed Pongs drop the connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct GatewayQuery {
    pub participant: ParticipantId,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, dispatcher, query.participant))
}

/// Stream notifications addressed to `id` until either side hangs up.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, id: ParticipantId) {
    let (mut sender, mut receiver) = socket.split();
    if dispatcher.is_connected(id) {
        info!("{} reconnected, replacing the previous gateway connection", id);
    }
    let Some((conn_id, mut rx)) = dispatcher.register(id) else {
        let _ = sender.send(Message::Close(None)).await;
        return;
    };
    info!("{} connected to gateway", id);

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                let Some(addressed) = outgoing else { break };
                let text = match serde_json::to_string(&addressed) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Could not encode {} for {}: {}", addressed.notification.kind(), id, e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Pong(_))) => pong_received = true,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if std::mem::replace(&mut pong_received, false) {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout for {} (missed {} pongs), dropping connection", id, missed_heartbeats);
                        break;
                    }
                }
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
        }
    }

    dispatcher.unregister(id, conn_id);
    info!("{} disconnected from gateway", id);
}
