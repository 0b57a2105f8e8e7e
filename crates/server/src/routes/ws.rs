use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::interval;

use crate::messages::{ClientMessage, ServerMessage, SubscriptionFilter};
use crate::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

#[utoipa::path(
    get,
    path = "/api/v1/ws",
    responses(
        (status = 101, description = "WebSocket upgrade; progress envelopes are pushed as JSON text")
    ),
    tag = "events"
)]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let bus = state.event_bus.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, bus))
}

/// Serialize and send; false once the peer is gone.
async fn send_json<T: Serialize>(sender: &mut SplitSink<WebSocket, Message>, msg: &T) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize WebSocket message");
            true
        }
    }
}

async fn handle_socket(socket: WebSocket, bus: events::EventBus) {
    let (mut sender, mut receiver) = socket.split();

    // Everything is pushed until the client narrows or pauses the stream
    let mut event_rx = bus.subscribe();
    let mut filter = SubscriptionFilter::default();
    let mut subscribed = true;

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    heartbeat.reset();

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !send_json(&mut sender, &ServerMessage::Pong).await {
                    break;
                }
            }

            event_result = event_rx.recv() => {
                match event_result {
                    Ok(envelope) => {
                        if subscribed && filter.matches(&envelope)
                            && !send_json(&mut sender, &envelope).await
                        {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            msg = tokio::time::timeout(CLIENT_TIMEOUT + HEARTBEAT_INTERVAL, receiver.next()) => {
                match msg {
                    Ok(Some(Ok(Message::Text(text)))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Subscribe { run_ids }) => {
                                filter = SubscriptionFilter { run_ids: run_ids.clone() };
                                subscribed = true;
                                ServerMessage::Subscribed { run_ids }
                            }
                            Ok(ClientMessage::Unsubscribe) => {
                                subscribed = false;
                                filter = SubscriptionFilter::default();
                                ServerMessage::Unsubscribed
                            }
                            Ok(ClientMessage::Ping) => ServerMessage::Pong,
                            Err(e) => ServerMessage::Error {
                                message: format!("Invalid message: {}", e),
                            },
                        };
                        if !send_json(&mut sender, &reply).await {
                            break;
                        }
                    }
                    Ok(Some(Ok(Message::Close(_)))) => {
                        break;
                    }
                    Ok(Some(Ok(Message::Ping(data)))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Some(Ok(_))) => {}
                    Ok(Some(Err(_))) | Ok(None) => {
                        break;
                    }
                    Err(_) => {
                        tracing::debug!("WebSocket client idle");
                    }
                }
            }
        }
    }

    tracing::debug!("WebSocket connection closed");
}
