//! /ws — the real-time channel.
//!
//! Each socket is one connection: a reader loop that parses frames into
//! inbound events for the coordinator, and a writer task that serializes
//! whatever the coordinator queues for this connection. Closing the socket
//! is reported to the coordinator as a disconnect.

use std::sync::atomic::Ordering;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use echo_core::{ConnectionId, InboundEvent, OutboundEvent};

use super::ApiState;

pub async fn handle_ws(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(move |socket| run_socket(socket, state))
}

/// Parse one text frame. Errors are phrased for the client.
pub fn parse_frame(text: &str) -> Result<InboundEvent, String> {
    serde_json::from_str(text).map_err(|e| format!("malformed event: {e}"))
}

async fn run_socket(socket: WebSocket, state: ApiState) {
    let connection_id = ConnectionId(state.next_connection.fetch_add(1, Ordering::Relaxed));
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundEvent>();

    if state
        .coordinator
        .connect(connection_id, out_tx.clone())
        .await
        .is_err()
    {
        tracing::warn!(connection = %connection_id, "coordinator unavailable, dropping socket");
        return;
    }

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(connection = %connection_id, error = %e, "failed to encode event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(connection = %connection_id, error = %e, "socket read failed");
                break;
            }
        };

        match parse_frame(text.as_str()) {
            Ok(event) => {
                if state.coordinator.dispatch(connection_id, event).await.is_err() {
                    break;
                }
            }
            Err(reason) => {
                tracing::debug!(connection = %connection_id, %reason, "rejected frame");
                let _ = out_tx.send(OutboundEvent::ValidationError { reason });
            }
        }
    }

    let _ = state
        .coordinator
        .dispatch(connection_id, InboundEvent::Disconnect)
        .await;
    writer.abort();
}
