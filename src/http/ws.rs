//! Live session feed over WebSocket
//!
//! Each connection holds one hub subscription for its lifetime. Messages are
//! JSON objects tagged with `type`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use crate::provision::{LiveUpdateHub, SessionUpdate};

use super::state::AppState;

/// Messages sent to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveMessage {
    /// First message on every connection
    Connected { subscriber_id: String },
    /// A session changed
    Session(SessionUpdate),
}

/// `GET /ws/sessions`
pub async fn sessions_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let hub = state.provisioner.hub().clone();
    ws.on_upgrade(move |socket| forward_updates(socket, hub))
}

async fn forward_updates(socket: WebSocket, hub: LiveUpdateHub) {
    let mut subscription = hub.subscribe();
    let subscriber_id = subscription.id().to_string();
    let (mut sender, mut receiver) = socket.split();

    let hello = LiveMessage::Connected {
        subscriber_id: subscriber_id.clone(),
    };
    if send_json(&mut sender, &hello).await.is_err() {
        return;
    }
    tracing::info!(subscriber = %subscriber_id, "Live observer connected");

    loop {
        tokio::select! {
            update = subscription.recv() => {
                // `None` means the hub dropped us for falling behind
                let Some(update) = update else { break };
                if send_json(&mut sender, &LiveMessage::Session(update)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::info!(subscriber = %subscriber_id, "Live observer disconnected");
}

async fn send_json<S>(sender: &mut S, message: &LiveMessage) -> Result<(), ()>
where
    S: Sink<Message> + Unpin,
{
    let text = serde_json::to_string(message).map_err(|e| {
        tracing::error!(error = %e, "Failed to encode live message");
    })?;
    sender.send(Message::Text(text)).await.map_err(|_| ())
}
