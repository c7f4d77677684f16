use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::rest::session::CurrentUser;
use crate::models::notification::UnreadCount;
use crate::registry::notifications;
use crate::state::AppState;

/// Streams the caller's unread-notification counter, starting with its
/// current value.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user.user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.unread_tx.subscribe();

    info!(user_id = %user_id, "websocket client connected");

    let initial = notifications::unread_count(&state, user_id);
    let send_task = tokio::spawn(async move {
        if send_count(&mut sender, user_id, initial).await.is_err() {
            return;
        }

        loop {
            let update = match rx.recv().await {
                Ok(update) => update,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %user_id, skipped, "websocket client lagged");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if update.user_id != user_id {
                continue;
            }
            if send_count(&mut sender, user_id, update.unread).await.is_err() {
                break;
            }
        }
    });

    let recv_task = tokio::spawn(async move {
        while let Some(Ok(_msg)) = receiver.next().await {}
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    info!(user_id = %user_id, "websocket client disconnected");
}

async fn send_count<S>(sender: &mut S, user_id: Uuid, unread: usize) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(&UnreadCount { user_id, unread }) {
        Ok(json) => json,
        Err(err) => {
            warn!(error = %err, "failed to serialize unread count for ws");
            return Ok(());
        }
    };

    sender.send(Message::Text(json.into())).await.map_err(|_| ())
}
