pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use crate::broadcast::RoomEvent;
use crate::error::{ChatError, ChatResult};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use handlers::Connection;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one frame
async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> ChatResult<()> {
    let json = serde_json::to_string(msg)?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| ChatError::TransportFailure(e.to_string()))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut conn = Connection::new();

    if let Err(e) = send_json(
        &mut sender,
        &ServerMessage::ConnectionStateChanged { connected: true },
    )
    .await
    {
        tracing::error!("Failed to send connection state: {}", e);
        return;
    }

    loop {
        tokio::select! {
            // Room fan-out, only once logged in
            room_event = async {
                match &mut conn.events {
                    Some(rx) => Some(rx.recv().await),
                    None => std::future::pending::<Option<Result<RoomEvent, RecvError>>>().await,
                }
            } => {
                match room_event {
                    Some(Ok(event)) => {
                        let Some(session_id) = conn.session_id() else {
                            continue;
                        };
                        if !event.is_for(session_id) {
                            continue;
                        }
                        if let Err(e) = send_json(&mut sender, &event.message).await {
                            tracing::error!(session_id, "Failed to forward room event: {}", e);
                            break;
                        }
                    }
                    Some(Err(RecvError::Lagged(skipped))) => {
                        tracing::warn!(
                            session_id = conn.session_id().unwrap_or_default(),
                            skipped,
                            "Subscriber lagged, resending presence"
                        );
                        let mut failed = false;
                        for frame in handlers::resync_after_lag(&state).await {
                            if let Err(e) = send_json(&mut sender, &frame).await {
                                tracing::error!("Failed to resync lagged client: {}", e);
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            break;
                        }
                    }
                    Some(Err(RecvError::Closed)) => break,
                    None => {}
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text.as_str());

                        let response = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut conn, &state).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };

                        if let Some(response) = response {
                            if let Err(e) = send_json(&mut sender, &response).await {
                                tracing::error!("Failed to send response: {}", e);
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Disconnect counts as logout
    if let Some(session) = conn.end() {
        state.remove(&session.id).await;
    }
    tracing::info!("WebSocket connection closed");
}
