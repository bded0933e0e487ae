//! Status WebSocket: one socket per browser tab, subscribed to a single session.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::avatar::hub::StatusEvent;
use crate::errors::AppError;
use crate::extract::AppPath;
use crate::models::session::Session;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
    StatusRequest,
    #[serde(other)]
    Unknown,
}

/// GET /ws/avatar/:session_id
pub async fn handle_avatar_ws(
    State(state): State<AppState>,
    AppPath(session_id): AppPath<Uuid>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    if state.broker.sessions().get(session_id).await.is_none() {
        return Err(AppError::NotFound(format!("Session {session_id} not found")));
    }
    let heartbeat = Duration::from_secs(state.config.ws_heartbeat_secs.max(1));
    Ok(ws.on_upgrade(move |socket| run_socket(socket, state, session_id, heartbeat)))
}

async fn run_socket(socket: WebSocket, state: AppState, session_id: Uuid, heartbeat: Duration) {
    let broker = state.broker.clone();
    let mut events = broker.hub().subscribe(session_id).await;
    let (mut sender, mut receiver) = socket.split();
    info!(
        "WebSocket connected for session {session_id} ({} listening)",
        broker.hub().subscriber_count(session_id).await
    );

    let greeting = StatusEvent::Connected {
        session_id,
        message: "WebSocket connected".to_string(),
    };
    let mut open = send_event(&mut sender, &greeting).await.is_ok();
    if open {
        if let Some(session) = broker.sessions().get(session_id).await {
            open = send_event(&mut sender, &StatusEvent::status(&session)).await.is_ok();
        }
    }

    if open {
        let mut ticker = tokio::time::interval(heartbeat);
        ticker.tick().await;

        loop {
            tokio::select! {
                incoming = receiver.next() => {
                    let text = match incoming {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            debug!("WebSocket read error for session {session_id}: {e}");
                            break;
                        }
                    };
                    let session = broker.sessions().get(session_id).await;
                    if let Some(reply) = client_reply(session_id, &text, session.as_ref()) {
                        if send_event(&mut sender, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if send_event(&mut sender, &event).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("WebSocket for session {session_id} lagged, skipped {skipped} events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = ticker.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    drop(events);
    info!("WebSocket disconnected for session {session_id}");
    broker.client_disconnected(session_id).await;
}

async fn send_event<S>(sender: &mut S, event: &StatusEvent) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Could not serialize status event: {e}");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}

/// Answer for a client frame, if it needs one. Unknown message types are ignored.
fn client_reply(session_id: Uuid, text: &str, session: Option<&Session>) -> Option<StatusEvent> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            return Some(StatusEvent::Error {
                session_id,
                message: format!("Invalid message: {e}"),
            })
        }
    };

    match message {
        ClientMessage::Ping => Some(StatusEvent::Pong),
        ClientMessage::StatusRequest => Some(match session {
            Some(session) => StatusEvent::status(session),
            None => StatusEvent::Error {
                session_id,
                message: "Session not found".to_string(),
            },
        }),
        ClientMessage::Unknown => {
            debug!("Ignoring unknown WebSocket message for session {session_id}");
            None
        }
    }
}
