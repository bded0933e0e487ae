//! Per-session fan-out of status events to WebSocket subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::models::session::{Session, SessionStatus};

/// Buffered events per session; slow sockets skip ahead rather than block publishers.
const CHANNEL_CAPACITY: usize = 64;

/// Everything the server pushes down a session's WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum StatusEvent {
    Connected {
        session_id: Uuid,
        message: String,
    },
    Status {
        session_id: Uuid,
        status: SessionStatus,
        data: Value,
    },
    /// Text for the browser to forward over its vendor data channel.
    Interaction { session_id: Uuid, payload: Value },
    /// Raw vendor webhook callback, relayed as-is.
    VendorEvent {
        session_id: Uuid,
        event_type: String,
        payload: Value,
    },
    Error {
        session_id: Uuid,
        message: String,
    },
    Pong,
}

impl StatusEvent {
    pub fn status(session: &Session) -> Self {
        StatusEvent::Status {
            session_id: session.id,
            status: session.status,
            data: json!({
                "conversation_id": session.conversation_id,
                "conversation_url": session.conversation_url,
                "room_name": session.room_name,
                "created_at": session.created_at,
                "activated_at": session.activated_at,
                "ended_at": session.ended_at,
                "messages": session.transcript.len(),
            }),
        }
    }
}

#[derive(Clone, Default)]
pub struct StatusHub {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<StatusEvent>>>>,
}

impl StatusHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, session_id: Uuid) -> broadcast::Receiver<StatusEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Sends to every current subscriber. Returns how many received it.
    pub async fn publish(&self, session_id: Uuid, event: StatusEvent) -> usize {
        let channels = self.channels.read().await;
        match channels.get(&session_id) {
            // No receivers is fine
            Some(tx) => tx.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub async fn subscriber_count(&self, session_id: Uuid) -> usize {
        self.channels
            .read()
            .await
            .get(&session_id)
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Drops the session's channel once nobody listens any more.
    pub async fn release_if_idle(&self, session_id: Uuid) -> bool {
        let mut channels = self.channels.write().await;
        let idle = channels
            .get(&session_id)
            .is_some_and(|tx| tx.receiver_count() == 0);
        if idle {
            channels.remove(&session_id);
        }
        idle
    }
}
