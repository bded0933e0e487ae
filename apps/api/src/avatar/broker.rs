//! Session Broker: owns the avatar session lifecycle.
//!
//! Every vendor call for a session goes through here: the persona conversation,
//! the streaming room and the participant token. Handlers and the WebSocket
//! layer only ever talk to the broker.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::avatar::hub::{StatusEvent, StatusHub};
use crate::avatar::store::SessionStore;
use crate::errors::AppError;
use crate::models::session::{Session, SessionStatus};
use crate::vendors::persona::{ConversationRequest, PersonaProvider};
use crate::vendors::streaming::{Room, RoomOptions, StreamingProvider, TokenRequest};

pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Vendor event that means the conversation is over on their side.
const SHUTDOWN_EVENT: &str = "system.shutdown";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub conversation_name: Option<String>,
    pub custom_greeting: Option<String>,
    pub participant_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub conversation_id: String,
    pub conversation_url: Option<String>,
    pub room_name: Option<String>,
    pub token: Option<String>,
    pub url: Option<String>,
    pub vendor: Value,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub message: String,
    pub delivered_to: usize,
}

#[derive(Debug, Serialize)]
pub struct EndResponse {
    pub session_id: Uuid,
    pub success: bool,
    pub status: SessionStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub session: Session,
    /// Fresh vendor view of the conversation, if it could be fetched.
    pub vendor: Option<Value>,
    /// Live streaming room, while the provider still has it open.
    pub room: Option<Room>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequestBody {
    pub room_name: String,
    pub participant_name: String,
    pub participant_identity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub url: String,
    pub room_name: String,
}

/// Vendor callback body. Unknown fields are kept in `properties`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub conversation_id: String,
    pub event_type: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub handled: bool,
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct BrokerSettings {
    /// Vendor webhook target, passed when a conversation is created.
    pub callback_url: Option<String>,
    pub end_session_on_disconnect: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Broker
// ────────────────────────────────────────────────────────────────────────────

pub struct SessionBroker {
    persona: Arc<dyn PersonaProvider>,
    streaming: Arc<dyn StreamingProvider>,
    sessions: SessionStore,
    hub: StatusHub,
    settings: BrokerSettings,
}

impl SessionBroker {
    pub fn new(
        persona: Arc<dyn PersonaProvider>,
        streaming: Arc<dyn StreamingProvider>,
        settings: BrokerSettings,
    ) -> Self {
        Self {
            persona,
            streaming,
            sessions: SessionStore::new(),
            hub: StatusHub::new(),
            settings,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn hub(&self) -> &StatusHub {
        &self.hub
    }

    async fn get_session(&self, session_id: Uuid) -> Result<Session, AppError> {
        self.sessions
            .get(session_id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
    }

    /// Creates the persona conversation and streaming room, then activates the session.
    pub async fn start(&self, request: StartRequest) -> Result<StartResponse, AppError> {
        let session = Session::new();
        let session_id = session.id;
        self.sessions.insert(session).await;
        info!("Session {session_id} pending, creating persona conversation");

        let conversation = match self
            .persona
            .create_conversation(&ConversationRequest {
                conversation_name: request.conversation_name.clone(),
                conversational_context: request.custom_greeting.clone(),
                callback_url: self.settings.callback_url.clone(),
            })
            .await
        {
            Ok(c) => c,
            Err(e) => {
                // A session that never reached the vendor is discarded, not ended.
                self.sessions.remove(session_id).await;
                return Err(e.into());
            }
        };

        let (room_name, token) = self
            .open_room(session_id, request.participant_name.as_deref())
            .await;

        let conversation_id = conversation.conversation_id.clone();
        let conversation_url = conversation.conversation_url.clone();
        let stored_room = room_name.clone();
        let session = self
            .sessions
            .update(session_id, move |s| {
                s.conversation_id = Some(conversation_id);
                s.conversation_url = conversation_url;
                s.room_name = stored_room;
                s.advance(SessionStatus::Active)
                    .map(|_| ())
                    .map_err(|e| AppError::Conflict(e.to_string()))
            })
            .await?;

        info!(
            "Session {session_id} active (conversation {})",
            conversation.conversation_id
        );
        self.hub
            .publish(session_id, StatusEvent::status(&session))
            .await;

        Ok(StartResponse {
            session_id,
            status: session.status,
            conversation_id: conversation.conversation_id,
            conversation_url: conversation.conversation_url,
            room_name,
            token,
            url: self.streaming.url().map(String::from),
            vendor: conversation.raw,
        })
    }

    /// Best effort: the avatar still works through the conversation URL without a room.
    async fn open_room(
        &self,
        session_id: Uuid,
        participant_name: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        if !self.streaming.is_configured() {
            warn!("Streaming provider not configured, session {session_id} runs without a room");
            return (None, None);
        }

        let room_name = format!("avatar_{session_id}");
        if let Err(e) = self.streaming.create_room(&RoomOptions::new(&room_name)).await {
            warn!("Could not create streaming room {room_name}: {e}");
            return (None, None);
        }

        let token = self
            .streaming
            .issue_token(&TokenRequest {
                room_name: room_name.clone(),
                identity: format!("user_{session_id}"),
                name: participant_name.map(String::from),
            })
            .map_err(|e| warn!("Could not issue token for room {room_name}: {e}"))
            .ok();

        (Some(room_name), token)
    }

    /// Records the message and hands the vendor echo payload to the browser.
    pub async fn send(&self, session_id: Uuid, text: &str) -> Result<SendResponse, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("text cannot be empty".to_string()));
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(AppError::Validation(format!(
                "text cannot exceed {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let session = self.sessions.append_message(session_id, "user", text).await?;

        let payload = json!({
            "message_type": "conversation",
            "event_type": "conversation.echo",
            "conversation_id": session.conversation_id,
            "properties": { "text": text },
        });
        let delivered_to = self
            .hub
            .publish(session_id, StatusEvent::Interaction { session_id, payload })
            .await;

        info!("Message queued for session {session_id} ({delivered_to} subscribers)");
        Ok(SendResponse {
            success: true,
            message: "Message sent successfully".to_string(),
            delivered_to,
        })
    }

    /// Tears the session down. Ending an ended session is a no-op.
    pub async fn end(&self, session_id: Uuid) -> Result<EndResponse, AppError> {
        let session = self.get_session(session_id).await?;

        match session.status {
            SessionStatus::Pending => Err(AppError::Conflict(format!(
                "Session {session_id} is still starting"
            ))),
            SessionStatus::Ended => Ok(EndResponse {
                session_id,
                success: true,
                status: SessionStatus::Ended,
                message: "Conversation already ended".to_string(),
            }),
            SessionStatus::Active => {
                if let Some(conversation_id) = &session.conversation_id {
                    self.persona.end_conversation(conversation_id).await?;
                }
                self.finish(&session).await
            }
        }
    }

    /// Releases the room and marks the session ended. The conversation must already be over.
    async fn finish(&self, session: &Session) -> Result<EndResponse, AppError> {
        if let Some(room_name) = &session.room_name {
            if let Err(e) = self.streaming.delete_room(room_name).await {
                warn!("Could not delete streaming room {room_name}: {e}");
            }
        }

        let (ended, changed) = self
            .sessions
            .advance(session.id, SessionStatus::Ended)
            .await?;
        if changed {
            info!("Session {} ended", session.id);
            self.hub
                .publish(session.id, StatusEvent::status(&ended))
                .await;
        }
        self.hub.release_if_idle(session.id).await;

        Ok(EndResponse {
            session_id: session.id,
            success: true,
            status: ended.status,
            message: "Conversation ended successfully".to_string(),
        })
    }

    /// Local record merged with a fresh vendor lookup.
    pub async fn status(&self, session_id: Uuid) -> Result<StatusResponse, AppError> {
        let session = self.get_session(session_id).await?;

        let vendor = match &session.conversation_id {
            Some(conversation_id) => match self.persona.get_conversation(conversation_id).await {
                Ok(conversation) => Some(conversation.raw),
                Err(e) => {
                    warn!("Could not refresh conversation {conversation_id}: {e}");
                    None
                }
            },
            None => None,
        };

        let room = match &session.room_name {
            Some(room_name) => self.find_room(room_name).await,
            None => None,
        };

        Ok(StatusResponse {
            session,
            vendor,
            room,
        })
    }

    async fn find_room(&self, room_name: &str) -> Option<Room> {
        match self.streaming.list_rooms().await {
            Ok(rooms) => rooms.into_iter().find(|r| r.name == room_name),
            Err(e) => {
                warn!("Could not list streaming rooms: {e}");
                None
            }
        }
    }

    pub fn issue_token(&self, request: TokenRequestBody) -> Result<TokenResponse, AppError> {
        if request.room_name.trim().is_empty() {
            return Err(AppError::Validation("room_name cannot be empty".to_string()));
        }
        let url = self
            .streaming
            .url()
            .filter(|_| self.streaming.is_configured())
            .ok_or(AppError::NotConfigured("Streaming provider"))?
            .to_string();

        let identity = request
            .participant_identity
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| format!("user_{}", Utc::now().timestamp_millis()));

        let token = self.streaming.issue_token(&TokenRequest {
            room_name: request.room_name.clone(),
            identity,
            name: Some(request.participant_name),
        })?;

        Ok(TokenResponse {
            token,
            url,
            room_name: request.room_name,
        })
    }

    /// Relays a vendor callback to subscribers; a shutdown event ends the session.
    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<WebhookAck, AppError> {
        let Some(session) = self.sessions.find_by_conversation(&event.conversation_id).await else {
            warn!(
                "Webhook {} for unknown conversation {}",
                event.event_type, event.conversation_id
            );
            return Ok(WebhookAck {
                handled: false,
                session_id: None,
            });
        };

        info!(
            "Webhook {} for session {} ({})",
            event.event_type,
            session.id,
            event.message_type.as_deref().unwrap_or("-")
        );
        self.hub
            .publish(
                session.id,
                StatusEvent::VendorEvent {
                    session_id: session.id,
                    event_type: event.event_type.clone(),
                    payload: event.properties.clone(),
                },
            )
            .await;

        if event.event_type == SHUTDOWN_EVENT && session.status == SessionStatus::Active {
            self.finish(&session).await?;
        }

        Ok(WebhookAck {
            handled: true,
            session_id: Some(session.id),
        })
    }

    /// Called when a WebSocket closes. The last subscriber leaving ends an active session.
    pub async fn client_disconnected(&self, session_id: Uuid) {
        if !self.hub.release_if_idle(session_id).await {
            return;
        }
        if !self.settings.end_session_on_disconnect {
            return;
        }

        let active = self
            .sessions
            .get(session_id)
            .await
            .is_some_and(|s| s.status == SessionStatus::Active);
        if active {
            info!("Last client left session {session_id}, ending it");
            if let Err(e) = self.end(session_id).await {
                warn!("Could not end session {session_id} after disconnect: {e}");
            }
        }
    }

    /// Ends every active session. Used on server shutdown.
    pub async fn shutdown(&self) {
        for session_id in self.sessions.active_ids().await {
            if let Err(e) = self.end(session_id).await {
                warn!("Could not end session {session_id} during shutdown: {e}");
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
