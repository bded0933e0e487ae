//! In-memory session registry. The lock is never held across a vendor call.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::session::{Session, SessionStatus, TranscriptEntry};

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Session) {
        self.inner.write().await.insert(session.id, session);
    }

    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.inner.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> Option<Session> {
        self.inner.write().await.remove(&id)
    }

    pub async fn find_by_conversation(&self, conversation_id: &str) -> Option<Session> {
        self.inner
            .read()
            .await
            .values()
            .find(|s| s.conversation_id.as_deref() == Some(conversation_id))
            .cloned()
    }

    /// Runs `f` against the stored session and returns the updated copy.
    pub async fn update<F>(&self, id: Uuid, f: F) -> Result<Session, AppError>
    where
        F: FnOnce(&mut Session) -> Result<(), AppError>,
    {
        let mut sessions = self.inner.write().await;
        let session = sessions
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;
        f(session)?;
        Ok(session.clone())
    }

    /// Moves a session forward. The bool is false when it was already in `to`.
    pub async fn advance(&self, id: Uuid, to: SessionStatus) -> Result<(Session, bool), AppError> {
        let mut changed = false;
        let session = self
            .update(id, |s| {
                changed = s
                    .advance(to)
                    .map_err(|e| AppError::Conflict(e.to_string()))?;
                Ok(())
            })
            .await?;
        Ok((session, changed))
    }

    /// Appends to the transcript. The status check and the write share one lock,
    /// so an `end` can never slip in between them.
    pub async fn append_message(&self, id: Uuid, role: &str, text: &str) -> Result<Session, AppError> {
        self.update(id, |s| {
            if s.status != SessionStatus::Active {
                return Err(AppError::Conflict(format!(
                    "Session {id} is {}, messages need an active session",
                    s.status
                )));
            }
            s.transcript.push(TranscriptEntry {
                role: role.to_string(),
                text: text.to_string(),
                timestamp: Utc::now(),
            });
            Ok(())
        })
        .await
    }

    pub async fn active_ids(&self) -> Vec<Uuid> {
        self.inner
            .read()
            .await
            .values()
            .filter(|s| s.status == SessionStatus::Active)
            .map(|s| s.id)
            .collect()
    }
}
