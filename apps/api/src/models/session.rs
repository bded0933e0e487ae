use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an avatar session. Only moves forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Ended,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
        }
    }

    pub fn next(&self) -> Option<SessionStatus> {
        match self {
            SessionStatus::Pending => Some(SessionStatus::Active),
            SessionStatus::Active => Some(SessionStatus::Ended),
            SessionStatus::Ended => None,
        }
    }

    pub fn can_advance_to(&self, to: SessionStatus) -> bool {
        self.next() == Some(to)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: SessionStatus,
    pub to: SessionStatus,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session cannot move from {} to {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Local record of an avatar session and the vendor-side resources it owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub status: SessionStatus,
    pub conversation_id: Option<String>,
    pub conversation_url: Option<String>,
    pub room_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub transcript: Vec<TranscriptEntry>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SessionStatus::Pending,
            conversation_id: None,
            conversation_url: None,
            room_name: None,
            created_at: Utc::now(),
            activated_at: None,
            ended_at: None,
            transcript: Vec::new(),
        }
    }

    /// Applies a status change. Returns `Ok(false)` when already in `to`.
    pub fn advance(&mut self, to: SessionStatus) -> Result<bool, TransitionError> {
        if self.status == to {
            return Ok(false);
        }
        if !self.status.can_advance_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }

        self.status = to;
        match to {
            SessionStatus::Active => self.activated_at = Some(Utc::now()),
            SessionStatus::Ended => self.ended_at = Some(Utc::now()),
            SessionStatus::Pending => {}
        }
        Ok(true)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_pending() {
        let session = Session::new();
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(session.activated_at.is_none());
    }

    #[test]
    fn test_full_lifecycle_in_order() {
        let mut session = Session::new();
        assert_eq!(session.advance(SessionStatus::Active), Ok(true));
        assert!(session.activated_at.is_some());
        assert_eq!(session.advance(SessionStatus::Ended), Ok(true));
        assert!(session.ended_at.is_some());
    }

    #[test]
    fn test_skipping_active_is_rejected() {
        let mut session = Session::new();
        let err = session.advance(SessionStatus::Ended).unwrap_err();
        assert_eq!(err.from, SessionStatus::Pending);
        assert_eq!(err.to, SessionStatus::Ended);
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[test]
    fn test_reversal_is_rejected() {
        let mut session = Session::new();
        session.advance(SessionStatus::Active).unwrap();
        session.advance(SessionStatus::Ended).unwrap();
        assert!(session.advance(SessionStatus::Active).is_err());
        assert!(session.advance(SessionStatus::Pending).is_err());
        assert_eq!(session.status, SessionStatus::Ended);
    }

    #[test]
    fn test_same_status_is_noop() {
        let mut session = Session::new();
        session.advance(SessionStatus::Active).unwrap();
        let activated_at = session.activated_at;
        assert_eq!(session.advance(SessionStatus::Active), Ok(false));
        assert_eq!(session.activated_at, activated_at);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Active).unwrap();
        assert_eq!(json, r#""active""#);
    }
}
