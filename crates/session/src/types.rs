//! Session records and their lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use netops_core::{DeviceId, SessionId, TenantId, UserId};

/// Lifecycle of an interactive session.
///
/// `Pending -> Connecting -> Active -> { Closed | Error }`. The pending
/// window is bounded; a ticket that is never attached simply expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Pending,
    Connecting,
    Active,
    Closed,
    Error,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closed => "closed",
            SessionState::Error => "error",
        }
    }
}

/// One session row. The key authorizes exactly one attach and is excluded
/// from serialization so it can never ride along in an API response.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub device_id: DeviceId,
    pub device_name: String,
    pub device_ip: String,
    #[serde(skip)]
    pub session_key: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    pub transcript_path: Option<String>,
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .field("state", &self.state)
            .field("session_key", &"***")
            .finish_non_exhaustive()
    }
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == SessionState::Pending && now > self.expires_at
    }
}

/// What `create_session` hands back. The only place the key ever surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTicket {
    pub session_id: SessionId,
    pub session_key: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("access denied")]
    Denied,
    #[error("device not found")]
    DeviceNotFound,
    #[error("no resolvable credentials for device")]
    CredentialsMissing,
    #[error("session ticket expired")]
    Expired,
    #[error("session key already used")]
    AlreadyAttached,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transcript: {0}")]
    Transcript(#[from] std::io::Error),
    #[error("storage: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: SessionId::new(),
            tenant_id: TenantId::new(),
            user_id: UserId::new(),
            device_id: DeviceId::new(),
            device_name: "r1".into(),
            device_ip: "10.0.0.1".into(),
            session_key: "super-secret".into(),
            state: SessionState::Pending,
            created_at: now,
            expires_at: now + chrono::Duration::minutes(5),
            started_at: None,
            ended_at: None,
            duration_ms: None,
            error: None,
            transcript_path: None,
        }
    }

    #[test]
    fn session_key_never_serializes() {
        let value = serde_json::to_value(record()).unwrap();
        assert!(value.get("session_key").is_none());
        assert!(!value.to_string().contains("super-secret"));
    }

    #[test]
    fn session_key_never_debugs() {
        let rendered = format!("{:?}", record());
        assert!(!rendered.contains("super-secret"));
    }

    #[test]
    fn only_pending_rows_expire() {
        let mut rec = record();
        let late = rec.expires_at + chrono::Duration::seconds(1);
        assert!(rec.is_expired(late));
        rec.state = SessionState::Active;
        assert!(!rec.is_expired(late));
    }
}
