//! Session persistence behind a trait, in-memory for now.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use netops_core::SessionId;

use crate::types::{SessionError, SessionRecord};

pub trait SessionStore: Send + Sync {
    fn insert(&self, record: SessionRecord) -> Result<(), SessionError>;
    fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, SessionError>;
    /// Overwrite the row. The broker is the only writer after insert, so
    /// last-write-wins is safe here.
    fn update(&self, record: SessionRecord) -> Result<(), SessionError>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    rows: RwLock<HashMap<SessionId, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn lock_poisoned() -> SessionError {
        SessionError::Storage("session store lock poisoned".to_string())
    }
}

impl SessionStore for InMemorySessionStore {
    fn insert(&self, record: SessionRecord) -> Result<(), SessionError> {
        let mut rows = self.rows.write().map_err(|_| Self::lock_poisoned())?;
        rows.insert(record.id, record);
        Ok(())
    }

    fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, SessionError> {
        let rows = self.rows.read().map_err(|_| Self::lock_poisoned())?;
        Ok(rows.get(&id).cloned())
    }

    fn update(&self, record: SessionRecord) -> Result<(), SessionError> {
        let mut rows = self.rows.write().map_err(|_| Self::lock_poisoned())?;
        if !rows.contains_key(&record.id) {
            return Err(SessionError::NotFound);
        }
        rows.insert(record.id, record);
        Ok(())
    }
}

impl SessionStore for Arc<InMemorySessionStore> {
    fn insert(&self, record: SessionRecord) -> Result<(), SessionError> {
        (**self).insert(record)
    }

    fn get(&self, id: SessionId) -> Result<Option<SessionRecord>, SessionError> {
        (**self).get(id)
    }

    fn update(&self, record: SessionRecord) -> Result<(), SessionError> {
        (**self).update(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionState;
    use chrono::Utc;
    use netops_core::{DeviceId, TenantId, UserId};

    fn record() -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            id: SessionId::new(),
            tenant_id: TenantId::new(),
            user_id: UserId::new(),
            device_id: DeviceId::new(),
            device_name: "r1".into(),
            device_ip: "10.0.0.1".into(),
            session_key: "k".into(),
            state: SessionState::Pending,
            created_at: now,
            expires_at: now,
            started_at: None,
            ended_at: None,
            duration_ms: None,
            error: None,
            transcript_path: None,
        }
    }

    #[test]
    fn insert_then_get_round_trips() {
        let store = InMemorySessionStore::new();
        let rec = record();
        let id = rec.id;
        store.insert(rec).unwrap();
        let loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.state, SessionState::Pending);
    }

    #[test]
    fn update_of_unknown_row_is_not_found() {
        let store = InMemorySessionStore::new();
        let err = store.update(record()).unwrap_err();
        assert!(matches!(err, SessionError::NotFound));
    }
}
