//! The session broker: ticket issue, single-use attach, lifecycle bookkeeping.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::RngCore;
use tracing::{info, warn};

use netops_auth::Principal;
use netops_directory::{CredentialChain, DeviceDirectory};
use netops_secrets::redact;

use crate::recorder::TranscriptRecorder;
use crate::relay::{self, RelayEnd, ServerFrame, SessionTransport};
use crate::ssh::DeviceConnector;
use crate::store::SessionStore;
use crate::types::{SessionError, SessionRecord, SessionState, SessionTicket};

/// How long an unattached ticket stays valid.
const PENDING_TTL_MINUTES: i64 = 5;

fn random_session_key() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub struct SessionBroker {
    store: Arc<dyn SessionStore>,
    directory: Arc<dyn DeviceDirectory>,
    chain: Arc<CredentialChain>,
    connector: Arc<dyn DeviceConnector>,
    transcript_dir: PathBuf,
    pending_ttl: Duration,
}

impl SessionBroker {
    pub fn new(
        store: Arc<dyn SessionStore>,
        directory: Arc<dyn DeviceDirectory>,
        chain: Arc<CredentialChain>,
        connector: Arc<dyn DeviceConnector>,
        transcript_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            directory,
            chain,
            connector,
            transcript_dir,
            pending_ttl: Duration::minutes(PENDING_TTL_MINUTES),
        }
    }

    /// Issue a ticket for an interactive session on `device_id`.
    ///
    /// The returned key is the only copy: it is not logged and never
    /// serialized out of the record again.
    pub async fn create_session(
        &self,
        device_id: netops_core::DeviceId,
        principal: &Principal,
    ) -> Result<SessionTicket, SessionError> {
        let device = self
            .directory
            .get(device_id)
            .await
            .map_err(|e| SessionError::Storage(e.to_string()))?
            .ok_or(SessionError::DeviceNotFound)?;

        if !principal.can_access_tenant(device.tenant_id) {
            return Err(SessionError::Denied);
        }
        if self.chain.resolve(&device).await.is_none() {
            return Err(SessionError::CredentialsMissing);
        }

        let now = Utc::now();
        let record = SessionRecord {
            id: netops_core::SessionId::new(),
            tenant_id: device.tenant_id,
            user_id: principal.user_id,
            device_id,
            device_name: device.name.clone(),
            device_ip: device.ip_address.clone(),
            session_key: random_session_key(),
            state: SessionState::Pending,
            created_at: now,
            expires_at: now + self.pending_ttl,
            started_at: None,
            ended_at: None,
            duration_ms: None,
            error: None,
            transcript_path: None,
        };
        let ticket = SessionTicket {
            session_id: record.id,
            session_key: record.session_key.clone(),
            expires_at: record.expires_at,
        };
        self.store.insert(record)?;
        info!(session = %ticket.session_id, device = %device_id, "session ticket issued");
        Ok(ticket)
    }

    /// Attach a client transport and drive the session to completion.
    ///
    /// Returns once the session ends, however it ends. All rejections
    /// happen before any state transition, so a rejected attach leaves the
    /// ticket exactly as it was.
    pub async fn attach(
        &self,
        session_id: netops_core::SessionId,
        session_key: &str,
        mut transport: SessionTransport,
        principal: &Principal,
    ) -> Result<(), SessionError> {
        let mut record = self
            .store
            .get(session_id)?
            .ok_or(SessionError::NotFound)?;

        if record.session_key != session_key {
            return Err(SessionError::Denied);
        }
        if !principal.can_access_tenant(record.tenant_id)
            || !principal.can_act_for(record.user_id)
        {
            return Err(SessionError::Denied);
        }
        let now = Utc::now();
        if record.is_expired(now) {
            return Err(SessionError::Expired);
        }
        if record.state != SessionState::Pending {
            return Err(SessionError::AlreadyAttached);
        }

        record.state = SessionState::Connecting;
        record.started_at = Some(now);
        let recorder = TranscriptRecorder::open(&self.transcript_dir, session_id)?;
        record.transcript_path = Some(recorder.path().display().to_string());
        self.store.update(record.clone())?;

        let shell = self.open_device_shell(&record).await;
        let mut shell = match shell {
            Ok(shell) => shell,
            Err(err) => {
                let reason = redact(&err.to_string());
                let _ = transport
                    .outgoing
                    .send(ServerFrame::Error {
                        message: reason.clone(),
                    })
                    .await;
                recorder.close("error");
                self.finalize(session_id, SessionState::Error, Some(reason))?;
                return Err(err);
            }
        };

        record.state = SessionState::Active;
        self.store.update(record.clone())?;
        info!(session = %session_id, device = %record.device_id, "session active");

        match relay::relay(&mut shell, &mut transport, &recorder).await {
            Ok(end) => {
                recorder.close("closed");
                self.finalize(session_id, SessionState::Closed, None)?;
                if end == RelayEnd::ClientClosed {
                    info!(session = %session_id, "client disconnected");
                }
                Ok(())
            }
            Err(err) => {
                let reason = redact(&err.to_string());
                let _ = transport
                    .outgoing
                    .send(ServerFrame::Error {
                        message: reason.clone(),
                    })
                    .await;
                shell.close().await;
                recorder.close("error");
                self.finalize(session_id, SessionState::Error, Some(reason))?;
                Err(err)
            }
        }
    }

    async fn open_device_shell(
        &self,
        record: &SessionRecord,
    ) -> Result<Box<dyn crate::ssh::DeviceShell>, SessionError> {
        let device = self
            .directory
            .get(record.device_id)
            .await
            .map_err(|e| SessionError::Storage(e.to_string()))?
            .ok_or(SessionError::DeviceNotFound)?;
        let credentials = self
            .chain
            .resolve(&device)
            .await
            .ok_or(SessionError::CredentialsMissing)?;
        self.connector
            .open_shell(&device.ip_address, device.ssh_port, &credentials)
            .await
    }

    /// Transcript readback for the owner or an admin.
    pub fn session_log(
        &self,
        session_id: netops_core::SessionId,
        principal: &Principal,
    ) -> Result<(SessionRecord, String), SessionError> {
        let record = self
            .store
            .get(session_id)?
            .ok_or(SessionError::NotFound)?;
        if !principal.can_access_tenant(record.tenant_id)
            || !principal.can_act_for(record.user_id)
        {
            return Err(SessionError::Denied);
        }
        let body = match &record.transcript_path {
            Some(path) => std::fs::read_to_string(path).unwrap_or_default(),
            None => String::new(),
        };
        Ok((record, body))
    }

    /// Commit the terminal state exactly once. A second call for an already
    /// finished session is a no-op.
    fn finalize(
        &self,
        session_id: netops_core::SessionId,
        state: SessionState,
        error: Option<String>,
    ) -> Result<(), SessionError> {
        let Some(mut record) = self.store.get(session_id)? else {
            warn!(session = %session_id, "finalize for unknown session");
            return Ok(());
        };
        if record.state.is_terminal() {
            return Ok(());
        }
        let ended = Utc::now();
        record.state = state;
        record.error = error;
        record.ended_at = Some(ended);
        let started = record.started_at.unwrap_or(record.created_at);
        record.duration_ms = Some((ended - started).num_milliseconds().max(0));
        self.store.update(record)?;
        info!(session = %session_id, state = state.as_str(), "session finished");
        Ok(())
    }
}
