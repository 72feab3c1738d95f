//! Device-side SSH plumbing.
//!
//! `DeviceConnector` opens an interactive shell; `DeviceShell` is the byte
//! pipe the relay drives. The same connector doubles as the login prober
//! used by the credential-check job, since both boil down to "can this
//! username/password get past authentication".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use tokio::net::TcpStream;
use tracing::debug;

use netops_directory::{Credentials, LoginOutcome, LoginProber};
use netops_secrets::redact;

use crate::types::SessionError;

/// One chunk read off the remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutput {
    Data(Vec<u8>),
    Stderr(Vec<u8>),
}

/// An open interactive shell on a device.
#[async_trait]
pub trait DeviceShell: Send {
    /// Next chunk from the remote, `None` once the channel is closed.
    async fn read(&mut self) -> Option<ShellOutput>;
    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError>;
    async fn resize(&mut self, rows: u32, cols: u32) -> Result<(), SessionError>;
    async fn close(&mut self);
}

#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn open_shell(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> Result<Box<dyn DeviceShell>, SessionError>;
}

/// Network gear rarely has a provisioned host-key trust store, so server
/// keys are accepted; the transcript is the audit trail.
struct AcceptingHandler;

#[async_trait]
impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, _key: &PublicKey) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

pub struct RusshConnector {
    config: Arc<client::Config>,
    connect_timeout: Duration,
}

impl Default for RusshConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl RusshConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(Duration::from_secs(600)),
            ..Default::default()
        });
        Self {
            config,
            connect_timeout,
        }
    }

    async fn authenticated_handle(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> Result<client::Handle<AcceptingHandler>, SessionError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| SessionError::Connect(format!("connect timeout to {host}:{port}")))?
            .map_err(|e| SessionError::Connect(redact(&e.to_string())))?;

        let mut handle = client::connect_stream(Arc::clone(&self.config), stream, AcceptingHandler)
            .await
            .map_err(|e| SessionError::Connect(redact(&e.to_string())))?;

        let authenticated = handle
            .authenticate_password(&credentials.username, &credentials.password)
            .await
            .map_err(|e| SessionError::Connect(redact(&e.to_string())))?;
        if !authenticated {
            return Err(SessionError::Connect("authentication rejected".to_string()));
        }
        Ok(handle)
    }
}

#[async_trait]
impl DeviceConnector for RusshConnector {
    async fn open_shell(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> Result<Box<dyn DeviceShell>, SessionError> {
        let handle = self.authenticated_handle(host, port, credentials).await?;

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| SessionError::Connect(redact(&e.to_string())))?;
        channel
            .request_pty(false, "xterm-color", 80, 24, 0, 0, &[])
            .await
            .map_err(|e| SessionError::Connect(redact(&e.to_string())))?;
        channel
            .request_shell(false)
            .await
            .map_err(|e| SessionError::Connect(redact(&e.to_string())))?;

        debug!(host, port, "interactive shell open");
        Ok(Box::new(RusshShell { handle, channel }))
    }
}

struct RusshShell {
    handle: client::Handle<AcceptingHandler>,
    channel: russh::Channel<client::Msg>,
}

#[async_trait]
impl DeviceShell for RusshShell {
    async fn read(&mut self) -> Option<ShellOutput> {
        loop {
            match self.channel.wait().await? {
                russh::ChannelMsg::Data { data } => return Some(ShellOutput::Data(data.to_vec())),
                russh::ChannelMsg::ExtendedData { data, ext } if ext == 1 => {
                    return Some(ShellOutput::Stderr(data.to_vec()));
                }
                russh::ChannelMsg::Close => return None,
                // Exit status, EOF and window adjustments carry no bytes.
                _ => continue,
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        self.channel
            .data(data)
            .await
            .map_err(|e| SessionError::Connect(redact(&e.to_string())))
    }

    async fn resize(&mut self, rows: u32, cols: u32) -> Result<(), SessionError> {
        self.channel
            .window_change(cols, rows, 0, 0)
            .await
            .map_err(|e| SessionError::Connect(redact(&e.to_string())))
    }

    async fn close(&mut self) {
        let _ = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await;
    }
}

#[async_trait]
impl LoginProber for RusshConnector {
    async fn attempt_login(
        &self,
        host: &str,
        port: u16,
        credentials: &Credentials,
    ) -> LoginOutcome {
        match self.authenticated_handle(host, port, credentials).await {
            Ok(handle) => {
                let _ = handle
                    .disconnect(russh::Disconnect::ByApplication, "", "en")
                    .await;
                LoginOutcome::Success
            }
            Err(SessionError::Connect(reason)) if reason == "authentication rejected" => {
                LoginOutcome::AuthFailed
            }
            Err(err) => LoginOutcome::Unreachable {
                reason: redact(&err.to_string()),
            },
        }
    }
}
