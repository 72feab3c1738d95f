//! The duplex pump between a client transport and a device shell.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::recorder::{Direction, TranscriptRecorder};
use crate::ssh::{DeviceShell, ShellOutput};
use crate::types::SessionError;

/// Frames the client sends over the attach transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    Data { payload: String },
    Resize { rows: u32, cols: u32 },
}

/// Frames the broker sends back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Data { payload: String },
    Error { message: String },
}

/// The client half of an attached session. The WebSocket handler owns the
/// other ends and does nothing but encode/decode frames.
pub struct SessionTransport {
    pub incoming: mpsc::Receiver<ClientFrame>,
    pub outgoing: mpsc::Sender<ServerFrame>,
}

impl SessionTransport {
    /// A connected transport pair: the broker side and the handles the
    /// WebSocket task keeps.
    pub fn pair(buffer: usize) -> (Self, mpsc::Sender<ClientFrame>, mpsc::Receiver<ServerFrame>) {
        let (client_tx, incoming) = mpsc::channel(buffer);
        let (outgoing, server_rx) = mpsc::channel(buffer);
        (Self { incoming, outgoing }, client_tx, server_rx)
    }
}

/// Why the relay loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The remote closed the channel.
    RemoteClosed,
    /// The client dropped the transport.
    ClientClosed,
}

/// Pump bytes both ways until either side closes.
///
/// Remote output is recorded before it is forwarded so the transcript never
/// misses a chunk the client saw. A write failure towards the remote ends
/// the session; a full or dropped client channel counts as a disconnect.
pub async fn relay(
    shell: &mut Box<dyn DeviceShell>,
    transport: &mut SessionTransport,
    recorder: &TranscriptRecorder,
) -> Result<RelayEnd, SessionError> {
    loop {
        tokio::select! {
            chunk = shell.read() => match chunk {
                Some(ShellOutput::Data(bytes)) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    recorder.record(Direction::Out, &text);
                    if transport.outgoing.send(ServerFrame::Data { payload: text }).await.is_err() {
                        shell.close().await;
                        return Ok(RelayEnd::ClientClosed);
                    }
                }
                Some(ShellOutput::Stderr(bytes)) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    recorder.record(Direction::Err, &text);
                    if transport.outgoing.send(ServerFrame::Error { message: text }).await.is_err() {
                        shell.close().await;
                        return Ok(RelayEnd::ClientClosed);
                    }
                }
                None => {
                    debug!("remote channel closed");
                    return Ok(RelayEnd::RemoteClosed);
                }
            },
            frame = transport.incoming.recv() => match frame {
                Some(ClientFrame::Data { payload }) => {
                    recorder.record(Direction::In, &payload);
                    shell.write(payload.as_bytes()).await?;
                }
                Some(ClientFrame::Resize { rows, cols }) => {
                    shell.resize(rows.max(1), cols.max(1)).await?;
                }
                None => {
                    shell.close().await;
                    return Ok(RelayEnd::ClientClosed);
                }
            },
        }
    }
}
