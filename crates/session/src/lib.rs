//! `netops-session` — interactive device access.
//!
//! A session is issued as a single-use ticket, attached over a duplex
//! transport, relayed against the device's SSH shell, and recorded to an
//! append-only transcript from the first byte to the last.

pub mod broker;
pub mod recorder;
pub mod relay;
pub mod ssh;
pub mod store;
pub mod types;

pub use broker::SessionBroker;
pub use recorder::{Direction, TranscriptRecorder};
pub use relay::{ClientFrame, RelayEnd, ServerFrame, SessionTransport};
pub use ssh::{DeviceConnector, DeviceShell, RusshConnector, ShellOutput};
pub use store::{InMemorySessionStore, SessionStore};
pub use types::{SessionError, SessionRecord, SessionState, SessionTicket};
