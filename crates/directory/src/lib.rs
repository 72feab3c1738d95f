//! `netops-directory` — device inventory boundary.
//!
//! The job processors and the session broker consume devices, credentials,
//! and external systems exclusively through the traits in this crate. The
//! in-memory implementations back single-process deployments and tests; a
//! database-backed implementation plugs in behind the same traits.

pub mod credentials;
pub mod device;
pub mod directory;
pub mod memory;
pub mod monitoring;
pub mod probe;
pub mod registry;

pub use credentials::{
    CredentialCandidate, CredentialChain, CredentialSource, Credentials, LoginOutcome, LoginProber,
};
pub use device::{
    DeviceFilter, DeviceRecord, DeviceStatus, DiscoveredInterface, DiscoveredPeer, SnmpStatus,
};
pub use directory::{DeviceDirectory, DirectoryError, UpsertOutcome};
pub use memory::{
    InMemoryCursorStore, InMemoryDeviceDirectory, InMemoryMonitoring, InMemoryRegistry,
    InMemorySnmpProbe,
};
pub use monitoring::{MonitoringError, MonitoringPlatform};
pub use probe::{ProbeError, SnmpProbe, SnmpTarget};
pub use registry::{
    CursorStore, Registry, RegistryDevice, RegistryError, RegistrySecret, RegistryTenant,
};
