//! Storage boundary for device records and their discovered topology.

use async_trait::async_trait;
use netops_core::DeviceId;
use thiserror::Error;

use crate::device::{DeviceFilter, DeviceRecord, DiscoveredInterface, DiscoveredPeer};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("device {0} not found")]
    NotFound(DeviceId),
    #[error("directory storage error: {0}")]
    Storage(String),
}

/// Whether an upsert created a new record or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Device persistence. Upserts are keyed by id; registry lookups let the
/// inventory sync match records it has seen before.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    async fn get(&self, id: DeviceId) -> Result<Option<DeviceRecord>, DirectoryError>;

    async fn find_by_registry_id(
        &self,
        registry_id: &str,
    ) -> Result<Option<DeviceRecord>, DirectoryError>;

    async fn list(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, DirectoryError>;

    async fn upsert(&self, device: DeviceRecord) -> Result<UpsertOutcome, DirectoryError>;

    /// Replace the discovered interface set wholesale.
    async fn replace_interfaces(
        &self,
        id: DeviceId,
        interfaces: Vec<DiscoveredInterface>,
    ) -> Result<(), DirectoryError>;

    /// Replace the discovered peer set wholesale.
    async fn replace_peers(
        &self,
        id: DeviceId,
        peers: Vec<DiscoveredPeer>,
    ) -> Result<(), DirectoryError>;

    async fn interfaces(&self, id: DeviceId) -> Result<Vec<DiscoveredInterface>, DirectoryError>;

    async fn peers(&self, id: DeviceId) -> Result<Vec<DiscoveredPeer>, DirectoryError>;
}
