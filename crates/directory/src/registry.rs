//! External source-of-truth registry collaborator.
//!
//! The inventory sync reads tenants, devices, and device secrets from here.
//! Implementations talk to the real registry API; tests use in-crate fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry rejected the request as unauthorized")]
    Unauthorized,
    #[error("registry transport error: {0}")]
    Transport(String),
    #[error("registry response could not be decoded: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryTenant {
    pub id: String,
    pub name: String,
    pub group: Option<String>,
}

/// Device as the registry reports it. Optional fields stay optional here;
/// the inventory sync decides what is required and what marks a device
/// pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryDevice {
    pub id: String,
    pub name: String,
    pub primary_ip: Option<String>,
    pub tenant_id: Option<String>,
    pub role: Option<String>,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub site: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub backup_enabled: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A secret attached to a registry device. Some registries store the
/// username on the secret, others encode it in the secret name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySecret {
    pub name: String,
    pub username: Option<String>,
    pub plaintext: String,
}

#[async_trait]
pub trait Registry: Send + Sync {
    async fn list_tenants(&self) -> Result<Vec<RegistryTenant>, RegistryError>;

    /// Devices changed since the cursor; `None` means a full listing.
    async fn list_devices(
        &self,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RegistryDevice>, RegistryError>;

    async fn device_secrets(&self, device_id: &str)
        -> Result<Vec<RegistrySecret>, RegistryError>;
}

/// Persists the per-registry sync cursor so later inventory runs fetch only
/// changed records.
pub trait CursorStore: Send + Sync {
    fn get(&self, key: &str) -> Option<DateTime<Utc>>;
    fn set(&self, key: &str, at: DateTime<Utc>);
}
