//! Monitoring platform collaborator.

use async_trait::async_trait;
use thiserror::Error;

use crate::device::DeviceRecord;

#[derive(Debug, Error)]
pub enum MonitoringError {
    /// The referenced host does not exist on the platform. The monitoring
    /// sync processor treats this as a signal to add instead.
    #[error("monitored host not found")]
    NotFound,
    #[error("monitoring platform error: {0}")]
    Platform(String),
}

#[async_trait]
pub trait MonitoringPlatform: Send + Sync {
    /// Register a host; returns the platform's reference for it.
    async fn add_host(&self, device: &DeviceRecord) -> Result<String, MonitoringError>;

    async fn update_host(
        &self,
        monitoring_ref: &str,
        device: &DeviceRecord,
    ) -> Result<(), MonitoringError>;

    async fn delete_host(&self, monitoring_ref: &str) -> Result<(), MonitoringError>;
}
