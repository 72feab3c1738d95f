//! SNMP probe collaborator.

use async_trait::async_trait;
use thiserror::Error;

use crate::device::{DeviceRecord, DiscoveredInterface, DiscoveredPeer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpTarget {
    pub host: String,
    pub port: u16,
    pub community: String,
}

impl SnmpTarget {
    /// Build a target from a device record, if it carries SNMP settings.
    pub fn from_device(device: &DeviceRecord) -> Option<Self> {
        let community = device.snmp_community.clone()?;
        Some(Self {
            host: device.ip_address.clone(),
            port: device.snmp_port,
            community,
        })
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("snmp target did not respond in time")]
    Timeout,
    #[error("snmp protocol error: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait SnmpProbe: Send + Sync {
    /// Reachability check: Ok means the agent answered.
    async fn ping(&self, target: &SnmpTarget) -> Result<(), ProbeError>;

    async fn interfaces(&self, target: &SnmpTarget)
        -> Result<Vec<DiscoveredInterface>, ProbeError>;

    async fn peers(&self, target: &SnmpTarget) -> Result<Vec<DiscoveredPeer>, ProbeError>;
}
