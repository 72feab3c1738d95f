//! Device records as the control plane sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use netops_core::{DeviceId, TenantId};

/// Operational status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Active,
    Inactive,
}

/// Result of the most recent SNMP reachability poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnmpStatus {
    Unknown,
    Ok,
    Error,
}

/// A managed device.
///
/// `cred_password_enc` is always the encrypted envelope form; the clear text
/// exists only transiently inside components that called the secret codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub tenant_id: TenantId,
    pub name: String,
    pub hostname: Option<String>,
    pub ip_address: String,
    pub ssh_port: u16,
    pub snmp_community: Option<String>,
    pub snmp_port: u16,
    pub role: Option<String>,
    pub platform: Option<String>,
    pub model: Option<String>,
    pub site: Option<String>,
    pub status: DeviceStatus,
    pub backup_enabled: bool,
    pub cred_username: Option<String>,
    pub cred_password_enc: Option<String>,
    /// Identifier in the external source-of-truth registry, when synced.
    pub registry_id: Option<String>,
    /// Identifier in the monitoring platform, when registered there.
    pub monitoring_ref: Option<String>,
    pub snmp_status: SnmpStatus,
    pub last_snmp_ok: Option<DateTime<Utc>>,
    /// Fields still missing before the device is fully usable
    /// (e.g. `["username", "password"]`). Empty means not pending.
    pub pending_fields: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceRecord {
    /// Minimal record with sane defaults; builders in tests fill the rest.
    pub fn new(tenant_id: TenantId, name: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(),
            tenant_id,
            name: name.into(),
            hostname: None,
            ip_address: ip_address.into(),
            ssh_port: 22,
            snmp_community: None,
            snmp_port: 161,
            role: None,
            platform: None,
            model: None,
            site: None,
            status: DeviceStatus::Active,
            backup_enabled: false,
            cred_username: None,
            cred_password_enc: None,
            registry_id: None,
            monitoring_ref: None,
            snmp_status: SnmpStatus::Unknown,
            last_snmp_ok: None,
            pending_fields: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.pending_fields.is_empty()
    }
}

/// Read-side filter for device listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFilter {
    pub tenant_id: Option<TenantId>,
    pub status: Option<DeviceStatus>,
    pub backup_enabled: Option<bool>,
    #[serde(default)]
    pub pending_only: bool,
}

impl DeviceFilter {
    pub fn matches(&self, device: &DeviceRecord) -> bool {
        if let Some(t) = self.tenant_id {
            if device.tenant_id != t {
                return false;
            }
        }
        if let Some(s) = self.status {
            if device.status != s {
                return false;
            }
        }
        if let Some(b) = self.backup_enabled {
            if device.backup_enabled != b {
                return false;
            }
        }
        if self.pending_only && !device.is_pending() {
            return false;
        }
        true
    }
}

/// Interface found by SNMP discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredInterface {
    pub if_index: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub if_type: Option<String>,
}

/// BGP peer found by SNMP discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredPeer {
    pub peer_ip: String,
    pub asn: Option<u32>,
    pub name: Option<String>,
    pub vrf_name: Option<String>,
}
