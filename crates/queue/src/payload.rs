//! Typed job payloads and queue routing.
//!
//! Every payload variant knows which queue it belongs to and how to derive
//! its deterministic job id. Queue names and per-queue concurrency live here
//! so the worker pool and the API agree on them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use netops_core::{DeviceId, TenantId};

use crate::types::JobId;

pub mod queue_names {
    pub const INVENTORY_SYNC: &str = "inventory-sync";
    pub const PENDING_REFRESH: &str = "pending-refresh";
    pub const BACKUP_SYNC: &str = "backup-sync";
    pub const SNMP_DISCOVERY: &str = "snmp-discovery";
    pub const SNMP_POLLING: &str = "snmp-polling";
    pub const DEVICE_SCAN: &str = "device-scan";
    pub const CREDENTIAL_CHECK: &str = "credential-check";
    pub const CONNECTIVITY_TEST: &str = "connectivity-test";
    pub const MONITORING_SYNC: &str = "monitoring-sync";

    pub const ALL: &[&str] = &[
        INVENTORY_SYNC,
        PENDING_REFRESH,
        BACKUP_SYNC,
        SNMP_DISCOVERY,
        SNMP_POLLING,
        DEVICE_SCAN,
        CREDENTIAL_CHECK,
        CONNECTIVITY_TEST,
        MONITORING_SYNC,
    ];
}

/// Worker slots per queue. SNMP traffic is cheap and parallel; syncs that
/// write shared state run narrow.
pub fn queue_concurrency(queue: &str) -> usize {
    match queue {
        queue_names::INVENTORY_SYNC => 2,
        queue_names::PENDING_REFRESH => 1,
        queue_names::BACKUP_SYNC => 1,
        queue_names::SNMP_DISCOVERY => 4,
        queue_names::SNMP_POLLING => 6,
        queue_names::DEVICE_SCAN => 4,
        queue_names::CREDENTIAL_CHECK => 2,
        queue_names::CONNECTIVITY_TEST => 4,
        queue_names::MONITORING_SYNC => 2,
        _ => 1,
    }
}

/// Registry-side filters applied during inventory sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFilters {
    pub tenant_group: Option<String>,
    pub role: Option<String>,
    pub platform: Option<String>,
    pub site: Option<String>,
}

/// Which discovered set an SNMP discovery run replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryTarget {
    Interfaces,
    Peers,
}

impl DiscoveryTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryTarget::Interfaces => "interfaces",
            DiscoveryTarget::Peers => "peers",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringAction {
    Add,
    Update,
    Delete,
}

impl MonitoringAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringAction::Add => "add",
            MonitoringAction::Update => "update",
            MonitoringAction::Delete => "delete",
        }
    }
}

/// The typed payload of a job, tagged by kind on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum JobPayload {
    InventorySync {
        #[serde(default)]
        resources: Vec<String>,
        #[serde(default)]
        filters: InventoryFilters,
        tenant_id: Option<TenantId>,
        /// Who requested the sync, for the job log
        actor: Option<String>,
    },
    PendingRefresh {
        limit: usize,
        tenant_id: Option<TenantId>,
    },
    BackupSync {
        tenant_id: Option<TenantId>,
    },
    SnmpDiscovery {
        device_id: DeviceId,
        target: DiscoveryTarget,
    },
    SnmpPoll {
        device_id: DeviceId,
    },
    DeviceScan {
        device_id: DeviceId,
        reason: Option<String>,
    },
    CredentialCheck {
        device_id: DeviceId,
    },
    ConnectivityTest {
        device_id: Option<DeviceId>,
        host: String,
        port: u16,
        timeout_ms: u64,
    },
    MonitoringSync {
        action: MonitoringAction,
        device_id: DeviceId,
    },
}

impl JobPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            JobPayload::InventorySync { .. } => "inventory-sync",
            JobPayload::PendingRefresh { .. } => "pending-refresh",
            JobPayload::BackupSync { .. } => "backup-sync",
            JobPayload::SnmpDiscovery { .. } => "snmp-discovery",
            JobPayload::SnmpPoll { .. } => "snmp-poll",
            JobPayload::DeviceScan { .. } => "device-scan",
            JobPayload::CredentialCheck { .. } => "credential-check",
            JobPayload::ConnectivityTest { .. } => "connectivity-test",
            JobPayload::MonitoringSync { .. } => "monitoring-sync",
        }
    }

    pub fn queue(&self) -> &'static str {
        match self {
            JobPayload::InventorySync { .. } => queue_names::INVENTORY_SYNC,
            JobPayload::PendingRefresh { .. } => queue_names::PENDING_REFRESH,
            JobPayload::BackupSync { .. } => queue_names::BACKUP_SYNC,
            JobPayload::SnmpDiscovery { .. } => queue_names::SNMP_DISCOVERY,
            JobPayload::SnmpPoll { .. } => queue_names::SNMP_POLLING,
            JobPayload::DeviceScan { .. } => queue_names::DEVICE_SCAN,
            JobPayload::CredentialCheck { .. } => queue_names::CREDENTIAL_CHECK,
            JobPayload::ConnectivityTest { .. } => queue_names::CONNECTIVITY_TEST,
            JobPayload::MonitoringSync { .. } => queue_names::MONITORING_SYNC,
        }
    }

    /// The logical target the job acts on, used in the derived id.
    pub fn target(&self) -> String {
        match self {
            JobPayload::InventorySync { tenant_id, .. }
            | JobPayload::PendingRefresh { tenant_id, .. }
            | JobPayload::BackupSync { tenant_id } => tenant_id
                .map(|t| t.to_string())
                .unwrap_or_else(|| "all".to_string()),
            JobPayload::SnmpDiscovery { device_id, target } => {
                format!("{device_id}-{}", target.as_str())
            }
            JobPayload::SnmpPoll { device_id }
            | JobPayload::DeviceScan { device_id, .. }
            | JobPayload::CredentialCheck { device_id } => device_id.to_string(),
            JobPayload::ConnectivityTest { host, port, .. } => format!("{host}-{port}"),
            JobPayload::MonitoringSync { action, device_id } => {
                format!("{device_id}-{}", action.as_str())
            }
        }
    }

    pub fn derive_id(&self, at: DateTime<Utc>) -> JobId {
        JobId::derive(self.kind(), &self.target(), at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_routes_to_its_queue() {
        let payload = JobPayload::SnmpPoll {
            device_id: DeviceId::new(),
        };
        assert_eq!(payload.queue(), "snmp-polling");
        assert_eq!(payload.kind(), "snmp-poll");
    }

    #[test]
    fn discovery_target_distinguishes_ids() {
        let device_id = DeviceId::new();
        let at = Utc::now();
        let interfaces = JobPayload::SnmpDiscovery {
            device_id,
            target: DiscoveryTarget::Interfaces,
        };
        let peers = JobPayload::SnmpDiscovery {
            device_id,
            target: DiscoveryTarget::Peers,
        };
        assert_ne!(interfaces.derive_id(at), peers.derive_id(at));
    }

    #[test]
    fn payload_round_trips_through_json() {
        let payload = JobPayload::ConnectivityTest {
            device_id: None,
            host: "10.0.0.1".into(),
            port: 22,
            timeout_ms: 5_000,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""kind":"connectivity-test""#));
        let back: JobPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn every_queue_has_a_concurrency() {
        for queue in queue_names::ALL {
            assert!(queue_concurrency(queue) >= 1);
        }
    }
}
