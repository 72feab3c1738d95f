//! In-memory implementations for single-process deployments and tests.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netops_core::DeviceId;

use crate::device::{DeviceFilter, DeviceRecord, DiscoveredInterface, DiscoveredPeer};
use crate::directory::{DeviceDirectory, DirectoryError, UpsertOutcome};
use crate::monitoring::{MonitoringError, MonitoringPlatform};
use crate::probe::{ProbeError, SnmpProbe, SnmpTarget};
use crate::registry::{
    CursorStore, Registry, RegistryDevice, RegistryError, RegistrySecret, RegistryTenant,
};

#[derive(Default)]
struct Inner {
    devices: HashMap<DeviceId, DeviceRecord>,
    interfaces: HashMap<DeviceId, Vec<DiscoveredInterface>>,
    peers: HashMap<DeviceId, Vec<DiscoveredPeer>>,
}

#[derive(Default)]
pub struct InMemoryDeviceDirectory {
    inner: RwLock<Inner>,
}

impl InMemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryDeviceDirectory {
    async fn get(&self, id: DeviceId) -> Result<Option<DeviceRecord>, DirectoryError> {
        Ok(self.inner.read().unwrap().devices.get(&id).cloned())
    }

    async fn find_by_registry_id(
        &self,
        registry_id: &str,
    ) -> Result<Option<DeviceRecord>, DirectoryError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .devices
            .values()
            .find(|d| d.registry_id.as_deref() == Some(registry_id))
            .cloned())
    }

    async fn list(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, DirectoryError> {
        let mut devices: Vec<_> = self
            .inner
            .read()
            .unwrap()
            .devices
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    async fn upsert(&self, mut device: DeviceRecord) -> Result<UpsertOutcome, DirectoryError> {
        device.updated_at = Utc::now();
        let mut inner = self.inner.write().unwrap();
        let outcome = if inner.devices.contains_key(&device.id) {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };
        inner.devices.insert(device.id, device);
        Ok(outcome)
    }

    async fn replace_interfaces(
        &self,
        id: DeviceId,
        interfaces: Vec<DiscoveredInterface>,
    ) -> Result<(), DirectoryError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.devices.contains_key(&id) {
            return Err(DirectoryError::NotFound(id));
        }
        inner.interfaces.insert(id, interfaces);
        Ok(())
    }

    async fn replace_peers(
        &self,
        id: DeviceId,
        peers: Vec<DiscoveredPeer>,
    ) -> Result<(), DirectoryError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.devices.contains_key(&id) {
            return Err(DirectoryError::NotFound(id));
        }
        inner.peers.insert(id, peers);
        Ok(())
    }

    async fn interfaces(&self, id: DeviceId) -> Result<Vec<DiscoveredInterface>, DirectoryError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .interfaces
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn peers(&self, id: DeviceId) -> Result<Vec<DiscoveredPeer>, DirectoryError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .peers
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Registry backed by a seeded device list. The smallest deployment runs
/// without an external source of truth at all; operators load devices here.
#[derive(Default)]
pub struct InMemoryRegistry {
    devices: RwLock<Vec<RegistryDevice>>,
    secrets: RwLock<HashMap<String, Vec<RegistrySecret>>>,
    tenants: RwLock<Vec<RegistryTenant>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tenant(&self, tenant: RegistryTenant) {
        self.tenants.write().unwrap().push(tenant);
    }

    pub fn add_device(&self, device: RegistryDevice) {
        self.devices.write().unwrap().push(device);
    }

    pub fn add_secret(&self, device_id: impl Into<String>, secret: RegistrySecret) {
        self.secrets
            .write()
            .unwrap()
            .entry(device_id.into())
            .or_default()
            .push(secret);
    }
}

#[async_trait]
impl Registry for InMemoryRegistry {
    async fn list_tenants(&self) -> Result<Vec<RegistryTenant>, RegistryError> {
        Ok(self.tenants.read().unwrap().clone())
    }

    async fn list_devices(
        &self,
        updated_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RegistryDevice>, RegistryError> {
        Ok(self
            .devices
            .read()
            .unwrap()
            .iter()
            .filter(|d| match (updated_since, d.updated_at) {
                (Some(since), Some(at)) => at > since,
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn device_secrets(&self, device_id: &str) -> Result<Vec<RegistrySecret>, RegistryError> {
        Ok(self
            .secrets
            .read()
            .unwrap()
            .get(device_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Monitoring platform that just keeps a host table. Stands in until a real
/// platform adapter is wired behind the same trait.
#[derive(Default)]
pub struct InMemoryMonitoring {
    hosts: RwLock<HashMap<String, String>>,
    next: std::sync::atomic::AtomicU64,
}

impl InMemoryMonitoring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.read().unwrap().len()
    }
}

#[async_trait]
impl MonitoringPlatform for InMemoryMonitoring {
    async fn add_host(&self, device: &DeviceRecord) -> Result<String, MonitoringError> {
        let reference = format!(
            "host-{}",
            self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
        );
        self.hosts
            .write()
            .unwrap()
            .insert(reference.clone(), device.name.clone());
        Ok(reference)
    }

    async fn update_host(
        &self,
        monitoring_ref: &str,
        device: &DeviceRecord,
    ) -> Result<(), MonitoringError> {
        let mut hosts = self.hosts.write().unwrap();
        match hosts.get_mut(monitoring_ref) {
            Some(name) => {
                *name = device.name.clone();
                Ok(())
            }
            None => Err(MonitoringError::NotFound),
        }
    }

    async fn delete_host(&self, monitoring_ref: &str) -> Result<(), MonitoringError> {
        match self.hosts.write().unwrap().remove(monitoring_ref) {
            Some(_) => Ok(()),
            None => Err(MonitoringError::NotFound),
        }
    }
}

/// Probe with a scripted view of the network. Useful for single-process
/// deployments without SNMP reach and for exercising the poll/discovery
/// pipeline end to end.
#[derive(Default)]
pub struct InMemorySnmpProbe {
    reachable: RwLock<std::collections::HashSet<String>>,
    interfaces: RwLock<HashMap<String, Vec<DiscoveredInterface>>>,
    peers: RwLock<HashMap<String, Vec<DiscoveredPeer>>>,
}

impl InMemorySnmpProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_reachable(&self, host: impl Into<String>) {
        self.reachable.write().unwrap().insert(host.into());
    }

    pub fn set_interfaces(&self, host: impl Into<String>, interfaces: Vec<DiscoveredInterface>) {
        self.interfaces.write().unwrap().insert(host.into(), interfaces);
    }

    pub fn set_peers(&self, host: impl Into<String>, peers: Vec<DiscoveredPeer>) {
        self.peers.write().unwrap().insert(host.into(), peers);
    }
}

#[async_trait]
impl SnmpProbe for InMemorySnmpProbe {
    async fn ping(&self, target: &SnmpTarget) -> Result<(), ProbeError> {
        if self.reachable.read().unwrap().contains(&target.host) {
            Ok(())
        } else {
            Err(ProbeError::Timeout)
        }
    }

    async fn interfaces(&self, target: &SnmpTarget) -> Result<Vec<DiscoveredInterface>, ProbeError> {
        self.ping(target).await?;
        Ok(self
            .interfaces
            .read()
            .unwrap()
            .get(&target.host)
            .cloned()
            .unwrap_or_default())
    }

    async fn peers(&self, target: &SnmpTarget) -> Result<Vec<DiscoveredPeer>, ProbeError> {
        self.ping(target).await?;
        Ok(self
            .peers
            .read()
            .unwrap()
            .get(&target.host)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryCursorStore {
    cursors: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for InMemoryCursorStore {
    fn get(&self, key: &str) -> Option<DateTime<Utc>> {
        self.cursors.read().unwrap().get(key).copied()
    }

    fn set(&self, key: &str, at: DateTime<Utc>) {
        self.cursors.write().unwrap().insert(key.to_string(), at);
    }
}
