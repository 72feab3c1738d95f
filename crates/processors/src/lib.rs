//! `netops-processors` — the job implementations.
//!
//! Each processor is pure with respect to its own queue: it reads and writes
//! through the directory/registry/probe/monitoring collaborator traits and
//! reports back through the job context. Child jobs go through the context
//! too, never straight to the store.

use std::sync::Arc;

use netops_directory::{
    CredentialChain, CursorStore, DeviceDirectory, LoginProber, MonitoringPlatform, Registry,
    RegistryError, SnmpProbe,
};
use netops_queue::{Processor, ProcessorError};
use netops_secrets::SecretCodec;

pub mod backup_sync;
pub mod connectivity_test;
pub mod credential_check;
pub mod device_scan;
pub mod inventory_sync;
pub mod manifest;
pub mod monitoring_sync;
pub mod pending_refresh;
pub mod snmp_discovery;
pub mod snmp_poll;

pub use backup_sync::BackupSyncProcessor;
pub use connectivity_test::ConnectivityTestProcessor;
pub use credential_check::CredentialCheckProcessor;
pub use device_scan::DeviceScanProcessor;
pub use inventory_sync::InventorySyncProcessor;
pub use manifest::{ManifestEntry, ManifestWriter};
pub use monitoring_sync::MonitoringSyncProcessor;
pub use pending_refresh::PendingRefreshProcessor;
pub use snmp_discovery::SnmpDiscoveryProcessor;
pub use snmp_poll::SnmpPollProcessor;

/// Registry errors mapped onto the failure taxonomy: auth problems will not
/// fix themselves by retrying, transport hiccups might.
pub(crate) fn registry_failure(err: RegistryError) -> ProcessorError {
    match err {
        RegistryError::Unauthorized => ProcessorError::permanent(err.to_string()),
        RegistryError::Transport(_) | RegistryError::Decode(_) => {
            ProcessorError::transient(err.to_string())
        }
    }
}

/// Everything the processor set needs, bundled for wiring at the binary edge.
pub struct ProcessorDeps {
    pub directory: Arc<dyn DeviceDirectory>,
    pub registry: Arc<dyn Registry>,
    pub cursors: Arc<dyn CursorStore>,
    pub chain: Arc<CredentialChain>,
    pub codec: Arc<SecretCodec>,
    pub probe: Arc<dyn SnmpProbe>,
    pub monitoring: Arc<dyn MonitoringPlatform>,
    pub prober: Arc<dyn LoginProber>,
    pub manifest: Arc<ManifestWriter>,
}

/// One instance of every processor, ready for worker pool registration.
pub fn all_processors(deps: &ProcessorDeps) -> Vec<Arc<dyn Processor>> {
    vec![
        Arc::new(InventorySyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.registry),
            Arc::clone(&deps.cursors),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.codec),
        )),
        Arc::new(PendingRefreshProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.chain),
        )),
        Arc::new(BackupSyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.manifest),
        )),
        Arc::new(SnmpDiscoveryProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.probe),
        )),
        Arc::new(SnmpPollProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.probe),
        )),
        Arc::new(DeviceScanProcessor::new(Arc::clone(&deps.directory))),
        Arc::new(CredentialCheckProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.prober),
        )),
        Arc::new(ConnectivityTestProcessor),
        Arc::new(MonitoringSyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.monitoring),
        )),
    ]
}

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    use netops_directory::registry::{RegistryDevice, RegistrySecret, RegistryTenant};
    use netops_directory::{
        Credentials, DeviceRecord, DiscoveredInterface, DiscoveredPeer, InMemoryCursorStore,
        InMemoryDeviceDirectory, LoginOutcome, MonitoringError, ProbeError, SnmpTarget,
    };
    use netops_events::QueueEventBridge;
    use netops_queue::{InMemoryQueueStore, JobContext, JobPayload, QueueService};
    use netops_secrets::{InMemoryTokenStore, TokenStore};

    pub struct TestDeps {
        pub directory: Arc<dyn DeviceDirectory>,
        pub registry: Arc<dyn Registry>,
        pub cursors: Arc<dyn CursorStore>,
        pub chain: Arc<CredentialChain>,
        pub codec: Arc<SecretCodec>,
    }

    #[derive(Default)]
    pub struct FakeRegistryState {
        pub tenants: Vec<RegistryTenant>,
        pub devices: Vec<RegistryDevice>,
        pub secrets: HashMap<String, Vec<RegistrySecret>>,
    }

    impl FakeRegistryState {
        pub fn with_devices(devices: Vec<RegistryDevice>) -> Self {
            Self {
                devices,
                ..Self::default()
            }
        }
    }

    struct FakeRegistry(FakeRegistryState);

    #[async_trait]
    impl Registry for FakeRegistry {
        async fn list_tenants(&self) -> Result<Vec<RegistryTenant>, RegistryError> {
            Ok(self.0.tenants.clone())
        }

        async fn list_devices(
            &self,
            updated_since: Option<DateTime<Utc>>,
        ) -> Result<Vec<RegistryDevice>, RegistryError> {
            Ok(self
                .0
                .devices
                .iter()
                .filter(|d| match (updated_since, d.updated_at) {
                    (Some(since), Some(at)) => at > since,
                    _ => true,
                })
                .cloned()
                .collect())
        }

        async fn device_secrets(
            &self,
            device_id: &str,
        ) -> Result<Vec<RegistrySecret>, RegistryError> {
            Ok(self.0.secrets.get(device_id).cloned().unwrap_or_default())
        }
    }

    pub fn deps_with_registry(state: FakeRegistryState) -> TestDeps {
        let codec = Arc::new(SecretCodec::new("test-secret"));
        let registry: Arc<dyn Registry> = Arc::new(FakeRegistry(state));
        let store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
        let chain = Arc::new(CredentialChain::new(
            Arc::clone(&codec),
            Arc::clone(&registry),
            store,
            chrono::Duration::minutes(5),
        ));
        TestDeps {
            directory: Arc::new(InMemoryDeviceDirectory::new()),
            registry,
            cursors: Arc::new(InMemoryCursorStore::new()),
            chain,
            codec,
        }
    }

    /// Enqueue and claim one job so the context refers to a live active job.
    pub fn ctx_for(payload: &JobPayload) -> (JobContext, Arc<QueueService>) {
        let bridge = Arc::new(QueueEventBridge::new());
        let service = Arc::new(QueueService::new(InMemoryQueueStore::arc(), bridge));
        service.enqueue(payload.clone()).unwrap();
        let job = service.claim(payload.queue()).unwrap().unwrap();
        (JobContext::new(&job, Arc::clone(&service)), service)
    }

    pub struct FakeProbe {
        reachable: bool,
        interfaces: Vec<DiscoveredInterface>,
        peers: Vec<DiscoveredPeer>,
    }

    impl FakeProbe {
        pub fn reachable() -> Self {
            Self {
                reachable: true,
                interfaces: Vec::new(),
                peers: Vec::new(),
            }
        }

        pub fn unreachable() -> Self {
            Self {
                reachable: false,
                interfaces: Vec::new(),
                peers: Vec::new(),
            }
        }

        pub fn with_interfaces(mut self, interfaces: Vec<DiscoveredInterface>) -> Self {
            self.interfaces = interfaces;
            self
        }
    }

    #[async_trait]
    impl SnmpProbe for FakeProbe {
        async fn ping(&self, _target: &SnmpTarget) -> Result<(), ProbeError> {
            if self.reachable {
                Ok(())
            } else {
                Err(ProbeError::Timeout)
            }
        }

        async fn interfaces(
            &self,
            _target: &SnmpTarget,
        ) -> Result<Vec<DiscoveredInterface>, ProbeError> {
            if self.reachable {
                Ok(self.interfaces.clone())
            } else {
                Err(ProbeError::Timeout)
            }
        }

        async fn peers(&self, _target: &SnmpTarget) -> Result<Vec<DiscoveredPeer>, ProbeError> {
            if self.reachable {
                Ok(self.peers.clone())
            } else {
                Err(ProbeError::Timeout)
            }
        }
    }

    pub struct FakeMonitoring {
        hosts: Mutex<HashMap<String, String>>,
        counter: AtomicU64,
    }

    impl FakeMonitoring {
        pub fn new() -> Self {
            Self {
                hosts: Mutex::new(HashMap::new()),
                counter: AtomicU64::new(0),
            }
        }

        pub fn host_count(&self) -> usize {
            self.hosts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl MonitoringPlatform for FakeMonitoring {
        async fn add_host(&self, device: &DeviceRecord) -> Result<String, MonitoringError> {
            let reference = format!("mon-{}", self.counter.fetch_add(1, Ordering::SeqCst));
            self.hosts
                .lock()
                .unwrap()
                .insert(reference.clone(), device.name.clone());
            Ok(reference)
        }

        async fn update_host(
            &self,
            monitoring_ref: &str,
            device: &DeviceRecord,
        ) -> Result<(), MonitoringError> {
            let mut hosts = self.hosts.lock().unwrap();
            match hosts.get_mut(monitoring_ref) {
                Some(name) => {
                    *name = device.name.clone();
                    Ok(())
                }
                None => Err(MonitoringError::NotFound),
            }
        }

        async fn delete_host(&self, monitoring_ref: &str) -> Result<(), MonitoringError> {
            match self.hosts.lock().unwrap().remove(monitoring_ref) {
                Some(_) => Ok(()),
                None => Err(MonitoringError::NotFound),
            }
        }
    }

    pub struct FakeProber {
        username: String,
        password: String,
    }

    impl FakeProber {
        pub fn accepting(username: &str, password: &str) -> Self {
            Self {
                username: username.to_string(),
                password: password.to_string(),
            }
        }
    }

    #[async_trait]
    impl LoginProber for FakeProber {
        async fn attempt_login(
            &self,
            _host: &str,
            _port: u16,
            credentials: &Credentials,
        ) -> LoginOutcome {
            if credentials.username == self.username && credentials.password == self.password {
                LoginOutcome::Success
            } else {
                LoginOutcome::AuthFailed
            }
        }
    }
}
