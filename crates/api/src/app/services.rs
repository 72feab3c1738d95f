//! Infrastructure wiring: stores, queue service, worker pool, session broker.

use std::sync::Arc;

use netops_directory::{
    CredentialChain, DeviceDirectory, InMemoryCursorStore, InMemoryDeviceDirectory,
    InMemoryMonitoring, InMemoryRegistry, InMemorySnmpProbe, LoginProber, Registry,
};
use netops_events::QueueEventBridge;
use netops_processors::{ManifestWriter, ProcessorDeps, all_processors};
use netops_queue::{
    InMemoryQueueStore, QueueService, QueueStore, WorkerPool, WorkerPoolConfig, WorkerPoolHandle,
};
use netops_secrets::{InMemoryTokenStore, SecretCodec, TokenStore};
use netops_session::{InMemorySessionStore, RusshConnector, SessionBroker, SessionStore};

use crate::config::ApiConfig;
use crate::scheduler::{Scheduler, SchedulerHandle};

/// Everything the route handlers reach for.
pub struct AppServices {
    pub queue: Arc<QueueService>,
    pub bridge: Arc<QueueEventBridge>,
    pub broker: Arc<SessionBroker>,
    pub directory: Arc<dyn DeviceDirectory>,
}

/// Background work owned by the process: workers and the scheduler.
pub struct AppRuntime {
    pub pool: WorkerPoolHandle,
    pub scheduler: SchedulerHandle,
}

impl AppRuntime {
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        self.pool.shutdown().await;
    }
}

pub fn build_services(config: &ApiConfig) -> (Arc<AppServices>, AppRuntime) {
    let codec = Arc::new(SecretCodec::new(&config.encryption_secret));
    let registry: Arc<dyn Registry> = Arc::new(InMemoryRegistry::new());
    let token_store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    let chain = Arc::new(CredentialChain::new(
        Arc::clone(&codec),
        Arc::clone(&registry),
        token_store,
        chrono::Duration::minutes(5),
    ));

    let directory: Arc<dyn DeviceDirectory> = Arc::new(InMemoryDeviceDirectory::new());
    let connector = Arc::new(RusshConnector::default());

    let bridge = Arc::new(QueueEventBridge::new());
    let store: Arc<dyn QueueStore> = InMemoryQueueStore::arc();
    let queue = Arc::new(QueueService::new(store, Arc::clone(&bridge)));

    let deps = ProcessorDeps {
        directory: Arc::clone(&directory),
        registry,
        cursors: Arc::new(InMemoryCursorStore::new()),
        chain: Arc::clone(&chain),
        codec,
        probe: Arc::new(InMemorySnmpProbe::new()),
        monitoring: Arc::new(InMemoryMonitoring::new()),
        prober: Arc::clone(&connector) as Arc<dyn LoginProber>,
        manifest: Arc::new(ManifestWriter::new(&config.manifest_path)),
    };
    let mut pool = WorkerPool::new(Arc::clone(&queue));
    for processor in all_processors(&deps) {
        pool = pool.register(processor);
    }
    let pool = pool.spawn(WorkerPoolConfig::default());

    let session_store: Arc<dyn SessionStore> = InMemorySessionStore::arc();
    let broker = Arc::new(SessionBroker::new(
        session_store,
        Arc::clone(&directory),
        chain,
        connector,
        config.transcript_dir.clone(),
    ));

    let scheduler = Scheduler::new(config.scheduler.clone(), Arc::clone(&queue), Arc::clone(&directory)).spawn();

    let services = Arc::new(AppServices {
        queue,
        bridge,
        broker,
        directory,
    });
    (services, AppRuntime { pool, scheduler })
}
