//! Worker pool: per-queue claim loops with bounded concurrency.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::payload::queue_concurrency;
use crate::processor::{JobContext, Processor};
use crate::service::QueueService;
use crate::types::Job;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// How long a claim loop sleeps when its queue is empty
    pub poll_interval: Duration,
    /// How often the maintenance sweep (prune + stall reap) runs
    pub sweep_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Handle to a running pool. Dropping it does NOT stop the workers; call
/// [`WorkerPoolHandle::shutdown`] to stop claiming and drain in-flight jobs.
pub struct WorkerPoolHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerPoolHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// One claim loop per registered processor's queue, plus a maintenance task.
pub struct WorkerPool {
    service: Arc<QueueService>,
    processors: Vec<Arc<dyn Processor>>,
}

impl WorkerPool {
    pub fn new(service: Arc<QueueService>) -> Self {
        Self {
            service,
            processors: Vec::new(),
        }
    }

    pub fn register(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn spawn(self, config: WorkerPoolConfig) -> WorkerPoolHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        for processor in self.processors {
            tasks.push(tokio::spawn(queue_loop(
                Arc::clone(&self.service),
                processor,
                config.poll_interval,
                shutdown_rx.clone(),
            )));
        }

        tasks.push(tokio::spawn(sweep_loop(
            Arc::clone(&self.service),
            config.sweep_interval,
            shutdown_rx,
        )));

        WorkerPoolHandle {
            shutdown: shutdown_tx,
            tasks,
        }
    }
}

async fn queue_loop(
    service: Arc<QueueService>,
    processor: Arc<dyn Processor>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let queue = processor.queue();
    let concurrency = queue_concurrency(queue);
    let semaphore = Arc::new(Semaphore::new(concurrency));
    info!(queue, concurrency, "worker loop started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        match service.claim(queue) {
            Ok(Some(job)) => {
                let service = Arc::clone(&service);
                let processor = Arc::clone(&processor);
                tokio::spawn(async move {
                    run_one(service, processor, job).await;
                    drop(permit);
                });
            }
            Ok(None) => {
                drop(permit);
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = shutdown.changed() => {}
                }
            }
            Err(err) => {
                drop(permit);
                error!(queue, error = %err, "claim failed");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }

    // Drain: wait for every in-flight job before returning.
    let _ = semaphore.acquire_many(concurrency as u32).await;
    info!(queue, "worker loop drained");
}

async fn run_one(service: Arc<QueueService>, processor: Arc<dyn Processor>, job: Job) {
    let ctx = JobContext::new(&job, Arc::clone(&service));
    match processor.process(&ctx, &job.payload).await {
        Ok(result) => {
            if let Err(err) = service.complete(&job.queue, &job.id, result) {
                error!(queue = %job.queue, job_id = %job.id, error = %err, "complete failed");
            }
        }
        Err(proc_err) => {
            if let Err(err) = service.fail_attempt(&job, &proc_err) {
                error!(queue = %job.queue, job_id = %job.id, error = %err, "fail commit failed");
            }
        }
    }
}

async fn sweep_loop(
    service: Arc<QueueService>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if let Err(err) = service.sweep(chrono::Utc::now()) {
                    error!(error = %err, "maintenance sweep failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{JobPayload, queue_names};
    use crate::processor::ProcessorError;
    use crate::store::InMemoryQueueStore;
    use crate::types::RetryPolicy;
    use async_trait::async_trait;
    use netops_core::DeviceId;
    use netops_events::{QueueEventBridge, QueueEventKind, SubscriptionFilter};

    struct EchoPoll;

    #[async_trait]
    impl Processor for EchoPoll {
        fn queue(&self) -> &'static str {
            queue_names::SNMP_POLLING
        }

        async fn process(
            &self,
            ctx: &JobContext,
            _payload: &JobPayload,
        ) -> Result<serde_json::Value, ProcessorError> {
            ctx.log("polled");
            Ok(serde_json::json!({"reachable": true}))
        }
    }

    struct AlwaysTimeout;

    #[async_trait]
    impl Processor for AlwaysTimeout {
        fn queue(&self) -> &'static str {
            queue_names::SNMP_POLLING
        }

        async fn process(
            &self,
            _ctx: &JobContext,
            _payload: &JobPayload,
        ) -> Result<serde_json::Value, ProcessorError> {
            Err(ProcessorError::transient("timed out"))
        }
    }

    fn fast_config() -> WorkerPoolConfig {
        WorkerPoolConfig {
            poll_interval: Duration::from_millis(10),
            sweep_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn pool_runs_jobs_to_completion() {
        let bridge = Arc::new(QueueEventBridge::new());
        let service = Arc::new(QueueService::new(
            InMemoryQueueStore::arc(),
            Arc::clone(&bridge),
        ));
        let mut rx = bridge.subscribe(SubscriptionFilter::all());

        let handle = WorkerPool::new(Arc::clone(&service))
            .register(Arc::new(EchoPoll))
            .spawn(fast_config());

        service
            .enqueue(JobPayload::SnmpPoll {
                device_id: DeviceId::new(),
            })
            .unwrap();

        let completed = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = rx.recv().await.unwrap();
                if event.event == QueueEventKind::Completed {
                    return event;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(completed.data, Some(serde_json::json!({"reachable": true})));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn pool_retries_then_fails_terminally() {
        let bridge = Arc::new(QueueEventBridge::new());
        let service = Arc::new(QueueService::new(
            InMemoryQueueStore::arc(),
            Arc::clone(&bridge),
        ));
        let mut rx = bridge.subscribe(SubscriptionFilter::all());

        let handle = WorkerPool::new(Arc::clone(&service))
            .register(Arc::new(AlwaysTimeout))
            .spawn(fast_config());

        let job = crate::types::Job::new(JobPayload::SnmpPoll {
            device_id: DeviceId::new(),
        })
        .with_retry_policy(RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
        });
        service.enqueue_job(job).unwrap();

        let (actives, failed) = tokio::time::timeout(Duration::from_secs(2), async {
            let mut actives = 0;
            loop {
                let event = rx.recv().await.unwrap();
                match event.event {
                    QueueEventKind::Active => actives += 1,
                    QueueEventKind::Failed => return (actives, event),
                    _ => {}
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(actives, 2);
        assert!(failed.data.unwrap()["failed_reason"]
            .as_str()
            .unwrap()
            .contains("timed out"));

        handle.shutdown().await;
    }
}
