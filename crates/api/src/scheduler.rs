//! Interval-driven enqueue loops.
//!
//! The scheduler only enqueues; the worker pool does the work. Each loop
//! survives enqueue failures, so a transient store error delays one round
//! instead of killing the schedule.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use netops_directory::{DeviceDirectory, DeviceFilter, DeviceStatus};
use netops_queue::{JobPayload, QueueService};

use crate::config::SchedulerConfig;

pub struct Scheduler {
    config: SchedulerConfig,
    queue: Arc<QueueService>,
    directory: Arc<dyn DeviceDirectory>,
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        queue: Arc<QueueService>,
        directory: Arc<dyn DeviceDirectory>,
    ) -> Self {
        Self {
            config,
            queue,
            directory,
        }
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(poll_loop(
            self.config.snmp_poll_interval,
            Arc::clone(&self.queue),
            Arc::clone(&self.directory),
            shutdown.subscribe(),
        )));

        tasks.push(tokio::spawn(enqueue_loop(
            "backup-sync",
            self.config.backup_sync_interval,
            Arc::clone(&self.queue),
            shutdown.subscribe(),
            || JobPayload::BackupSync { tenant_id: None },
        )));

        tasks.push(tokio::spawn(enqueue_loop(
            "pending-refresh",
            self.config.pending_refresh_interval,
            Arc::clone(&self.queue),
            shutdown.subscribe(),
            || JobPayload::PendingRefresh {
                limit: 50,
                tenant_id: None,
            },
        )));

        if let Some(interval) = self.config.inventory_sync_interval {
            tasks.push(tokio::spawn(enqueue_loop(
                "inventory-sync",
                interval,
                Arc::clone(&self.queue),
                shutdown.subscribe(),
                || JobPayload::InventorySync {
                    resources: Vec::new(),
                    filters: Default::default(),
                    tenant_id: None,
                    actor: Some("scheduler".to_string()),
                },
            )));
        }

        SchedulerHandle { shutdown, tasks }
    }
}

async fn wait_or_shutdown(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(interval) => false,
        _ = shutdown.changed() => true,
    }
}

/// Fan one SNMP poll job out per active device with SNMP settings.
async fn poll_loop(
    interval: Duration,
    queue: Arc<QueueService>,
    directory: Arc<dyn DeviceDirectory>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if wait_or_shutdown(interval, &mut shutdown).await {
            return;
        }
        let filter = DeviceFilter {
            status: Some(DeviceStatus::Active),
            ..DeviceFilter::default()
        };
        let devices = match directory.list(&filter).await {
            Ok(devices) => devices,
            Err(err) => {
                warn!(error = %err, "snmp poll round skipped, directory listing failed");
                continue;
            }
        };
        let mut enqueued = 0usize;
        for device in devices {
            if device.snmp_community.is_none() {
                continue;
            }
            let payload = JobPayload::SnmpPoll {
                device_id: device.id,
            };
            match queue.enqueue(payload) {
                Ok(_) => enqueued += 1,
                Err(err) => warn!(device = %device.id, error = %err, "snmp poll enqueue failed"),
            }
        }
        debug!(enqueued, "snmp poll round scheduled");
    }
}

async fn enqueue_loop<F>(
    name: &'static str,
    interval: Duration,
    queue: Arc<QueueService>,
    mut shutdown: watch::Receiver<bool>,
    payload: F,
) where
    F: Fn() -> JobPayload + Send + 'static,
{
    loop {
        if wait_or_shutdown(interval, &mut shutdown).await {
            return;
        }
        match queue.enqueue(payload()) {
            Ok(outcome) => debug!(loop_name = name, job_id = %outcome.job.id, "scheduled"),
            Err(err) => warn!(loop_name = name, error = %err, "scheduled enqueue failed"),
        }
    }
}
