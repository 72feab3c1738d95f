//! Monitoring sync: mirror a device into the monitoring platform.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use netops_directory::{DeviceDirectory, MonitoringError, MonitoringPlatform};
use netops_queue::{
    JobContext, JobPayload, MonitoringAction, Processor, ProcessorError, queue_names,
};

pub struct MonitoringSyncProcessor {
    directory: Arc<dyn DeviceDirectory>,
    platform: Arc<dyn MonitoringPlatform>,
}

impl MonitoringSyncProcessor {
    pub fn new(directory: Arc<dyn DeviceDirectory>, platform: Arc<dyn MonitoringPlatform>) -> Self {
        Self {
            directory,
            platform,
        }
    }
}

fn platform_failure(err: MonitoringError) -> ProcessorError {
    match err {
        MonitoringError::NotFound => ProcessorError::not_found("monitored host"),
        MonitoringError::Platform(msg) => ProcessorError::transient(msg),
    }
}

#[async_trait]
impl Processor for MonitoringSyncProcessor {
    fn queue(&self) -> &'static str {
        queue_names::MONITORING_SYNC
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::MonitoringSync { action, device_id } = payload else {
            return Err(ProcessorError::validation("expected monitoring-sync payload"));
        };

        let mut device = self
            .directory
            .get(*device_id)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?
            .ok_or_else(|| ProcessorError::not_found(format!("device {device_id}")))?;

        let applied = match action {
            MonitoringAction::Add => {
                let reference = self
                    .platform
                    .add_host(&device)
                    .await
                    .map_err(platform_failure)?;
                device.monitoring_ref = Some(reference);
                "add"
            }
            MonitoringAction::Update => match &device.monitoring_ref {
                Some(reference) => {
                    match self.platform.update_host(reference, &device).await {
                        Ok(()) => "update",
                        // The platform lost the host: re-register it.
                        Err(MonitoringError::NotFound) => {
                            debug!(device = %device.id, "host missing on platform, re-adding");
                            ctx.log("update target missing, falling back to add".to_string());
                            let reference = self
                                .platform
                                .add_host(&device)
                                .await
                                .map_err(platform_failure)?;
                            device.monitoring_ref = Some(reference);
                            "add"
                        }
                        Err(err) => return Err(platform_failure(err)),
                    }
                }
                None => {
                    let reference = self
                        .platform
                        .add_host(&device)
                        .await
                        .map_err(platform_failure)?;
                    device.monitoring_ref = Some(reference);
                    "add"
                }
            },
            MonitoringAction::Delete => {
                if let Some(reference) = device.monitoring_ref.take() {
                    match self.platform.delete_host(&reference).await {
                        // Already gone is the desired end state.
                        Ok(()) | Err(MonitoringError::NotFound) => {}
                        Err(err) => return Err(platform_failure(err)),
                    }
                }
                "delete"
            }
        };

        self.directory
            .upsert(device)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?;

        Ok(serde_json::json!({ "applied": applied }))
    }
}
