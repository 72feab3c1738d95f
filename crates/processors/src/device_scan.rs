//! Device scan: fan out one poll and two discovery children.

use std::sync::Arc;

use async_trait::async_trait;

use netops_directory::DeviceDirectory;
use netops_queue::{
    DiscoveryTarget, JobContext, JobPayload, Processor, ProcessorError, queue_names,
};

pub struct DeviceScanProcessor {
    directory: Arc<dyn DeviceDirectory>,
}

impl DeviceScanProcessor {
    pub fn new(directory: Arc<dyn DeviceDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Processor for DeviceScanProcessor {
    fn queue(&self) -> &'static str {
        queue_names::DEVICE_SCAN
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::DeviceScan { device_id, reason } = payload else {
            return Err(ProcessorError::validation("expected device-scan payload"));
        };

        // Fail fast if the device vanished; children would all hit the same
        // wall otherwise.
        self.directory
            .get(*device_id)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?
            .ok_or_else(|| ProcessorError::not_found(format!("device {device_id}")))?;

        if let Some(reason) = reason {
            ctx.log(format!("scan triggered: {reason}"));
        }

        let children = [
            JobPayload::SnmpPoll {
                device_id: *device_id,
            },
            JobPayload::SnmpDiscovery {
                device_id: *device_id,
                target: DiscoveryTarget::Interfaces,
            },
            JobPayload::SnmpDiscovery {
                device_id: *device_id,
                target: DiscoveryTarget::Peers,
            },
        ];

        let mut child_ids = Vec::with_capacity(children.len());
        for child in children {
            let outcome = ctx
                .enqueue(child)
                .map_err(|e| ProcessorError::transient(e.to_string()))?;
            child_ids.push(outcome.job.id.to_string());
        }

        // The scan does not wait on its children; their lifecycles are
        // observable through their own ids.
        Ok(serde_json::json!({ "children": child_ids }))
    }
}
