//! SNMP poll: reachability check, device status update.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use netops_directory::{DeviceDirectory, SnmpProbe, SnmpStatus, SnmpTarget};
use netops_queue::{JobContext, JobPayload, Processor, ProcessorError, queue_names};

pub struct SnmpPollProcessor {
    directory: Arc<dyn DeviceDirectory>,
    probe: Arc<dyn SnmpProbe>,
}

impl SnmpPollProcessor {
    pub fn new(directory: Arc<dyn DeviceDirectory>, probe: Arc<dyn SnmpProbe>) -> Self {
        Self { directory, probe }
    }
}

#[async_trait]
impl Processor for SnmpPollProcessor {
    fn queue(&self) -> &'static str {
        queue_names::SNMP_POLLING
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::SnmpPoll { device_id } = payload else {
            return Err(ProcessorError::validation("expected snmp-poll payload"));
        };

        let mut device = self
            .directory
            .get(*device_id)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?
            .ok_or_else(|| ProcessorError::not_found(format!("device {device_id}")))?;

        let Some(target) = SnmpTarget::from_device(&device) else {
            return Err(ProcessorError::validation(format!(
                "device {device_id} has no snmp community"
            )));
        };

        // An unreachable agent is a normal poll outcome, not a job failure.
        let reachable = match self.probe.ping(&target).await {
            Ok(()) => {
                device.snmp_status = SnmpStatus::Ok;
                device.last_snmp_ok = Some(Utc::now());
                true
            }
            Err(err) => {
                ctx.log(format!("snmp ping failed: {err}"));
                device.snmp_status = SnmpStatus::Error;
                false
            }
        };

        self.directory
            .upsert(device)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?;

        Ok(serde_json::json!({ "reachable": reachable }))
    }
}
