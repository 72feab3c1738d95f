//! SNMP discovery: replace a device's discovered interfaces or peers.

use std::sync::Arc;

use async_trait::async_trait;

use netops_directory::{DeviceDirectory, SnmpProbe, SnmpTarget};
use netops_queue::{
    DiscoveryTarget, JobContext, JobPayload, Processor, ProcessorError, queue_names,
};

pub struct SnmpDiscoveryProcessor {
    directory: Arc<dyn DeviceDirectory>,
    probe: Arc<dyn SnmpProbe>,
}

impl SnmpDiscoveryProcessor {
    pub fn new(directory: Arc<dyn DeviceDirectory>, probe: Arc<dyn SnmpProbe>) -> Self {
        Self { directory, probe }
    }
}

#[async_trait]
impl Processor for SnmpDiscoveryProcessor {
    fn queue(&self) -> &'static str {
        queue_names::SNMP_DISCOVERY
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::SnmpDiscovery { device_id, target } = payload else {
            return Err(ProcessorError::validation("expected snmp-discovery payload"));
        };

        let device = self
            .directory
            .get(*device_id)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?
            .ok_or_else(|| ProcessorError::not_found(format!("device {device_id}")))?;

        let Some(snmp) = SnmpTarget::from_device(&device) else {
            return Err(ProcessorError::validation(format!(
                "device {device_id} has no snmp community"
            )));
        };

        // Delete-then-insert: the discovered set always mirrors the last
        // successful walk.
        let count = match target {
            DiscoveryTarget::Interfaces => {
                let interfaces = self
                    .probe
                    .interfaces(&snmp)
                    .await
                    .map_err(|e| ProcessorError::transient(e.to_string()))?;
                let count = interfaces.len();
                self.directory
                    .replace_interfaces(*device_id, interfaces)
                    .await
                    .map_err(|e| ProcessorError::transient(e.to_string()))?;
                count
            }
            DiscoveryTarget::Peers => {
                let peers = self
                    .probe
                    .peers(&snmp)
                    .await
                    .map_err(|e| ProcessorError::transient(e.to_string()))?;
                let count = peers.len();
                self.directory
                    .replace_peers(*device_id, peers)
                    .await
                    .map_err(|e| ProcessorError::transient(e.to_string()))?;
                count
            }
        };

        ctx.log(format!("discovered {count} {}", target.as_str()));
        Ok(serde_json::json!({
            "target": target.as_str(),
            "discovered": count,
        }))
    }
}
