//! Backup sync: regenerate the manifest's managed region from devices with
//! backup enabled and resolvable credentials.

use std::sync::Arc;

use async_trait::async_trait;

use netops_directory::{CredentialChain, DeviceDirectory, DeviceFilter, DeviceStatus};
use netops_queue::{JobContext, JobPayload, Processor, ProcessorError, queue_names};

use crate::manifest::{ManifestEntry, ManifestWriter, guess_model};

pub struct BackupSyncProcessor {
    directory: Arc<dyn DeviceDirectory>,
    chain: Arc<CredentialChain>,
    manifest: Arc<ManifestWriter>,
}

impl BackupSyncProcessor {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        chain: Arc<CredentialChain>,
        manifest: Arc<ManifestWriter>,
    ) -> Self {
        Self {
            directory,
            chain,
            manifest,
        }
    }
}

#[async_trait]
impl Processor for BackupSyncProcessor {
    fn queue(&self) -> &'static str {
        queue_names::BACKUP_SYNC
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::BackupSync { tenant_id } = payload else {
            return Err(ProcessorError::validation("expected backup-sync payload"));
        };

        let filter = DeviceFilter {
            tenant_id: *tenant_id,
            status: Some(DeviceStatus::Active),
            backup_enabled: Some(true),
            ..DeviceFilter::default()
        };
        let devices = self
            .directory
            .list(&filter)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?;

        let mut entries = Vec::new();
        let mut skipped = 0usize;

        for device in &devices {
            let Some(credentials) = self.chain.resolve(device).await else {
                ctx.log(format!("device {} skipped: credentials unresolvable", device.id));
                skipped += 1;
                continue;
            };
            entries.push(ManifestEntry {
                name: device.name.clone(),
                ip: device.ip_address.clone(),
                model: guess_model(device.model.as_deref(), device.platform.as_deref())
                    .to_string(),
                login: credentials.username,
                password: credentials.password,
                port: device.ssh_port,
            });
        }

        let written = self
            .manifest
            .rewrite(&entries)
            .await
            .map_err(|e| ProcessorError::transient(format!("manifest write failed: {e}")))?;

        Ok(serde_json::json!({
            "written": written,
            "skipped": skipped,
        }))
    }
}
