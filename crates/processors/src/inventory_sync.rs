//! Inventory sync: reconcile the external registry into the local directory.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use netops_core::TenantId;
use netops_directory::{CredentialChain, CursorStore, DeviceDirectory, DeviceRecord, Registry, RegistryDevice, UpsertOutcome};
use netops_queue::{
    InventoryFilters, JobContext, JobPayload, Processor, ProcessorError, queue_names,
};
use netops_secrets::SecretCodec;

use crate::registry_failure;

const CURSOR_KEY: &str = "registry-devices";

pub struct InventorySyncProcessor {
    directory: Arc<dyn DeviceDirectory>,
    registry: Arc<dyn Registry>,
    cursors: Arc<dyn CursorStore>,
    chain: Arc<CredentialChain>,
    codec: Arc<SecretCodec>,
}

impl InventorySyncProcessor {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        registry: Arc<dyn Registry>,
        cursors: Arc<dyn CursorStore>,
        chain: Arc<CredentialChain>,
        codec: Arc<SecretCodec>,
    ) -> Self {
        Self {
            directory,
            registry,
            cursors,
            chain,
            codec,
        }
    }

    fn matches_filters(filters: &InventoryFilters, remote: &RegistryDevice) -> bool {
        fn field_matches(filter: &Option<String>, value: &Option<String>) -> bool {
            match filter {
                None => true,
                Some(wanted) => value.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(wanted)),
            }
        }
        field_matches(&filters.role, &remote.role)
            && field_matches(&filters.platform, &remote.platform)
            && field_matches(&filters.site, &remote.site)
    }

    /// Apply the remote record onto a local one (existing or fresh).
    fn apply_remote(&self, device: &mut DeviceRecord, remote: &RegistryDevice) {
        device.name = remote.name.clone();
        if let Some(ip) = &remote.primary_ip {
            device.ip_address = ip.clone();
        }
        device.role = remote.role.clone();
        device.platform = remote.platform.clone();
        device.model = remote.model.clone();
        device.site = remote.site.clone();
        device.backup_enabled = remote.backup_enabled;
        device.registry_id = Some(remote.id.clone());

        if let Some(username) = &remote.username {
            device.cred_username = Some(username.clone());
        }
        if let Some(password) = &remote.password {
            device.cred_password_enc = Some(self.codec.encrypt(password));
        }
    }
}

#[async_trait]
impl Processor for InventorySyncProcessor {
    fn queue(&self) -> &'static str {
        queue_names::INVENTORY_SYNC
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::InventorySync {
            filters,
            tenant_id,
            actor,
            ..
        } = payload
        else {
            return Err(ProcessorError::validation("expected inventory-sync payload"));
        };

        if let Some(actor) = actor {
            ctx.log(format!("sync requested by {actor}"));
        }

        // Tenant-group filtering needs the tenant listing to map group
        // membership onto device tenant ids.
        let group_tenants: Option<Vec<String>> = match &filters.tenant_group {
            Some(group) => {
                let tenants = self.registry.list_tenants().await.map_err(registry_failure)?;
                Some(
                    tenants
                        .into_iter()
                        .filter(|t| t.group.as_deref().is_some_and(|g| g.eq_ignore_ascii_case(group)))
                        .map(|t| t.id)
                        .collect(),
                )
            }
            None => None,
        };

        let since = self.cursors.get(CURSOR_KEY);
        let remotes = self
            .registry
            .list_devices(since)
            .await
            .map_err(registry_failure)?;
        let total = remotes.len();
        ctx.log(format!("registry returned {total} changed devices"));

        let mut created = 0usize;
        let mut updated = 0usize;
        let mut pending = 0usize;
        let mut skipped = 0usize;
        let mut newest_seen = since;

        for (index, remote) in remotes.iter().enumerate() {
            if !Self::matches_filters(filters, remote) {
                skipped += 1;
                continue;
            }
            if let Some(members) = &group_tenants {
                let in_group = remote
                    .tenant_id
                    .as_deref()
                    .is_some_and(|t| members.iter().any(|m| m == t));
                if !in_group {
                    skipped += 1;
                    continue;
                }
            }

            let Some(tenant) = remote
                .tenant_id
                .as_deref()
                .and_then(|t| TenantId::from_str(t).ok())
                .or(*tenant_id)
            else {
                debug!(registry_id = %remote.id, "no tenant mapping, skipping");
                skipped += 1;
                continue;
            };

            let mut device = match self
                .directory
                .find_by_registry_id(&remote.id)
                .await
                .map_err(|e| ProcessorError::transient(e.to_string()))?
            {
                Some(existing) => existing,
                None => DeviceRecord::new(
                    tenant,
                    remote.name.clone(),
                    remote.primary_ip.clone().unwrap_or_default(),
                ),
            };
            self.apply_remote(&mut device, remote);
            device.pending_fields = self.chain.missing_fields(&device).await;
            if device.is_pending() {
                pending += 1;
            }

            match self
                .directory
                .upsert(device)
                .await
                .map_err(|e| ProcessorError::transient(e.to_string()))?
            {
                UpsertOutcome::Created => created += 1,
                UpsertOutcome::Updated => updated += 1,
            }

            if let Some(at) = remote.updated_at {
                if newest_seen.map_or(true, |seen| at > seen) {
                    newest_seen = Some(at);
                }
            }

            if total > 0 && (index + 1) % 25 == 0 {
                ctx.progress(serde_json::json!((index + 1) * 100 / total));
            }
        }

        self.cursors.set(CURSOR_KEY, newest_seen.unwrap_or_else(Utc::now));

        Ok(serde_json::json!({
            "fetched": total,
            "created": created,
            "updated": updated,
            "pending": pending,
            "skipped": skipped,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ctx_for, deps_with_registry, FakeRegistryState};
    use netops_directory::DeviceFilter;

    fn remote(id: &str, tenant: Option<TenantId>) -> RegistryDevice {
        RegistryDevice {
            id: id.to_string(),
            name: format!("device-{id}"),
            primary_ip: Some("10.0.0.10".into()),
            tenant_id: tenant.map(|t| t.to_string()),
            role: Some("router".into()),
            platform: Some("ios".into()),
            model: Some("C9300".into()),
            site: Some("hq".into()),
            username: Some("admin".into()),
            password: Some("hunter2".into()),
            backup_enabled: true,
            updated_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn creates_device_with_resolved_credentials() {
        let tenant = TenantId::new();
        let state = FakeRegistryState::with_devices(vec![remote("101", Some(tenant))]);
        let deps = deps_with_registry(state);
        let processor = InventorySyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.registry),
            Arc::clone(&deps.cursors),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.codec),
        );

        let payload = JobPayload::InventorySync {
            resources: vec![],
            filters: InventoryFilters::default(),
            tenant_id: None,
            actor: Some("tester".into()),
        };
        let (ctx, _service) = ctx_for(&payload);
        let result = processor.process(&ctx, &payload).await.unwrap();

        assert_eq!(result["created"], 1);
        assert_eq!(result["pending"], 0);

        let devices = deps.directory.list(&DeviceFilter::default()).await.unwrap();
        assert_eq!(devices.len(), 1);
        let device = &devices[0];
        assert_eq!(device.tenant_id, tenant);
        assert_eq!(device.cred_username.as_deref(), Some("admin"));
        // Stored encrypted, never plaintext.
        let enc = device.cred_password_enc.as_deref().unwrap();
        assert!(enc.starts_with("v1:"));
        assert_eq!(deps.codec.decrypt(enc).as_deref(), Some("hunter2"));
        assert!(device.pending_fields.is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_mark_device_pending() {
        let tenant = TenantId::new();
        let mut r = remote("102", Some(tenant));
        r.username = None;
        r.password = None;
        let state = FakeRegistryState::with_devices(vec![r]);
        let deps = deps_with_registry(state);
        let processor = InventorySyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.registry),
            Arc::clone(&deps.cursors),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.codec),
        );

        let payload = JobPayload::InventorySync {
            resources: vec![],
            filters: InventoryFilters::default(),
            tenant_id: None,
            actor: None,
        };
        let (ctx, _service) = ctx_for(&payload);
        let result = processor.process(&ctx, &payload).await.unwrap();
        assert_eq!(result["pending"], 1);

        let devices = deps.directory.list(&DeviceFilter::default()).await.unwrap();
        assert_eq!(
            devices[0].pending_fields,
            vec!["username".to_string(), "password".to_string()]
        );
        assert!(devices[0].cred_password_enc.is_none());
    }

    #[tokio::test]
    async fn rerun_updates_instead_of_duplicating() {
        let tenant = TenantId::new();
        let state = FakeRegistryState::with_devices(vec![remote("103", Some(tenant))]);
        let deps = deps_with_registry(state);
        let processor = InventorySyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.registry),
            Arc::clone(&deps.cursors),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.codec),
        );

        let payload = JobPayload::InventorySync {
            resources: vec![],
            filters: InventoryFilters::default(),
            tenant_id: None,
            actor: None,
        };
        let (ctx, _service) = ctx_for(&payload);
        processor.process(&ctx, &payload).await.unwrap();
        let result = processor.process(&ctx, &payload).await.unwrap();

        assert_eq!(result["created"], 0);
        assert_eq!(result["updated"], 1);
        let devices = deps.directory.list(&DeviceFilter::default()).await.unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[tokio::test]
    async fn filters_exclude_non_matching_devices() {
        let tenant = TenantId::new();
        let state = FakeRegistryState::with_devices(vec![remote("104", Some(tenant))]);
        let deps = deps_with_registry(state);
        let processor = InventorySyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.registry),
            Arc::clone(&deps.cursors),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.codec),
        );

        let payload = JobPayload::InventorySync {
            resources: vec![],
            filters: InventoryFilters {
                role: Some("switch".into()),
                ..InventoryFilters::default()
            },
            tenant_id: None,
            actor: None,
        };
        let (ctx, _service) = ctx_for(&payload);
        let result = processor.process(&ctx, &payload).await.unwrap();
        assert_eq!(result["skipped"], 1);
        assert_eq!(result["created"], 0);
    }

    #[tokio::test]
    async fn tenant_group_filter_uses_tenant_membership() {
        let in_group = TenantId::new();
        let outside = TenantId::new();
        let state = FakeRegistryState {
            tenants: vec![
                netops_directory::registry::RegistryTenant {
                    id: in_group.to_string(),
                    name: "isp-a".into(),
                    group: Some("backbone".into()),
                },
                netops_directory::registry::RegistryTenant {
                    id: outside.to_string(),
                    name: "isp-b".into(),
                    group: None,
                },
            ],
            devices: vec![remote("106", Some(in_group)), remote("107", Some(outside))],
            ..FakeRegistryState::default()
        };
        let deps = deps_with_registry(state);
        let processor = InventorySyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.registry),
            Arc::clone(&deps.cursors),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.codec),
        );

        let payload = JobPayload::InventorySync {
            resources: vec![],
            filters: InventoryFilters {
                tenant_group: Some("backbone".into()),
                ..InventoryFilters::default()
            },
            tenant_id: None,
            actor: None,
        };
        let (ctx, _service) = ctx_for(&payload);
        let result = processor.process(&ctx, &payload).await.unwrap();
        assert_eq!(result["created"], 1);
        assert_eq!(result["skipped"], 1);

        let devices = deps.directory.list(&DeviceFilter::default()).await.unwrap();
        assert_eq!(devices[0].tenant_id, in_group);
    }

    #[tokio::test]
    async fn cursor_advances_to_newest_remote() {
        let tenant = TenantId::new();
        let state = FakeRegistryState::with_devices(vec![remote("105", Some(tenant))]);
        let deps = deps_with_registry(state);
        let processor = InventorySyncProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.registry),
            Arc::clone(&deps.cursors),
            Arc::clone(&deps.chain),
            Arc::clone(&deps.codec),
        );

        assert!(deps.cursors.get(CURSOR_KEY).is_none());
        let payload = JobPayload::InventorySync {
            resources: vec![],
            filters: InventoryFilters::default(),
            tenant_id: None,
            actor: None,
        };
        let (ctx, _service) = ctx_for(&payload);
        processor.process(&ctx, &payload).await.unwrap();
        assert!(deps.cursors.get(CURSOR_KEY).is_some());
    }
}
