//! Pending refresh: re-resolve credentials for devices marked incomplete.

use std::sync::Arc;

use async_trait::async_trait;

use netops_directory::{CredentialChain, DeviceDirectory, DeviceFilter};
use netops_queue::{JobContext, JobPayload, Processor, ProcessorError, queue_names};

pub struct PendingRefreshProcessor {
    directory: Arc<dyn DeviceDirectory>,
    chain: Arc<CredentialChain>,
}

impl PendingRefreshProcessor {
    pub fn new(directory: Arc<dyn DeviceDirectory>, chain: Arc<CredentialChain>) -> Self {
        Self { directory, chain }
    }
}

#[async_trait]
impl Processor for PendingRefreshProcessor {
    fn queue(&self) -> &'static str {
        queue_names::PENDING_REFRESH
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::PendingRefresh { limit, tenant_id } = payload else {
            return Err(ProcessorError::validation("expected pending-refresh payload"));
        };

        let filter = DeviceFilter {
            tenant_id: *tenant_id,
            pending_only: true,
            ..DeviceFilter::default()
        };
        let pending = self
            .directory
            .list(&filter)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?;

        let mut cleared = 0usize;
        let mut still_pending = 0usize;

        for mut device in pending.into_iter().take(*limit) {
            let missing = self.chain.missing_fields(&device).await;
            if missing.is_empty() {
                ctx.log(format!("device {} resolved, clearing pending marker", device.id));
                device.pending_fields.clear();
                self.directory
                    .upsert(device)
                    .await
                    .map_err(|e| ProcessorError::transient(e.to_string()))?;
                cleared += 1;
            } else {
                still_pending += 1;
            }
        }

        Ok(serde_json::json!({
            "cleared": cleared,
            "still_pending": still_pending,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ctx_for, deps_with_registry, FakeRegistryState};
    use netops_core::TenantId;
    use netops_directory::DeviceRecord;

    #[tokio::test]
    async fn clears_markers_that_now_resolve() {
        let deps = deps_with_registry(FakeRegistryState::default());
        let tenant = TenantId::new();

        let mut resolvable = DeviceRecord::new(tenant, "r1", "10.0.0.1");
        resolvable.cred_username = Some("admin".into());
        resolvable.cred_password_enc = Some(deps.codec.encrypt("pw"));
        resolvable.pending_fields = vec!["password".into()];
        deps.directory.upsert(resolvable).await.unwrap();

        let mut unresolvable = DeviceRecord::new(tenant, "r2", "10.0.0.2");
        unresolvable.pending_fields = vec!["username".into(), "password".into()];
        deps.directory.upsert(unresolvable).await.unwrap();

        let processor =
            PendingRefreshProcessor::new(Arc::clone(&deps.directory), Arc::clone(&deps.chain));
        let payload = JobPayload::PendingRefresh {
            limit: 10,
            tenant_id: None,
        };
        let (ctx, _service) = ctx_for(&payload);
        let result = processor.process(&ctx, &payload).await.unwrap();

        assert_eq!(result["cleared"], 1);
        assert_eq!(result["still_pending"], 1);

        let still = deps
            .directory
            .list(&DeviceFilter {
                pending_only: true,
                ..DeviceFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(still.len(), 1);
        assert_eq!(still[0].name, "r2");
    }

    #[tokio::test]
    async fn limit_bounds_the_batch() {
        let deps = deps_with_registry(FakeRegistryState::default());
        let tenant = TenantId::new();
        for i in 0..3 {
            let mut device = DeviceRecord::new(tenant, format!("r{i}"), "10.0.0.1");
            device.cred_username = Some("admin".into());
            device.cred_password_enc = Some(deps.codec.encrypt("pw"));
            device.pending_fields = vec!["password".into()];
            deps.directory.upsert(device).await.unwrap();
        }

        let processor =
            PendingRefreshProcessor::new(Arc::clone(&deps.directory), Arc::clone(&deps.chain));
        let payload = JobPayload::PendingRefresh {
            limit: 2,
            tenant_id: None,
        };
        let (ctx, _service) = ctx_for(&payload);
        let result = processor.process(&ctx, &payload).await.unwrap();
        assert_eq!(result["cleared"], 2);
    }
}
