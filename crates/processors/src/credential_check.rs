//! Credential check: try every candidate login against a device, report
//! the ranking. Mutates nothing.

use std::sync::Arc;

use async_trait::async_trait;

use netops_directory::{CredentialChain, DeviceDirectory, LoginOutcome, LoginProber};
use netops_queue::{JobContext, JobPayload, Processor, ProcessorError, queue_names};

pub struct CredentialCheckProcessor {
    directory: Arc<dyn DeviceDirectory>,
    chain: Arc<CredentialChain>,
    prober: Arc<dyn LoginProber>,
}

impl CredentialCheckProcessor {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        chain: Arc<CredentialChain>,
        prober: Arc<dyn LoginProber>,
    ) -> Self {
        Self {
            directory,
            chain,
            prober,
        }
    }
}

#[async_trait]
impl Processor for CredentialCheckProcessor {
    fn queue(&self) -> &'static str {
        queue_names::CREDENTIAL_CHECK
    }

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError> {
        let JobPayload::CredentialCheck { device_id } = payload else {
            return Err(ProcessorError::validation("expected credential-check payload"));
        };

        let device = self
            .directory
            .get(*device_id)
            .await
            .map_err(|e| ProcessorError::transient(e.to_string()))?
            .ok_or_else(|| ProcessorError::not_found(format!("device {device_id}")))?;

        let candidates = self.chain.candidates(&device).await;
        ctx.log(format!("trying {} credential candidates", candidates.len()));

        let mut attempts = Vec::new();
        let mut first_success: Option<String> = None;

        for candidate in &candidates {
            let outcome = self
                .prober
                .attempt_login(&device.ip_address, device.ssh_port, &candidate.credentials)
                .await;
            if first_success.is_none() && outcome == LoginOutcome::Success {
                first_success = Some(candidate.identity.clone());
            }
            attempts.push(serde_json::json!({
                "identity": candidate.identity,
                "source": candidate.source,
                "outcome": outcome,
            }));
        }

        Ok(serde_json::json!({
            "attempts": attempts,
            "first_success": first_success,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ctx_for, deps_with_registry, FakeProber, FakeRegistryState};
    use netops_core::{DeviceId, TenantId};
    use netops_directory::DeviceRecord;
    use netops_directory::registry::RegistrySecret;

    #[tokio::test]
    async fn ranks_candidates_and_reports_first_success() {
        let mut state = FakeRegistryState::default();
        state.secrets.insert(
            "77".to_string(),
            vec![RegistrySecret {
                name: "ssh".into(),
                username: Some("backup-admin".into()),
                plaintext: "good-pw".into(),
            }],
        );
        let deps = deps_with_registry(state);

        let mut device = DeviceRecord::new(TenantId::new(), "r1", "10.0.0.1");
        device.registry_id = Some("77".into());
        device.cred_username = Some("stale-admin".into());
        device.cred_password_enc = Some(deps.codec.encrypt("stale-pw"));
        let device_id = device.id;
        deps.directory.upsert(device).await.unwrap();

        // Only the secret-store password works.
        let prober = Arc::new(FakeProber::accepting("backup-admin", "good-pw"));
        let processor = CredentialCheckProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.chain),
            prober,
        );

        let payload = JobPayload::CredentialCheck { device_id };
        let (ctx, _service) = ctx_for(&payload);
        let result = processor.process(&ctx, &payload).await.unwrap();

        let attempts = result["attempts"].as_array().unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0]["identity"], "stale-admin");
        assert_eq!(attempts[0]["outcome"]["outcome"], "auth_failed");
        assert_eq!(attempts[1]["identity"], "backup-admin");
        assert_eq!(result["first_success"], "backup-admin");
    }

    #[tokio::test]
    async fn missing_device_is_not_found() {
        let deps = deps_with_registry(FakeRegistryState::default());
        let processor = CredentialCheckProcessor::new(
            Arc::clone(&deps.directory),
            Arc::clone(&deps.chain),
            Arc::new(FakeProber::accepting("x", "y")),
        );

        let payload = JobPayload::CredentialCheck {
            device_id: DeviceId::new(),
        };
        let (ctx, _service) = ctx_for(&payload);
        let err = processor.process(&ctx, &payload).await.unwrap_err();
        assert_eq!(err.kind, netops_queue::FailureKind::NotFound);
    }
}
