//! The queue service: single writer of job state, single emitter of events.
//!
//! Every transition goes store-then-event so observers always see lifecycle
//! events in occurrence order. Failure reasons pass through redaction before
//! they reach either the store or the bridge.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use netops_events::{QueueEvent, QueueEventBridge, QueueEventKind};
use netops_secrets::redact;

use crate::payload::JobPayload;
use crate::processor::ProcessorError;
use crate::store::{EnqueueDisposition, EnqueueOutcome, QueueStore, QueueStoreError};
use crate::types::{Job, JobId, JobState, RetentionPolicy};

pub struct QueueService {
    store: Arc<dyn QueueStore>,
    bridge: Arc<QueueEventBridge>,
    retention: RetentionPolicy,
    stall_after: Duration,
}

impl QueueService {
    pub fn new(store: Arc<dyn QueueStore>, bridge: Arc<QueueEventBridge>) -> Self {
        Self {
            store,
            bridge,
            retention: RetentionPolicy::default(),
            stall_after: Duration::from_secs(300),
        }
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_stall_after(mut self, stall_after: Duration) -> Self {
        self.stall_after = stall_after;
        self
    }

    pub fn bridge(&self) -> &Arc<QueueEventBridge> {
        &self.bridge
    }

    /// Enqueue a payload as a job with the default retry policy.
    pub fn enqueue(&self, payload: JobPayload) -> Result<EnqueueOutcome, QueueStoreError> {
        self.enqueue_job(Job::new(payload))
    }

    /// Enqueue a pre-built job (custom id or retry policy).
    pub fn enqueue_job(&self, job: Job) -> Result<EnqueueOutcome, QueueStoreError> {
        let outcome = self.store.enqueue(job)?;
        match outcome.disposition {
            EnqueueDisposition::Created => {
                debug!(queue = %outcome.job.queue, job_id = %outcome.job.id, "job enqueued");
                self.emit(&outcome.job, QueueEventKind::Waiting, None);
            }
            EnqueueDisposition::Merged => {
                debug!(
                    queue = %outcome.job.queue,
                    job_id = %outcome.job.id,
                    "enqueue merged into live job"
                );
            }
        }
        Ok(outcome)
    }

    pub fn get(&self, queue: &str, id: &JobId) -> Result<Option<Job>, QueueStoreError> {
        self.store.get(queue, id)
    }

    pub fn list(
        &self,
        queue: &str,
        state: Option<JobState>,
        start: usize,
        end: usize,
    ) -> Result<Vec<Job>, QueueStoreError> {
        self.store.list(queue, state, start, end)
    }

    /// Claim the next ready job for a worker.
    pub fn claim(&self, queue: &str) -> Result<Option<Job>, QueueStoreError> {
        let Some(job) = self.store.claim_next(queue)? else {
            return Ok(None);
        };
        self.emit(&job, QueueEventKind::Active, None);
        Ok(Some(job))
    }

    pub fn report_progress(&self, queue: &str, id: &JobId, value: serde_json::Value) {
        match self.store.update_progress(queue, id, value.clone()) {
            Ok(job) => self.emit(&job, QueueEventKind::Progress, Some(value)),
            Err(err) => debug!(queue, job_id = %id, error = %err, "progress update dropped"),
        }
    }

    pub fn append_log(&self, queue: &str, id: &JobId, line: String) {
        if let Err(err) = self.store.append_log(queue, id, redact(&line)) {
            debug!(queue, job_id = %id, error = %err, "log append dropped");
        }
    }

    pub fn complete(
        &self,
        queue: &str,
        id: &JobId,
        result: serde_json::Value,
    ) -> Result<Job, QueueStoreError> {
        let job = self.store.complete(queue, id, result.clone())?;
        debug!(queue, job_id = %id, "job completed");
        self.emit(&job, QueueEventKind::Completed, Some(result));
        Ok(job)
    }

    /// Commit a failed attempt. Transient failures retry with exponential
    /// backoff while attempts remain; everything else is terminal.
    pub fn fail_attempt(&self, job: &Job, error: &ProcessorError) -> Result<Job, QueueStoreError> {
        let reason = redact(&error.message);
        let retriable = error.is_retriable() && job.retry_policy.attempts_remain(job.attempts_made);

        if retriable {
            let delay = job.retry_policy.delay_after_attempt(job.attempts_made);
            let retry_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
            let requeued = self
                .store
                .fail(&job.queue, &job.id, reason.clone(), Some(retry_at))?;
            debug!(
                queue = %job.queue,
                job_id = %job.id,
                attempt = job.attempts_made,
                delay_ms = delay.as_millis() as u64,
                "job failed, retrying"
            );
            self.emit(&requeued, QueueEventKind::Waiting, None);
            Ok(requeued)
        } else {
            let failed = self.store.fail(&job.queue, &job.id, reason.clone(), None)?;
            warn!(
                queue = %job.queue,
                job_id = %job.id,
                attempts = job.attempts_made,
                reason = %reason,
                "job failed terminally"
            );
            self.emit(
                &failed,
                QueueEventKind::Failed,
                Some(serde_json::json!({ "failed_reason": reason })),
            );
            Ok(failed)
        }
    }

    /// Maintenance: prune retained terminal jobs and reap stalled actives.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<(), QueueStoreError> {
        let pruned = self.store.prune(now, &self.retention)?;
        if pruned > 0 {
            debug!(pruned, "retention prune removed terminal jobs");
        }

        for job in self.store.reap_stalled(now, self.stall_after)? {
            warn!(queue = %job.queue, job_id = %job.id, "stalled job returned to waiting");
            self.emit(&job, QueueEventKind::Stalled, None);
        }

        Ok(())
    }

    fn emit(&self, job: &Job, kind: QueueEventKind, data: Option<serde_json::Value>) {
        self.bridge
            .publish(QueueEvent::new(&job.queue, kind, job.id.as_str(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::queue_names;
    use crate::store::InMemoryQueueStore;
    use crate::types::RetryPolicy;
    use netops_core::DeviceId;
    use netops_events::SubscriptionFilter;

    fn service() -> (Arc<QueueService>, Arc<QueueEventBridge>) {
        let bridge = Arc::new(QueueEventBridge::new());
        let service = Arc::new(QueueService::new(
            Arc::new(InMemoryQueueStore::new()),
            Arc::clone(&bridge),
        ));
        (service, bridge)
    }

    fn poll_payload() -> JobPayload {
        JobPayload::SnmpPoll {
            device_id: DeviceId::new(),
        }
    }

    #[tokio::test]
    async fn lifecycle_events_arrive_in_order() {
        let (service, bridge) = service();
        let mut rx = bridge.subscribe(SubscriptionFilter::all());

        let outcome = service.enqueue(poll_payload()).unwrap();
        let job = service.claim(queue_names::SNMP_POLLING).unwrap().unwrap();
        service.report_progress(&job.queue, &job.id, serde_json::json!(50));
        service
            .complete(&job.queue, &job.id, serde_json::json!({"ok": true}))
            .unwrap();

        let kinds: Vec<_> = [
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
            rx.recv().await.unwrap(),
        ]
        .into_iter()
        .map(|e| e.event)
        .collect();
        assert_eq!(
            kinds,
            vec![
                QueueEventKind::Waiting,
                QueueEventKind::Active,
                QueueEventKind::Progress,
                QueueEventKind::Completed,
            ]
        );
        assert_eq!(outcome.disposition, EnqueueDisposition::Created);
    }

    #[tokio::test]
    async fn merged_enqueue_emits_no_second_waiting() {
        let (service, bridge) = service();
        let mut rx = bridge.subscribe(SubscriptionFilter::all());

        let first = service.enqueue_job(Job::new(poll_payload()).with_id("snmp-poll:d:0".into()));
        let second = service.enqueue_job(Job::new(poll_payload()).with_id("snmp-poll:d:0".into()));
        assert_eq!(first.unwrap().disposition, EnqueueDisposition::Created);
        assert_eq!(second.unwrap().disposition, EnqueueDisposition::Merged);

        rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn transient_failure_retries_with_backoff() {
        let (service, _bridge) = service();
        service.enqueue(poll_payload()).unwrap();
        let job = service.claim(queue_names::SNMP_POLLING).unwrap().unwrap();

        let requeued = service
            .fail_attempt(&job, &ProcessorError::transient("device timeout"))
            .unwrap();
        assert_eq!(requeued.state, JobState::Waiting);
        assert!(requeued.not_before.unwrap() > Utc::now());
        assert_eq!(requeued.attempts_made, 1);
    }

    #[tokio::test]
    async fn validation_failure_is_terminal_immediately() {
        let (service, _bridge) = service();
        service.enqueue(poll_payload()).unwrap();
        let job = service.claim(queue_names::SNMP_POLLING).unwrap().unwrap();

        let failed = service
            .fail_attempt(&job, &ProcessorError::validation("missing device id"))
            .unwrap();
        assert_eq!(failed.state, JobState::Failed);
        assert_eq!(failed.attempts_made, 1);
    }

    #[tokio::test]
    async fn transient_failure_exhausts_into_failed() {
        let (service, bridge) = service();
        service
            .enqueue_job(Job::new(poll_payload()).with_retry_policy(RetryPolicy {
                max_attempts: 1,
                base_delay_ms: 1,
            }))
            .unwrap();
        let mut rx = bridge.subscribe(SubscriptionFilter::all());
        let job = service.claim(queue_names::SNMP_POLLING).unwrap().unwrap();

        let failed = service
            .fail_attempt(&job, &ProcessorError::transient("device timeout"))
            .unwrap();
        assert_eq!(failed.state, JobState::Failed);

        rx.recv().await.unwrap(); // active
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, QueueEventKind::Failed);
    }

    #[tokio::test]
    async fn failure_reasons_are_redacted() {
        let (service, _bridge) = service();
        service.enqueue(poll_payload()).unwrap();
        let job = service.claim(queue_names::SNMP_POLLING).unwrap().unwrap();

        let failed = service
            .fail_attempt(
                &job,
                &ProcessorError::permanent("ssh rejected password=hunter2"),
            )
            .unwrap();
        assert!(!failed.failed_reason.unwrap().contains("hunter2"));
    }

    #[tokio::test]
    async fn job_log_is_redacted() {
        let (service, _bridge) = service();
        service.enqueue(poll_payload()).unwrap();
        let job = service.claim(queue_names::SNMP_POLLING).unwrap().unwrap();

        service.append_log(&job.queue, &job.id, "trying community=private".into());
        let stored = service.get(&job.queue, &job.id).unwrap().unwrap();
        assert!(!stored.log[0].contains("private"));
    }

    #[tokio::test]
    async fn sweep_emits_stalled() {
        let (service, bridge) = service();
        service.enqueue(poll_payload()).unwrap();
        service.claim(queue_names::SNMP_POLLING).unwrap().unwrap();
        let mut rx = bridge.subscribe(SubscriptionFilter::all());

        let later = Utc::now() + chrono::Duration::minutes(10);
        service.sweep(later).unwrap();
        assert_eq!(rx.recv().await.unwrap().event, QueueEventKind::Stalled);
    }
}
