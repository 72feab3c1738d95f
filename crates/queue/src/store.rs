//! Job storage.
//!
//! The store owns persistence and the atomic claim; all state transitions
//! are store methods so workers can never bypass them. The in-memory store
//! backs single-process deployments and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{Job, JobId, JobState, RetentionPolicy, RetentionRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueDisposition {
    /// A new job row was created
    Created,
    /// An identical id was already waiting or active; no second job exists
    Merged,
}

#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub job: Job,
    pub disposition: EnqueueDisposition,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job {id} is {actual}, expected {expected}")]
    InvalidTransition {
        id: JobId,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job store abstraction.
pub trait QueueStore: Send + Sync {
    /// Insert a job, or merge into an existing live job with the same id.
    /// A terminal job with the same id is replaced by the fresh one.
    fn enqueue(&self, job: Job) -> Result<EnqueueOutcome, QueueStoreError>;

    fn get(&self, queue: &str, id: &JobId) -> Result<Option<Job>, QueueStoreError>;

    /// Jobs in a queue, optionally filtered by state, ordered oldest first,
    /// windowed by `[start, end)`.
    fn list(
        &self,
        queue: &str,
        state: Option<JobState>,
        start: usize,
        end: usize,
    ) -> Result<Vec<Job>, QueueStoreError>;

    /// Atomically claim the oldest claimable job: marks it `Active` and
    /// increments `attempts_made`.
    fn claim_next(&self, queue: &str) -> Result<Option<Job>, QueueStoreError>;

    /// `Active -> Completed` with a result.
    fn complete(
        &self,
        queue: &str,
        id: &JobId,
        result: serde_json::Value,
    ) -> Result<Job, QueueStoreError>;

    /// `Active -> Waiting` (when `retry_at` is set) or `Active -> Failed`.
    fn fail(
        &self,
        queue: &str,
        id: &JobId,
        reason: String,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<Job, QueueStoreError>;

    fn update_progress(
        &self,
        queue: &str,
        id: &JobId,
        progress: serde_json::Value,
    ) -> Result<Job, QueueStoreError>;

    fn append_log(&self, queue: &str, id: &JobId, line: String) -> Result<(), QueueStoreError>;

    /// Remove terminal jobs past their retention. Returns how many went.
    fn prune(&self, now: DateTime<Utc>, policy: &RetentionPolicy)
        -> Result<usize, QueueStoreError>;

    /// Return active jobs untouched for longer than `older_than` to
    /// `Waiting` so another worker can pick them up. Attempts stay counted.
    fn reap_stalled(
        &self,
        now: DateTime<Utc>,
        older_than: Duration,
    ) -> Result<Vec<Job>, QueueStoreError>;
}

/// In-memory queue store.
#[derive(Debug, Default)]
pub struct InMemoryQueueStore {
    queues: RwLock<HashMap<String, HashMap<JobId, Job>>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn with_job<T>(
        &self,
        queue: &str,
        id: &JobId,
        f: impl FnOnce(&mut Job) -> Result<T, QueueStoreError>,
    ) -> Result<T, QueueStoreError> {
        let mut queues = self.queues.write().unwrap();
        let job = queues
            .get_mut(queue)
            .and_then(|jobs| jobs.get_mut(id))
            .ok_or_else(|| QueueStoreError::NotFound(id.clone()))?;
        f(job)
    }
}

fn expect_active(job: &Job) -> Result<(), QueueStoreError> {
    if job.state != JobState::Active {
        return Err(QueueStoreError::InvalidTransition {
            id: job.id.clone(),
            expected: "active",
            actual: job.state.as_str(),
        });
    }
    Ok(())
}

impl QueueStore for InMemoryQueueStore {
    fn enqueue(&self, job: Job) -> Result<EnqueueOutcome, QueueStoreError> {
        let mut queues = self.queues.write().unwrap();
        let jobs = queues.entry(job.queue.clone()).or_default();

        if let Some(existing) = jobs.get(&job.id) {
            if !existing.state.is_terminal() {
                return Ok(EnqueueOutcome {
                    job: existing.clone(),
                    disposition: EnqueueDisposition::Merged,
                });
            }
        }

        jobs.insert(job.id.clone(), job.clone());
        Ok(EnqueueOutcome {
            job,
            disposition: EnqueueDisposition::Created,
        })
    }

    fn get(&self, queue: &str, id: &JobId) -> Result<Option<Job>, QueueStoreError> {
        let queues = self.queues.read().unwrap();
        Ok(queues.get(queue).and_then(|jobs| jobs.get(id)).cloned())
    }

    fn list(
        &self,
        queue: &str,
        state: Option<JobState>,
        start: usize,
        end: usize,
    ) -> Result<Vec<Job>, QueueStoreError> {
        let queues = self.queues.read().unwrap();
        let mut jobs: Vec<_> = queues
            .get(queue)
            .map(|jobs| {
                jobs.values()
                    .filter(|j| state.map_or(true, |s| j.state == s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs
            .into_iter()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect())
    }

    fn claim_next(&self, queue: &str) -> Result<Option<Job>, QueueStoreError> {
        let mut queues = self.queues.write().unwrap();
        let now = Utc::now();
        let Some(jobs) = queues.get_mut(queue) else {
            return Ok(None);
        };

        let next_id = jobs
            .values()
            .filter(|j| j.is_claimable(now))
            .min_by_key(|j| j.created_at)
            .map(|j| j.id.clone());

        let Some(id) = next_id else {
            return Ok(None);
        };
        let job = jobs.get_mut(&id).ok_or(QueueStoreError::NotFound(id))?;
        job.state = JobState::Active;
        job.attempts_made += 1;
        job.not_before = None;
        job.started_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    fn complete(
        &self,
        queue: &str,
        id: &JobId,
        result: serde_json::Value,
    ) -> Result<Job, QueueStoreError> {
        self.with_job(queue, id, |job| {
            expect_active(job)?;
            let now = Utc::now();
            job.state = JobState::Completed;
            job.result = Some(result);
            job.finished_at = Some(now);
            job.updated_at = now;
            Ok(job.clone())
        })
    }

    fn fail(
        &self,
        queue: &str,
        id: &JobId,
        reason: String,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<Job, QueueStoreError> {
        self.with_job(queue, id, |job| {
            expect_active(job)?;
            let now = Utc::now();
            job.failed_reason = Some(reason);
            job.updated_at = now;
            match retry_at {
                Some(at) => {
                    job.state = JobState::Waiting;
                    job.not_before = Some(at);
                }
                None => {
                    job.state = JobState::Failed;
                    job.finished_at = Some(now);
                }
            }
            Ok(job.clone())
        })
    }

    fn update_progress(
        &self,
        queue: &str,
        id: &JobId,
        progress: serde_json::Value,
    ) -> Result<Job, QueueStoreError> {
        self.with_job(queue, id, |job| {
            expect_active(job)?;
            job.progress = Some(progress);
            job.updated_at = Utc::now();
            Ok(job.clone())
        })
    }

    fn append_log(&self, queue: &str, id: &JobId, line: String) -> Result<(), QueueStoreError> {
        self.with_job(queue, id, |job| {
            job.log.push(line);
            job.updated_at = Utc::now();
            Ok(())
        })
    }

    fn prune(
        &self,
        now: DateTime<Utc>,
        policy: &RetentionPolicy,
    ) -> Result<usize, QueueStoreError> {
        let mut queues = self.queues.write().unwrap();
        let mut removed = 0;

        for jobs in queues.values_mut() {
            removed += prune_state(jobs, now, JobState::Completed, &policy.completed);
            removed += prune_state(jobs, now, JobState::Failed, &policy.failed);
        }

        Ok(removed)
    }

    fn reap_stalled(
        &self,
        now: DateTime<Utc>,
        older_than: Duration,
    ) -> Result<Vec<Job>, QueueStoreError> {
        let cutoff = now - chrono::Duration::from_std(older_than).unwrap_or_default();
        let mut queues = self.queues.write().unwrap();
        let mut stalled = Vec::new();

        for jobs in queues.values_mut() {
            for job in jobs.values_mut() {
                if job.state == JobState::Active && job.updated_at < cutoff {
                    job.state = JobState::Waiting;
                    job.not_before = None;
                    job.updated_at = now;
                    stalled.push(job.clone());
                }
            }
        }

        Ok(stalled)
    }
}

fn prune_state(
    jobs: &mut HashMap<JobId, Job>,
    now: DateTime<Utc>,
    state: JobState,
    rule: &RetentionRule,
) -> usize {
    let cutoff = now - chrono::Duration::from_std(rule.max_age).unwrap_or_default();
    let before = jobs.len();

    jobs.retain(|_, j| {
        j.state != state || j.finished_at.map_or(true, |finished| finished >= cutoff)
    });

    // Count cap: oldest beyond the cap go too.
    let mut terminal: Vec<_> = jobs
        .values()
        .filter(|j| j.state == state)
        .map(|j| (j.finished_at, j.id.clone()))
        .collect();
    if terminal.len() > rule.max_count {
        terminal.sort_by_key(|(finished, _)| *finished);
        let excess = terminal.len() - rule.max_count;
        for (_, id) in terminal.into_iter().take(excess) {
            jobs.remove(&id);
        }
    }

    before - jobs.len()
}

impl QueueStore for Arc<InMemoryQueueStore> {
    fn enqueue(&self, job: Job) -> Result<EnqueueOutcome, QueueStoreError> {
        (**self).enqueue(job)
    }

    fn get(&self, queue: &str, id: &JobId) -> Result<Option<Job>, QueueStoreError> {
        (**self).get(queue, id)
    }

    fn list(
        &self,
        queue: &str,
        state: Option<JobState>,
        start: usize,
        end: usize,
    ) -> Result<Vec<Job>, QueueStoreError> {
        (**self).list(queue, state, start, end)
    }

    fn claim_next(&self, queue: &str) -> Result<Option<Job>, QueueStoreError> {
        (**self).claim_next(queue)
    }

    fn complete(
        &self,
        queue: &str,
        id: &JobId,
        result: serde_json::Value,
    ) -> Result<Job, QueueStoreError> {
        (**self).complete(queue, id, result)
    }

    fn fail(
        &self,
        queue: &str,
        id: &JobId,
        reason: String,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<Job, QueueStoreError> {
        (**self).fail(queue, id, reason, retry_at)
    }

    fn update_progress(
        &self,
        queue: &str,
        id: &JobId,
        progress: serde_json::Value,
    ) -> Result<Job, QueueStoreError> {
        (**self).update_progress(queue, id, progress)
    }

    fn append_log(&self, queue: &str, id: &JobId, line: String) -> Result<(), QueueStoreError> {
        (**self).append_log(queue, id, line)
    }

    fn prune(
        &self,
        now: DateTime<Utc>,
        policy: &RetentionPolicy,
    ) -> Result<usize, QueueStoreError> {
        (**self).prune(now, policy)
    }

    fn reap_stalled(
        &self,
        now: DateTime<Utc>,
        older_than: Duration,
    ) -> Result<Vec<Job>, QueueStoreError> {
        (**self).reap_stalled(now, older_than)
    }
}
