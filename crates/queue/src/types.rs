//! Core job types and policies.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payload::JobPayload;

/// Job identifier: `<kind>:<target>:<millis>`.
///
/// Deterministic derivation means an enqueue for the same unit of work at
/// the same instant collides with the existing job instead of duplicating
/// it; the store merges such collisions while the job is waiting or active.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn derive(kind: &str, target: &str, at: DateTime<Utc>) -> Self {
        Self(format!("{kind}:{target}:{}", at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Queued (or re-queued after a retriable failure), waiting for a worker
    Waiting,
    /// Claimed by a worker
    Active,
    /// Finished successfully
    Completed,
    /// Exhausted retries or failed terminally
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

/// Retry policy: exponential backoff, `base * 2^(attempt - 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first (0 would never run; 1 = no retry)
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before the next attempt, given how many attempts have run.
    pub fn delay_after_attempt(&self, attempts_made: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempts_made.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(exp))
    }

    pub fn attempts_remain(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Retention rule for one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionRule {
    pub max_age: Duration,
    pub max_count: usize,
}

/// How long terminal jobs stay queryable before the maintenance sweep
/// removes them. Failures are kept longer for diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub completed: RetentionRule,
    pub failed: RetentionRule,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            completed: RetentionRule {
                max_age: Duration::from_secs(3_600),
                max_count: 100,
            },
            failed: RetentionRule {
                max_age: Duration::from_secs(86_400),
                max_count: 1_000,
            },
        }
    }
}

/// A unit of queued work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub payload: JobPayload,
    pub state: JobState,
    pub retry_policy: RetryPolicy,
    /// Attempts started so far (incremented on claim)
    pub attempts_made: u32,
    pub progress: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    pub failed_reason: Option<String>,
    pub log: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Backoff gate: not claimable before this instant
    pub not_before: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        let now = Utc::now();
        let id = payload.derive_id(now);
        Self {
            id,
            queue: payload.queue().to_string(),
            payload,
            state: JobState::Waiting,
            retry_policy: RetryPolicy::default(),
            attempts_made: 0,
            progress: None,
            result: None,
            failed_reason: None,
            log: Vec::new(),
            created_at: now,
            updated_at: now,
            not_before: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Waiting and past any backoff gate.
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Waiting && self.not_before.map_or(true, |at| now >= at)
    }
}
