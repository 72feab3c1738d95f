use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle transition of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventKind {
    Waiting,
    Active,
    Progress,
    Completed,
    Failed,
    Stalled,
}

/// One lifecycle event. `data` carries the kind-specific payload: progress
/// value, completion result, or failure reason (already redacted upstream).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub queue: String,
    pub event: QueueEventKind,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub ts: DateTime<Utc>,
}

impl QueueEvent {
    pub fn new(
        queue: impl Into<String>,
        event: QueueEventKind,
        job_id: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            queue: queue.into(),
            event,
            job_id: job_id.into(),
            data,
            ts: Utc::now(),
        }
    }
}
