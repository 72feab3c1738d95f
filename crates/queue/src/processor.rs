//! Processor seam between the queue and the job implementations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::payload::JobPayload;
use crate::service::QueueService;
use crate::store::{EnqueueOutcome, QueueStoreError};
use crate::types::{Job, JobId};

/// How a failure should be treated by the retry machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Worth retrying: timeouts, refused connections, flaky upstreams
    Transient,
    /// Retrying cannot help: auth rejections, unsupported devices
    Permanent,
    /// The payload itself is wrong
    Validation,
    /// The referenced entity does not exist
    NotFound,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProcessorError {
    pub kind: FailureKind,
    pub message: String,
}

impl ProcessorError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Validation,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::NotFound,
            message: message.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// Handle a processor uses to talk back to the queue: progress, job log,
/// and child jobs. Never mutates job state directly.
pub struct JobContext {
    job_id: JobId,
    queue: String,
    service: Arc<QueueService>,
}

impl JobContext {
    pub fn new(job: &Job, service: Arc<QueueService>) -> Self {
        Self {
            job_id: job.id.clone(),
            queue: job.queue.clone(),
            service,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn progress(&self, value: serde_json::Value) {
        self.service.report_progress(&self.queue, &self.job_id, value);
    }

    pub fn log(&self, line: impl Into<String>) {
        self.service.append_log(&self.queue, &self.job_id, line.into());
    }

    /// Enqueue a child job. The child has its own lifecycle; the parent does
    /// not block on it.
    pub fn enqueue(&self, payload: JobPayload) -> Result<EnqueueOutcome, QueueStoreError> {
        self.service.enqueue(payload)
    }
}

/// One job kind's implementation.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Which queue this processor serves.
    fn queue(&self) -> &'static str;

    async fn process(
        &self,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<serde_json::Value, ProcessorError>;
}
