//! `netops-queue` — the asynchronous work queue.
//!
//! Jobs carry a typed payload, a deterministic id, and a retry policy.
//! State transitions go through [`QueueService`], which is the only writer
//! and the single emission point for lifecycle events. The worker pool in
//! [`runtime`] claims and dispatches; processors live in their own crate.

pub mod payload;
pub mod processor;
pub mod runtime;
pub mod service;
pub mod store;
pub mod types;

pub use payload::{
    DiscoveryTarget, InventoryFilters, JobPayload, MonitoringAction, queue_concurrency,
    queue_names,
};
pub use processor::{FailureKind, JobContext, Processor, ProcessorError};
pub use runtime::{WorkerPool, WorkerPoolConfig, WorkerPoolHandle};
pub use service::QueueService;
pub use store::{EnqueueDisposition, EnqueueOutcome, InMemoryQueueStore, QueueStore, QueueStoreError};
pub use types::{Job, JobId, JobState, RetentionPolicy, RetentionRule, RetryPolicy};
