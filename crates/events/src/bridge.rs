//! Fan-out of queue events to live observers.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::event::QueueEvent;

/// What an observer wants to see. Empty `queues` means every queue; a set
/// restricts to those queues. `job_id` additionally narrows to one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub queues: HashSet<String>,
    pub job_id: Option<String>,
}

impl SubscriptionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_queues<I, S>(queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queues: queues.into_iter().map(Into::into).collect(),
            job_id: None,
        }
    }

    pub fn for_job(job_id: impl Into<String>) -> Self {
        Self {
            queues: HashSet::new(),
            job_id: Some(job_id.into()),
        }
    }

    pub fn matches(&self, event: &QueueEvent) -> bool {
        if !self.queues.is_empty() && !self.queues.contains(&event.queue) {
            return false;
        }
        if let Some(job_id) = &self.job_id {
            if job_id != &event.job_id {
                return false;
            }
        }
        true
    }
}

struct Observer {
    filter: SubscriptionFilter,
    sender: mpsc::UnboundedSender<QueueEvent>,
}

/// Broadcast point between the queue service and WebSocket handlers.
///
/// - No IO of its own; delivery is an unbounded channel send
/// - Events reach each matching observer in publish order
/// - Disconnected observers are pruned lazily during publish
#[derive(Default)]
pub struct QueueEventBridge {
    observers: Mutex<Vec<Observer>>,
}

impl QueueEventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, filter: SubscriptionFilter) -> mpsc::UnboundedReceiver<QueueEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut observers) = self.observers.lock() {
            observers.push(Observer { filter, sender: tx });
        }
        rx
    }

    pub fn publish(&self, event: QueueEvent) {
        let Ok(mut observers) = self.observers.lock() else {
            return;
        };
        observers.retain(|obs| {
            if obs.filter.matches(&event) {
                obs.sender.send(event.clone()).is_ok()
            } else {
                !obs.sender.is_closed()
            }
        });
    }

    #[cfg(test)]
    fn observer_count(&self) -> usize {
        self.observers.lock().map(|o| o.len()).unwrap_or(0)
    }
}
