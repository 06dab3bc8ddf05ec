use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::job::{FailureKind, JobId};

/// Metadata envelope attached to every job event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    pub job_id: Option<JobId>,
    pub timestamp: DateTime<Utc>,
}

impl EventMeta {
    pub fn new(job_id: Option<JobId>, timestamp: DateTime<Utc>) -> Self {
        Self {
            version: 1,
            job_id,
            timestamp,
        }
    }
}

/// Job lifecycle event with metadata and payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobEvent {
    pub meta: EventMeta,
    pub payload: JobEventPayload,
}

/// Event payload emitted for job lifecycle transitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum JobEventPayload {
    /// Job was registered in `Pending`.
    Created { job_id: JobId },
    /// Job was claimed for execution.
    Started { job_id: JobId, attempt: u32 },
    /// Job finished with a result.
    Completed { job_id: JobId, latency_ms: Option<i64> },
    /// Job finished with a failure.
    Failed {
        job_id: JobId,
        kind: FailureKind,
        reason: String,
    },
    /// Job was returned to `Pending`.
    Reset { job_id: JobId },
    /// Job was removed from the registry.
    Evicted { job_id: JobId },
    /// The registry stopped accepting new work.
    Closed,
}

/// In-process event bus using a tokio broadcast channel.
///
/// Publishing never waits for subscribers. A subscriber that falls more than
/// `capacity` events behind receives `RecvError::Lagged` and skips ahead.
pub struct InProcEventBus {
    sender: broadcast::Sender<JobEvent>,
    capacity: usize,
}

impl std::fmt::Debug for InProcEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcEventBus {
    /// Create a new event bus buffering up to `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event to all current subscribers.
    ///
    /// Events published while nobody is subscribed are dropped.
    pub fn publish(&self, event: JobEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for InProcEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn created(job_id: JobId) -> JobEvent {
        JobEvent {
            meta: EventMeta::new(Some(job_id), Utc::now()),
            payload: JobEventPayload::Created { job_id },
        }
    }

    #[tokio::test]
    async fn test_every_subscriber_receives_events() {
        let bus = InProcEventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let job_id = JobId::new();
        bus.publish(created(job_id));

        for rx in [&mut rx1, &mut rx2] {
            let event = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("event not delivered")
                .expect("channel closed");
            assert_eq!(event.payload, JobEventPayload::Created { job_id });
            assert_eq!(event.meta.job_id, Some(job_id));
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_dropped() {
        let bus = InProcEventBus::new(4);
        bus.publish(created(JobId::new()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = InProcEventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(created(JobId::new()));
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => assert_eq!(skipped, 3),
            other => panic!("expected lag, got {other:?}"),
        }
    }
}
