use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::config::JobConfig;
use crate::error::JobError;
use crate::events::{EventMeta, InProcEventBus, JobEvent, JobEventPayload};
use crate::job::{Failure, JobId, JobSnapshot, JobState, JobStatus};
use crate::telemetry;

type JobSlot<R> = Arc<Mutex<JobSnapshot<R>>>;

/// Number of registered jobs per status.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct JobCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl JobCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// Owner of every job record.
///
/// The id→job map sits behind its own `RwLock`; each job has a separate
/// `Mutex`, so work on different jobs never contends beyond the short map
/// lookup. Locks are always taken map first, then job, and never held across
/// an `.await`.
pub struct JobRegistry<R> {
    jobs: RwLock<HashMap<JobId, JobSlot<R>>>,
    closed: AtomicBool,
    events: Arc<InProcEventBus>,
    clock: Arc<dyn Clock>,
}

impl<R> fmt::Debug for JobRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistry")
            .field("jobs", &self.jobs.read().len())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .field("events", &self.events)
            .finish()
    }
}

impl<R> Default for JobRegistry<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> JobRegistry<R>
where
    R: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
            events: Arc::new(InProcEventBus::default()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Publish lifecycle events on `events` instead of a private bus.
    pub fn with_events(mut self, events: Arc<InProcEventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn events(&self) -> Arc<InProcEventBus> {
        Arc::clone(&self.events)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Current time according to the registry's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Register a new `Pending` job and return its id.
    ///
    /// Fails only once the registry has been closed.
    pub fn create(&self, config: JobConfig) -> Result<JobId, JobError> {
        let id = JobId::new();
        {
            let mut jobs = self.jobs.write();
            if self.is_closed() {
                return Err(JobError::Closed);
            }
            let record = JobSnapshot::new(id, config, self.clock.now());
            jobs.insert(id, Arc::new(Mutex::new(record)));
        }

        tracing::debug!(job_id = %id, "job created");
        telemetry::record_job_created();
        self.publish(Some(id), JobEventPayload::Created { job_id: id });
        Ok(id)
    }

    /// Copy of the job's current state.
    pub fn get(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        let slot = self.slot(id)?;
        let record = slot.lock();
        Ok(record.clone())
    }

    /// Atomically claim the right to execute a `Pending` job.
    ///
    /// Exactly one of several concurrent callers succeeds; the others see
    /// `AlreadyRunning`. Returns the claimed record.
    pub fn transition_to_processing(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        let claimed = {
            let jobs = self.jobs.read();
            if self.is_closed() {
                return Err(JobError::Closed);
            }
            let slot = jobs.get(&id).ok_or(JobError::NotFound(id))?;
            let mut record = slot.lock();
            match record.state {
                JobState::Pending => {}
                JobState::Processing => return Err(JobError::AlreadyRunning(id)),
                JobState::Completed(_) | JobState::Failed(_) => {
                    return Err(JobError::InvalidTransition {
                        id,
                        from: record.status(),
                        to: JobStatus::Processing,
                    })
                }
            }
            if !record.config.enabled {
                return Err(JobError::Disabled(id));
            }

            record.state = JobState::Processing;
            record.attempts = record.attempts.saturating_add(1);
            record.started_at = Some(self.clock.now());
            record.finished_at = None;
            record.clone()
        };

        tracing::debug!(job_id = %id, attempt = claimed.attempts, "job claimed");
        telemetry::record_job_started();
        self.publish(
            Some(id),
            JobEventPayload::Started {
                job_id: id,
                attempt: claimed.attempts,
            },
        );
        Ok(claimed)
    }

    /// Record a successful outcome for a `Processing` job.
    pub fn complete(&self, id: JobId, result: R) -> Result<JobSnapshot<R>, JobError> {
        let finished = self.finish(id, JobState::Completed(result))?;
        let latency_ms = finished.latency().map(|latency| latency.num_milliseconds());
        self.publish(
            Some(id),
            JobEventPayload::Completed {
                job_id: id,
                latency_ms,
            },
        );
        Ok(finished)
    }

    /// Record a failure for a `Processing` job.
    pub fn fail(&self, id: JobId, failure: Failure) -> Result<JobSnapshot<R>, JobError> {
        let payload = JobEventPayload::Failed {
            job_id: id,
            kind: failure.kind,
            reason: failure.reason.clone(),
        };
        let finished = self.finish(id, JobState::Failed(failure))?;
        self.publish(Some(id), payload);
        Ok(finished)
    }

    fn finish(&self, id: JobId, outcome: JobState<R>) -> Result<JobSnapshot<R>, JobError> {
        let slot = self.slot(id)?;
        let finished = {
            let mut record = slot.lock();
            if record.status() != JobStatus::Processing {
                let err = JobError::InvalidTransition {
                    id,
                    from: record.status(),
                    to: outcome.status(),
                };
                tracing::error!(job_id = %id, error = %err, "refusing to finish job that is not processing");
                return Err(err);
            }
            record.state = outcome;
            record.finished_at = Some(self.clock.now());
            record.clone()
        };

        telemetry::record_job_finished(finished.status().as_str(), finished.latency());
        Ok(finished)
    }

    /// Return a job to `Pending`, clearing its outcome.
    ///
    /// Repeating a reset is harmless; resetting a `Processing` job fails with
    /// `Conflict`. The attempt counter is kept.
    pub fn reset(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        let slot = self.slot(id)?;
        let reset = {
            let mut record = slot.lock();
            if record.status() == JobStatus::Processing {
                return Err(JobError::Conflict(id));
            }
            record.state = JobState::Pending;
            record.started_at = None;
            record.finished_at = None;
            record.clone()
        };

        tracing::debug!(job_id = %id, "job reset");
        self.publish(Some(id), JobEventPayload::Reset { job_id: id });
        Ok(reset)
    }

    /// Remove a job that is not `Processing`.
    ///
    /// Retention is decided by the caller; the registry never evicts on its
    /// own.
    pub fn evict(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        let evicted = {
            let mut jobs = self.jobs.write();
            let slot = jobs.get(&id).ok_or(JobError::NotFound(id))?;
            let record = slot.lock().clone();
            if record.status() == JobStatus::Processing {
                return Err(JobError::Conflict(id));
            }
            jobs.remove(&id);
            record
        };

        tracing::debug!(job_id = %id, "job evicted");
        self.publish(Some(id), JobEventPayload::Evicted { job_id: id });
        Ok(evicted)
    }

    /// Stop accepting new jobs and new executions.
    ///
    /// Executions already claimed may still complete or fail; reads keep
    /// working.
    pub fn close(&self) {
        {
            let _jobs = self.jobs.write();
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
        }
        tracing::info!("job registry closed");
        self.publish(None, JobEventPayload::Closed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    pub fn counts(&self) -> JobCounts {
        let slots: Vec<JobSlot<R>> = self.jobs.read().values().cloned().collect();
        let mut counts = JobCounts::default();
        for slot in slots {
            match slot.lock().status() {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    fn slot(&self, id: JobId) -> Result<JobSlot<R>, JobError> {
        self.jobs
            .read()
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    fn publish(&self, job_id: Option<JobId>, payload: JobEventPayload) {
        self.events.publish(JobEvent {
            meta: EventMeta::new(job_id, self.clock.now()),
            payload,
        });
    }
}
