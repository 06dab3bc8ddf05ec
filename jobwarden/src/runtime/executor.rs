use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::Instrument;

use crate::error::JobError;
use crate::job::{Failure, JobId, JobSnapshot};
use crate::registry::JobRegistry;
use crate::telemetry;
use crate::worker::{Validator, WorkContext, Worker};

use super::token::CancelToken;

/// Runs a single job to a terminal state.
///
/// A run claims the job, checks the payload with the validator, then calls
/// the worker bounded by the job's timeout. Every outcome the worker can
/// produce is recorded on the job before `run` returns; nothing is retried
/// here.
pub struct Executor<P, R, V> {
    registry: Arc<JobRegistry<R>>,
    validator: Arc<V>,
    _payload: PhantomData<fn(P)>,
}

impl<P, R, V> fmt::Debug for Executor<P, R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("registry", &self.registry)
            .field("validator_type", &std::any::type_name::<V>())
            .finish()
    }
}

impl<P, R, V> Executor<P, R, V>
where
    P: Send + 'static,
    R: Clone + Send + Sync + 'static,
    V: Validator<P> + 'static,
{
    pub fn new(registry: Arc<JobRegistry<R>>, validator: Arc<V>) -> Self {
        Self {
            registry,
            validator,
            _payload: PhantomData,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry<R>> {
        &self.registry
    }

    /// Claim `id` and execute it with `worker`.
    ///
    /// Claim errors (`AlreadyRunning`, `NotFound`, `Disabled`, `Closed`,
    /// `InvalidTransition`) return without touching the job.
    ///
    /// Dropping the returned future after the claim fails the job as
    /// `aborted`, so it can be reset and run again.
    pub async fn run<W>(&self, id: JobId, payload: P, worker: Arc<W>) -> Result<R, JobError>
    where
        W: Worker<P, R> + ?Sized + 'static,
    {
        let (job, guard) = self.claim(id)?;
        self.execute_claimed(job, payload, worker, guard).await
    }

    /// Move `id` to `Processing` and arm a guard that fails it if the
    /// execution is dropped before recording an outcome.
    pub(crate) fn claim(&self, id: JobId) -> Result<(JobSnapshot<R>, ClaimGuard<R>), JobError> {
        let job = self.registry.transition_to_processing(id)?;
        Ok((job, ClaimGuard::new(Arc::clone(&self.registry), id)))
    }

    /// Execute a job that was claimed through [`Executor::claim`].
    pub(crate) async fn execute_claimed<W>(
        &self,
        job: JobSnapshot<R>,
        payload: P,
        worker: Arc<W>,
        guard: ClaimGuard<R>,
    ) -> Result<R, JobError>
    where
        W: Worker<P, R> + ?Sized + 'static,
    {
        let span = telemetry::job_run_span(job.id.to_string(), job.attempts);
        let cancel = guard.cancel.clone();
        let outcome = self
            .execute_inner(job, payload, worker, cancel)
            .instrument(span)
            .await;
        guard.disarm();
        outcome
    }

    async fn execute_inner<W>(
        &self,
        job: JobSnapshot<R>,
        payload: P,
        worker: Arc<W>,
        cancel: CancelToken,
    ) -> Result<R, JobError>
    where
        W: Worker<P, R> + ?Sized + 'static,
    {
        let id = job.id;
        let job_label = id.to_string();
        let level = job.config.log_level;

        if !self.validator.is_valid(&payload) {
            telemetry::log_at(level, &job_label, "payload rejected by validator");
            self.registry.fail(id, Failure::validation())?;
            return Err(JobError::Validation);
        }

        let timeout = job.config.timeout();
        let ctx = WorkContext::new(id, job.attempts, Instant::now() + timeout, cancel.clone());
        telemetry::log_at(level, &job_label, "worker started");

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(
                async move {
                    let outcome = worker.execute(payload, ctx).await;
                    if cancel.is_cancelled() {
                        tracing::debug!(job_id = %id, "discarding worker result after timeout");
                    }
                    outcome
                }
                .in_current_span(),
            )
        };

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(result))) => {
                self.registry.complete(id, result.clone())?;
                telemetry::log_at(level, &job_label, "job completed");
                Ok(result)
            }
            Ok(Ok(Err(err))) => {
                let reason = format!("{err:#}");
                tracing::warn!(job_id = %id, error = %reason, "worker failed");
                self.registry.fail(id, Failure::worker(reason.clone()))?;
                Err(JobError::Worker(reason))
            }
            Ok(Err(join_err)) => {
                let reason = if join_err.is_panic() {
                    "worker panicked"
                } else {
                    "worker task cancelled"
                };
                tracing::warn!(job_id = %id, error = %join_err, "{reason}");
                self.registry.fail(id, Failure::worker(reason))?;
                Err(JobError::Worker(reason.to_string()))
            }
            Err(_elapsed) => {
                cancel.cancel();
                let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(job_id = %id, timeout_ms, "worker timed out");
                self.registry.fail(id, Failure::timeout())?;
                Err(JobError::Timeout(timeout))
            }
        }
    }
}

/// Fails a claimed job as `aborted` when dropped while still armed.
///
/// Armed from the claim until the executor records an outcome; the worker's
/// cancellation token is signalled on abort.
pub(crate) struct ClaimGuard<R>
where
    R: Clone + Send + Sync + 'static,
{
    registry: Arc<JobRegistry<R>>,
    id: JobId,
    cancel: CancelToken,
    armed: bool,
}

impl<R> ClaimGuard<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn new(registry: Arc<JobRegistry<R>>, id: JobId) -> Self {
        Self {
            registry,
            id,
            cancel: CancelToken::new(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<R> Drop for ClaimGuard<R>
where
    R: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.cancel.cancel();
        tracing::warn!(job_id = %self.id, "execution dropped before recording an outcome");
        if let Err(err) = self.registry.fail(self.id, Failure::aborted()) {
            tracing::debug!(job_id = %self.id, error = %err, "aborted job was already settled");
        }
    }
}
