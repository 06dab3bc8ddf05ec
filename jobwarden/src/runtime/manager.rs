use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::{JobConfig, ManagerConfig};
use crate::error::{JobError, PollError};
use crate::events::JobEvent;
use crate::job::{JobId, JobSnapshot, JobStatus};
use crate::poller::Poller;
use crate::registry::{JobCounts, JobRegistry};
use crate::worker::{Validator, Worker};

use super::executor::Executor;
use super::runner::{AsyncRunner, JobHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Closed,
}

/// Point-in-time health of a [`JobManager`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub jobs: JobCounts,
}

/// Front door for one payload/result domain.
///
/// Ties a registry, an executor and a runner to a single worker, and exposes
/// the submit / status / reset / retry / health / close surface a transport
/// layer needs. Build one with [`JobManagerBuilder`](super::JobManagerBuilder).
pub struct JobManager<P, R, V, W> {
    config: ManagerConfig,
    registry: Arc<JobRegistry<R>>,
    runner: AsyncRunner<P, R, V>,
    worker: Arc<W>,
}

impl<P, R, V, W> fmt::Debug for JobManager<P, R, V, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("worker_type", &std::any::type_name::<W>())
            .finish()
    }
}

impl<P, R, V, W> JobManager<P, R, V, W>
where
    P: Send + 'static,
    R: Clone + Send + Sync + 'static,
    V: Validator<P> + 'static,
    W: Worker<P, R> + 'static,
{
    pub(crate) fn from_parts(
        config: ManagerConfig,
        registry: Arc<JobRegistry<R>>,
        validator: Arc<V>,
        worker: Arc<W>,
    ) -> Self {
        let executor = Arc::new(Executor::new(Arc::clone(&registry), validator));
        Self {
            config,
            registry,
            runner: AsyncRunner::new(executor),
            worker,
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry<R>> {
        &self.registry
    }

    pub fn runner(&self) -> &AsyncRunner<P, R, V> {
        &self.runner
    }

    /// Register a job and start it in the background.
    ///
    /// Returns as soon as the job is claimed; the outcome is read back with
    /// [`status`](Self::status). `config` falls back to the manager's default
    /// job config.
    pub fn submit(&self, payload: P, config: Option<JobConfig>) -> Result<JobId, JobError> {
        self.submit_with_handle(payload, config)
            .map(JobHandle::detach)
    }

    /// Like [`submit`](Self::submit), returning a handle that resolves to
    /// the outcome.
    ///
    /// A job whose config is disabled stays registered in `Pending` and the
    /// call fails with `Disabled`.
    pub fn submit_with_handle(
        &self,
        payload: P,
        config: Option<JobConfig>,
    ) -> Result<JobHandle<R>, JobError> {
        let config = config.unwrap_or_else(|| self.config.default_job.clone());
        let id = self.registry.create(config)?;
        self.runner.submit(id, payload, Arc::clone(&self.worker))
    }

    pub fn status(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        self.registry.get(id)
    }

    pub fn reset(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        self.registry.reset(id)
    }

    /// Reset a `Failed` job and run it again with `payload`.
    ///
    /// Allowed while the job has used fewer than `max_retries` attempts;
    /// the first attempt never counts against the limit.
    pub fn retry(&self, id: JobId, payload: P) -> Result<JobHandle<R>, JobError> {
        let job = self.registry.get(id)?;
        if job.status() != JobStatus::Failed {
            return Err(JobError::InvalidTransition {
                id,
                from: job.status(),
                to: JobStatus::Pending,
            });
        }

        let max_retries = job.config.max_retries;
        if job.attempts >= u32::from(max_retries).max(1) {
            tracing::debug!(job_id = %id, attempts = job.attempts, max_retries, "retries exhausted");
            return Err(JobError::RetriesExhausted {
                id,
                attempts: job.attempts,
                max_retries,
            });
        }

        self.registry.reset(id)?;
        tracing::info!(job_id = %id, attempt = job.attempts + 1, "retrying job");
        self.runner.submit(id, payload, Arc::clone(&self.worker))
    }

    /// Remove a finished or pending job from the registry.
    pub fn evict(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        self.registry.evict(id)
    }

    pub fn health(&self) -> HealthReport {
        let status = if self.registry.is_closed() {
            HealthStatus::Closed
        } else {
            HealthStatus::Healthy
        };
        HealthReport {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: self.registry.now(),
            jobs: self.registry.counts(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.registry.subscribe()
    }

    /// Poller over this manager's registry using the configured poll
    /// settings.
    pub fn poller(&self) -> Poller<Arc<JobRegistry<R>>> {
        Poller::new(Arc::clone(&self.registry), self.config.poll.clone())
    }

    /// Poll `id` until it is terminal.
    pub async fn wait(&self, id: JobId) -> Result<JobSnapshot<R>, PollError> {
        self.poller().poll_until_terminal(id).await
    }

    /// Stop accepting work and wait for in-flight executions.
    ///
    /// Fails if executions are still running after `shutdown_timeout_ms`.
    /// Calling it again is harmless.
    pub async fn close(&self) -> anyhow::Result<()> {
        tracing::info!("Initiating graceful shutdown of job manager");
        self.registry.close();

        let timeout = self.config.shutdown_timeout();
        let unfinished = self.runner.drain(timeout).await;
        if unfinished > 0 {
            anyhow::bail!("{unfinished} job executions still running after {timeout:?}");
        }

        tracing::info!("Job manager shutdown complete");
        Ok(())
    }
}
