use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::Instrument;

use crate::config::{Backoff, PollConfig};
use crate::error::{JobError, PollError};
use crate::job::{JobId, JobSnapshot};
use crate::registry::JobRegistry;
use crate::telemetry;

/// Read side a [`Poller`] checks job status against.
#[async_trait]
pub trait StatusSource<R>: Send + Sync {
    async fn fetch(&self, id: JobId) -> Result<JobSnapshot<R>, JobError>;
}

#[async_trait]
impl<R> StatusSource<R> for JobRegistry<R>
where
    R: Clone + Send + Sync + 'static,
{
    async fn fetch(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        self.get(id)
    }
}

#[async_trait]
impl<R, S> StatusSource<R> for Arc<S>
where
    R: Send + Sync + 'static,
    S: StatusSource<R> + ?Sized,
{
    async fn fetch(&self, id: JobId) -> Result<JobSnapshot<R>, JobError> {
        (**self).fetch(id).await
    }
}

/// Client-side loop that waits for a job to reach a terminal status.
///
/// Giving up never changes the job itself.
pub struct Poller<S> {
    source: S,
    config: PollConfig,
}

impl<S> fmt::Debug for Poller<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("source_type", &std::any::type_name::<S>())
            .field("config", &self.config)
            .finish()
    }
}

impl<S> Poller<S> {
    pub fn new(source: S, config: PollConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Check `id` up to `max_attempts` times, sleeping between checks.
    ///
    /// Returns the first terminal snapshot seen. A job that disappears
    /// mid-poll yields `PollError::NotFound`; running out of attempts
    /// yields `PollError::TimeoutExceeded`.
    pub async fn poll_until_terminal<R>(&self, id: JobId) -> Result<JobSnapshot<R>, PollError>
    where
        S: StatusSource<R>,
        R: Send + Sync + 'static,
    {
        let span = telemetry::job_poll_span(id.to_string(), self.config.max_attempts);
        self.poll_inner(id).instrument(span).await
    }

    async fn poll_inner<R>(&self, id: JobId) -> Result<JobSnapshot<R>, PollError>
    where
        S: StatusSource<R>,
        R: Send + Sync + 'static,
    {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            match self.source.fetch(id).await {
                Ok(job) if job.is_terminal() => {
                    tracing::debug!(attempt, status = %job.status(), "job reached terminal status");
                    return Ok(job);
                }
                Ok(_) => {}
                Err(JobError::NotFound(_)) => return Err(PollError::NotFound(id)),
                Err(err) => return Err(PollError::Source(err)),
            }

            if attempt < max_attempts {
                tokio::time::sleep(backoff_delay(&self.config, attempt)).await;
            }
        }

        tracing::debug!(attempts = max_attempts, "giving up on non-terminal job");
        Err(PollError::TimeoutExceeded {
            id,
            attempts: max_attempts,
        })
    }
}

/// Delay to sleep after poll `attempt` (1-based).
///
/// `Fixed` always returns the base interval. `Exponential` returns
/// `interval * factor^(attempt - 1)`, capped at `max_interval_ms`.
pub fn backoff_delay(config: &PollConfig, attempt: u32) -> Duration {
    match config.backoff {
        Backoff::Fixed => config.interval(),
        Backoff::Exponential {
            factor,
            max_interval_ms,
        } => {
            let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
            let scaled = config.interval_ms as f64 * f64::from(factor.max(0.0)).powi(exponent);
            let capped = if scaled.is_finite() {
                scaled.min(max_interval_ms as f64)
            } else {
                max_interval_ms as f64
            };
            Duration::from_millis(capped as u64)
        }
    }
}
