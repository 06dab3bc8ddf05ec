use std::time::Duration;

use thiserror::Error;

use crate::job::{JobId, JobStatus, TIMEOUT_REASON, VALIDATION_FAILED_REASON};

/// Errors returned by registry, executor and runner operations.
///
/// Only `Validation`, `Timeout` and `Worker` are recorded on the job itself;
/// the rest describe a rejected request and leave the job untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("{}", VALIDATION_FAILED_REASON)]
    Validation,

    #[error("job {0} is already running")]
    AlreadyRunning(JobId),

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("{} after {:?}", TIMEOUT_REASON, .0)]
    Timeout(Duration),

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("job {0} is processing and cannot be reset or evicted")]
    Conflict(JobId),

    #[error("job {0} is disabled")]
    Disabled(JobId),

    #[error("job registry is closed")]
    Closed,

    /// A transition was requested from a status that does not allow it.
    #[error("job {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job {id} used {attempts} of {max_retries} attempts")]
    RetriesExhausted {
        id: JobId,
        attempts: u32,
        max_retries: u16,
    },

    /// The execution task ended without reporting an outcome.
    #[error("execution of job {0} was aborted")]
    Aborted(JobId),

    #[error("no tokio runtime available to run job {0}")]
    NoRuntime(JobId),
}

impl JobError {
    /// Whether this error was also recorded as a `Failed` job.
    pub fn is_job_failure(&self) -> bool {
        matches!(
            self,
            JobError::Validation | JobError::Timeout(_) | JobError::Worker(_)
        )
    }
}

/// Errors returned by [`Poller::poll_until_terminal`](crate::poller::Poller::poll_until_terminal).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PollError {
    /// The job stayed non-terminal for every attempt. The job itself is not
    /// changed.
    #[error("job {id} not terminal after {attempts} attempts")]
    TimeoutExceeded { id: JobId, attempts: u32 },

    /// The job disappeared, or never existed.
    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("status lookup failed: {0}")]
    Source(JobError),
}
