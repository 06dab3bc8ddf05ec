//! Tracing and telemetry instrumentation for jobwarden.
//!
//! Span constructors and record helpers used along the job lifecycle. The
//! record helpers always log through `tracing` and additionally update the
//! Prometheus collectors when the `metrics` feature is enabled.
//!
//! # Example
//!
//! ```ignore
//! use jobwarden::telemetry::{init_tracing, job_run_span};
//! use jobwarden::LogLevel;
//!
//! init_tracing(LogLevel::Info);
//! let span = job_run_span("job-123", 1);
//! let _enter = span.enter();
//! ```

use tracing::{info_span, Span};
use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Create a tracing span for one executor run.
#[must_use]
pub fn job_run_span(job_id: impl AsRef<str>, attempt: u32) -> Span {
    info_span!(
        "jobwarden.run",
        job_id = %job_id.as_ref(),
        attempt = attempt,
    )
}

/// Create a tracing span for a poll loop.
#[must_use]
pub fn job_poll_span(job_id: impl AsRef<str>, max_attempts: u32) -> Span {
    info_span!(
        "jobwarden.poll",
        job_id = %job_id.as_ref(),
        max_attempts = max_attempts,
    )
}

/// Emit a per-job lifecycle message at the job's configured level.
pub fn log_at(level: LogLevel, job_id: impl AsRef<str>, message: &str) {
    let job_id = job_id.as_ref();
    match level {
        LogLevel::Trace => tracing::trace!(job_id = %job_id, "{message}"),
        LogLevel::Debug => tracing::debug!(job_id = %job_id, "{message}"),
        LogLevel::Info => tracing::info!(job_id = %job_id, "{message}"),
        LogLevel::Warn => tracing::warn!(job_id = %job_id, "{message}"),
        LogLevel::Error => tracing::error!(job_id = %job_id, "{message}"),
    }
}

/// Record that a job was registered.
pub fn record_job_created() {
    #[cfg(feature = "metrics")]
    crate::metrics::record_job_created();
}

/// Record that a job was claimed for execution.
pub fn record_job_started() {
    #[cfg(feature = "metrics")]
    crate::metrics::inc_jobs_in_flight();
}

/// Record that a job reached a terminal status.
///
/// # Arguments
/// * `status` - The terminal status (`completed` or `failed`)
/// * `latency` - Time between claim and outcome, when known
pub fn record_job_finished(status: impl AsRef<str>, latency: Option<chrono::Duration>) {
    let duration_secs = latency
        .and_then(|latency| latency.to_std().ok())
        .map(|latency| latency.as_secs_f64());

    tracing::debug!(
        status = %status.as_ref(),
        duration_secs = duration_secs,
        "job finished"
    );

    #[cfg(feature = "metrics")]
    {
        crate::metrics::dec_jobs_in_flight();
        crate::metrics::record_job_finished(status.as_ref());
        if let Some(duration_secs) = duration_secs {
            crate::metrics::observe_job_duration(status.as_ref(), duration_secs);
        }
    }
}

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over `default_level`. Calling this more than
/// once, or after another subscriber was installed, is a no-op.
pub fn init_tracing(default_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_ascii_lowercase()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
