//! Prometheus metrics instrumentation for jobwarden.
//!
//! All metrics are conditionally compiled behind the `metrics` feature flag.
//!
//! # Metrics
//!
//! ## Counters
//! - `jobwarden_jobs_created_total` - Total number of jobs registered
//! - `jobwarden_jobs_finished_total` - Jobs that reached a terminal status
//!
//! ## Gauges
//! - `jobwarden_jobs_in_flight` - Jobs currently processing
//!
//! ## Histograms
//! - `jobwarden_job_duration_seconds` - Time from claim to outcome
#![cfg(feature = "metrics")]

use prometheus::{
    exponential_buckets, CounterVec, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts,
    Registry,
};
use std::sync::LazyLock;

/// Global Prometheus registry for jobwarden metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static JOBS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "jobwarden_jobs_created_total",
        "Total number of jobs registered",
    )
    .expect("jobwarden_jobs_created_total metric creation failed")
});

/// Labels:
/// - `status`: `completed` or `failed`
pub static JOBS_FINISHED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        "jobwarden_jobs_finished_total",
        "Total number of jobs that reached a terminal status",
    );
    CounterVec::new(opts, &["status"]).expect("jobwarden_jobs_finished_total metric creation failed")
});

pub static JOBS_IN_FLIGHT: LazyLock<Gauge> = LazyLock::new(|| {
    Gauge::new("jobwarden_jobs_in_flight", "Jobs currently processing")
        .expect("jobwarden_jobs_in_flight metric creation failed")
});

/// Labels:
/// - `status`: `completed` or `failed`
pub static JOB_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let buckets = exponential_buckets(0.001, 2.0, 16).expect("bucket creation failed");
    let opts = HistogramOpts::new(
        "jobwarden_job_duration_seconds",
        "Time from claim to outcome in seconds",
    )
    .buckets(buckets);
    HistogramVec::new(opts, &["status"])
        .expect("jobwarden_job_duration_seconds metric creation failed")
});

/// Register all collectors with [`REGISTRY`].
///
/// Calling it more than once is safe.
pub fn init_metrics() -> anyhow::Result<()> {
    let registry = &*REGISTRY;

    for metric in [
        Box::new(JOBS_CREATED_TOTAL.clone()) as Box<dyn prometheus::core::Collector>,
        Box::new(JOBS_FINISHED_TOTAL.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
        Box::new(JOB_DURATION_SECONDS.clone()),
    ] {
        if let Err(e) = registry.register(metric) {
            if !matches!(e, prometheus::Error::AlreadyReg) {
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn record_job_created() {
    JOBS_CREATED_TOTAL.inc();
}

pub fn record_job_finished(status: &str) {
    JOBS_FINISHED_TOTAL.with_label_values(&[status]).inc();
}

pub fn inc_jobs_in_flight() {
    JOBS_IN_FLIGHT.inc();
}

pub fn dec_jobs_in_flight() {
    JOBS_IN_FLIGHT.dec();
}

pub fn observe_job_duration(status: &str, duration_secs: f64) {
    JOB_DURATION_SECONDS
        .with_label_values(&[status])
        .observe(duration_secs);
}

/// Gather all registered metrics in Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode_to_string(&metric_families)
        .map_err(Into::into)
}
