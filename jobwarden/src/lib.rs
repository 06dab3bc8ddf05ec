//! Jobwarden - Generic job lifecycle management.
//!
//! A crate for running domain-specific work items ("jobs") through a fixed
//! state machine with at-most-one concurrent execution per job, a
//! per-job timeout, and status retrieval by id.
//!
//! # Core Concepts
//!
//! - **Job**: One unit of submitted work, tracked as a [`JobSnapshot`] moving
//!   through `Pending -> Processing -> Completed | Failed`, and back to
//!   `Pending` on reset.
//!
//! - **Registry**: The [`JobRegistry`] owns every job record. Its atomic
//!   claim ([`JobRegistry::transition_to_processing`]) is what prevents two
//!   executions of the same job.
//!
//! - **Worker**: The [`Worker`] trait is the domain action plugged into the
//!   manager; a [`Validator`] screens payloads before any worker call.
//!
//! - **Runtime**: The [`Executor`] runs one job to a terminal state under its
//!   timeout, the [`AsyncRunner`] schedules runs on tokio, and the
//!   [`JobManager`] ties it all together behind submit / status / reset /
//!   retry / health / close.
//!
//! - **Poller**: The [`Poller`] waits client-side for a job to become
//!   terminal, with a bounded number of attempts.
//!
//! - **Events**: Lifecycle transitions are published on an
//!   [`InProcEventBus`].
//!
//! # Feature Flags
//!
//! - `metrics` - Prometheus metrics support
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use jobwarden::*;
//!
//! let manager = JobManagerBuilder::new(ManagerConfig::default())
//!     .with_worker(Arc::new(ReviewWorker::new()))
//!     .with_validator(Arc::new(|doc: &Option<String>| doc.is_some()))
//!     .build()?;
//!
//! let id = manager.submit(Some("resume.pdf".into()), None)?;
//! let job = manager.wait(id).await?;
//! ```

/// Timestamp source for job records.
pub mod clock;

/// Job, poll and manager configuration.
///
/// [`JobConfig`], [`PollConfig`] and [`ManagerConfig`] deserialize with
/// defaults for any missing field.
pub mod config;

/// Typed errors returned by registry, runtime and poller operations.
pub mod error;

/// Lifecycle events and the in-process broadcast bus.
pub mod events;

/// Job identifiers, statuses, failures and snapshots.
pub mod job;

#[cfg(feature = "metrics")]
/// Prometheus metrics for job lifecycle tracking.
pub mod metrics;

/// Client-side status polling.
pub mod poller;

/// Thread-safe job store and state machine.
pub mod registry;

/// Executor, runner, manager and builder.
pub mod runtime;

/// Tracing spans and telemetry record helpers.
pub mod telemetry;

/// Worker and validator capabilities.
pub mod worker;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use events::*;
pub use job::*;
pub use poller::*;
pub use registry::*;
pub use runtime::*;
pub use worker::*;
