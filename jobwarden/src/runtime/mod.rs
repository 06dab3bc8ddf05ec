/// Builder for constructing job managers.
pub mod builder;
/// Single-job execution with validation and timeout handling.
pub mod executor;
/// Job manager tying registry, runner and worker together.
pub mod manager;
/// Task scheduling with awaitable or detached handles.
pub mod runner;
/// Cooperative cancellation signalling.
pub mod token;

pub use builder::JobManagerBuilder;
pub use executor::Executor;
pub use manager::{HealthReport, HealthStatus, JobManager};
pub use runner::{AsyncRunner, JobHandle};
pub use token::CancelToken;
