use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ManagerConfig;
use crate::events::InProcEventBus;
use crate::registry::JobRegistry;
use crate::worker::{Validator, Worker};

use super::manager::JobManager;

/// Builder for constructing a `JobManager` with explicit dependencies.
///
/// The worker and validator are required. The event bus defaults to a new
/// bus sized by `event_capacity`, the clock to the system clock.
///
/// # Example
///
/// ```ignore
/// use jobwarden::*;
///
/// let manager = JobManagerBuilder::new(ManagerConfig::default())
///     .with_worker(Arc::new(worker))
///     .with_validator(Arc::new(AcceptAll))
///     .build()?;
/// ```
pub struct JobManagerBuilder<P, R, V, W> {
    config: ManagerConfig,
    worker: Option<Arc<W>>,
    validator: Option<Arc<V>>,
    events: Option<Arc<InProcEventBus>>,
    clock: Option<Arc<dyn Clock>>,
    _types: std::marker::PhantomData<fn(P) -> R>,
}

impl<P, R, V, W> fmt::Debug for JobManagerBuilder<P, R, V, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("JobManagerBuilder");
        debug.field("config", &self.config);
        debug.field("worker_set", &self.worker.is_some());
        debug.field("validator_set", &self.validator.is_some());
        debug.field("events_set", &self.events.is_some());
        debug.field("clock_set", &self.clock.is_some());

        if self.worker.is_some() {
            debug.field("worker_type", &type_name::<W>());
        }
        if self.validator.is_some() {
            debug.field("validator_type", &type_name::<V>());
        }

        debug.finish()
    }
}

impl<P, R, V, W> JobManagerBuilder<P, R, V, W>
where
    P: Send + 'static,
    R: Clone + Send + Sync + 'static,
    V: Validator<P> + 'static,
    W: Worker<P, R> + 'static,
{
    /// Create a new builder with the given manager configuration.
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            worker: None,
            validator: None,
            events: None,
            clock: None,
            _types: std::marker::PhantomData,
        }
    }

    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the worker that executes every job of this manager.
    pub fn with_worker(mut self, worker: Arc<W>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Set the payload validator.
    pub fn with_validator(mut self, validator: Arc<V>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Share an existing event bus, e.g. with another manager.
    pub fn with_events(mut self, events: Arc<InProcEventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the manager, returning an error if a dependency is missing.
    pub fn build(self) -> anyhow::Result<JobManager<P, R, V, W>> {
        let worker = self
            .worker
            .ok_or_else(|| anyhow::anyhow!("worker dependency missing"))?;
        let validator = self
            .validator
            .ok_or_else(|| anyhow::anyhow!("validator dependency missing"))?;
        if self.config.event_capacity == 0 {
            anyhow::bail!("event_capacity must be greater than zero");
        }

        let events = self
            .events
            .unwrap_or_else(|| Arc::new(InProcEventBus::new(self.config.event_capacity)));
        let mut registry = JobRegistry::new().with_events(events);
        if let Some(clock) = self.clock {
            registry = registry.with_clock(clock);
        }

        tracing::debug!(
            worker_type = type_name::<W>(),
            validator_type = type_name::<V>(),
            "building job manager"
        );

        Ok(JobManager::from_parts(
            self.config,
            Arc::new(registry),
            validator,
            worker,
        ))
    }
}
