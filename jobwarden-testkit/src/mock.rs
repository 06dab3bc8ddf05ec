use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobwarden::*;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

/// What a [`MockWorker`] does when called.
#[derive(Clone, Debug)]
pub enum WorkerBehavior<R> {
    /// Return `result` after `delay`.
    Succeed { result: R, delay: Duration },
    /// Return an error with `error` as message after `delay`.
    Fail { error: String, delay: Duration },
    /// Panic inside the worker task.
    Panic,
}

#[derive(Clone, Debug)]
pub struct WorkerCall<P> {
    pub job_id: JobId,
    pub attempt: u32,
    pub payload: P,
}

/// Scriptable worker that records every call.
///
/// By default the worker ignores its cancel token, so a call that outlives
/// the job timeout keeps sleeping and finishes later. Use
/// [`observing_cancellation`](Self::observing_cancellation) to make it stop
/// as soon as the executor gives up.
#[derive(Clone)]
pub struct MockWorker<P, R> {
    calls: Arc<Mutex<Vec<WorkerCall<P>>>>,
    behavior: Arc<Mutex<WorkerBehavior<R>>>,
    gate: Option<Arc<Semaphore>>,
    observe_cancel: bool,
    finished: Arc<AtomicUsize>,
    cancelled: Arc<AtomicUsize>,
}

impl<P, R> MockWorker<P, R>
where
    P: Clone + Debug + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new(behavior: WorkerBehavior<R>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(Mutex::new(behavior)),
            gate: None,
            observe_cancel: false,
            finished: Arc::new(AtomicUsize::new(0)),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn succeeding(result: R) -> Self {
        Self::succeeding_after(result, Duration::ZERO)
    }

    pub fn succeeding_after(result: R, delay: Duration) -> Self {
        Self::new(WorkerBehavior::Succeed { result, delay })
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self::new(WorkerBehavior::Fail {
            error: error.into(),
            delay: Duration::ZERO,
        })
    }

    /// Worker that takes `duration` before returning `result`.
    pub fn hanging(duration: Duration, result: R) -> Self {
        Self::succeeding_after(result, duration)
    }

    pub fn panicking() -> Self {
        Self::new(WorkerBehavior::Panic)
    }

    /// Block every call until a permit is available on `gate`.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn observing_cancellation(mut self) -> Self {
        self.observe_cancel = true;
        self
    }

    pub fn set_behavior(&self, behavior: WorkerBehavior<R>) {
        *self.behavior.lock() = behavior;
    }

    pub fn calls(&self) -> Vec<WorkerCall<P>> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn assert_call_count_eq(&self, expected: usize) {
        let actual = self.call_count();
        assert_eq!(
            actual, expected,
            "Expected {} worker calls, got {}",
            expected, actual
        );
    }

    /// Calls that ran to the end of their delay.
    pub fn finished_count(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    /// Calls that stopped early because of cancellation.
    pub fn cancelled_count(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl<P, R> Worker<P, R> for MockWorker<P, R>
where
    P: Clone + Debug + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    async fn execute(&self, payload: P, ctx: WorkContext) -> anyhow::Result<R> {
        tracing::trace!(job_id = %ctx.job_id(), ?payload, "mock worker called");
        self.calls.lock().push(WorkerCall {
            job_id: ctx.job_id(),
            attempt: ctx.attempt(),
            payload,
        });

        let _permit = match &self.gate {
            Some(gate) => Some(gate.acquire().await?),
            None => None,
        };

        let behavior = self.behavior.lock().clone();
        let (delay, outcome) = match behavior {
            WorkerBehavior::Succeed { result, delay } => (delay, Ok(result)),
            WorkerBehavior::Fail { error, delay } => (delay, Err(anyhow::anyhow!(error))),
            WorkerBehavior::Panic => panic!("mock worker panic"),
        };

        if self.observe_cancel {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.cancel_token().cancelled() => {
                    self.cancelled.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("cancelled");
                }
            }
        } else {
            tokio::time::sleep(delay).await;
        }

        self.finished.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    fn observes_cancellation(&self) -> bool {
        self.observe_cancel
    }
}
