use std::fmt;
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::JobError;
use crate::job::JobId;
use crate::worker::{Validator, Worker};

use super::executor::Executor;

/// Schedules executor runs on the tokio runtime.
///
/// `submit` claims the job before spawning, so a second submission for a
/// job that is already `Processing` fails with `AlreadyRunning` and no
/// duplicate task is created. The returned [`JobHandle`] can be awaited for
/// the outcome or detached, in which case the outcome is only visible
/// through the registry.
pub struct AsyncRunner<P, R, V> {
    executor: Arc<Executor<P, R, V>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<P, R, V> fmt::Debug for AsyncRunner<P, R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRunner")
            .field("executor", &self.executor)
            .field("tracked_tasks", &self.tasks.lock().len())
            .finish()
    }
}

impl<P, R, V> AsyncRunner<P, R, V>
where
    P: Send + 'static,
    R: Clone + Send + Sync + 'static,
    V: Validator<P> + 'static,
{
    pub fn new(executor: Arc<Executor<P, R, V>>) -> Self {
        Self {
            executor,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn executor(&self) -> &Arc<Executor<P, R, V>> {
        &self.executor
    }

    /// Claim `id` and run it on a new task.
    ///
    /// Fails with `NoRuntime` outside a tokio runtime, before the job is
    /// claimed.
    pub fn submit<W>(&self, id: JobId, payload: P, worker: Arc<W>) -> Result<JobHandle<R>, JobError>
    where
        W: Worker<P, R> + ?Sized + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| JobError::NoRuntime(id))?;
        let (job, guard) = self.executor.claim(id)?;
        let (tx, rx) = oneshot::channel();
        let executor = Arc::clone(&self.executor);

        let task = runtime.spawn(async move {
            let outcome = executor.execute_claimed(job, payload, worker, guard).await;
            // The receiver is gone when the handle was detached.
            let _ = tx.send(outcome);
        });

        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);

        Ok(JobHandle { id, rx })
    }

    /// Number of submitted executions that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tasks
            .lock()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Wait up to `timeout` for every submitted execution to finish.
    ///
    /// Returns how many were still running when the timeout expired. Those
    /// keep running and stay tracked, so a later drain waits for them again.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let deadline = tokio::time::Instant::now() + timeout;
        let mut unfinished = Vec::new();

        for mut task in tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("execution task failed: {:?}", e),
                Err(_) => unfinished.push(task),
            }
        }

        let count = unfinished.len();
        if count > 0 {
            tracing::warn!(unfinished = count, "executions still running after drain timeout");
            self.tasks.lock().extend(unfinished);
        }
        count
    }
}

/// Handle to a submitted execution.
///
/// Awaiting the handle yields the same outcome a direct
/// [`Executor::run`] would have returned.
#[derive(Debug)]
pub struct JobHandle<R> {
    id: JobId,
    rx: oneshot::Receiver<Result<R, JobError>>,
}

impl<R> JobHandle<R> {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Wait for the execution outcome.
    ///
    /// Resolves to `Aborted` when the execution task ended without
    /// reporting, e.g. because the runtime shut down.
    pub async fn outcome(self) -> Result<R, JobError> {
        let id = self.id;
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(JobError::Aborted(id)),
        }
    }

    /// Stop tracking the outcome. The execution keeps running.
    pub fn detach(self) -> JobId {
        self.id
    }
}

impl<R> IntoFuture for JobHandle<R>
where
    R: Send + 'static,
{
    type Output = Result<R, JobError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.outcome().boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use crate::config::JobConfig;
    use crate::job::JobStatus;
    use crate::registry::JobRegistry;
    use crate::worker::{AcceptAll, WorkContext};

    struct Gated(Arc<Semaphore>);

    #[async_trait]
    impl Worker<u32, u32> for Gated {
        async fn execute(&self, payload: u32, _ctx: WorkContext) -> anyhow::Result<u32> {
            let _permit = self.0.acquire().await?;
            Ok(payload + 1)
        }
    }

    fn runner() -> AsyncRunner<u32, u32, AcceptAll> {
        let executor = Executor::new(Arc::new(JobRegistry::new()), Arc::new(AcceptAll));
        AsyncRunner::new(Arc::new(executor))
    }

    #[tokio::test]
    async fn test_handle_resolves_to_outcome() {
        let runner = runner();
        let id = runner.executor().registry().create(JobConfig::default()).unwrap();
        let gate = Arc::new(Semaphore::new(1));

        let handle = runner.submit(id, 1, Arc::new(Gated(gate))).unwrap();
        assert_eq!(handle.id(), id);
        assert_eq!(handle.await, Ok(2));
    }

    #[tokio::test]
    async fn test_duplicate_submit_is_rejected() {
        let runner = runner();
        let registry = Arc::clone(runner.executor().registry());
        let id = registry.create(JobConfig::default()).unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let worker = Arc::new(Gated(Arc::clone(&gate)));

        let first = runner.submit(id, 1, Arc::clone(&worker)).unwrap();
        let second = runner.submit(id, 1, Arc::clone(&worker)).unwrap_err();
        assert_eq!(second, JobError::AlreadyRunning(id));
        assert_eq!(registry.get(id).unwrap().attempts, 1);

        gate.add_permits(1);
        assert_eq!(first.outcome().await, Ok(2));
    }

    #[tokio::test]
    async fn test_detached_outcome_visible_in_registry() {
        let runner = runner();
        let registry = Arc::clone(runner.executor().registry());
        let id = registry.create(JobConfig::default()).unwrap();

        let detached = runner
            .submit(id, 4, Arc::new(Gated(Arc::new(Semaphore::new(1)))))
            .unwrap()
            .detach();
        assert_eq!(detached, id);

        assert_eq!(runner.drain(Duration::from_secs(1)).await, 0);
        let job = registry.get(id).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.result(), Some(&5));
    }

    #[tokio::test]
    async fn test_drain_reports_unfinished() {
        let runner = runner();
        let id = runner.executor().registry().create(JobConfig::default()).unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let _handle = runner.submit(id, 1, Arc::new(Gated(Arc::clone(&gate)))).unwrap();

        assert_eq!(runner.in_flight(), 1);
        assert_eq!(runner.drain(Duration::from_millis(20)).await, 1);
        assert_eq!(runner.in_flight(), 1);
        assert_eq!(runner.drain(Duration::from_millis(20)).await, 1);

        gate.add_permits(1);
        assert_eq!(runner.drain(Duration::from_secs(1)).await, 0);
        assert_eq!(runner.in_flight(), 0);
        assert_eq!(
            runner.executor().registry().get(id).unwrap().status(),
            JobStatus::Completed
        );
    }

    #[test]
    fn test_submit_outside_runtime_leaves_job_pending() {
        let runner = runner();
        let registry = Arc::clone(runner.executor().registry());
        let id = registry.create(JobConfig::default()).unwrap();

        let err = runner
            .submit(id, 1, Arc::new(Gated(Arc::new(Semaphore::new(1)))))
            .unwrap_err();
        assert_eq!(err, JobError::NoRuntime(id));

        let job = registry.get(id).unwrap();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_runtime_shutdown_fails_unstarted_execution() {
        let runner = runner();
        let registry = Arc::clone(runner.executor().registry());
        let id = registry.create(JobConfig::default()).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        {
            let _enter = rt.enter();
            runner
                .submit(id, 1, Arc::new(Gated(Arc::new(Semaphore::new(1)))))
                .unwrap()
                .detach();
        }
        assert_eq!(registry.get(id).unwrap().status(), JobStatus::Processing);
        drop(rt);

        let job = registry.get(id).unwrap();
        assert_eq!(job.status(), JobStatus::Failed);
        assert_eq!(job.failure_reason(), Some(crate::job::ABORTED_REASON));
        assert_eq!(registry.reset(id).unwrap().status(), JobStatus::Pending);
    }
}
