use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::job::JobId;
use crate::runtime::token::CancelToken;

/// Per-call execution context handed to a [`Worker`].
#[derive(Clone, Debug)]
pub struct WorkContext {
    job_id: JobId,
    attempt: u32,
    deadline: Instant,
    cancel: CancelToken,
}

impl WorkContext {
    pub(crate) fn new(job_id: JobId, attempt: u32, deadline: Instant, cancel: CancelToken) -> Self {
        Self {
            job_id,
            attempt,
            deadline,
            cancel,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// 1-based attempt number of this execution.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Point in time after which the executor stops waiting.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Signalled when the executor gives up on this call.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Domain action performed for a job.
///
/// The executor bounds every call by the job's timeout. When the deadline
/// passes it stops waiting and signals [`WorkContext::cancel_token`];
/// implementations that never look at the token keep running in the
/// background and their late result is dropped.
#[async_trait]
pub trait Worker<P, R>: Send + Sync {
    async fn execute(&self, payload: P, ctx: WorkContext) -> anyhow::Result<R>;

    /// Whether `execute` returns promptly once the cancel token fires.
    fn observes_cancellation(&self) -> bool {
        false
    }
}

#[async_trait]
impl<P, R, W> Worker<P, R> for Arc<W>
where
    P: Send + 'static,
    R: Send + 'static,
    W: Worker<P, R> + ?Sized,
{
    async fn execute(&self, payload: P, ctx: WorkContext) -> anyhow::Result<R> {
        (**self).execute(payload, ctx).await
    }

    fn observes_cancellation(&self) -> bool {
        (**self).observes_cancellation()
    }
}

/// Payload predicate checked before any worker call.
pub trait Validator<P>: Send + Sync {
    fn is_valid(&self, payload: &P) -> bool;
}

impl<P, F> Validator<P> for F
where
    F: Fn(&P) -> bool + Send + Sync,
{
    fn is_valid(&self, payload: &P) -> bool {
        self(payload)
    }
}

/// Validator that accepts every payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

impl<P> Validator<P> for AcceptAll {
    fn is_valid(&self, _payload: &P) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Echo;

    #[async_trait]
    impl Worker<String, usize> for Echo {
        async fn execute(&self, payload: String, _ctx: WorkContext) -> anyhow::Result<usize> {
            Ok(payload.len())
        }
    }

    #[test]
    fn test_closure_validator() {
        let non_empty = |payload: &String| !payload.is_empty();
        assert!(non_empty.is_valid(&"resume.pdf".to_string()));
        assert!(!non_empty.is_valid(&String::new()));
        assert!(Validator::<Option<u8>>::is_valid(&AcceptAll, &None));
    }

    #[tokio::test]
    async fn test_arc_worker_delegates() {
        let worker = Arc::new(Echo);
        let ctx = WorkContext::new(
            JobId::new(),
            1,
            Instant::now() + Duration::from_secs(1),
            CancelToken::new(),
        );
        assert!(!ctx.is_cancelled());
        assert!(ctx.remaining() <= Duration::from_secs(1));

        let len = worker.execute("abc".to_string(), ctx).await.unwrap();
        assert_eq!(len, 3);
        assert!(!worker.observes_cancellation());
    }
}
