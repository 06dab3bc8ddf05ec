//! Poller integration tests for jobwarden.
//!
//! Covers bounded polling against jobs that never finish, jobs evicted
//! mid-poll, and exponential backoff timing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jobwarden::*;
use jobwarden_testkit::{document, Document, DocumentValidator, MockWorker, ScoreResult};

fn registry() -> Arc<JobRegistry<ScoreResult>> {
    Arc::new(JobRegistry::new())
}

#[tokio::test]
async fn test_poll_gives_up_instead_of_hanging() {
    let registry = registry();
    let id = registry.create(JobConfig::default()).unwrap();
    registry.transition_to_processing(id).unwrap();

    let poller = Poller::new(
        Arc::clone(&registry),
        PollConfig::new(Duration::from_millis(50), 3),
    );

    let started = Instant::now();
    let err = poller.poll_until_terminal::<ScoreResult>(id).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err, PollError::TimeoutExceeded { id, attempts: 3 });
    assert!(elapsed >= Duration::from_millis(100), "slept {elapsed:?}");
    assert!(elapsed < Duration::from_secs(1), "slept {elapsed:?}");
    assert_eq!(registry.get(id).unwrap().status(), JobStatus::Processing);
}

#[tokio::test]
async fn test_eviction_mid_poll_is_not_found() {
    let registry = registry();
    let id = registry.create(JobConfig::default()).unwrap();

    let evictor = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            registry.evict(id)
        })
    };

    let poller = Poller::new(
        Arc::clone(&registry),
        PollConfig::new(Duration::from_millis(10), 100),
    );
    let err = poller.poll_until_terminal::<ScoreResult>(id).await.unwrap_err();
    assert_eq!(err, PollError::NotFound(id));
    assert!(evictor.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_poll_observes_runner_outcome() {
    let registry = registry();
    let executor = Arc::new(Executor::new(
        Arc::clone(&registry),
        Arc::new(DocumentValidator),
    ));
    let runner = AsyncRunner::new(executor);
    let worker: Arc<MockWorker<Document, ScoreResult>> = Arc::new(MockWorker::succeeding_after(
        ScoreResult::new(7),
        Duration::from_millis(20),
    ));

    let id = registry.create(JobConfig::default()).unwrap();
    runner
        .submit(id, document("resume.pdf"), worker)
        .unwrap()
        .detach();

    let poller = Poller::new(
        Arc::clone(&registry),
        PollConfig::new(Duration::from_millis(5), 200),
    );
    let job = poller.poll_until_terminal::<ScoreResult>(id).await.unwrap();
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.into_result(), Some(ScoreResult::new(7)));
}

#[tokio::test]
async fn test_exponential_backoff_grows_sleep() {
    let registry = registry();
    let id = registry.create(JobConfig::default()).unwrap();

    let config = PollConfig::new(Duration::from_millis(10), 4).with_backoff(Backoff::Exponential {
        factor: 2.0,
        max_interval_ms: 25,
    });
    let expected: Duration = (1..4).map(|attempt| backoff_delay(&config, attempt)).sum();
    assert_eq!(expected, Duration::from_millis(10 + 20 + 25));

    let poller = Poller::new(Arc::clone(&registry), config);
    let started = Instant::now();
    let err = poller.poll_until_terminal::<ScoreResult>(id).await.unwrap_err();

    assert_eq!(err, PollError::TimeoutExceeded { id, attempts: 4 });
    assert!(started.elapsed() >= expected);
}
