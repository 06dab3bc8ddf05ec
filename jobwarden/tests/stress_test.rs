//! Stress tests for jobwarden.
//!
//! Runs 1000 jobs through one manager on a multi-threaded runtime.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jobwarden::*;
use jobwarden_testkit::{document, Document, DocumentValidator, MockWorker, ScoreResult};
use tokio::time::timeout;

const JOB_COUNT: usize = 1000;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_thousand_jobs_complete_exactly_once() {
    let worker = MockWorker::<Document, ScoreResult>::succeeding_after(
        ScoreResult::new(1),
        Duration::from_millis(1),
    );
    let manager = Arc::new(
        JobManagerBuilder::new(ManagerConfig::default().with_event_capacity(4096))
            .with_worker(Arc::new(worker.clone()))
            .with_validator(Arc::new(DocumentValidator))
            .build()
            .expect("manager should build"),
    );

    let mut handles = Vec::with_capacity(JOB_COUNT);
    for i in 0..JOB_COUNT {
        let handle = manager
            .submit_with_handle(document(&format!("doc-{i}.pdf")), None)
            .expect("submit should succeed");
        handles.push(handle.outcome());
    }

    let outcomes = timeout(Duration::from_secs(30), futures::future::join_all(handles))
        .await
        .expect("jobs did not finish in time");
    assert!(outcomes.iter().all(|outcome| outcome.is_ok()));

    worker.assert_call_count_eq(JOB_COUNT);
    let unique: HashSet<JobId> = worker.calls().iter().map(|call| call.job_id).collect();
    assert_eq!(unique.len(), JOB_COUNT);

    let counts = manager.health().jobs;
    assert_eq!(counts.completed, JOB_COUNT);
    assert_eq!(counts.total(), JOB_COUNT);

    manager.close().await.expect("close should succeed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_readers_see_committed_states() {
    let worker = MockWorker::<Document, ScoreResult>::succeeding_after(
        ScoreResult::new(2),
        Duration::from_millis(2),
    );
    let manager = Arc::new(
        JobManagerBuilder::new(ManagerConfig::default())
            .with_worker(Arc::new(worker.clone()))
            .with_validator(Arc::new(DocumentValidator))
            .build()
            .expect("manager should build"),
    );

    let ids: Vec<JobId> = (0..100)
        .map(|i| {
            manager
                .submit(document(&format!("r-{i}.pdf")), None)
                .expect("submit should succeed")
        })
        .collect();

    let readers = (0..4).map(|_| {
        let manager = Arc::clone(&manager);
        let ids = ids.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                for id in &ids {
                    let job = manager.status(*id).expect("job should exist");
                    match job.status() {
                        JobStatus::Completed => assert_eq!(job.result(), Some(&ScoreResult::new(2))),
                        JobStatus::Processing => assert!(job.result().is_none()),
                        other => panic!("unexpected status {other}"),
                    }
                }
                tokio::task::yield_now().await;
            }
        })
    });
    for reader in futures::future::join_all(readers).await {
        reader.expect("reader panicked");
    }

    manager.close().await.expect("close should succeed");
    assert_eq!(manager.health().jobs.completed, 100);
}
