//! Benchmarks for registry and runtime operations using criterion.
//!
//! These benchmarks measure:
//! - Job creation
//! - Claim / complete cycle on a single job
//! - Snapshot reads under a populated registry
//! - Full manager round trip (submit -> outcome)

#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use jobwarden::*;
use jobwarden_testkit::{document, Document, DocumentValidator, MockWorker, ScoreResult};
use tokio::runtime::Runtime;

/// Creates a tokio runtime for async benchmarks.
fn create_runtime() -> Runtime {
    Runtime::new().expect("Failed to create tokio runtime")
}

fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_create");
    group.throughput(Throughput::Elements(1));

    group.bench_function("in_memory", |b| {
        let registry: JobRegistry<ScoreResult> = JobRegistry::new();
        b.iter(|| registry.create(JobConfig::default()).expect("create failed"));
    });

    group.finish();
}

fn bench_claim_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_claim_complete");
    group.throughput(Throughput::Elements(1));

    group.bench_function("single_job", |b| {
        let registry: JobRegistry<ScoreResult> = JobRegistry::new();
        let id = registry.create(JobConfig::default()).expect("create failed");
        b.iter(|| {
            registry.transition_to_processing(id).expect("claim failed");
            registry
                .complete(id, ScoreResult::new(7))
                .expect("complete failed");
            registry.reset(id).expect("reset failed");
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry_get");

    for size in [100usize, 10_000] {
        let registry: JobRegistry<ScoreResult> = JobRegistry::new();
        let ids: Vec<JobId> = (0..size)
            .map(|_| registry.create(JobConfig::default()).expect("create failed"))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % ids.len();
                registry.get(ids[i]).expect("get failed")
            });
        });
    }

    group.finish();
}

fn bench_manager_round_trip(c: &mut Criterion) {
    let rt = create_runtime();
    let mut group = c.benchmark_group("manager_round_trip");
    group.sample_size(50);

    group.bench_function("submit_and_await", |b| {
        let worker = MockWorker::<Document, ScoreResult>::succeeding(ScoreResult::new(1));
        let manager = rt.block_on(async {
            JobManagerBuilder::new(ManagerConfig::default())
                .with_worker(Arc::new(worker))
                .with_validator(Arc::new(DocumentValidator))
                .build()
                .expect("manager build failed")
        });

        b.to_async(&rt).iter(|| async {
            let handle = manager
                .submit_with_handle(document("bench.pdf"), None)
                .expect("submit failed");
            let id = handle.id();
            handle.await.expect("job failed");
            manager.evict(id).expect("evict failed");
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_create,
    bench_claim_complete,
    bench_get,
    bench_manager_round_trip
);
criterion_main!(benches);
