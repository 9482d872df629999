//! Benchmarks for task admission and execution throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crossbeam_channel::bounded;
use std::time::Duration;
use veda_exec::prelude::*;

const TASKS: usize = 10_000;

fn run_batch(pool: &ThreadPool, n: usize) {
    let (tx, rx) = bounded(n);
    for i in 0..n {
        let tx = tx.clone();
        pool.execute(move || {
            let _ = tx.send(black_box(i * i));
        })
        .unwrap();
    }
    drop(tx);
    for _ in rx.iter() {}
}

fn bench_fixed_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_pool");
    group.throughput(Throughput::Elements(TASKS as u64));

    for threads in [1, 2, 4, 8] {
        let config = PoolConfig::builder()
            .core_size(threads)
            .max_size(threads)
            .unbounded_queue()
            .build()
            .unwrap();
        let pool = ThreadPool::new(config).unwrap();
        pool.prestart_all_core_threads().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, _| {
            b.iter(|| run_batch(&pool, TASKS));
        });

        pool.shutdown();
        pool.await_termination(Duration::from_secs(10));
    }

    group.finish();
}

fn bench_caller_runs_backpressure(c: &mut Criterion) {
    let mut group = c.benchmark_group("caller_runs");
    group.throughput(Throughput::Elements(TASKS as u64));

    for queue in [0, 16, 256] {
        let config = PoolConfig::builder()
            .core_size(2)
            .max_size(4)
            .bounded_queue(queue)
            .rejection_policy(RejectionPolicy::CallerRuns)
            .build()
            .unwrap();
        let pool = ThreadPool::new(config).unwrap();

        group.bench_with_input(BenchmarkId::new("queue", queue), &queue, |b, _| {
            b.iter(|| run_batch(&pool, TASKS));
        });

        pool.shutdown();
        pool.await_termination(Duration::from_secs(10));
    }

    group.finish();
}

fn bench_pool_startup(c: &mut Criterion) {
    c.bench_function("create_run_shutdown", |b| {
        b.iter(|| {
            let pool = ThreadPool::new(PoolConfig::with_sizes(4, 4)).unwrap();
            run_batch(&pool, 100);
            pool.shutdown();
            pool.await_termination(Duration::from_secs(10))
        });
    });
}

criterion_group!(
    benches,
    bench_fixed_pool,
    bench_caller_runs_backpressure,
    bench_pool_startup
);
criterion_main!(benches);
