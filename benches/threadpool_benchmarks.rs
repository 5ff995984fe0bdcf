use criterion::{criterion_group, criterion_main, Criterion, BenchmarkId, Throughput};
use task_pool::{Config as PoolConfig, TaskPool};
use std::{
    hint::black_box,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

// Benchmark 1: submit + drain
fn bench_submit_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("submit_drain");

    for size in [100, 1000, 10000] {
        group.throughput(Throughput::Elements(size as u64));

        for (name, config) in [
            ("unbounded", PoolConfig::default()),
            ("bounded", PoolConfig::cpu_bound()),
        ] {
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, &size| {
                b.iter(|| {
                    let pool = TaskPool::with_config(config.clone()).unwrap();
                    let counter = Arc::new(AtomicUsize::new(0));
                    for i in 0..size {
                        let counter = counter.clone();
                        pool.submit(move |x: usize| counter.fetch_add(black_box(x), Ordering::Relaxed), i)
                            .unwrap();
                    }
                    pool.shutdown();
                    black_box(counter.load(Ordering::Relaxed));
                });
            });
        }
    }

    group.finish();
}

// Benchmark 2: handles on a long-lived pool
fn bench_handles(c: &mut Criterion) {
    let mut group = c.benchmark_group("with_handle");
    let pool = TaskPool::with_config(PoolConfig::default()).unwrap();

    for size in [100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let handles: Vec<_> = (0..size)
                    .map(|i: u64| pool.submit_with_handle(|x: u64| black_box(x * x), i).unwrap())
                    .collect();
                for handle in handles {
                    black_box(handle.join().unwrap());
                }
            });
        });
    }

    group.finish();
    pool.shutdown();
}

criterion_group!(benches, bench_submit_drain, bench_handles);
criterion_main!(benches);
