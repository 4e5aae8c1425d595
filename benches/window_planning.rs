//! Window Planning Benchmarks
//!
//! Benchmarks for window set construction, coverage insertion, worker
//! planning, and cold versus warm requests through the dispatcher.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kuba_window_cache::cache::InMemoryCacheStore;
use kuba_window_cache::query::{QueryRequest, RequestDispatcher, WorkerPlanner};
use kuba_window_cache::storage::InMemoryPointStore;
use kuba_window_cache::types::DataPoint;
use kuba_window_cache::window::{Interval, WindowSet};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Test Data Generators
// =============================================================================

/// Window set with every third window fully covered and every fifth half covered
fn create_covered_set(windows: i64, step: i64) -> WindowSet {
    let mut set = WindowSet::new(0, windows * step - 1, step).unwrap();
    for i in 0..windows {
        let start = i * step;
        if i % 3 == 0 {
            set.add_covered(Interval::with_value(start, start + step - 1, 1.0))
                .unwrap();
        } else if i % 5 == 0 {
            set.add_covered(Interval::with_value(start, start + step / 2, 1.0))
                .unwrap();
        }
    }
    set
}

fn create_point_store(count: i64) -> Arc<InMemoryPointStore> {
    let store = Arc::new(InMemoryPointStore::new());
    store.insert_many((0..count).map(|ts| DataPoint::new("bench", ts, (ts % 97) as f64)));
    store
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_window_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("window_construction");

    for windows in [100i64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(windows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(windows), &windows, |b, &n| {
            b.iter(|| WindowSet::new(black_box(3), black_box(n * 60 + 2), 60).unwrap())
        });
    }

    group.finish();
}

fn bench_coverage_insertion(c: &mut Criterion) {
    c.bench_function("coverage_insertion_1000_windows", |b| {
        b.iter(|| black_box(create_covered_set(1_000, 60)))
    });
}

fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_planning");
    let planner = WorkerPlanner::new();

    for windows in [100i64, 1_000, 10_000] {
        let set = create_covered_set(windows, 60);
        group.throughput(Throughput::Elements(windows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(windows), &set, |b, set| {
            b.iter(|| planner.plan(black_box(set)))
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let backend = create_point_store(100_000);
    let request = QueryRequest::new("sum(bench)", 0, 99_999, 100);

    let mut group = c.benchmark_group("dispatch");

    group.bench_function("cold", |b| {
        b.iter(|| {
            let cache = Arc::new(InMemoryCacheStore::new(Duration::from_secs(300), 100_000));
            let dispatcher = RequestDispatcher::new(backend.clone(), cache);
            rt.block_on(dispatcher.request(black_box(&request))).unwrap()
        })
    });

    let cache = Arc::new(InMemoryCacheStore::new(Duration::from_secs(300), 100_000));
    let warm = RequestDispatcher::new(backend.clone(), cache);
    rt.block_on(warm.request(&request)).unwrap();

    group.bench_function("warm", |b| {
        b.iter(|| rt.block_on(warm.request(black_box(&request))).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_window_construction,
    bench_coverage_insertion,
    bench_planning,
    bench_dispatch
);
criterion_main!(benches);
