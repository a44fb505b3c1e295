//! Benchmarks for stepping, cancellation and scheduler ticks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stepwork::prelude::*;

fn bench_unit_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("unit_step");

    group.bench_function("exclusive", |b| {
        let mut unit = WorkUnit::new();
        unit.initialize(
            None,
            Some(Box::new(sequence::from_fn(|| true))),
            AsyncFlags::empty(),
        );
        b.iter(|| black_box(unit.step()));
    });

    group.bench_function("threaded", |b| {
        let unit = WorkUnit::new();
        unit.initialize(
            None,
            Some(Box::new(sequence::from_fn(|| true))),
            AsyncFlags::empty(),
        );
        b.iter(|| black_box(unit.threaded_step()));
    });

    group.finish();
}

fn bench_allocate_and_cancel(c: &mut Criterion) {
    let arena = WorkArena::new(1024).unwrap();
    let dispatcher = QueueDispatcher::new();

    c.bench_function("allocate_cancel_retire", |b| {
        b.iter(|| {
            let handle = arena
                .allocate(Work::from_sequence(sequence::from_fn(|| true)).on_stop(|| {}))
                .unwrap();
            arena.cancel(&handle);
            arena.retire(handle.slot(), &dispatcher);
            dispatcher.dispatch_pending()
        });
    });
}

fn bench_nested_cancel(c: &mut Criterion) {
    let mut group = c.benchmark_group("nested_cancel");

    for fanout in [1usize, 8, 64].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(fanout), fanout, |b, &fanout| {
            let arena = WorkArena::new(fanout + 1).unwrap();
            let dispatcher = QueueDispatcher::new();
            b.iter(|| {
                let root = arena.allocate(Work::from_action(|| {})).unwrap();
                for _ in 0..fanout {
                    let child = arena.allocate(Work::from_action(|| {})).unwrap();
                    arena.nest(&root, child).unwrap();
                }
                arena.cancel(&root);
                for handle in arena.live_handles() {
                    arena.retire(handle.slot(), &dispatcher);
                }
            });
        });
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for units in [16usize, 256, 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(units), units, |b, &units| {
            let config = Config::builder()
                .main_thread_only()
                .capacity(units)
                .build()
                .unwrap();
            let scheduler = Scheduler::new(config).unwrap();
            for _ in 0..units {
                scheduler
                    .spawn(Work::from_sequence(sequence::from_fn(|| true)))
                    .unwrap();
            }
            b.iter(|| black_box(scheduler.tick()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_unit_step,
    bench_allocate_and_cancel,
    bench_nested_cancel,
    bench_tick
);
criterion_main!(benches);
