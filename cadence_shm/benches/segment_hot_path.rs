//! Hot-path benchmarks: the per-tick publish and the client reads.

use cadence_common::{Mode, State, States, TimeSpec};
use cadence_shm::{SegmentConfig, SegmentRegistry};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_publish_observation(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let segment = registry
        .create("bench_publish", &SegmentConfig::new(8, 4096, 1000.0))
        .unwrap();

    let mut states = States::zeroed(8);
    for dof in 0..8 {
        states.set(dof, State::new(dof as f64));
    }

    c.bench_function("publish_observation_8_dofs", |b| {
        b.iter(|| {
            black_box(segment.publish_observation(1000.0, &states, &states));
        });
    });
}

fn bench_read_latest(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let segment = registry
        .create("bench_read", &SegmentConfig::new(8, 4096, 1000.0))
        .unwrap();
    let states = States::zeroed(8);
    segment.publish_observation(1000.0, &states, &states);

    c.bench_function("read_latest_8_dofs", |b| {
        b.iter(|| {
            let observation = black_box(segment.read_latest());
            black_box(observation.iteration);
        });
    });
}

fn bench_enqueue_pop(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let registry = SegmentRegistry::with_base_dir(dir.path());
    let segment = registry
        .create("bench_queue", &SegmentConfig::new(8, 4096, 1000.0))
        .unwrap();

    c.bench_function("enqueue_then_pop", |b| {
        b.iter(|| {
            segment
                .enqueue(0, State::new(1.0), TimeSpec::relative_iteration(10), Mode::Queue)
                .unwrap();
            black_box(segment.pop_next(0));
            segment.mark_idle(0);
        });
    });
}

criterion_group!(
    benches,
    bench_publish_observation,
    bench_read_latest,
    bench_enqueue_pop
);
criterion_main!(benches);
