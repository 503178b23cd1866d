use criterion::*;
use std::hint::black_box;

use ecs_registry::Registry;

mod common;
use common::*;

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    for &(label, n) in &[
        ("spawn_10k", AGENTS_SMALL),
        ("spawn_100k", AGENTS_MED),
    ] {
        group.bench_function(label, |b| {
            b.iter_batched(
                Registry::new,
                |mut registry| {
                    populate(&mut registry, n).unwrap();
                    black_box(registry);
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("churn_10k", |b| {
        b.iter_batched(
            Registry::new,
            |mut registry| {
                let entities = populate(&mut registry, AGENTS_SMALL).unwrap();
                for entity in entities {
                    registry.despawn(entity).unwrap();
                }
                black_box(registry);
            },
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
