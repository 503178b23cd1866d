use criterion::*;

use ecs_registry::{Cursor, ECSResult, PhaseSet, Registry, Scheduler, System, ViewDescriptor};

mod common;
use common::*;

struct Movement;

impl System for Movement {
    fn phases(&self) -> PhaseSet {
        PhaseSet::PROCESS
    }

    fn descriptor(&self) -> ViewDescriptor {
        ViewDescriptor::new().with::<Position>().with::<Velocity>()
    }

    fn process(&mut self, cursor: &mut Cursor<'_>) -> ECSResult<()> {
        let velocity = *cursor.get::<Velocity>()?;
        let position = cursor.get_mut::<Position>()?;
        position.x += velocity.x;
        position.y += velocity.y;
        Ok(())
    }
}

struct Decay;

impl System for Decay {
    fn phases(&self) -> PhaseSet {
        PhaseSet::PROCESS
    }

    fn descriptor(&self) -> ViewDescriptor {
        ViewDescriptor::new().with::<Wealth>()
    }

    fn process(&mut self, cursor: &mut Cursor<'_>) -> ECSResult<()> {
        cursor.get_mut::<Wealth>()?.value *= 0.99;
        Ok(())
    }
}

fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    let mut registry = Registry::new();
    populate(&mut registry, AGENTS_MED).unwrap();

    let mut scheduler = Scheduler::new();
    scheduler.add_system(Movement);
    scheduler.add_system(Decay);
    scheduler.start(&mut registry).unwrap();

    group.bench_function("process_100k", |b| {
        b.iter(|| scheduler.process(&mut registry).unwrap());
    });

    group.finish();
}

criterion_group!(benches, tick_benchmark);
criterion_main!(benches);
