#![allow(dead_code)]

use ecs_registry::{ECSResult, Entity, Registry};

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;

#[derive(Clone, Copy, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Velocity {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Wealth {
    pub value: f32,
}

pub fn populate(registry: &mut Registry, count: usize) -> ECSResult<Vec<Entity>> {
    let mut entities = Vec::with_capacity(count);
    for i in 0..count {
        let entity = registry.spawn_with(Position { x: i as f32, y: 0.0 })?;
        registry.add(entity, Velocity { x: 1.0, y: 0.0 })?;
        if i % 2 == 0 {
            registry.add(entity, Wealth { value: 100.0 })?;
        }
        entities.push(entity);
    }
    Ok(entities)
}
