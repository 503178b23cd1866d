//! # ECS Registry
//!
//! Data-oriented Entity-Component-System registry: a single-threaded,
//! in-process store that associates arbitrarily typed component values with
//! lightweight entity handles, partitions entities by the exact set of
//! component types they possess, answers include/exclude queries over those
//! partitions, and drives user systems through a phased lifecycle.
//!
//! ## Design Goals
//! - Sparse-set component pools with stable dense positions
//! - Archetype-interned entity routing for cheap filtered queries
//! - Safe mutation of the world while iterating a view
//! - Deterministic, sequential system scheduling
//!
//! ## Quick start
//! ```rust
//! use ecs_registry::prelude::*;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Default)]
//! struct Position { x: f32, y: f32 }
//! #[derive(Debug, Clone, Copy, PartialEq, Default)]
//! struct Velocity { x: f32, y: f32 }
//!
//! let mut registry = Registry::new();
//! let entity = registry.spawn_with(Position { x: 0.0, y: 0.0 })?;
//! registry.add(entity, Velocity { x: 1.0, y: 0.0 })?;
//!
//! let view = ViewDescriptor::new()
//!     .with::<Position>()
//!     .with::<Velocity>()
//!     .build(&registry)?;
//! view.each(&mut registry, |cursor| {
//!     let velocity = *cursor.get::<Velocity>()?;
//!     let position = cursor.get_mut::<Position>()?;
//!     position.x += velocity.x;
//!     position.y += velocity.y;
//!     Ok(())
//! })?;
//!
//! assert_eq!(registry.get::<Position>(entity)?, &Position { x: 1.0, y: 0.0 });
//! # Ok::<(), ecs_registry::ECSError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core registry types

pub use engine::registry::Registry;

pub use engine::entity::{Entity, EntityTable};

pub use engine::storage::SlotArray;

pub use engine::component::{ComponentDesc, ComponentPool, ComponentRegistry, TypeErasedPool};

pub use engine::archetype::{Archetype, ArchetypeIndex};

pub use engine::query::{ComponentTuple, Cursor, View, ViewDescriptor};

pub use engine::systems::{Notificable, Phase, PhaseSet, System};

pub use engine::scheduler::Scheduler;

pub use engine::error::{
    CapacityError, ECSError, ECSResult, InvalidComponentError, InvalidEntityError,
    InvalidViewError, MissingComponentError,
};

pub use engine::types::{
    ArchetypeID, ComponentID, EntityID, IndexID, Signature, SlotPos, VersionID,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used registry types.
///
/// Import with:
/// ```rust
/// use ecs_registry::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Cursor, ECSError, ECSResult, Entity, Notificable, Phase, PhaseSet, Registry, Scheduler,
        System, View, ViewDescriptor,
    };
}
