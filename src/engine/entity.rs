//! Entity identity and the entity table.
//!
//! ## Purpose
//! Entities are lightweight, opaque identifiers. This module is responsible
//! for:
//!
//! - Packing stable entity identifiers into a single 64-bit value
//! - Tracking entity liveness via slot versioning
//! - Reusing freed slots without ever resolving a stale handle
//!
//! ## Entity Model
//! An [`Entity`] is a compact, versioned handle composed of:
//!
//! - An **index**, identifying the slot within the entity table
//! - A **version**, incremented on slot reuse to invalidate stale handles
//!
//! ## Invariants
//! - An entity is live if and only if the table slot at its index holds that
//!   exact handle (`table[e.index] == e`).
//! - Destroying an entity frees its slot but retains the recorded handle, so
//!   the next occupant of the slot reads `version + 1`.
//! - The version sentinel [`INVALID_VERSION`] is never issued to a live
//!   entity; incrementing skips over it.

use std::fmt;

use crate::engine::storage::SlotArray;
use crate::engine::types::{
    EntityID, IndexID, SlotPos, VersionID, INDEX_BITS, INDEX_MASK, INVALID_VERSION, VERSION_MASK,
};

/// Opaque, versioned identifier for a registry entity.
///
/// ## Representation
/// Packs an index and a version into a single [`EntityID`]:
///
/// - **Index** — slot within the entity table
/// - **Version** — reuse counter; two handles with the same index but
///   different versions are distinct entities
///
/// ## Notes
/// `Entity` values are plain data: cheap to copy and compare, safe to hold
/// across mutations, never owning. Holding a handle does not keep the entity
/// alive.

#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity(pub EntityID);

#[inline]
const fn make_id(index: IndexID, version: VersionID) -> EntityID {
    ((version as EntityID) << INDEX_BITS) | (index as EntityID)
}

#[inline]
fn make_entity(index: IndexID, version: VersionID) -> Entity {
    debug_assert!((index as EntityID) <= INDEX_MASK);
    debug_assert!((version as EntityID) <= VERSION_MASK);
    Entity(make_id(index, version))
}

#[inline]
const fn split_entity(entity: Entity) -> (IndexID, VersionID) {
    let id = entity.0;
    let index = (id & INDEX_MASK) as IndexID;
    let version = (id >> INDEX_BITS) as VersionID;
    (index, version)
}

impl Entity {
    /// The canonical invalid handle; its version is the reserved sentinel.
    pub const INVALID: Entity = Entity(EntityID::MAX);

    /// Returns the `(index, version)` components of this entity.
    #[inline]
    pub fn components(self) -> (IndexID, VersionID) {
        split_entity(self)
    }

    /// Returns the slot index encoded in this entity.
    #[inline]
    pub fn index(self) -> IndexID {
        (self.0 & INDEX_MASK) as IndexID
    }

    /// Returns the version component of this entity.
    #[inline]
    pub fn version(self) -> VersionID {
        (self.0 >> INDEX_BITS) as VersionID
    }

    /// Returns `true` unless the version is the reserved invalid sentinel.
    ///
    /// ## Notes
    /// Validity is a property of the handle alone; it says nothing about
    /// liveness. Use the registry to check whether the entity still exists.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.version() != INVALID_VERSION
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("Entity(invalid)");
        }
        write!(f, "Entity({}v{})", self.index(), self.version())
    }
}

/// Slot table of live entities.
///
/// ## Purpose
/// `EntityTable` owns entity slot allocation, versioning, and liveness. Slot
/// `i` holds the currently live entity whose index is `i`; the sole liveness
/// predicate is `table[e.index] == e`.
///
/// ## Design
/// Backed by a non-invalidating [`SlotArray`]: a freed slot keeps the dead
/// handle it last held, and the next spawn at that slot reads the retained
/// version and issues `version + 1`. This is what prevents stale handles
/// from ever resolving after reuse.

pub struct EntityTable {
    slots: SlotArray<Entity>,
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { slots: SlotArray::new(false) }
    }

    /// Allocates a new entity.
    ///
    /// ## Behavior
    /// - Reuses the most recently freed slot if one exists; the new handle's
    ///   version is the retained version plus one (skipping the invalid
    ///   sentinel).
    /// - Otherwise appends a fresh slot with version `0`.
    pub fn spawn(&mut self) -> Entity {
        let (index, version) = match self.slots.peek() {
            Some(pos) => {
                let version = self
                    .slots
                    .retained(pos)
                    .map_or(0, |previous| next_version(previous.version()));
                (pos as IndexID, version)
            }
            None => (self.slots.size() as IndexID, 0),
        };
        let entity = make_entity(index, version);
        let pos = self.slots.add(entity);
        debug_assert_eq!(pos as IndexID, index);
        entity
    }

    /// Frees the entity's slot, retaining its version for the next occupant.
    ///
    /// Returns `false` when the handle is stale, invalid, or out of range.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.slots.remove_at(entity.index() as SlotPos)
    }

    /// Returns `true` if `entity` is the live occupant of its slot.
    pub fn is_alive(&self, entity: Entity) -> bool {
        entity.is_valid()
            && self.slots.try_get(entity.index() as SlotPos) == Some(&entity)
    }

    /// Number of live entities.
    #[inline]
    pub fn count(&self) -> usize {
        self.slots.count()
    }

    /// Highest ever-used slot index plus one.
    #[inline]
    pub fn size(&self) -> usize {
        self.slots.size()
    }

    /// Iterates over live entities in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().map(|(_, entity)| *entity)
    }
}

fn next_version(version: VersionID) -> VersionID {
    let next = version.wrapping_add(1);
    if next == INVALID_VERSION { 0 } else { next }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_packing_roundtrip() {
        let entity = make_entity(42, 7);
        assert_eq!(entity.index(), 42);
        assert_eq!(entity.version(), 7);
        assert_eq!(entity.components(), (42, 7));
    }

    #[test]
    fn test_invalid_sentinel() {
        assert!(!Entity::INVALID.is_valid());
        assert_eq!(Entity::INVALID.version(), INVALID_VERSION);
        let live = make_entity(0, 0);
        assert!(live.is_valid());
        assert_ne!(live, Entity::INVALID);
    }

    #[test]
    fn test_spawn_assigns_fresh_slots() {
        let mut table = EntityTable::new();
        let a = table.spawn();
        let b = table.spawn();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(a.version(), 0);
        assert!(table.is_alive(a));
        assert!(table.is_alive(b));
        assert_eq!(table.count(), 2);
    }

    #[test]
    fn test_reuse_bumps_version() {
        let mut table = EntityTable::new();
        let a = table.spawn();
        let _b = table.spawn();
        assert!(table.despawn(a));

        let c = table.spawn();
        assert_eq!(c.index(), a.index());
        assert_eq!(c.version(), a.version() + 1);
        assert_ne!(c, a);
        assert!(!table.is_alive(a));
        assert!(table.is_alive(c));
    }

    #[test]
    fn test_stale_handle_never_resolves() {
        let mut table = EntityTable::new();
        let a = table.spawn();
        table.despawn(a);
        assert!(!table.is_alive(a));
        assert!(!table.despawn(a));

        let reused = table.spawn();
        assert!(!table.is_alive(a));
        assert!(table.is_alive(reused));
    }

    #[test]
    fn test_churn_keeps_table_size_bounded() {
        let mut table = EntityTable::new();
        let mut batch = Vec::new();
        for _ in 0..10 {
            for _ in 0..1_000 {
                batch.push(table.spawn());
            }
            for entity in batch.drain(..) {
                assert!(table.despawn(entity));
            }
        }
        assert_eq!(table.count(), 0);
        assert!(table.size() <= 1_000);
    }

    #[test]
    fn test_iter_yields_live_entities_in_slot_order() {
        let mut table = EntityTable::new();
        let a = table.spawn();
        let b = table.spawn();
        let c = table.spawn();
        table.despawn(b);

        let live: Vec<Entity> = table.iter().collect();
        assert_eq!(live, vec![a, c]);
    }
}
