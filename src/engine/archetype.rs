//! Archetypes and the archetype index.
//!
//! ## Purpose
//! An archetype represents exactly one unordered set of component types and
//! owns the membership list of entities currently possessing that exact
//! shape. The [`ArchetypeIndex`] interns archetypes by signature so two
//! constructions of the same type-set always resolve to the same archetype.
//!
//! ## Design
//! - Archetype identity is the [`Signature`] bitset itself; equality and
//!   hashing over the bitset make interning order-independent for free.
//! - Archetypes hold no storage references. Component values stay in their
//!   per-type pools; the registry resolves pools by id when it needs them.
//!   This keeps ownership acyclic: the registry owns pools and archetypes,
//!   archetypes know only ids.
//! - Membership is a [`SlotArray`] with invalidation: removing an entity
//!   marks its slot invalid without compacting, so slot indices observed by
//!   an in-flight view iteration stay stable; the hole is reused by a later
//!   insertion.
//!
//! ## Invariants
//! - The signature is frozen at creation.
//! - Archetype ids are assigned in creation order and never reused, so
//!   ascending id order *is* registration order.
//! - Two live archetypes never share a signature.

use std::collections::HashMap;

use crate::engine::entity::Entity;
use crate::engine::storage::SlotArray;
use crate::engine::types::{ArchetypeID, ComponentID, Signature, SlotPos};

/// Stores the entities sharing one exact component type-set.

pub struct Archetype {
    archetype_id: ArchetypeID,
    signature: Signature,
    entities: SlotArray<Entity>,
}

impl Archetype {
    fn new(archetype_id: ArchetypeID, signature: Signature) -> Self {
        Self {
            archetype_id,
            signature,
            entities: SlotArray::new(true),
        }
    }

    /// Returns the identifier assigned to this archetype.
    ///
    /// ## Notes
    /// Stable for the lifetime of the archetype.
    #[inline]
    pub fn archetype_id(&self) -> ArchetypeID {
        self.archetype_id
    }

    /// Returns the archetype's component type-set.
    #[inline]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Returns `true` if this archetype's type-set includes `component_id`.
    #[inline]
    pub fn contains(&self, component_id: ComponentID) -> bool {
        self.signature.has(component_id)
    }

    /// Returns `true` if this archetype satisfies an include/exclude query.
    #[inline]
    pub fn matches(&self, with: &Signature, without: &Signature) -> bool {
        self.signature.contains_all(with) && self.signature.disjoint(without)
    }

    /// Number of member entities, excluding invalidated slots.
    #[inline]
    pub fn count(&self) -> usize {
        self.entities.count()
    }

    /// Highest membership slot ever used plus one.
    ///
    /// Iteration walks `0..slot_size()` and skips invalidated slots.
    #[inline]
    pub fn slot_size(&self) -> usize {
        self.entities.size()
    }

    /// Returns the entity at membership slot `pos`, if that slot is live.
    #[inline]
    pub fn entity_at(&self, pos: SlotPos) -> Option<Entity> {
        self.entities.try_get(pos).copied()
    }

    /// Iterates live members in ascending slot order.
    pub fn entities(&self) -> impl Iterator<Item = (SlotPos, Entity)> + '_ {
        self.entities.iter().map(|(pos, entity)| (pos, *entity))
    }

    /// Adds `entity` to the membership list, reusing a hole if one exists.
    pub(crate) fn insert(&mut self, entity: Entity) -> SlotPos {
        debug_assert!(self.entities.position_of(&entity).is_none());
        self.entities.add(entity)
    }

    /// Removes `entity`, leaving an invalidated hole in its slot.
    ///
    /// Linear scan of the membership list; never compacts. Returns `false`
    /// when the entity is not a member.
    pub(crate) fn remove(&mut self, entity: Entity) -> bool {
        match self.entities.position_of(&entity) {
            Some(pos) => self.entities.remove_at(pos),
            None => false,
        }
    }
}

/// Interning table of archetypes, keyed by signature.
///
/// ## Design
/// Archetypes live in a tombstoned vector indexed by [`ArchetypeID`], so
/// ids held by views and entity routing stay valid when cleanup drops an
/// archetype. Dropped slots are never reused; a recreated type-set gets a
/// fresh id at the end of the vector.

#[derive(Default)]
pub struct ArchetypeIndex {
    archetypes: Vec<Option<Archetype>>,
    by_signature: HashMap<Signature, ArchetypeID>,
}

impl ArchetypeIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the archetype for `signature`, creating it on first sight.
    pub fn get_or_create(&mut self, signature: Signature) -> ArchetypeID {
        debug_assert!(!signature.is_empty());
        if let Some(&archetype_id) = self.by_signature.get(&signature) {
            return archetype_id;
        }
        let archetype_id = self.archetypes.len() as ArchetypeID;
        self.by_signature.insert(signature, archetype_id);
        self.archetypes.push(Some(Archetype::new(archetype_id, signature)));
        archetype_id
    }

    /// Pure lookup of the archetype for `signature`.
    pub fn get(&self, signature: &Signature) -> Option<ArchetypeID> {
        self.by_signature.get(signature).copied()
    }

    /// Returns the archetype with `archetype_id`, if still live.
    #[inline]
    pub fn archetype(&self, archetype_id: ArchetypeID) -> Option<&Archetype> {
        self.archetypes.get(archetype_id as usize)?.as_ref()
    }

    /// Mutable variant of [`ArchetypeIndex::archetype`].
    #[inline]
    pub fn archetype_mut(&mut self, archetype_id: ArchetypeID) -> Option<&mut Archetype> {
        self.archetypes.get_mut(archetype_id as usize)?.as_mut()
    }

    /// Returns every archetype matching an include/exclude query, in
    /// registration order.
    ///
    /// Linear scan: an archetype matches when it contains every id in
    /// `with` and none in `without`.
    pub fn matching(&self, with: &Signature, without: &Signature) -> Vec<ArchetypeID> {
        self.archetypes
            .iter()
            .flatten()
            .filter(|archetype| archetype.matches(with, without))
            .map(|archetype| archetype.archetype_id())
            .collect()
    }

    /// Removes every archetype whose type-set mentions `component_id`.
    ///
    /// Collects the doomed set before mutating, then tombstones each entry.
    /// Returns the number of archetypes dropped.
    pub fn drop_with(&mut self, component_id: ComponentID) -> usize {
        let doomed: Vec<ArchetypeID> = self
            .archetypes
            .iter()
            .flatten()
            .filter(|archetype| archetype.contains(component_id))
            .map(|archetype| archetype.archetype_id())
            .collect();

        for archetype_id in &doomed {
            if let Some(archetype) = self.archetypes[*archetype_id as usize].take() {
                debug_assert_eq!(archetype.count(), 0);
                self.by_signature.remove(archetype.signature());
            }
        }
        doomed.len()
    }

    /// Number of live archetypes.
    pub fn len(&self) -> usize {
        self.archetypes.iter().flatten().count()
    }

    /// Returns `true` if no archetype is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates live archetypes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> + '_ {
        self.archetypes.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::build_signature;

    fn entity(raw: u64) -> Entity {
        Entity(raw)
    }

    #[test]
    fn test_interning_is_order_independent() {
        let mut index = ArchetypeIndex::new();
        let ab = index.get_or_create(build_signature(&[0, 1]));
        let ba = index.get_or_create(build_signature(&[1, 0]));
        assert_eq!(ab, ba);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_ids_follow_registration_order() {
        let mut index = ArchetypeIndex::new();
        let first = index.get_or_create(build_signature(&[0]));
        let second = index.get_or_create(build_signature(&[1]));
        let third = index.get_or_create(build_signature(&[0, 1]));
        assert!(first < second && second < third);
        assert_eq!(index.get(&build_signature(&[1])), Some(second));
        assert_eq!(index.get(&build_signature(&[2])), None);
    }

    #[test]
    fn test_matching_with_and_without() {
        let mut index = ArchetypeIndex::new();
        let a = index.get_or_create(build_signature(&[0]));
        let ab = index.get_or_create(build_signature(&[0, 1]));
        let abc = index.get_or_create(build_signature(&[0, 1, 2]));

        let with_a = index.matching(&build_signature(&[0]), &Signature::default());
        assert_eq!(with_a, vec![a, ab, abc]);

        let with_a_not_c = index.matching(&build_signature(&[0]), &build_signature(&[2]));
        assert_eq!(with_a_not_c, vec![a, ab]);

        let with_ab = index.matching(&build_signature(&[1, 0]), &Signature::default());
        assert_eq!(with_ab, vec![ab, abc]);
    }

    #[test]
    fn test_membership_slots_never_compact() {
        let mut index = ArchetypeIndex::new();
        let id = index.get_or_create(build_signature(&[0]));
        let archetype = index.archetype_mut(id).unwrap();

        let slot_a = archetype.insert(entity(1));
        let slot_b = archetype.insert(entity(2));
        let slot_c = archetype.insert(entity(3));

        assert!(archetype.remove(entity(2)));
        assert!(!archetype.remove(entity(2)));
        assert_eq!(archetype.count(), 2);
        assert_eq!(archetype.slot_size(), 3);
        assert_eq!(archetype.entity_at(slot_b), None);
        assert_eq!(archetype.entity_at(slot_a), Some(entity(1)));
        assert_eq!(archetype.entity_at(slot_c), Some(entity(3)));

        // the invalidated hole is reused by the next insertion
        assert_eq!(archetype.insert(entity(4)), slot_b);
        assert_eq!(archetype.count(), 3);
    }

    #[test]
    fn test_drop_with_tombstones_and_preserves_other_ids() {
        let mut index = ArchetypeIndex::new();
        let a = index.get_or_create(build_signature(&[0]));
        let ab = index.get_or_create(build_signature(&[0, 1]));
        let b = index.get_or_create(build_signature(&[1]));

        let dropped = index.drop_with(0);
        assert_eq!(dropped, 2);
        assert!(index.archetype(a).is_none());
        assert!(index.archetype(ab).is_none());
        assert!(index.archetype(b).is_some());
        assert_eq!(index.len(), 1);

        // recreating the type-set yields a fresh id, never a reused one
        let recreated = index.get_or_create(build_signature(&[0]));
        assert!(recreated > b);
    }
}
