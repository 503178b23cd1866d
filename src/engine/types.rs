//! Core identifiers, bit layouts, and component signatures.
//!
//! This module defines the **fundamental types and constants** shared across
//! the registry: entity handle packing, compact component identifiers, and
//! the bitset signatures used for archetype identity and view matching.
//!
//! ## Entity Representation
//!
//! Entities are encoded as a packed 64-bit integer:
//!
//! ```text
//! | version | index |
//! ```
//!
//! - **Index** identifies the slot in the entity table.
//! - **Version** is a reuse counter; it is bumped when a slot is recycled so
//!   stale handles never resolve.
//!
//! The bit widths are compile-time constants validated with static
//! assertions.
//!
//! ## Components and Signatures
//!
//! Component types are identified by compact [`ComponentID`] values assigned
//! at first registration. A [`Signature`] is a fixed-size bitset over those
//! ids; it is the identity of an archetype and the matching predicate of a
//! view. Two signatures built from the same ids in any order are equal, which
//! makes the bitset itself the interning key.

/// Bit-width type used for compile-time layout calculations.
pub type Bits = u8;

/// Packed 64-bit entity identifier.
pub type EntityID = u64;
/// Slot index within the entity table.
pub type IndexID = u32;
/// Reuse counter for an entity slot.
pub type VersionID = u32;
/// Position inside a [`SlotArray`](crate::engine::storage::SlotArray).
pub type SlotPos = u32;

/// Compact identifier for a registered component type.
pub type ComponentID = u16;
/// Identifier for an interned archetype.
pub type ArchetypeID = u32;

/// Total number of bits in an [`EntityID`].
pub const ENTITY_BITS: Bits = 64;
/// Number of bits reserved for entity versioning.
pub const VERSION_BITS: Bits = 32;
/// Number of bits reserved for the entity slot index.
pub const INDEX_BITS: Bits = ENTITY_BITS - VERSION_BITS;

const _: [(); 1] = [(); (INDEX_BITS > 0) as usize];
const _: [(); 1] = [(); (VERSION_BITS > 0) as usize];
const _: [(); 1] =
    [(); (INDEX_BITS as usize + VERSION_BITS as usize == ENTITY_BITS as usize) as usize];

const fn mask(bits: Bits) -> EntityID {
    if bits == 0 { 0 } else { ((1 as EntityID) << bits) - 1 }
}

/// Mask selecting the index portion of an [`EntityID`].
pub const INDEX_MASK: EntityID = mask(INDEX_BITS);
/// Mask selecting the version portion of an [`EntityID`] (after shifting).
pub const VERSION_MASK: EntityID = mask(VERSION_BITS);

/// Version value reserved for invalid entity handles.
///
/// A handle carrying this version never validates; slot reuse skips it when
/// incrementing.
pub const INVALID_VERSION: VersionID = VersionID::MAX;

/// Maximum number of component types a single registry can assign ids to.
pub const COMPONENT_CAP: usize = 1024;
/// Number of `u64` words required to represent a full component signature.
pub const SIGNATURE_WORDS: usize = (COMPONENT_CAP + 63) / 64;

const _: [(); 1] = [(); (COMPONENT_CAP % 64 == 0) as usize];
const _: [(); 1] = [(); (COMPONENT_CAP <= ComponentID::MAX as usize + 1) as usize];

/// Bitset over component ids.
///
/// ## Purpose
/// Describes an unordered set of component types. Archetypes are keyed by
/// their signature; views match archetypes by signature containment and
/// disjointness.
///
/// ## Invariants
/// - Bits at or above the registry's assigned id range are never set.
/// - Equality and hashing are order-independent by construction.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Signature {
    /// Packed component bitset.
    pub words: [u64; SIGNATURE_WORDS],
}

impl Default for Signature {
    fn default() -> Self {
        Self { words: [0u64; SIGNATURE_WORDS] }
    }
}

impl Signature {
    /// Sets the bit corresponding to `component_id`.
    #[inline]
    pub fn set(&mut self, component_id: ComponentID) {
        let word = (component_id as usize) / 64;
        let bit = (component_id as usize) % 64;
        self.words[word] |= 1u64 << bit;
    }

    /// Clears the bit corresponding to `component_id`.
    #[inline]
    pub fn clear(&mut self, component_id: ComponentID) {
        let word = (component_id as usize) / 64;
        let bit = (component_id as usize) % 64;
        self.words[word] &= !(1u64 << bit);
    }

    /// Returns `true` if `component_id` is present in this signature.
    #[inline]
    pub fn has(&self, component_id: ComponentID) -> bool {
        let word = (component_id as usize) / 64;
        let bit = (component_id as usize) % 64;
        (self.words[word] >> bit) & 1 == 1
    }

    /// Returns `true` if no bits are set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Returns the number of component ids present.
    #[inline]
    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Returns `true` if every id in `other` is also present in `self`.
    #[inline]
    pub fn contains_all(&self, other: &Signature) -> bool {
        for (mine, theirs) in self.words.iter().zip(other.words.iter()) {
            if (mine & theirs) != *theirs {
                return false;
            }
        }
        true
    }

    /// Returns `true` if `self` and `other` share no ids.
    #[inline]
    pub fn disjoint(&self, other: &Signature) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| (mine & theirs) == 0)
    }

    /// Iterates over all component ids set in this signature, ascending.
    pub fn iterate_over_components(&self) -> impl Iterator<Item = ComponentID> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let base = word_index * 64;
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some((base + tz) as ComponentID)
            })
        })
    }
}

/// Builds a component signature from a list of component ids.
pub fn build_signature(component_ids: &[ComponentID]) -> Signature {
    let mut signature = Signature::default();
    for &component_id in component_ids {
        signature.set(component_id);
    }
    signature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_set_has_clear() {
        let mut signature = Signature::default();
        assert!(!signature.has(3));
        signature.set(3);
        signature.set(200);
        assert!(signature.has(3));
        assert!(signature.has(200));
        assert_eq!(signature.count(), 2);
        signature.clear(3);
        assert!(!signature.has(3));
        assert_eq!(signature.count(), 1);
    }

    #[test]
    fn test_signature_order_independent_identity() {
        let forward = build_signature(&[1, 2, 70]);
        let backward = build_signature(&[70, 2, 1]);
        assert_eq!(forward, backward);

        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(forward, 7u32);
        assert_eq!(map.get(&backward), Some(&7));
    }

    #[test]
    fn test_signature_contains_all_and_disjoint() {
        let superset = build_signature(&[1, 2, 3, 65]);
        let subset = build_signature(&[2, 65]);
        let other = build_signature(&[4, 100]);

        assert!(superset.contains_all(&subset));
        assert!(!subset.contains_all(&superset));
        assert!(superset.contains_all(&Signature::default()));
        assert!(superset.disjoint(&other));
        assert!(!superset.disjoint(&subset));
    }

    #[test]
    fn test_signature_iteration_is_ascending() {
        let signature = build_signature(&[900, 0, 64, 5]);
        let ids: Vec<ComponentID> = signature.iterate_over_components().collect();
        assert_eq!(ids, vec![0, 5, 64, 900]);
    }

    #[test]
    fn test_empty_signature() {
        let signature = Signature::default();
        assert!(signature.is_empty());
        assert_eq!(signature.count(), 0);
        assert_eq!(signature.iterate_over_components().count(), 0);
    }
}
