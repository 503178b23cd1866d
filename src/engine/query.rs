//! Declarative views and lazy iteration.
//!
//! ## Purpose
//! A [`ViewDescriptor`] declares an include/exclude query over component
//! types. Compiling it against a registry yields a [`View`]: an immutable
//! snapshot of the archetypes matching the descriptor at build time, over
//! which iteration streams entities and their components.
//!
//! ## Iteration model
//! Views iterate archetypes in registration order and membership slots in
//! ascending order; invalidated slots are transparent holes. The archetype
//! *set* is frozen at build — an archetype created afterwards never appears
//! in an existing view — while membership and component values are read
//! live. Views are cheap; rebuild per frame or cache per system.
//!
//! ## Mutation during iteration
//! [`View::each`] hands the body a [`Cursor`] that owns mutable registry
//! access for the duration of the step. Adding or removing components, or
//! destroying the current entity, is permitted mid-iteration: the walk
//! holds only slot indices between steps and re-reads archetype state every
//! step, so no structural change can invalidate it. Component access for an
//! entity destroyed this step reports `MissingComponent`.

use std::any::{type_name, TypeId};

use crate::engine::entity::Entity;
use crate::engine::error::{ECSResult, InvalidViewError};
use crate::engine::registry::Registry;
use crate::engine::types::{build_signature, ArchetypeID, ComponentID, SlotPos};

/// Builder of an include/exclude component query.
///
/// Type names are captured alongside ids-to-be so that an unbuildable
/// descriptor can report every unknown type by name.

#[derive(Clone, Default)]
pub struct ViewDescriptor {
    with: Vec<(TypeId, &'static str)>,
    without: Vec<(TypeId, &'static str)>,
}

impl ViewDescriptor {
    /// Creates an empty descriptor (matches every archetype).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a descriptor whose include list is the component types of
    /// tuple `Q`.
    pub fn of<Q: ComponentTuple<'static>>() -> Self {
        let mut descriptor = Self::new();
        Q::collect_types(&mut descriptor.with);
        descriptor
    }

    /// Requires matched archetypes to contain `T`.
    pub fn with<T: 'static + Send + Sync>(mut self) -> Self {
        let entry = (TypeId::of::<T>(), type_name::<T>());
        if !self.with.contains(&entry) {
            self.with.push(entry);
        }
        self
    }

    /// Excludes archetypes containing `T`.
    pub fn without<T: 'static + Send + Sync>(mut self) -> Self {
        let entry = (TypeId::of::<T>(), type_name::<T>());
        if !self.without.contains(&entry) {
            self.without.push(entry);
        }
        self
    }

    /// Compiles the descriptor against `registry`.
    ///
    /// ## Errors
    /// `InvalidView` when any referenced type has no pool; the error
    /// enumerates every unknown type, include and exclude clauses alike.
    pub fn build(&self, registry: &Registry) -> ECSResult<View> {
        let mut unknown = Vec::new();
        let mut with = Vec::with_capacity(self.with.len());
        let mut without = Vec::with_capacity(self.without.len());

        for &(type_id, name) in &self.with {
            match registry.component_id_for_query(type_id) {
                Some(component_id) => with.push(component_id),
                None => unknown.push(name),
            }
        }
        for &(type_id, name) in &self.without {
            match registry.component_id_for_query(type_id) {
                Some(component_id) => without.push(component_id),
                None => unknown.push(name),
            }
        }
        if !unknown.is_empty() {
            return Err(InvalidViewError { unknown }.into());
        }

        let archetypes =
            registry.matching_archetypes(&build_signature(&with), &build_signature(&without));
        Ok(View { archetypes })
    }
}

/// Immutable snapshot of the archetypes matching a descriptor.

pub struct View {
    archetypes: Vec<ArchetypeID>,
}

impl View {
    /// Number of archetypes captured at build time.
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Current number of entities across the captured archetypes.
    ///
    /// Membership is live: this count reflects entities added to or removed
    /// from the captured archetypes after the view was built.
    pub fn entities_count(&self, registry: &Registry) -> usize {
        self.archetypes
            .iter()
            .filter_map(|&archetype_id| registry.archetype(archetype_id))
            .map(|archetype| archetype.count())
            .sum()
    }

    /// Streams every live entity across the captured archetypes.
    pub fn entities<'r>(&'r self, registry: &'r Registry) -> impl Iterator<Item = Entity> + 'r {
        self.archetypes
            .iter()
            .filter_map(move |&archetype_id| registry.archetype(archetype_id))
            .flat_map(|archetype| archetype.entities().map(|(_, entity)| entity))
    }

    /// Streams entities with a monotonically increasing iteration counter.
    pub fn entities_indexed<'r>(
        &'r self,
        registry: &'r Registry,
    ) -> impl Iterator<Item = (usize, Entity)> + 'r {
        self.entities(registry).enumerate()
    }

    /// Streams tuples of component references for each entity.
    ///
    /// Entities missing any requested component (possible when `Q` asks for
    /// types beyond the include clauses) are skipped.
    pub fn iter<'r, Q: ComponentTuple<'r>>(
        &'r self,
        registry: &'r Registry,
    ) -> impl Iterator<Item = (Entity, Q)> + 'r {
        self.entities(registry)
            .filter_map(move |entity| Q::fetch(registry, entity).ok().map(|tuple| (entity, tuple)))
    }

    /// Group stream: invokes `body` with a [`Cursor`] per visited entity.
    ///
    /// The cursor carries mutable registry access, so the body may mutate
    /// the world — including destroying the entity under the cursor. A
    /// failing body aborts the walk and propagates.
    pub fn each<F>(&self, registry: &mut Registry, mut body: F) -> ECSResult<()>
    where
        F: FnMut(&mut Cursor<'_>) -> ECSResult<()>,
    {
        let mut iteration = 0usize;
        for (position, &archetype_id) in self.archetypes.iter().enumerate() {
            let mut slot: SlotPos = 0;
            loop {
                // Re-read per step: the body may have grown, shrunk, or
                // dropped this archetype.
                let Some(archetype) = registry.archetype(archetype_id) else { break };
                if slot as usize >= archetype.slot_size() {
                    break;
                }
                if let Some(entity) = archetype.entity_at(slot) {
                    let mut cursor = Cursor {
                        registry: &mut *registry,
                        view_archetypes: &self.archetypes,
                        position,
                        archetype_id,
                        slot,
                        entity,
                        iteration,
                        last: None,
                        resolved: Vec::new(),
                    };
                    body(&mut cursor)?;
                    iteration += 1;
                }
                slot += 1;
            }
        }
        Ok(())
    }
}

/// Per-step accessor handed to [`View::each`] bodies.
///
/// Exposes the current entity, its iteration position, and typed component
/// access. Type-to-id resolution is memoized for the duration of the step,
/// so repeated access to the same component inside one body is a direct
/// pool index after the first fetch. The memo is fresh on every step.

pub struct Cursor<'r> {
    registry: &'r mut Registry,
    view_archetypes: &'r [ArchetypeID],
    position: usize,
    archetype_id: ArchetypeID,
    slot: SlotPos,
    entity: Entity,
    iteration: usize,
    last: Option<bool>,
    resolved: Vec<(TypeId, ComponentID)>,
}

impl<'r> Cursor<'r> {
    /// The entity under the cursor.
    #[inline]
    pub fn entity(&self) -> Entity {
        self.entity
    }

    /// Zero-based position in the overall iteration.
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Returns `true` on the first step of the iteration.
    #[inline]
    pub fn is_first(&self) -> bool {
        self.iteration == 0
    }

    /// The archetype the current entity was visited in.
    #[inline]
    pub fn archetype_id(&self) -> ArchetypeID {
        self.archetype_id
    }

    /// The membership slot the current entity was visited at.
    #[inline]
    pub fn slot(&self) -> SlotPos {
        self.slot
    }

    /// Returns `true` when no further live entity follows in the view.
    ///
    /// Computed lazily by a one-shot forward scan over the remaining slots
    /// and archetypes, then memoized for the step.
    pub fn is_last(&mut self) -> bool {
        if let Some(last) = self.last {
            return last;
        }
        let mut more = false;
        if let Some(archetype) = self.registry.archetype(self.archetype_id) {
            let size = archetype.slot_size();
            let mut pos = self.slot + 1;
            while (pos as usize) < size {
                if archetype.entity_at(pos).is_some() {
                    more = true;
                    break;
                }
                pos += 1;
            }
        }
        if !more {
            for &archetype_id in &self.view_archetypes[self.position + 1..] {
                if let Some(archetype) = self.registry.archetype(archetype_id) {
                    if archetype.count() > 0 {
                        more = true;
                        break;
                    }
                }
            }
        }
        let last = !more;
        self.last = Some(last);
        last
    }

    /// Returns the current entity's `T`.
    ///
    /// ## Errors
    /// `InvalidComponent` when no pool for `T` exists; `MissingComponent`
    /// when the entity owns no value (including after being destroyed
    /// earlier in this step).
    pub fn get<T: 'static + Send + Sync>(&mut self) -> ECSResult<&T> {
        let component_id = self.resolve::<T>()?;
        self.registry.component_by_id(component_id, self.entity.index())
    }

    /// Mutable variant of [`Cursor::get`].
    pub fn get_mut<T: 'static + Send + Sync>(&mut self) -> ECSResult<&mut T> {
        let component_id = self.resolve::<T>()?;
        self.registry.component_by_id_mut(component_id, self.entity.index())
    }

    /// Returns `true` if the current entity owns a `T`. Never raises.
    pub fn has<T: 'static + Send + Sync>(&mut self) -> bool {
        match self.resolve::<T>() {
            Ok(component_id) => self
                .registry
                .has_component_index(component_id, self.entity.index()),
            Err(_) => false,
        }
    }

    /// Mutable access to the world for structural changes mid-iteration:
    /// destroying the current entity, spawning, enqueueing systems,
    /// requesting a restart.
    pub fn registry(&mut self) -> &mut Registry {
        self.registry
    }

    fn resolve<T: 'static + Send + Sync>(&mut self) -> ECSResult<ComponentID> {
        let type_id = TypeId::of::<T>();
        if let Some(&(_, component_id)) =
            self.resolved.iter().find(|(cached, _)| *cached == type_id)
        {
            return Ok(component_id);
        }
        let component_id = self
            .registry
            .component_id_for_query(type_id)
            .ok_or(crate::engine::error::InvalidComponentError { name: type_name::<T>() })?;
        self.resolved.push((type_id, component_id));
        Ok(component_id)
    }
}

/// Heterogeneous tuple of component references, arities 1 through 9.
///
/// The compile-time replacement for spelled-out per-arity overloads: one
/// macro derives the include-type list and the fetch logic for every tuple
/// shape.
pub trait ComponentTuple<'r>: Sized {
    /// Appends `(TypeId, name)` pairs for each element type, in order.
    fn collect_types(out: &mut Vec<(TypeId, &'static str)>);

    /// Resolves each element for `entity`, in declaration order.
    ///
    /// ## Errors
    /// The registry `get` taxonomy, reported for the first unresolvable
    /// element.
    fn fetch(registry: &'r Registry, entity: Entity) -> ECSResult<Self>;
}

macro_rules! impl_component_tuple {
    ($($component:ident),+) => {
        impl<'r, $($component: 'static + Send + Sync),+> ComponentTuple<'r>
            for ($(&'r $component,)+)
        {
            fn collect_types(out: &mut Vec<(TypeId, &'static str)>) {
                $(out.push((TypeId::of::<$component>(), type_name::<$component>()));)+
            }

            fn fetch(registry: &'r Registry, entity: Entity) -> ECSResult<Self> {
                Ok(($(registry.get::<$component>(entity)?,)+))
            }
        }
    };
}

impl_component_tuple!(A);
impl_component_tuple!(A, B);
impl_component_tuple!(A, B, C);
impl_component_tuple!(A, B, C, D);
impl_component_tuple!(A, B, C, D, E);
impl_component_tuple!(A, B, C, D, E, F);
impl_component_tuple!(A, B, C, D, E, F, G);
impl_component_tuple!(A, B, C, D, E, F, G, H);
impl_component_tuple!(A, B, C, D, E, F, G, H, I);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::error::ECSError;

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Vel {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Frozen;

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    struct Missing;

    fn moving_world(count: usize) -> (Registry, Vec<Entity>) {
        let mut registry = Registry::new();
        let mut entities = Vec::new();
        for i in 0..count {
            let entity = registry.spawn();
            registry.add(entity, Pos { x: i as f32, y: 0.0 }).unwrap();
            registry.add(entity, Vel { x: 1.0, y: 0.0 }).unwrap();
            entities.push(entity);
        }
        (registry, entities)
    }

    #[test]
    fn test_each_applies_velocity() {
        let mut registry = Registry::new();
        let entity = registry.spawn_with(Pos { x: 0.0, y: 0.0 }).unwrap();
        registry.add(entity, Vel { x: 1.0, y: 0.0 }).unwrap();

        let view = ViewDescriptor::new()
            .with::<Pos>()
            .with::<Vel>()
            .build(&registry)
            .unwrap();
        assert_eq!(view.entities_count(&registry), 1);

        view.each(&mut registry, |cursor| {
            let vel = *cursor.get::<Vel>()?;
            let pos = cursor.get_mut::<Pos>()?;
            pos.x += vel.x;
            pos.y += vel.y;
            Ok(())
        })
        .unwrap();

        assert_eq!(registry.get::<Pos>(entity).unwrap(), &Pos { x: 1.0, y: 0.0 });
    }

    #[test]
    fn test_registered_but_unowned_type_builds_empty_view() {
        let mut registry = Registry::new();
        registry.register::<Missing>().unwrap();

        let view = ViewDescriptor::new().with::<Missing>().build(&registry).unwrap();
        assert_eq!(view.archetype_count(), 0);
        assert_eq!(view.entities_count(&registry), 0);
        assert_eq!(view.entities(&registry).count(), 0);
    }

    #[test]
    fn test_unregistered_type_fails_build_naming_it() {
        let registry = Registry::new();
        let result = ViewDescriptor::new().with::<Missing>().build(&registry);
        match result {
            Err(ECSError::InvalidView(e)) => {
                assert_eq!(e.unknown.len(), 1);
                assert!(e.unknown[0].contains("Missing"));
            }
            other => panic!("expected InvalidView, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_without_excludes_archetypes() {
        let mut registry = Registry::new();
        let plain = registry.spawn_with(Pos::default()).unwrap();
        let frozen = registry.spawn_with(Pos::default()).unwrap();
        registry.add(frozen, Frozen).unwrap();

        let view = ViewDescriptor::new()
            .with::<Pos>()
            .without::<Frozen>()
            .build(&registry)
            .unwrap();
        let visited: Vec<Entity> = view.entities(&registry).collect();
        assert_eq!(visited, vec![plain]);
    }

    #[test]
    fn test_archetype_set_is_snapshot_membership_is_live() {
        let mut registry = Registry::new();
        let first = registry.spawn_with(Pos::default()).unwrap();
        let view = ViewDescriptor::new().with::<Pos>().build(&registry).unwrap();

        // lands in a brand-new {Pos, Vel} archetype: invisible to the view
        let second = registry.spawn_with(Pos::default()).unwrap();
        registry.add(second, Vel::default()).unwrap();
        // lands in the captured {Pos} archetype: visible (live membership)
        let third = registry.spawn_with(Pos::default()).unwrap();

        let visited: Vec<Entity> = view.entities(&registry).collect();
        assert_eq!(visited, vec![first, third]);

        // rebuilding captures the new archetype
        let rebuilt = ViewDescriptor::new().with::<Pos>().build(&registry).unwrap();
        assert_eq!(rebuilt.entities_count(&registry), 3);
    }

    #[test]
    fn test_view_built_before_any_entity_stays_empty() {
        let mut registry = Registry::new();
        registry.register::<Pos>().unwrap();
        let view = ViewDescriptor::new().with::<Pos>().build(&registry).unwrap();

        let _entity = registry.spawn_with(Pos::default()).unwrap();
        assert_eq!(view.entities(&registry).count(), 0);

        let rebuilt = ViewDescriptor::new().with::<Pos>().build(&registry).unwrap();
        assert_eq!(rebuilt.entities(&registry).count(), 1);
    }

    #[test]
    fn test_destroy_current_entity_mid_iteration() {
        let (mut registry, entities) = moving_world(3);
        let doomed = entities[1];
        let view = registry.view_of::<(&Pos,)>().unwrap();

        let mut visited = Vec::new();
        view.each(&mut registry, |cursor| {
            let entity = cursor.entity();
            visited.push(entity);
            if entity == doomed {
                cursor.registry().despawn(entity)?;
                // component access after the destroy reports absence
                assert!(matches!(
                    cursor.get::<Pos>(),
                    Err(ECSError::MissingComponent(_))
                ));
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(visited, entities);
        assert!(!registry.is_alive(doomed));
        assert_eq!(registry.entities_count(), 2);
    }

    #[test]
    fn test_cursor_positions_and_lazy_is_last() {
        let (mut registry, entities) = moving_world(3);
        let view = registry.view_of::<(&Pos,)>().unwrap();

        let mut log = Vec::new();
        view.each(&mut registry, |cursor| {
            log.push((cursor.entity(), cursor.iteration(), cursor.is_first(), cursor.is_last()));
            Ok(())
        })
        .unwrap();

        assert_eq!(
            log,
            vec![
                (entities[0], 0, true, false),
                (entities[1], 1, false, false),
                (entities[2], 2, false, true),
            ]
        );
    }

    #[test]
    fn test_each_skips_invalidated_slots() {
        let (mut registry, entities) = moving_world(3);
        registry.despawn(entities[1]).unwrap();

        let view = registry.view_of::<(&Pos,)>().unwrap();
        let visited: Vec<Entity> = view.entities(&registry).collect();
        assert_eq!(visited, vec![entities[0], entities[2]]);

        let mut stepped = Vec::new();
        view.each(&mut registry, |cursor| {
            stepped.push(cursor.entity());
            Ok(())
        })
        .unwrap();
        assert_eq!(stepped, visited);
    }

    #[test]
    fn test_structural_change_mid_iteration_visits_each_entity_once() {
        let (mut registry, entities) = moving_world(3);
        registry.register::<Frozen>().unwrap();
        let view = ViewDescriptor::new()
            .with::<Pos>()
            .without::<Frozen>()
            .build(&registry)
            .unwrap();

        let mut visits = 0;
        view.each(&mut registry, |cursor| {
            visits += 1;
            let entity = cursor.entity();
            // moves the entity into a {Pos, Vel, Frozen} archetype outside the view
            cursor.registry().add(entity, Frozen)?;
            Ok(())
        })
        .unwrap();

        assert_eq!(visits, entities.len());
        for entity in entities {
            assert!(registry.has::<Frozen>(entity));
        }
    }

    #[test]
    fn test_tuple_stream_and_indexed_stream() {
        let (registry, entities) = moving_world(2);
        let view = registry.view_of::<(&Pos, &Vel)>().unwrap();

        let tuples: Vec<(Entity, (&Pos, &Vel))> = view.iter(&registry).collect();
        assert_eq!(tuples.len(), 2);
        assert_eq!(tuples[0].0, entities[0]);
        assert_eq!(tuples[0].1 .0, &Pos { x: 0.0, y: 0.0 });
        assert_eq!(tuples[1].1 .1, &Vel { x: 1.0, y: 0.0 });

        let indexed: Vec<(usize, Entity)> = view.entities_indexed(&registry).collect();
        assert_eq!(indexed, vec![(0, entities[0]), (1, entities[1])]);
    }

    #[test]
    fn test_cursor_memoizes_type_resolution() {
        let (mut registry, _) = moving_world(1);
        let view = registry.view_of::<(&Pos,)>().unwrap();
        view.each(&mut registry, |cursor| {
            for _ in 0..3 {
                let _ = cursor.get::<Pos>()?;
            }
            assert_eq!(cursor.resolved.len(), 1);
            assert!(cursor.has::<Vel>());
            assert_eq!(cursor.resolved.len(), 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_failing_body_aborts_and_propagates() {
        let (mut registry, _) = moving_world(3);
        let view = registry.view_of::<(&Pos,)>().unwrap();

        let mut visits = 0;
        let result = view.each(&mut registry, |cursor| {
            visits += 1;
            cursor.get::<Missing>().map(|_| ())
        });
        assert!(matches!(result, Err(ECSError::InvalidComponent(_))));
        assert_eq!(visits, 1);
    }
}
