//! The registry: entity lifecycle, component mutation, and view factories.
//!
//! ## Purpose
//! `Registry` is the single owner of all world state — the entity table,
//! every component pool, the archetype index, and the entity-to-archetype
//! routing — and the single public surface through which that state is
//! mutated.
//!
//! ## Design
//! - Every structural change (adding or removing a component, destroying an
//!   entity) flows through one place: the pool is updated first, then the
//!   entity is re-routed between archetypes, so the three structures can
//!   never drift apart.
//! - Pools and archetypes hold no back-references; archetypes know component
//!   ids and the registry resolves them, keeping ownership a strict tree.
//! - Destroying an entity deletes its values only from the pools its
//!   archetype references — never a scan over all pools.
//! - The registry also hosts the scheduler's pending one-shot queues and the
//!   deferred-restart request flag, so system bodies (which reach the world
//!   through their cursor) can legally enqueue work and request restarts
//!   mid-phase.
//!
//! ## Validation
//! Every entity-accepting operation validates the handle first: the entity
//! table slot at `entity.index()` must hold exactly that handle. Stale
//! handles surface as `InvalidEntity`; the probing surface (`get_opt`,
//! `has`, `pool_exists`) is the non-raising alternative.

use std::any::{type_name, TypeId};
use std::collections::VecDeque;
use std::mem;

use tracing::debug;

use crate::engine::archetype::{Archetype, ArchetypeIndex};
use crate::engine::component::{ComponentDesc, ComponentPool, ComponentRegistry, TypeErasedPool};
use crate::engine::entity::{Entity, EntityTable};
use crate::engine::error::{
    ECSResult, InvalidComponentError, InvalidEntityError, MissingComponentError,
};
use crate::engine::query::{ComponentTuple, View, ViewDescriptor};
use crate::engine::systems::System;
use crate::engine::types::{ArchetypeID, ComponentID, IndexID, Signature};

/// Owner of all world state and the public mutation/query surface.

#[derive(Default)]
pub struct Registry {
    entities: EntityTable,
    components: ComponentRegistry,
    pools: Vec<Option<Box<dyn TypeErasedPool>>>,
    archetypes: ArchetypeIndex,
    routing: Vec<Option<ArchetypeID>>,
    pending_single_frame: VecDeque<Box<dyn System>>,
    pending_pre_process: VecDeque<Box<dyn System>>,
    pending_post_process: VecDeque<Box<dyn System>>,
    restart_requested: bool,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Entity lifecycle ────────────────────────────────────────────────

    /// Creates a new entity with no components.
    ///
    /// Reuses the most recently freed table slot; the handle's version is
    /// the retained version plus one, so a stale handle to the previous
    /// occupant never resolves.
    pub fn spawn(&mut self) -> Entity {
        let entity = self.entities.spawn();
        let index = entity.index() as usize;
        if self.routing.len() <= index {
            self.routing.resize(index + 1, None);
        }
        entity
    }

    /// Creates an entity owning one component value.
    pub fn spawn_with<T: 'static + Send + Sync>(&mut self, value: T) -> ECSResult<Entity> {
        let entity = self.spawn();
        self.add(entity, value)?;
        Ok(entity)
    }

    /// Creates an entity owning one default-constructed component.
    pub fn spawn_with_default<T: Default + 'static + Send + Sync>(&mut self) -> ECSResult<Entity> {
        self.spawn_with(T::default())
    }

    /// Destroys an entity, dropping every component value it owns.
    ///
    /// ## Behavior
    /// - Removes the entity from its archetype (leaving an invalidated
    ///   membership hole, stable for in-flight iteration).
    /// - Deletes its value from each pool the archetype references.
    /// - Frees the table slot, retaining the version for the next occupant.
    ///
    /// ## Errors
    /// `InvalidEntity` when the handle fails validation.
    pub fn despawn(&mut self, entity: Entity) -> ECSResult<()> {
        self.validate(entity)?;
        let index = entity.index() as usize;
        if let Some(archetype_id) = self.routing[index].take() {
            let signature = self
                .archetypes
                .archetype(archetype_id)
                .map(|archetype| *archetype.signature())
                .unwrap_or_default();
            if let Some(archetype) = self.archetypes.archetype_mut(archetype_id) {
                archetype.remove(entity);
            }
            for component_id in signature.iterate_over_components() {
                if let Some(pool) = self.pool_by_id_mut(component_id) {
                    pool.delete(entity.index());
                }
            }
        }
        self.entities.despawn(entity);
        Ok(())
    }

    /// Checks `table[entity.index()] == entity`.
    ///
    /// ## Errors
    /// `InvalidEntity` when the slot is out of range, not live, or holds a
    /// different version.
    pub fn validate(&self, entity: Entity) -> ECSResult<()> {
        if self.entities.is_alive(entity) {
            return Ok(());
        }
        Err(InvalidEntityError { index: entity.index(), version: entity.version() }.into())
    }

    /// Returns `true` if `entity` is live. Never raises.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entities_count(&self) -> usize {
        self.entities.count()
    }

    // ── Component registration ──────────────────────────────────────────

    /// Registers component type `T`, pre-creating its pool.
    ///
    /// Components are normally registered by being used; explicit
    /// registration exists so a view over a type no entity owns yet can be
    /// built without raising `InvalidView`. Idempotent; the assigned id is
    /// stable for the registry's lifetime, even across [`Registry::clean`].
    pub fn register<T: 'static + Send + Sync>(&mut self) -> ECSResult<ComponentID> {
        let component_id = self.components.register::<T>()?;
        let index = component_id as usize;
        if self.pools.len() <= index {
            self.pools.resize_with(index + 1, || None);
        }
        if self.pools[index].is_none() {
            self.pools[index] = Some(Box::new(ComponentPool::<T>::new(component_id)));
        }
        Ok(component_id)
    }

    /// Returns `true` if a pool for `T` currently exists. Never raises.
    pub fn pool_exists<T: 'static + Send + Sync>(&self) -> bool {
        self.components
            .id_of::<T>()
            .map_or(false, |id| self.pools.get(id as usize).map_or(false, Option::is_some))
    }

    /// Number of live component pools.
    pub fn component_pools_count(&self) -> usize {
        self.pools.iter().flatten().count()
    }

    /// Returns the descriptor recorded for `T`, if registered.
    pub fn description_of<T: 'static + Send + Sync>(&self) -> Option<&ComponentDesc> {
        let component_id = self.components.id_of::<T>()?;
        self.components.description(component_id)
    }

    // ── Component mutation ──────────────────────────────────────────────

    /// Associates `value` with `entity`, moving it to the wider archetype.
    ///
    /// ## Behavior
    /// Idempotent: when the entity already owns a `T`, this is a no-op and
    /// the first value wins. Registers `T` implicitly on first use.
    ///
    /// ## Errors
    /// `InvalidEntity` when the handle fails validation.
    pub fn add<T: 'static + Send + Sync>(&mut self, entity: Entity, value: T) -> ECSResult<()> {
        self.validate(entity)?;
        let component_id = self.register::<T>()?;
        {
            let pool = self.typed_pool_mut::<T>()?;
            if pool.has(entity.index()) {
                return Ok(());
            }
            pool.add(entity.index(), value);
        }
        let mut signature = self.signature_of(entity);
        signature.set(component_id);
        self.route(entity, signature);
        Ok(())
    }

    /// Adds a default-constructed `T` to `entity`.
    pub fn add_default<T: Default + 'static + Send + Sync>(
        &mut self,
        entity: Entity,
    ) -> ECSResult<()> {
        self.add(entity, T::default())
    }

    /// Writes `value` over the entity's `T`, inserting when absent.
    ///
    /// The overwriting counterpart of [`Registry::add`]: an existing value
    /// is replaced in place (no structural change); an absent one is
    /// inserted with the usual archetype transition.
    pub fn set<T: 'static + Send + Sync>(&mut self, entity: Entity, value: T) -> ECSResult<()> {
        self.validate(entity)?;
        let component_id = self.register::<T>()?;
        let inserted = {
            let pool = self.typed_pool_mut::<T>()?;
            match pool.get_mut(entity.index()) {
                Some(slot) => {
                    *slot = value;
                    false
                }
                None => {
                    pool.add(entity.index(), value);
                    true
                }
            }
        };
        if inserted {
            let mut signature = self.signature_of(entity);
            signature.set(component_id);
            self.route(entity, signature);
        }
        Ok(())
    }

    /// Writes a default-constructed `T`, inserting when absent.
    pub fn set_default<T: Default + 'static + Send + Sync>(
        &mut self,
        entity: Entity,
    ) -> ECSResult<()> {
        self.set(entity, T::default())
    }

    /// Returns the entity's `T`.
    ///
    /// ## Errors
    /// - `InvalidEntity` when the handle fails validation.
    /// - `InvalidComponent` when no pool for `T` exists.
    /// - `MissingComponent` when the pool exists but the entity owns no
    ///   value.
    pub fn get<T: 'static + Send + Sync>(&self, entity: Entity) -> ECSResult<&T> {
        self.validate(entity)?;
        self.typed_pool::<T>()?
            .get(entity.index())
            .ok_or_else(|| missing::<T>(entity.index()).into())
    }

    /// Mutable variant of [`Registry::get`], for in-place updates.
    ///
    /// ## Errors
    /// Same taxonomy as [`Registry::get`]; an absent value raises
    /// `MissingComponent` rather than yielding any shared fallback slot.
    pub fn get_mut<T: 'static + Send + Sync>(&mut self, entity: Entity) -> ECSResult<&mut T> {
        self.validate(entity)?;
        let index = entity.index();
        self.typed_pool_mut::<T>()?
            .get_mut(index)
            .ok_or_else(|| missing::<T>(index).into())
    }

    /// Non-raising read: `Ok(None)` when the pool or value is absent.
    ///
    /// ## Errors
    /// Only `InvalidEntity`; component absence is the `None` it exists to
    /// report.
    pub fn get_opt<T: 'static + Send + Sync>(&self, entity: Entity) -> ECSResult<Option<&T>> {
        self.validate(entity)?;
        Ok(self
            .typed_pool::<T>()
            .ok()
            .and_then(|pool| pool.get(entity.index())))
    }

    /// Returns the entity's `T`, inserting a default first when absent.
    pub fn get_or_create<T: Default + 'static + Send + Sync>(
        &mut self,
        entity: Entity,
    ) -> ECSResult<&T> {
        let value: &mut T = self.get_or_create_mut(entity)?;
        Ok(value)
    }

    /// Mutable variant of [`Registry::get_or_create`].
    pub fn get_or_create_mut<T: Default + 'static + Send + Sync>(
        &mut self,
        entity: Entity,
    ) -> ECSResult<&mut T> {
        self.validate(entity)?;
        if !self.has::<T>(entity) {
            self.add(entity, T::default())?;
        }
        self.get_mut(entity)
    }

    /// Returns `true` if `entity` owns a `T`. Never raises.
    pub fn has<T: 'static + Send + Sync>(&self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        self.typed_pool::<T>()
            .map_or(false, |pool| pool.has(entity.index()))
    }

    /// Number of components the entity currently owns.
    pub fn components_count(&self, entity: Entity) -> ECSResult<usize> {
        self.validate(entity)?;
        Ok(self.signature_of(entity).count())
    }

    /// Returns `true` if the entity owns no components.
    pub fn is_empty(&self, entity: Entity) -> ECSResult<bool> {
        Ok(self.components_count(entity)? == 0)
    }

    /// Detaches `T` from `entity`, dropping the value.
    ///
    /// Removes when present; a no-op when the entity owns no `T` (the pool
    /// must still exist). The entity transitions to the narrower archetype,
    /// leaving archetype tracking entirely when no components remain.
    ///
    /// ## Errors
    /// - `InvalidEntity` when the handle fails validation.
    /// - `InvalidComponent` when no pool for `T` exists.
    pub fn remove<T: 'static + Send + Sync>(&mut self, entity: Entity) -> ECSResult<()> {
        self.validate(entity)?;
        let component_id = self
            .components
            .id_of::<T>()
            .ok_or(InvalidComponentError { name: type_name::<T>() })?;
        let removed = self.typed_pool_mut::<T>()?.remove(entity.index()).is_some();
        if removed {
            let mut signature = self.signature_of(entity);
            signature.clear(component_id);
            self.route(entity, signature);
        }
        Ok(())
    }

    /// Detaches `T` and returns the value it held.
    ///
    /// ## Errors
    /// As [`Registry::remove`], plus `MissingComponent` when the entity
    /// owns no value to hand back.
    pub fn get_and_remove<T: 'static + Send + Sync>(&mut self, entity: Entity) -> ECSResult<T> {
        self.validate(entity)?;
        let component_id = self
            .components
            .id_of::<T>()
            .ok_or(InvalidComponentError { name: type_name::<T>() })?;
        let index = entity.index();
        let value = self
            .typed_pool_mut::<T>()?
            .remove(index)
            .ok_or_else(|| missing::<T>(index))?;
        let mut signature = self.signature_of(entity);
        signature.clear(component_id);
        self.route(entity, signature);
        Ok(value)
    }

    /// Detaches every component the entity owns.
    ///
    /// The entity stays alive with an empty shape.
    pub fn remove_all(&mut self, entity: Entity) -> ECSResult<()> {
        self.validate(entity)?;
        let signature = self.signature_of(entity);
        for component_id in signature.iterate_over_components() {
            if let Some(pool) = self.pool_by_id_mut(component_id) {
                pool.delete(entity.index());
            }
        }
        self.route(entity, Signature::default());
        Ok(())
    }

    /// Resolves a tuple of component references in declaration order.
    ///
    /// Arities 1..9 are provided through [`ComponentTuple`].
    ///
    /// ## Errors
    /// The taxonomy of [`Registry::get`], reported for the first
    /// unresolvable element.
    pub fn get_components<'r, Q: ComponentTuple<'r>>(&'r self, entity: Entity) -> ECSResult<Q> {
        self.validate(entity)?;
        Q::fetch(self, entity)
    }

    // ── Views ───────────────────────────────────────────────────────────

    /// Compiles `descriptor` into a view over the current archetype set.
    ///
    /// ## Errors
    /// `InvalidView` naming every descriptor type without a pool.
    pub fn view(&self, descriptor: &ViewDescriptor) -> ECSResult<View> {
        descriptor.build(self)
    }

    /// Builds a view over the component types of tuple `Q`.
    ///
    /// Shorthand for a descriptor with only include clauses.
    pub fn view_of<Q: ComponentTuple<'static>>(&self) -> ECSResult<View> {
        ViewDescriptor::of::<Q>().build(self)
    }

    // ── Housekeeping ────────────────────────────────────────────────────

    /// Drops empty pools and every archetype that referenced them.
    ///
    /// Component ids stay assigned, so re-registering a cleaned type is
    /// stable; the dropped archetypes are necessarily empty of entities.
    pub fn clean(&mut self) {
        let empty: Vec<ComponentID> = self
            .pools
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Some(pool) if pool.count() == 0 => Some(index as ComponentID),
                _ => None,
            })
            .collect();
        if empty.is_empty() {
            return;
        }

        let mut dropped_archetypes = 0;
        for &component_id in &empty {
            self.pools[component_id as usize] = None;
            dropped_archetypes += self.archetypes.drop_with(component_id);
        }
        debug!(
            dropped_pools = empty.len(),
            dropped_archetypes, "dropped empty component pools"
        );
    }

    // ── Scheduler coupling ──────────────────────────────────────────────

    /// Queues a system for one-shot execution at the next single-frame
    /// drain point. Legal from any system body.
    pub fn enqueue_single_frame(&mut self, system: impl System + 'static) {
        self.pending_single_frame.push_back(Box::new(system));
    }

    /// Queues a system to run once before the next batch of Process
    /// systems. Legal from any system body.
    pub fn enqueue_pre_process(&mut self, system: impl System + 'static) {
        self.pending_pre_process.push_back(Box::new(system));
    }

    /// Queues a system to run once after the next batch of Process
    /// systems. Legal from any system body.
    pub fn enqueue_post_process(&mut self, system: impl System + 'static) {
        self.pending_post_process.push_back(Box::new(system));
    }

    /// Asks the scheduler to restart at the active phase's natural exit.
    ///
    /// The mid-phase form of restarting; the scheduler honors the request
    /// when the phase completes.
    pub fn request_restart(&mut self) {
        self.restart_requested = true;
    }

    pub(crate) fn pop_single_frame(&mut self) -> Option<Box<dyn System>> {
        self.pending_single_frame.pop_front()
    }

    pub(crate) fn pop_pre_process(&mut self) -> Option<Box<dyn System>> {
        self.pending_pre_process.pop_front()
    }

    pub(crate) fn pop_post_process(&mut self) -> Option<Box<dyn System>> {
        self.pending_post_process.pop_front()
    }

    pub(crate) fn take_restart_request(&mut self) -> bool {
        mem::take(&mut self.restart_requested)
    }

    pub(crate) fn purge_queued_systems(&mut self, type_id: TypeId) -> usize {
        let before = self.pending_single_frame.len()
            + self.pending_pre_process.len()
            + self.pending_post_process.len();
        self.pending_single_frame.retain(|system| system_type(system.as_ref()) != type_id);
        self.pending_pre_process.retain(|system| system_type(system.as_ref()) != type_id);
        self.pending_post_process.retain(|system| system_type(system.as_ref()) != type_id);
        before
            - self.pending_single_frame.len()
            - self.pending_pre_process.len()
            - self.pending_post_process.len()
    }

    // ── Crate-internal access for views and cursors ─────────────────────

    pub(crate) fn archetype(&self, archetype_id: ArchetypeID) -> Option<&Archetype> {
        self.archetypes.archetype(archetype_id)
    }

    pub(crate) fn matching_archetypes(
        &self,
        with: &Signature,
        without: &Signature,
    ) -> Vec<ArchetypeID> {
        self.archetypes.matching(with, without)
    }

    /// Resolves a type to its component id when a pool currently exists.
    pub(crate) fn component_id_for_query(&self, type_id: TypeId) -> Option<ComponentID> {
        let component_id = self.components.id_of_type_id(type_id)?;
        self.pools.get(component_id as usize)?.as_ref()?;
        Some(component_id)
    }

    /// Pool read by resolved component id and raw entity index, without
    /// handle validation.
    ///
    /// Cursor access path: the caller has already resolved (and memoized)
    /// the component id, and a destroyed-mid-iteration entity reports
    /// `MissingComponent`, not `InvalidEntity`.
    pub(crate) fn component_by_id<T: 'static + Send + Sync>(
        &self,
        component_id: ComponentID,
        index: IndexID,
    ) -> ECSResult<&T> {
        self.pools
            .get(component_id as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(|pool| pool.as_any().downcast_ref::<ComponentPool<T>>())
            .ok_or(InvalidComponentError { name: type_name::<T>() })?
            .get(index)
            .ok_or_else(|| missing::<T>(index).into())
    }

    /// Mutable variant of [`Registry::component_by_id`].
    pub(crate) fn component_by_id_mut<T: 'static + Send + Sync>(
        &mut self,
        component_id: ComponentID,
        index: IndexID,
    ) -> ECSResult<&mut T> {
        self.pools
            .get_mut(component_id as usize)
            .and_then(|slot| slot.as_mut())
            .and_then(|pool| pool.as_any_mut().downcast_mut::<ComponentPool<T>>())
            .ok_or(InvalidComponentError { name: type_name::<T>() })?
            .get_mut(index)
            .ok_or_else(|| missing::<T>(index).into())
    }

    pub(crate) fn has_component_index(&self, component_id: ComponentID, index: IndexID) -> bool {
        self.pools
            .get(component_id as usize)
            .and_then(|slot| slot.as_ref())
            .map_or(false, |pool| pool.has_index(index))
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn typed_pool<T: 'static + Send + Sync>(&self) -> ECSResult<&ComponentPool<T>> {
        self.components
            .id_of::<T>()
            .and_then(|id| self.pools.get(id as usize))
            .and_then(|slot| slot.as_ref())
            .and_then(|pool| pool.as_any().downcast_ref::<ComponentPool<T>>())
            .ok_or_else(|| InvalidComponentError { name: type_name::<T>() }.into())
    }

    fn typed_pool_mut<T: 'static + Send + Sync>(&mut self) -> ECSResult<&mut ComponentPool<T>> {
        self.components
            .id_of::<T>()
            .and_then(|id| self.pools.get_mut(id as usize))
            .and_then(|slot| slot.as_mut())
            .and_then(|pool| pool.as_any_mut().downcast_mut::<ComponentPool<T>>())
            .ok_or_else(|| InvalidComponentError { name: type_name::<T>() }.into())
    }

    fn pool_by_id_mut(&mut self, component_id: ComponentID) -> Option<&mut dyn TypeErasedPool> {
        self.pools.get_mut(component_id as usize)?.as_deref_mut()
    }

    /// The entity's current type-set, read from its archetype.
    fn signature_of(&self, entity: Entity) -> Signature {
        self.routing
            .get(entity.index() as usize)
            .copied()
            .flatten()
            .and_then(|archetype_id| self.archetypes.archetype(archetype_id))
            .map(|archetype| *archetype.signature())
            .unwrap_or_default()
    }

    /// Moves the entity into the archetype for `signature`.
    ///
    /// Removal from the previous archetype leaves an invalidated membership
    /// hole; an empty signature leaves the entity out of archetype tracking
    /// entirely.
    fn route(&mut self, entity: Entity, signature: Signature) {
        let index = entity.index() as usize;
        if let Some(previous) = self.routing[index].take() {
            if let Some(archetype) = self.archetypes.archetype_mut(previous) {
                archetype.remove(entity);
            }
        }
        if !signature.is_empty() {
            let archetype_id = self.archetypes.get_or_create(signature);
            if let Some(archetype) = self.archetypes.archetype_mut(archetype_id) {
                archetype.insert(entity);
            }
            self.routing[index] = Some(archetype_id);
        }
    }
}

fn missing<T>(index: IndexID) -> MissingComponentError {
    MissingComponentError { name: type_name::<T>(), index }
}

fn system_type(system: &dyn System) -> TypeId {
    let any: &dyn std::any::Any = system;
    any.type_id()
}
