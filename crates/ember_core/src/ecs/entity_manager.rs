//! Entity storage and lifecycle
//!
//! The manager owns the entity counter, per-entity destroy flags, the
//! per-entity component mask table, and one type-erased container per
//! registered component type. Masks and containers are parallel structures:
//! bit `k` set in an entity's mask means (and must always mean) that the
//! container for component id `k` holds a value at that entity's index.
//!
//! Per-index lifecycle: unborn -> live -> marked-for-destroy -> removed.
//! `mark_destroyed` only flips the flag; physical teardown happens in
//! `remove_entity`, driven by the owning scene's deferred delete buffer.
//! Removed components are retained in a parallel container set so a
//! removal can be undone with `restore_entity`.

use std::any::type_name;
use std::collections::HashMap;

use super::bitmask::{Bitmask, MAX_COMPONENT_TYPES};
use super::component::{Component, ComponentId, ComponentManager};
use super::container::{AnyContainer, ComponentContainer};
use super::entity::{Entity, EntityIndex};
use super::error::EcsError;

pub struct EntityManager {
    components: ComponentManager,
    entity_counter: EntityIndex,
    /// Live storage, indexed by component id.
    containers: Vec<Option<Box<dyn AnyContainer>>>,
    /// Retention storage for removed entities, backing `restore_entity`.
    retained: Vec<Option<Box<dyn AnyContainer>>>,
    masks: HashMap<EntityIndex, Bitmask>,
    destroy_flags: HashMap<EntityIndex, bool>,
    /// Deferred removal requests made from inside system callbacks; the
    /// owning scene drains these into its delete buffer each update.
    scene_removals: Vec<Entity>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self {
            components: ComponentManager::new(),
            entity_counter: 0,
            containers: (0..MAX_COMPONENT_TYPES).map(|_| None).collect(),
            retained: (0..MAX_COMPONENT_TYPES).map(|_| None).collect(),
            masks: HashMap::new(),
            destroy_flags: HashMap::new(),
            scene_removals: Vec::new(),
        }
    }

    /// The component-type registry backing this manager.
    pub fn component_manager(&self) -> &ComponentManager {
        &self.components
    }

    pub fn component_manager_mut(&mut self) -> &mut ComponentManager {
        &mut self.components
    }

    /// Allocate the next entity index. The handle is live immediately;
    /// whether it is queued for system attachment is the scene's decision.
    pub fn create_entity(&mut self) -> Entity {
        let entity = Entity::new(self.entity_counter);
        self.destroy_flags.insert(self.entity_counter, false);
        self.entity_counter += 1;
        entity
    }

    /// Attach `component` to `entity`, registering the type on first use.
    /// Returns a reference to the stored value. Replaces any previous value
    /// of the same type.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<&mut T, EcsError> {
        if entity.is_null() {
            return Err(EcsError::NullEntity);
        }
        let id = self.components.id_of::<T>();
        let index = entity.index();
        self.masks.entry(index).or_default().turn_on_bit(id);
        Ok(self.ensure_container::<T>(id).insert(index, component))
    }

    /// Detach `T` from `entity`. Removing an absent component is a
    /// tolerated no-op.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        if entity.is_null() {
            return;
        }
        let Some(id) = self.components.lookup::<T>() else {
            return;
        };
        let index = entity.index();
        let Some(mask) = self.masks.get_mut(&index) else {
            return;
        };
        if !mask.get_bit(id) {
            return;
        }
        mask.clear_bit(id);
        if let Some(container) = self.containers[id as usize].as_deref_mut() {
            container.remove(index);
        }
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        if entity.is_null() {
            return Err(EcsError::NullEntity);
        }
        let index = entity.index();
        let id = self.components.lookup::<T>().ok_or_else(|| not_found::<T>(index))?;
        self.typed_container::<T>(id)
            .and_then(|container| container.get(index))
            .ok_or_else(|| not_found::<T>(index))
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        if entity.is_null() {
            return Err(EcsError::NullEntity);
        }
        let index = entity.index();
        let id = self.components.lookup::<T>().ok_or_else(|| not_found::<T>(index))?;
        self.typed_container_mut::<T>(id)
            .and_then(|container| container.get_mut(index))
            .ok_or_else(|| not_found::<T>(index))
    }

    /// Whether `entity` owns a `T`, answered from the mask table.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let Some(id) = self.components.lookup::<T>() else {
            return false;
        };
        self.masks
            .get(&entity.index())
            .is_some_and(|mask| mask.get_bit(id))
    }

    /// The entity's full component mask (empty for unknown indices).
    pub fn component_mask(&self, entity: Entity) -> Bitmask {
        self.masks.get(&entity.index()).copied().unwrap_or_default()
    }

    /// Flag `entity` for destruction without touching storage.
    pub fn mark_destroyed(&mut self, entity: Entity) {
        if entity.is_null() {
            return;
        }
        self.destroy_flags.insert(entity.index(), true);
    }

    /// True once the entity is flagged for destruction. A null handle is
    /// reported destroyed as the defensive default.
    pub fn entity_destroyed(&self, entity: Entity) -> bool {
        if entity.is_null() {
            return true;
        }
        self.destroy_flags
            .get(&entity.index())
            .copied()
            .unwrap_or(false)
    }

    /// Tear down every component slot for `entity`, retaining each removed
    /// value for a possible `restore_entity`, then erase its mask entry.
    /// Returns whether a mask entry existed.
    pub fn remove_entity(&mut self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let index = entity.index();
        let mask = self.component_mask(entity);
        for id in 0..MAX_COMPONENT_TYPES {
            if !mask.get_bit(id as u32) {
                continue;
            }
            let Some(container) = self.containers[id].as_deref() else {
                continue;
            };
            let retained = self.retained[id].get_or_insert_with(|| container.clone_empty());
            if !container.clone_to(retained.as_mut(), index) {
                tracing::error!(index, component = id, "failed to retain component on removal");
            }
            if let Some(live) = self.containers[id].as_deref_mut() {
                live.remove(index);
            }
        }
        self.masks.remove(&index).is_some()
    }

    /// Undo a prior `remove_entity`: move retained components back into live
    /// storage, restore the mask bits, and clear the destroy flag. Returns
    /// `false` for indices this manager never issued.
    pub fn restore_entity(&mut self, entity: Entity) -> bool {
        if entity.is_null() {
            return false;
        }
        let index = entity.index();
        for id in 0..MAX_COMPONENT_TYPES {
            let Some(retained) = self.retained[id].as_deref() else {
                continue;
            };
            if !retained.has(index) {
                continue;
            }
            if self.containers[id].is_none() {
                self.containers[id] = Some(retained.clone_empty());
            }
            let Some(live) = self.containers[id].as_deref_mut() else {
                continue;
            };
            if !retained.clone_to(live, index) {
                tracing::error!(index, component = id, "failed to restore component");
                return false;
            }
            self.masks
                .entry(index)
                .or_default()
                .turn_on_bit(id as u32);
            if let Some(retained) = self.retained[id].as_deref_mut() {
                retained.discard(index);
            }
        }
        match self.destroy_flags.get_mut(&index) {
            Some(flag) => {
                *flag = false;
                true
            }
            None => false,
        }
    }

    /// Allocate a fresh entity carrying an independent copy of every
    /// component resident at `entity`'s index. The mask is copied too.
    pub fn duplicate_entity(&mut self, entity: Entity) -> Entity {
        let duplicated = self.create_entity();
        let src = entity.index();
        let dst = duplicated.index();
        for container in self.containers.iter_mut().flatten() {
            if container.has(src) {
                container.duplicate(src, dst);
            }
        }
        let source_bits = self.component_mask(entity).bitset();
        self.masks.entry(dst).or_default().turn_on_bits(source_bits);
        duplicated
    }

    /// Queue a removal request on behalf of a system callback. The owning
    /// scene drains these into its deferred delete buffer, so removal never
    /// mutates containers mid-iteration. The destroy flag is set
    /// immediately so `entity_destroyed` stays accurate.
    pub fn remove_entity_from_scene(&mut self, entity: Entity) {
        if entity.is_null() {
            return;
        }
        self.mark_destroyed(entity);
        self.scene_removals.push(entity);
    }

    pub(crate) fn take_scene_removals(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.scene_removals)
    }

    /// All indices issued and not yet flagged destroyed, in index order.
    pub fn live_entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self
            .destroy_flags
            .iter()
            .filter(|(_, &flagged)| !flagged)
            .map(|(&index, _)| Entity::new(index))
            .collect();
        entities.sort_unstable();
        entities
    }

    /// Deep-copy the component registry, containers, masks, and flags of
    /// every live entity into `target`. Destroyed entities are skipped, so
    /// the clone starts without tombstones. `target`'s entity counter is
    /// raised to keep future indices collision-free.
    pub fn clone_self(&self, target: &mut EntityManager) -> bool {
        if !self.components.clone_self(&mut target.components) {
            return false;
        }
        let live = |index: EntityIndex| !self.destroy_flags.get(&index).copied().unwrap_or(true);

        for (id, slot) in self.containers.iter().enumerate() {
            let Some(container) = slot.as_deref() else {
                continue;
            };
            if target.containers[id].is_none() {
                target.containers[id] = Some(container.clone_empty());
            }
            let Some(target_container) = target.containers[id].as_deref_mut() else {
                return false;
            };
            if !container.clone_filtered(target_container, &live) {
                tracing::error!(component = id, "failed to clone component container");
                return false;
            }
        }
        for (&index, mask) in &self.masks {
            if live(index) {
                target.masks.insert(index, *mask);
            }
        }
        for (&index, &flagged) in &self.destroy_flags {
            if !flagged {
                target.destroy_flags.insert(index, false);
            }
        }
        target.entity_counter = target.entity_counter.max(self.entity_counter);
        true
    }

    /// Reset to the empty state: no registered types, no entities, no
    /// retained storage.
    pub fn clear_self(&mut self) -> bool {
        if !self.components.clear_self() {
            return false;
        }
        self.entity_counter = 0;
        self.masks.clear();
        self.destroy_flags.clear();
        self.scene_removals.clear();
        for slot in &mut self.containers {
            *slot = None;
        }
        for slot in &mut self.retained {
            *slot = None;
        }
        true
    }

    fn typed_container<T: Component>(&self, id: ComponentId) -> Option<&ComponentContainer<T>> {
        self.containers[id as usize]
            .as_deref()
            .and_then(|container| container.as_any().downcast_ref())
    }

    fn typed_container_mut<T: Component>(
        &mut self,
        id: ComponentId,
    ) -> Option<&mut ComponentContainer<T>> {
        self.containers[id as usize]
            .as_deref_mut()
            .and_then(|container| container.as_any_mut().downcast_mut())
    }

    fn ensure_container<T: Component>(&mut self, id: ComponentId) -> &mut ComponentContainer<T> {
        let slot = &mut self.containers[id as usize];
        let container = slot.get_or_insert_with(|| Box::new(ComponentContainer::<T>::new(id)));
        container
            .as_any_mut()
            .downcast_mut()
            .expect("container type diverged from component id")
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found<T: Component>(index: EntityIndex) -> EcsError {
    EcsError::ComponentNotFound {
        index,
        component: type_name::<T>(),
    }
}
