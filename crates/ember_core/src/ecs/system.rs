//! System base machinery
//!
//! A system declares the component types it requires at construction time.
//! Requirements start as pending type keys and are resolved into concrete
//! mask bits once the owning scene's component registry is available;
//! querying the mask before resolution is a precondition violation and
//! panics. After resolution the system is matched against entity masks and
//! receives add/remove/update/message callbacks from the system manager.

use std::any::Any;

use super::bitmask::Bitmask;
use super::component::{Component, ComponentKey, ComponentManager};
use super::entity::Entity;
use super::entity_manager::EntityManager;
use crate::message::{Message, MessageBus};
use crate::render::Drawable;

/// State shared by every system: requirement mask, pending requirement
/// keys, and the ordered list of currently-attached entities.
#[derive(Debug, Default)]
pub struct SystemBase {
    mask: Bitmask,
    pending: Vec<ComponentKey>,
    entities: Vec<Entity>,
    resolved: bool,
}

impl SystemBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a required component type (builder form).
    pub fn with_requirement<T: Component>(mut self) -> Self {
        self.require::<T>();
        self
    }

    /// Record a required component type.
    pub fn require<T: Component>(&mut self) {
        self.pending.push(ComponentKey::of::<T>());
    }

    /// Resolve pending requirement keys into mask bits. Must run before the
    /// system can match entities; the system manager calls this during
    /// registration.
    pub fn process_requirements(&mut self, components: &mut ComponentManager) {
        for key in self.pending.drain(..) {
            self.mask.turn_on_bit(components.id_from_key(key));
        }
        self.resolved = true;
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// The resolved requirement mask.
    pub fn mask(&self) -> Bitmask {
        self.assert_resolved();
        self.mask
    }

    /// Whether an entity with `entity_mask` satisfies this system's
    /// requirements. Only the system's own bits are compared, so entities
    /// owning extra components match.
    pub fn fits_requirements(&self, entity_mask: Bitmask) -> bool {
        self.assert_resolved();
        entity_mask.matches(self.mask, self.mask.bitset())
    }

    /// Entities currently attached, in attachment order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn has_entity(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    pub(crate) fn push_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub(crate) fn unlist_entity(&mut self, entity: Entity) -> bool {
        match self.entities.iter().position(|&e| e == entity) {
            Some(pos) => {
                self.entities.remove(pos);
                true
            }
            None => false,
        }
    }

    pub(crate) fn adopt_mask(&mut self, source: &SystemBase) {
        self.mask = source.mask;
        self.pending.clear();
        self.resolved = true;
    }

    fn assert_resolved(&self) {
        assert!(
            self.resolved,
            "system requirement mask queried before process_requirements"
        );
    }
}

/// Per-frame logic over entities whose masks satisfy the system's
/// requirements.
///
/// Implementors embed a [`SystemBase`] and expose it through
/// `base`/`base_mut`; everything else has a default no-op body. The entity
/// manager and message bus are passed into each callback rather than
/// stored. Structural changes made from inside a callback must go through
/// the deferred paths (`EntityManager::remove_entity_from_scene`, scene
/// buffers); the live entity and system lists are being iterated.
pub trait System: Any {
    fn base(&self) -> &SystemBase;
    fn base_mut(&mut self) -> &mut SystemBase;

    /// Called once per frame by the system manager.
    fn update(&mut self, _entities: &mut EntityManager, _bus: &mut MessageBus, _dt: f32) {}

    /// Called once per dispatched message.
    fn on_message(&mut self, _entities: &mut EntityManager, _message: &Message) {}

    /// Called right after an entity is attached.
    fn on_entity_added(&mut self, _entity: Entity, _entities: &mut EntityManager) {}

    /// Called right before an entity is detached.
    fn on_entity_removed(&mut self, _entity: Entity, _entities: &mut EntityManager) {}

    /// Produce a fresh instance for scene duplication, or `None` if this
    /// system does not support cloning. Implementations return an
    /// unresolved instance; the manager re-attaches entities and copies the
    /// mask through `clone_base`.
    fn clone_self(&self) -> Option<Box<dyn System>> {
        None
    }

    /// Drawable view of this system, for systems that render.
    fn as_drawable(&self) -> Option<&dyn Drawable> {
        None
    }
}

impl dyn System {
    /// Attach an entity. No-op returning `false` if already attached;
    /// otherwise appends and fires `on_entity_added`.
    pub fn add_entity(&mut self, entity: Entity, entities: &mut EntityManager) -> bool {
        if self.base().has_entity(entity) {
            return false;
        }
        self.base_mut().push_entity(entity);
        self.on_entity_added(entity, entities);
        true
    }

    /// Detach an entity, firing `on_entity_removed` first. Returns `false`
    /// if the entity was not attached.
    pub fn remove_entity(&mut self, entity: Entity, entities: &mut EntityManager) -> bool {
        if !self.base().has_entity(entity) {
            return false;
        }
        self.on_entity_removed(entity, entities);
        self.base_mut().unlist_entity(entity)
    }

    /// Re-attach every candidate entity whose mask fits this system's
    /// requirements to `target`, then copy the requirement mask over.
    /// Used when duplicating a whole scene: entities are re-filtered per
    /// system instead of copied as a flat list.
    pub fn clone_base(
        &self,
        target: &mut dyn System,
        entities: &mut EntityManager,
        candidates: &[Entity],
    ) -> bool {
        target.base_mut().adopt_mask(self.base());
        for &candidate in candidates {
            let mask = entities.component_mask(candidate);
            if self.base().fits_requirements(mask) {
                target.add_entity(candidate, entities);
            }
        }
        true
    }
}
