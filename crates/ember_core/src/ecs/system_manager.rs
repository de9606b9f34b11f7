//! System registry and event fan-out
//!
//! Keeps the ordered list of registered systems and routes entity
//! add/remove, message, and update events to every system whose
//! requirement mask matches.

use std::any::{type_name, Any, TypeId};

use super::component::ComponentManager;
use super::entity::Entity;
use super::entity_manager::EntityManager;
use super::system::System;
use crate::message::{Message, MessageBus};

struct SystemEntry {
    type_id: TypeId,
    name: &'static str,
    system: Box<dyn System>,
}

#[derive(Default)]
pub struct SystemManager {
    entries: Vec<SystemEntry>,
}

impl SystemManager {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a system, resolving its requirements against the component
    /// registry. Registering the same system type twice returns the
    /// existing instance.
    pub fn add_system<S: System>(
        &mut self,
        system: S,
        components: &mut ComponentManager,
    ) -> &mut S {
        let type_id = TypeId::of::<S>();
        let pos = match self.entries.iter().position(|entry| entry.type_id == type_id) {
            Some(pos) => {
                tracing::debug!(system = type_name::<S>(), "system already registered");
                pos
            }
            None => {
                let mut system = Box::new(system);
                system.base_mut().process_requirements(components);
                self.entries.push(SystemEntry {
                    type_id,
                    name: type_name::<S>(),
                    system,
                });
                self.entries.len() - 1
            }
        };
        let any: &mut dyn Any = self.entries[pos].system.as_mut();
        any.downcast_mut::<S>()
            .expect("system entry type diverged from its key")
    }

    pub fn has_system<S: System>(&self) -> bool {
        let type_id = TypeId::of::<S>();
        self.entries.iter().any(|entry| entry.type_id == type_id)
    }

    pub fn get_system<S: System>(&self) -> Option<&S> {
        let type_id = TypeId::of::<S>();
        self.entries
            .iter()
            .find(|entry| entry.type_id == type_id)
            .and_then(|entry| {
                let any: &dyn Any = entry.system.as_ref();
                any.downcast_ref::<S>()
            })
    }

    pub fn get_system_mut<S: System>(&mut self) -> Option<&mut S> {
        let type_id = TypeId::of::<S>();
        self.entries
            .iter_mut()
            .find(|entry| entry.type_id == type_id)
            .and_then(|entry| {
                let any: &mut dyn Any = entry.system.as_mut();
                any.downcast_mut::<S>()
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn System> {
        self.entries.iter().map(|entry| entry.system.as_ref())
    }

    /// Test `entity` against every system's mask and attach on match.
    /// Systems that already track the entity are skipped.
    pub fn add_entity(&mut self, entities: &mut EntityManager, entity: Entity) {
        let mask = entities.component_mask(entity);
        for entry in &mut self.entries {
            let system = entry.system.as_mut();
            if system.base().fits_requirements(mask) && !system.base().has_entity(entity) {
                system.add_entity(entity, entities);
            }
        }
    }

    /// Detach `entity` from every system that tracks it.
    pub fn remove_entity(&mut self, entities: &mut EntityManager, entity: Entity) {
        for entry in &mut self.entries {
            entry.system.as_mut().remove_entity(entity, entities);
        }
    }

    /// Broadcast a message to every system.
    pub fn handle_message(&mut self, entities: &mut EntityManager, message: &Message) {
        for entry in &mut self.entries {
            entry.system.on_message(entities, message);
        }
    }

    /// Tick every system once.
    pub fn update(&mut self, entities: &mut EntityManager, bus: &mut MessageBus, dt: f32) {
        for entry in &mut self.entries {
            entry.system.update(entities, bus, dt);
        }
    }

    /// Build a parallel manager for a duplicated scene. Each system that
    /// supports cloning gets a fresh instance with `candidates` re-filtered
    /// against its requirements; systems without clone support are skipped.
    pub fn clone_self(
        &self,
        target: &mut SystemManager,
        entities: &mut EntityManager,
        candidates: &[Entity],
    ) -> bool {
        for entry in &self.entries {
            match entry.system.clone_self() {
                Some(mut cloned) => {
                    entry
                        .system
                        .as_ref()
                        .clone_base(cloned.as_mut(), entities, candidates);
                    target.entries.push(SystemEntry {
                        type_id: entry.type_id,
                        name: entry.name,
                        system: cloned,
                    });
                }
                None => {
                    tracing::warn!(system = entry.name, "system does not support cloning; skipped");
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Component;
    use crate::ecs::system::SystemBase;

    #[derive(Clone)]
    struct Marker;
    impl Component for Marker {}

    struct TrackingSystem {
        base: SystemBase,
        added: usize,
        removed: usize,
        messages: Vec<i32>,
        ticks: usize,
    }

    impl TrackingSystem {
        fn new() -> Self {
            Self {
                base: SystemBase::new().with_requirement::<Marker>(),
                added: 0,
                removed: 0,
                messages: Vec::new(),
                ticks: 0,
            }
        }
    }

    impl System for TrackingSystem {
        fn base(&self) -> &SystemBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut SystemBase {
            &mut self.base
        }

        fn update(&mut self, _entities: &mut EntityManager, _bus: &mut MessageBus, _dt: f32) {
            self.ticks += 1;
        }

        fn on_message(&mut self, _entities: &mut EntityManager, message: &Message) {
            self.messages.push(message.id());
        }

        fn on_entity_added(&mut self, _entity: Entity, _entities: &mut EntityManager) {
            self.added += 1;
        }

        fn on_entity_removed(&mut self, _entity: Entity, _entities: &mut EntityManager) {
            self.removed += 1;
        }

        fn clone_self(&self) -> Option<Box<dyn System>> {
            Some(Box::new(TrackingSystem::new()))
        }
    }

    #[test]
    fn registration_is_idempotent() {
        let mut entities = EntityManager::new();
        let mut systems = SystemManager::new();

        systems.add_system(TrackingSystem::new(), entities.component_manager_mut());
        systems.add_system(TrackingSystem::new(), entities.component_manager_mut());
        assert_eq!(systems.len(), 1);
        assert!(systems.has_system::<TrackingSystem>());
    }

    #[test]
    fn entities_attach_only_on_matching_mask() {
        let mut entities = EntityManager::new();
        let mut systems = SystemManager::new();
        systems.add_system(TrackingSystem::new(), entities.component_manager_mut());

        let matching = entities.create_entity();
        entities.add_component(matching, Marker).unwrap();
        let plain = entities.create_entity();

        systems.add_entity(&mut entities, matching);
        systems.add_entity(&mut entities, plain);

        let system = systems.get_system::<TrackingSystem>().unwrap();
        assert_eq!(system.added, 1);
        assert_eq!(system.base().entities(), &[matching]);
    }

    #[test]
    fn broadcasts_reach_every_system() {
        let mut entities = EntityManager::new();
        let mut systems = SystemManager::new();
        systems.add_system(TrackingSystem::new(), entities.component_manager_mut());

        let mut bus = MessageBus::new();
        systems.update(&mut entities, &mut bus, 0.016);
        systems.handle_message(&mut entities, &Message::new(7, ()));

        let system = systems.get_system::<TrackingSystem>().unwrap();
        assert_eq!(system.ticks, 1);
        assert_eq!(system.messages, vec![7]);
    }

    #[test]
    fn clone_refilters_candidates_per_system() {
        let mut entities = EntityManager::new();
        let mut systems = SystemManager::new();
        systems.add_system(TrackingSystem::new(), entities.component_manager_mut());

        let matching = entities.create_entity();
        entities.add_component(matching, Marker).unwrap();
        let plain = entities.create_entity();

        let mut target = SystemManager::new();
        assert!(systems.clone_self(&mut target, &mut entities, &[matching, plain]));

        let cloned = target.get_system::<TrackingSystem>().unwrap();
        assert_eq!(cloned.base().entities(), &[matching]);
        assert!(cloned.base().is_resolved());
    }
}
