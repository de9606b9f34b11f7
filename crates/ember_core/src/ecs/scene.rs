//! Scene — the ECS composition root
//!
//! A scene owns one entity manager (with its component registry), one
//! system manager, a message bus, and the deferred add/delete buffers that
//! make structural mutation safe while the live entity and system lists are
//! being iterated. `update` is the single reconciliation point per frame:
//!
//! 1. swap in the pending-delete buffer (removals requested during this
//!    update land in next frame's buffer),
//! 2. detach each dead entity from every system, then tear down its
//!    storage,
//! 3. attach pending additions to every system whose mask matches,
//! 4. dispatch queued messages and tick all systems.
//!
//! Entity membership per frame: pending-add -> live (attached to matching
//! systems) -> pending-delete -> detached.

use super::component::Component;
use super::entity::Entity;
use super::entity_manager::EntityManager;
use super::error::EcsError;
use super::system::System;
use super::system_manager::SystemManager;
use crate::message::{Message, MessageBus, MessageId};
use crate::render::{Drawable, RenderTarget};

/// Two Vec buffers swapped at a fixed point: pushes go to the back buffer,
/// iteration reads the front, so pushes made mid-iteration are deferred to
/// the next swap.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    front: Vec<T>,
    back: Vec<T>,
}

impl<T> DoubleBuffer<T> {
    pub fn new() -> Self {
        Self {
            front: Vec::new(),
            back: Vec::new(),
        }
    }

    pub fn push(&mut self, value: T) {
        self.back.push(value);
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    pub fn data(&self) -> &[T] {
        &self.front
    }

    pub fn clear(&mut self) {
        self.front.clear();
    }

    pub fn clear_all(&mut self) {
        self.front.clear();
        self.back.clear();
    }
}

impl<T> Default for DoubleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Scene {
    entities: EntityManager,
    systems: SystemManager,
    bus: MessageBus,
    add_buffer: Vec<Entity>,
    delete_buffer: DoubleBuffer<Entity>,
    drawables: Vec<Box<dyn Drawable>>,
    use_systems: bool,
}

impl Scene {
    /// A scene that runs systems (the normal case).
    pub fn new() -> Self {
        Self::with_systems(true)
    }

    /// A direct-draw scene: entities and components work, but nothing is
    /// buffered for system attachment and `update` skips system dispatch.
    pub fn without_systems() -> Self {
        Self::with_systems(false)
    }

    fn with_systems(use_systems: bool) -> Self {
        Self {
            entities: EntityManager::new(),
            systems: SystemManager::new(),
            bus: MessageBus::new(),
            add_buffer: Vec::new(),
            delete_buffer: DoubleBuffer::new(),
            drawables: Vec::new(),
            use_systems,
        }
    }

    pub fn entity_manager(&self) -> &EntityManager {
        &self.entities
    }

    pub fn entity_manager_mut(&mut self) -> &mut EntityManager {
        &mut self.entities
    }

    /// Create an entity and queue it for system attachment on the next
    /// `update`.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.entities.create_entity();
        if self.use_systems {
            self.add_buffer.push(entity);
        }
        entity
    }

    /// Create an entity that bypasses the add buffer entirely: it exists in
    /// storage but stays invisible to systems until passed to
    /// [`Scene::add_entity`]. Useful for prefabs and scripted spawns.
    pub fn create_empty_entity(&mut self) -> Entity {
        self.entities.create_entity()
    }

    /// Explicitly queue an entity for system attachment.
    pub fn add_entity(&mut self, entity: Entity) {
        self.add_buffer.push(entity);
    }

    /// Duplicate an entity (components copied independently) and queue the
    /// duplicate for system attachment.
    pub fn duplicate_entity(&mut self, entity: Entity) -> Entity {
        let duplicated = self.entities.duplicate_entity(entity);
        if self.use_systems {
            self.add_buffer.push(duplicated);
        }
        duplicated
    }

    /// Queue an entity for removal on the next `update`. The destroy flag
    /// is set immediately so [`Scene::entity_destroyed`] is accurate before
    /// the buffer flush.
    pub fn remove_entity(&mut self, entity: Entity) {
        self.delete_buffer.push(entity);
        self.entities.mark_destroyed(entity);
    }

    /// Re-admit a previously removed entity (undo of a delete): retained
    /// components move back into live storage and the entity is re-attached
    /// to matching systems immediately.
    pub fn restore_entity(&mut self, entity: Entity) -> bool {
        let restored = self.entities.restore_entity(entity);
        if self.use_systems {
            self.systems.add_entity(&mut self.entities, entity);
        }
        restored
    }

    pub fn entity_destroyed(&self, entity: Entity) -> bool {
        self.entities.entity_destroyed(entity)
    }

    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<&mut T, EcsError> {
        self.entities.add_component(entity, component)
    }

    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.entities.remove_component::<T>(entity);
    }

    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        self.entities.get_component(entity)
    }

    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        self.entities.get_component_mut(entity)
    }

    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.entities.has_component::<T>(entity)
    }

    /// Register a system, resolving its component requirements. Registering
    /// the same type twice returns the existing instance.
    pub fn add_system<S: System>(&mut self, system: S) -> &mut S {
        self.systems
            .add_system(system, self.entities.component_manager_mut())
    }

    pub fn has_system<S: System>(&self) -> bool {
        self.systems.has_system::<S>()
    }

    pub fn get_system<S: System>(&self) -> Option<&S> {
        self.systems.get_system::<S>()
    }

    pub fn get_system_mut<S: System>(&mut self) -> Option<&mut S> {
        self.systems.get_system_mut::<S>()
    }

    /// Queue a message for broadcast during the next `update`.
    pub fn post_message<T: Send + 'static>(&mut self, id: MessageId, payload: T) {
        self.bus.post(id, payload);
    }

    /// Broadcast an externally produced message to all systems now.
    pub fn handle_messages(&mut self, message: &Message) {
        self.systems.handle_message(&mut self.entities, message);
    }

    /// The per-frame reconciliation point; see the module docs for the
    /// exact ordering.
    pub fn update(&mut self, dt: f32) {
        // Removal requests queued from inside system callbacks last frame.
        for entity in self.entities.take_scene_removals() {
            self.delete_buffer.push(entity);
        }

        self.delete_buffer.swap();
        for &entity in self.delete_buffer.data() {
            if self.use_systems {
                self.systems.remove_entity(&mut self.entities, entity);
            }
            self.entities.remove_entity(entity);
        }
        self.delete_buffer.clear();

        let pending = std::mem::take(&mut self.add_buffer);
        for entity in pending {
            self.systems.add_entity(&mut self.entities, entity);
        }

        if self.use_systems {
            while let Some(message) = self.bus.poll() {
                self.systems.handle_message(&mut self.entities, &message);
            }
            self.systems.update(&mut self.entities, &mut self.bus, dt);
        }
    }

    /// Register a direct-draw object (non-system scenes).
    pub fn add_drawable(&mut self, drawable: Box<dyn Drawable>) {
        self.drawables.push(drawable);
    }

    /// Draw registered drawables, then every system exposing a drawable
    /// view. Unrelated to the update cycle.
    pub fn draw(&self, target: &mut dyn RenderTarget) {
        for drawable in &self.drawables {
            drawable.draw(target);
        }
        for system in self.systems.iter() {
            if let Some(drawable) = system.as_drawable() {
                drawable.draw(target);
            }
        }
    }

    /// Deep-copy this scene's component registry and live entities into
    /// `target`; with `clone_systems`, also clone every system that
    /// supports it, re-filtering the copied entities per system.
    pub fn clone_self(&self, target: &mut Scene, clone_systems: bool) -> bool {
        if !self.entities.clone_self(&mut target.entities) {
            return false;
        }
        if clone_systems {
            let candidates = target.entities.live_entities();
            if !self
                .systems
                .clone_self(&mut target.systems, &mut target.entities, &candidates)
            {
                return false;
            }
        }
        true
    }

    /// Reset component registry, entity storage, buffers, and pending
    /// messages. Registered systems are kept; re-resolution against a
    /// cleared registry is the caller's concern when reusing the scene.
    pub fn clear_self(&mut self) -> bool {
        if !self.entities.clear_self() {
            return false;
        }
        self.add_buffer.clear();
        self.delete_buffer.clear_all();
        self.bus.clear();
        true
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::system::SystemBase;

    #[derive(Clone, Copy, PartialEq, Debug)]
    struct Position {
        x: i32,
        y: i32,
    }
    impl Component for Position {}

    #[derive(Clone, Copy, PartialEq, Debug)]
    struct Stat {
        val: i32,
    }
    impl Component for Stat {}

    #[derive(Default)]
    struct PositionSystem {
        base: SystemBase,
        added: usize,
        removed: usize,
        messages: usize,
    }

    impl PositionSystem {
        fn new() -> Self {
            Self {
                base: SystemBase::new().with_requirement::<Position>(),
                ..Default::default()
            }
        }
    }

    impl System for PositionSystem {
        fn base(&self) -> &SystemBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut SystemBase {
            &mut self.base
        }

        fn update(&mut self, entities: &mut EntityManager, _bus: &mut MessageBus, _dt: f32) {
            for &entity in self.base.entities() {
                if let Ok(position) = entities.get_component_mut::<Position>(entity) {
                    position.x += 1;
                }
            }
        }

        fn on_message(&mut self, _entities: &mut EntityManager, _message: &Message) {
            self.messages += 1;
        }

        fn on_entity_added(&mut self, _entity: Entity, _entities: &mut EntityManager) {
            self.added += 1;
        }

        fn on_entity_removed(&mut self, _entity: Entity, _entities: &mut EntityManager) {
            self.removed += 1;
        }

        fn clone_self(&self) -> Option<Box<dyn System>> {
            Some(Box::new(PositionSystem::new()))
        }
    }

    /// Removes every tracked entity through the deferred back-channel.
    struct ReaperSystem {
        base: SystemBase,
    }

    impl ReaperSystem {
        fn new() -> Self {
            Self {
                base: SystemBase::new().with_requirement::<Position>(),
            }
        }
    }

    impl System for ReaperSystem {
        fn base(&self) -> &SystemBase {
            &self.base
        }

        fn base_mut(&mut self) -> &mut SystemBase {
            &mut self.base
        }

        fn update(&mut self, entities: &mut EntityManager, _bus: &mut MessageBus, _dt: f32) {
            for &entity in self.base.entities() {
                entities.remove_entity_from_scene(entity);
            }
        }
    }

    #[test]
    fn component_round_trip() {
        let mut scene = Scene::new();
        let entity = scene.create_entity();
        scene.add_component(entity, Position { x: 1, y: 2 }).unwrap();

        assert!(scene.has_component::<Position>(entity));
        assert_eq!(
            scene.get_component::<Position>(entity).unwrap(),
            &Position { x: 1, y: 2 }
        );
    }

    #[test]
    fn system_attaches_after_update() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        let entity = scene.create_entity();
        scene.add_component(entity, Position { x: 10, y: 0 }).unwrap();

        scene.update(0.0);

        let system = scene.get_system::<PositionSystem>().unwrap();
        assert_eq!(system.base().entities().len(), 1);
        assert_eq!(system.added, 1);
    }

    #[test]
    fn only_matching_entities_attach() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        let matching = scene.create_entity();
        scene.add_component(matching, Position { x: 0, y: 0 }).unwrap();
        let plain = scene.create_entity();
        scene.add_component(plain, Stat { val: 1 }).unwrap();

        scene.update(0.0);

        let system = scene.get_system::<PositionSystem>().unwrap();
        assert_eq!(system.base().entities(), &[matching]);
    }

    #[test]
    fn removal_detaches_and_fires_hook_once() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        let entity = scene.create_entity();
        scene.add_component(entity, Position { x: 0, y: 0 }).unwrap();
        scene.update(0.0);

        scene.remove_entity(entity);
        assert!(scene.entity_destroyed(entity));
        scene.update(0.0);

        let system = scene.get_system::<PositionSystem>().unwrap();
        assert_eq!(system.removed, 1);
        assert!(system.base().entities().is_empty());
        assert!(!scene.has_component::<Position>(entity));
    }

    #[test]
    fn duplicate_is_independent_of_original() {
        let mut scene = Scene::new();
        let original = scene.create_entity();
        scene.add_component(original, Stat { val: 100 }).unwrap();

        let copy = scene.duplicate_entity(original);
        assert_eq!(scene.get_component::<Stat>(copy).unwrap(), &Stat { val: 100 });

        scene.get_component_mut::<Stat>(original).unwrap().val = 1;
        assert_eq!(scene.get_component::<Stat>(copy).unwrap(), &Stat { val: 100 });
    }

    #[test]
    fn same_frame_add_and_remove_leaves_no_attachment() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        let entity = scene.create_entity();
        scene.add_component(entity, Position { x: 0, y: 0 }).unwrap();
        scene.remove_entity(entity);

        scene.update(0.0);

        // The delete flushed before the add, and the torn-down entity no
        // longer matches the system's mask, so nothing ever attached.
        let system = scene.get_system::<PositionSystem>().unwrap();
        assert!(system.base().entities().is_empty());
        assert_eq!(system.added, 0);
    }

    #[test]
    fn systems_tick_attached_entities() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        let entity = scene.create_entity();
        scene.add_component(entity, Position { x: 0, y: 0 }).unwrap();

        scene.update(0.0); // attach
        scene.update(0.0); // tick twice
        assert_eq!(scene.get_component::<Position>(entity).unwrap().x, 2);
    }

    #[test]
    fn empty_entities_stay_invisible_until_added() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        let entity = scene.create_empty_entity();
        scene.add_component(entity, Position { x: 0, y: 0 }).unwrap();
        scene.update(0.0);

        assert!(scene
            .get_system::<PositionSystem>()
            .unwrap()
            .base()
            .entities()
            .is_empty());

        scene.add_entity(entity);
        scene.update(0.0);
        assert_eq!(
            scene.get_system::<PositionSystem>().unwrap().base().entities(),
            &[entity]
        );
    }

    #[test]
    fn removal_requested_during_system_update_is_deferred() {
        let mut scene = Scene::new();
        scene.add_system(ReaperSystem::new());

        let entity = scene.create_entity();
        scene.add_component(entity, Position { x: 0, y: 0 }).unwrap();

        scene.update(0.0); // attach; reaper queues removal during its tick
        assert!(scene.entity_destroyed(entity));
        assert!(scene.has_component::<Position>(entity));

        scene.update(0.0); // deferred removal lands
        assert!(!scene.has_component::<Position>(entity));
        assert!(scene
            .get_system::<ReaperSystem>()
            .unwrap()
            .base()
            .entities()
            .is_empty());
    }

    #[test]
    fn restore_reverses_a_removal() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        let entity = scene.create_entity();
        scene.add_component(entity, Position { x: 5, y: 5 }).unwrap();
        scene.update(0.0);

        scene.remove_entity(entity);
        scene.update(0.0);
        assert!(!scene.has_component::<Position>(entity));

        assert!(scene.restore_entity(entity));
        assert!(!scene.entity_destroyed(entity));
        assert_eq!(
            scene.get_component::<Position>(entity).unwrap(),
            &Position { x: 5, y: 5 }
        );
        assert_eq!(
            scene.get_system::<PositionSystem>().unwrap().base().entities(),
            &[entity]
        );
    }

    #[test]
    fn posted_messages_reach_systems_next_update() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        scene.post_message(7, "spawned");
        scene.update(0.0);
        assert_eq!(scene.get_system::<PositionSystem>().unwrap().messages, 1);

        // External synchronous dispatch path.
        scene.handle_messages(&Message::new(8, ()));
        assert_eq!(scene.get_system::<PositionSystem>().unwrap().messages, 2);
    }

    #[test]
    fn clone_carries_entities_and_systems() {
        let mut scene = Scene::new();
        scene.add_system(PositionSystem::new());

        let entity = scene.create_entity();
        scene.add_component(entity, Position { x: 3, y: 4 }).unwrap();
        scene.update(0.0);

        let mut clone = Scene::new();
        assert!(scene.clone_self(&mut clone, true));

        assert_eq!(
            clone.get_component::<Position>(entity).unwrap(),
            &Position { x: 3, y: 4 }
        );
        assert_eq!(
            clone.get_system::<PositionSystem>().unwrap().base().entities(),
            &[entity]
        );

        // Copies are independent.
        clone.get_component_mut::<Position>(entity).unwrap().x = 99;
        assert_eq!(scene.get_component::<Position>(entity).unwrap().x, 3);
    }

    #[test]
    fn clear_resets_storage_and_buffers() {
        let mut scene = Scene::new();
        let entity = scene.create_entity();
        scene.add_component(entity, Stat { val: 2 }).unwrap();

        assert!(scene.clear_self());
        assert!(!scene.has_component::<Stat>(entity));

        let fresh = scene.create_entity();
        assert_eq!(fresh.index(), 0);
    }

    struct RecordingTarget {
        draws: usize,
    }
    impl RenderTarget for RecordingTarget {}

    struct Sprite;
    impl Drawable for Sprite {
        fn draw(&self, target: &mut dyn RenderTarget) {
            let any: &mut dyn std::any::Any = target;
            if let Some(recorder) = any.downcast_mut::<RecordingTarget>() {
                recorder.draws += 1;
            }
        }
    }

    #[test]
    fn direct_draw_scene_walks_drawables() {
        let mut scene = Scene::without_systems();
        scene.add_drawable(Box::new(Sprite));
        scene.add_drawable(Box::new(Sprite));

        let mut target = RecordingTarget { draws: 0 };
        scene.draw(&mut target);
        assert_eq!(target.draws, 2);
    }
}
