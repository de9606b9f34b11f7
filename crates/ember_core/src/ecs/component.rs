// component.rs - Component trait and runtime type-id registry
//
// Component types are identified by their TypeId and mapped to small stable
// integer ids. The id doubles as the component's bit position in entity and
// system masks, and as its slot in the container array.

use std::any::{type_name, TypeId};

use super::bitmask::MAX_COMPONENT_TYPES;

/// Stable integer id assigned to a component type for the lifetime of a
/// [`ComponentManager`].
pub type ComponentId = u32;

/// Identity key for a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    type_id: TypeId,
    name: &'static str,
}

impl ComponentKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Human-readable type name for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Plain data attached to entities.
///
/// `on_destroy` is invoked right before the component is erased from its
/// container; override it for components owning external resources such as
/// GPU handles. The default is a no-op.
pub trait Component: Clone + Send + Sync + 'static {
    fn on_destroy(&mut self) {}
}

/// Assigns a stable integer id to each component type.
///
/// Ids are positions in an ordered key list: first registration appends,
/// repeated registration of the same type returns the existing position.
/// Ids therefore grow monotonically and never change for the lifetime of
/// the manager.
#[derive(Debug, Default)]
pub struct ComponentManager {
    keys: Vec<ComponentKey>,
}

impl ComponentManager {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Id of `T`, registering it on first sight.
    pub fn id_of<T: Component>(&mut self) -> ComponentId {
        self.id_from_key(ComponentKey::of::<T>())
    }

    /// Id for an identity key, registering it on first sight.
    pub fn id_from_key(&mut self, key: ComponentKey) -> ComponentId {
        if let Some(pos) = self.keys.iter().position(|k| *k == key) {
            return pos as ComponentId;
        }
        assert!(
            self.keys.len() < MAX_COMPONENT_TYPES,
            "component type limit ({MAX_COMPONENT_TYPES}) exceeded registering {}",
            key.name()
        );
        self.keys.push(key);
        (self.keys.len() - 1) as ComponentId
    }

    /// Id of an already-registered type; `None` if `T` was never registered.
    /// Query paths use this so a read never mutates the registry.
    pub fn lookup<T: Component>(&self) -> Option<ComponentId> {
        let key = ComponentKey::of::<T>();
        self.keys
            .iter()
            .position(|k| *k == key)
            .map(|pos| pos as ComponentId)
    }

    /// Number of registered component types.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Copy the registered-type list verbatim into another manager.
    /// Used when duplicating a whole scene.
    pub fn clone_self(&self, target: &mut ComponentManager) -> bool {
        target.keys = self.keys.clone();
        true
    }

    /// Empty the registered-type list.
    pub fn clear_self(&mut self) -> bool {
        self.keys.clear();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Position;
    impl Component for Position {}

    #[derive(Clone)]
    struct Velocity;
    impl Component for Velocity {}

    #[test]
    fn registration_is_idempotent() {
        let mut manager = ComponentManager::new();
        let first = manager.id_of::<Position>();
        let second = manager.id_of::<Position>();
        assert_eq!(first, second);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn ids_grow_monotonically() {
        let mut manager = ComponentManager::new();
        let a = manager.id_of::<Position>();
        let b = manager.id_of::<Velocity>();
        assert_eq!(a, 0);
        assert_eq!(b, 1);
    }

    #[test]
    fn lookup_does_not_register() {
        let mut manager = ComponentManager::new();
        assert_eq!(manager.lookup::<Position>(), None);
        assert_eq!(manager.len(), 0);

        let id = manager.id_of::<Position>();
        assert_eq!(manager.lookup::<Position>(), Some(id));
    }

    #[test]
    fn clone_and_clear() {
        let mut manager = ComponentManager::new();
        manager.id_of::<Position>();
        manager.id_of::<Velocity>();

        let mut clone = ComponentManager::new();
        assert!(manager.clone_self(&mut clone));
        assert_eq!(clone.lookup::<Position>(), Some(0));
        assert_eq!(clone.lookup::<Velocity>(), Some(1));

        assert!(manager.clear_self());
        assert!(manager.is_empty());
    }
}
