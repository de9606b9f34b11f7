// container.rs - Type-erased per-type component storage
//
// One container exists per registered component type, addressed by the
// type's ComponentId. The untyped interface is what EntityManager iterates
// during teardown, duplication, and scene cloning; typed access goes through
// a downcast to the concrete ComponentContainer<T>.

use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::component::{Component, ComponentId};
use super::entity::EntityIndex;

/// Untyped view of a component container, erasable by entity index.
pub trait AnyContainer: Any {
    /// Id of the component type stored here.
    fn component_id(&self) -> ComponentId;

    /// Number of currently-resident components.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn has(&self, index: EntityIndex) -> bool;

    /// Erase the slot for `index`, invoking the component's destroy hook
    /// first. Removing an absent index is a tolerated no-op returning
    /// `false`; bulk teardown paths call this unconditionally.
    fn remove(&mut self, index: EntityIndex) -> bool;

    /// Erase the slot for `index` without invoking the destroy hook. Used
    /// when dropping retained copies whose live counterpart already ran the
    /// hook (or was restored).
    fn discard(&mut self, index: EntityIndex) -> bool;

    /// Copy the component at `from` into a fresh slot at `to`. A missing
    /// source is a no-op returning `false`; the destination is left
    /// untouched.
    fn duplicate(&mut self, from: EntityIndex, to: EntityIndex) -> bool;

    /// New empty container of the same concrete type and component id.
    fn clone_empty(&self) -> Box<dyn AnyContainer>;

    /// Copy one entity's component into a parallel container of the same
    /// component type. Returns `false` on id mismatch, concrete-type
    /// mismatch, or missing source.
    fn clone_to(&self, target: &mut dyn AnyContainer, index: EntityIndex) -> bool;

    /// Bulk-copy every entity passing `filter` into a parallel container.
    /// Used by scene cloning, where the filter excludes destroyed entities.
    fn clone_filtered(
        &self,
        target: &mut dyn AnyContainer,
        filter: &dyn Fn(EntityIndex) -> bool,
    ) -> bool;

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Sparse storage holding exactly one `T` per entity that owns one.
#[derive(Debug)]
pub struct ComponentContainer<T: Component> {
    id: ComponentId,
    components: HashMap<EntityIndex, T>,
}

impl<T: Component> ComponentContainer<T> {
    pub fn new(id: ComponentId) -> Self {
        Self {
            id,
            components: HashMap::new(),
        }
    }

    pub fn insert(&mut self, index: EntityIndex, component: T) -> &mut T {
        match self.components.entry(index) {
            Entry::Occupied(mut slot) => {
                slot.insert(component);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(component),
        }
    }

    pub fn get(&self, index: EntityIndex) -> Option<&T> {
        self.components.get(&index)
    }

    pub fn get_mut(&mut self, index: EntityIndex) -> Option<&mut T> {
        self.components.get_mut(&index)
    }
}

impl<T: Component> AnyContainer for ComponentContainer<T> {
    fn component_id(&self) -> ComponentId {
        self.id
    }

    fn len(&self) -> usize {
        self.components.len()
    }

    fn has(&self, index: EntityIndex) -> bool {
        self.components.contains_key(&index)
    }

    fn remove(&mut self, index: EntityIndex) -> bool {
        if let Some(component) = self.components.get_mut(&index) {
            component.on_destroy();
        }
        self.components.remove(&index).is_some()
    }

    fn discard(&mut self, index: EntityIndex) -> bool {
        self.components.remove(&index).is_some()
    }

    fn duplicate(&mut self, from: EntityIndex, to: EntityIndex) -> bool {
        match self.components.get(&from) {
            Some(component) => {
                let copy = component.clone();
                self.components.insert(to, copy);
                true
            }
            None => false,
        }
    }

    fn clone_empty(&self) -> Box<dyn AnyContainer> {
        Box::new(ComponentContainer::<T>::new(self.id))
    }

    fn clone_to(&self, target: &mut dyn AnyContainer, index: EntityIndex) -> bool {
        if self.id != target.component_id() {
            return false;
        }
        let Some(target) = target.as_any_mut().downcast_mut::<ComponentContainer<T>>() else {
            return false;
        };
        match self.components.get(&index) {
            Some(component) => {
                target.insert(index, component.clone());
                true
            }
            None => false,
        }
    }

    fn clone_filtered(
        &self,
        target: &mut dyn AnyContainer,
        filter: &dyn Fn(EntityIndex) -> bool,
    ) -> bool {
        if self.id != target.component_id() {
            return false;
        }
        let Some(target) = target.as_any_mut().downcast_mut::<ComponentContainer<T>>() else {
            return false;
        };
        for (&index, component) in &self.components {
            if filter(index) {
                target.insert(index, component.clone());
            }
        }
        true
    }

    fn clear(&mut self) {
        self.components.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
