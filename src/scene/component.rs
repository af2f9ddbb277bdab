//! Components: behaviour units owned by an entity

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;

use glam::Mat4;

use crate::context::EngineContext;
use crate::input::Input;
use crate::renderer::DrawTarget;
use crate::time::Time;

use super::{EntityId, Scene};

/// Upcast helper so `dyn Component` can be downcast to its concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A behaviour attached to an entity.
///
/// Both capabilities default to doing nothing, so a component implements
/// only the ones it needs.
pub trait Component: AsAny {
    /// Called once when the component is added, with its owner.
    fn on_attach(&mut self, _owner: EntityId) {}

    /// Per-tick logic. The component is detached from its slot for the
    /// duration of the call, so it may freely mutate the scene.
    fn update(&mut self, _ctx: &mut UpdateContext<'_>) {}

    /// Issue draws for the owning entity.
    fn render(&self, _ctx: &mut RenderContext<'_>) {}
}

/// Everything a component sees during `update`.
pub struct UpdateContext<'a> {
    pub entity: EntityId,
    pub dt: f32,
    pub scene: &'a mut Scene,
    pub context: &'a mut EngineContext,
}

impl UpdateContext<'_> {
    pub fn input(&self) -> &Input {
        &self.context.input
    }

    pub fn time(&self) -> &Time {
        &self.context.time
    }
}

/// Everything a component sees during `render`.
pub struct RenderContext<'a> {
    pub entity: EntityId,
    /// World matrix of the owning entity
    pub world: Mat4,
    pub target: &'a mut dyn DrawTarget,
}

/// Scene-unique component identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u64);

/// Typed, non-owning handle to a component.
pub struct ComponentHandle<T> {
    pub entity: EntityId,
    pub id: ComponentId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ComponentHandle<T> {
    pub(crate) fn new(entity: EntityId, id: ComponentId) -> Self {
        Self {
            entity,
            id,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for ComponentHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentHandle<T> {}

impl<T> std::fmt::Debug for ComponentHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("entity", &self.entity)
            .field("id", &self.id)
            .finish()
    }
}

pub(crate) struct ComponentSlot {
    pub id: ComponentId,
    pub type_id: TypeId,
    pub enabled: bool,
    /// `None` only while the component is running its own update
    pub component: Option<Box<dyn Component>>,
}

/// Components of one entity in insertion order, indexed by concrete type.
#[derive(Default)]
pub(crate) struct ComponentList {
    slots: Vec<ComponentSlot>,
    by_type: HashMap<TypeId, Vec<usize>>,
}

impl ComponentList {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn push(&mut self, id: ComponentId, component: Box<dyn Component>) {
        let type_id = component.as_ref().as_any().type_id();
        self.by_type.entry(type_id).or_default().push(self.slots.len());
        self.slots.push(ComponentSlot {
            id,
            type_id,
            enabled: true,
            component: Some(component),
        });
    }

    pub fn first<T: Component>(&self) -> Option<&T> {
        self.by_type
            .get(&TypeId::of::<T>())?
            .iter()
            .find_map(|&index| self.slots[index].component.as_ref())
            .and_then(|c| c.as_ref().as_any().downcast_ref::<T>())
    }

    pub fn first_mut<T: Component>(&mut self) -> Option<&mut T> {
        let index = *self
            .by_type
            .get(&TypeId::of::<T>())?
            .iter()
            .find(|&&index| self.slots[index].component.is_some())?;
        self.slots[index]
            .component
            .as_mut()
            .and_then(|c| c.as_mut().as_any_mut().downcast_mut::<T>())
    }

    pub fn all<T: Component>(&self) -> impl Iterator<Item = &T> {
        self.by_type
            .get(&TypeId::of::<T>())
            .into_iter()
            .flatten()
            .filter_map(|&index| self.slots[index].component.as_ref())
            .filter_map(|c| c.as_ref().as_any().downcast_ref::<T>())
    }

    pub fn get<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.slot(id)?
            .component
            .as_ref()?
            .as_ref()
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn get_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.slot_mut(id)?
            .component
            .as_mut()?
            .as_mut()
            .as_any_mut()
            .downcast_mut::<T>()
    }

    pub fn count<T: Component>(&self) -> usize {
        self.by_type
            .get(&TypeId::of::<T>())
            .map_or(0, |indices| indices.len())
    }

    /// Remove every component of type `T`, returning how many were removed.
    pub fn remove_all<T: Component>(&mut self) -> usize {
        let type_id = TypeId::of::<T>();
        let before = self.slots.len();
        self.slots.retain(|slot| slot.type_id != type_id);
        let removed = before - self.slots.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    pub fn remove(&mut self, id: ComponentId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.id != id);
        let removed = before != self.slots.len();
        if removed {
            self.reindex();
        }
        removed
    }

    pub fn set_enabled(&mut self, id: ComponentId, enabled: bool) -> bool {
        match self.slot_mut(id) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self, id: ComponentId) -> Option<bool> {
        self.slot(id).map(|slot| slot.enabled)
    }

    /// Ids of enabled components, in insertion order
    pub fn enabled_ids(&self) -> Vec<ComponentId> {
        self.slots
            .iter()
            .filter(|slot| slot.enabled)
            .map(|slot| slot.id)
            .collect()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &dyn Component> {
        self.slots
            .iter()
            .filter(|slot| slot.enabled)
            .filter_map(|slot| slot.component.as_deref())
    }

    /// Detach an enabled component so it can run with mutable scene access.
    pub fn take(&mut self, id: ComponentId) -> Option<Box<dyn Component>> {
        let slot = self.slot_mut(id)?;
        if !slot.enabled {
            return None;
        }
        slot.component.take()
    }

    /// Put a detached component back. Returns it if its slot was removed meanwhile.
    pub fn restore(
        &mut self,
        id: ComponentId,
        component: Box<dyn Component>,
    ) -> Option<Box<dyn Component>> {
        match self.slot_mut(id) {
            Some(slot) => {
                slot.component = Some(component);
                None
            }
            None => Some(component),
        }
    }

    fn slot(&self, id: ComponentId) -> Option<&ComponentSlot> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    fn slot_mut(&mut self, id: ComponentId) -> Option<&mut ComponentSlot> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    fn reindex(&mut self) {
        self.by_type.clear();
        for (index, slot) in self.slots.iter().enumerate() {
            self.by_type.entry(slot.type_id).or_default().push(index);
        }
    }
}
