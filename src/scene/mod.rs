//! Scene graph
//!
//! A [`Scene`] owns its entities in an arena keyed by [`EntityId`]. Parent
//! and child links are handles, so destroying an entity out of traversal
//! order never leaves a dangling reference: its children are promoted to
//! roots instead.
//!
//! Update and render traverse root entities in registration order and
//! descend depth-first. An inactive entity prunes its whole subtree.

mod camera;
mod camera_controller;
mod component;
mod entity;
mod light;
mod manager;
mod mesh_renderer;
mod transform;

pub use camera::*;
pub use camera_controller::*;
pub use component::*;
pub use entity::*;
pub use light::*;
pub use manager::*;
pub use mesh_renderer::*;
pub use transform::*;

use glam::{Mat4, Vec3};
use slotmap::SlotMap;

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::renderer::DrawTarget;
use crate::resources::LoadContext;

/// Hooks run by the [`SceneManager`] around a scene's live period.
pub trait SceneLifecycle {
    /// Populate the scene. Resources are loaded through `ctx`.
    fn on_load(&mut self, scene: &mut Scene, ctx: &mut LoadContext<'_>) -> EngineResult<()>;

    /// Runs to completion before the scene's entities are dropped.
    fn on_unload(&mut self, _scene: &mut Scene, _context: &mut EngineContext) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Created,
    Loaded,
    Unloaded,
}

/// A named collection of entities and cameras
pub struct Scene {
    name: String,
    entities: SlotMap<EntityId, Entity>,
    /// Registration order, independent of the hierarchy
    order: Vec<EntityId>,
    cameras: SlotMap<CameraId, Camera>,
    active_camera: Option<CameraId>,
    lifecycle: Option<Box<dyn SceneLifecycle>>,
    state: SceneState,
    next_component_id: u64,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: SlotMap::with_key(),
            order: Vec::new(),
            cameras: SlotMap::with_key(),
            active_camera: None,
            lifecycle: None,
            state: SceneState::Created,
            next_component_id: 0,
        }
    }

    pub fn with_lifecycle(mut self, lifecycle: impl SceneLifecycle + 'static) -> Self {
        self.lifecycle = Some(Box::new(lifecycle));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    // Entities

    pub fn create_entity(&mut self, name: impl Into<String>) -> EntityId {
        let id = self.entities.insert(Entity::new(name));
        self.order.push(id);
        id
    }

    /// Remove an entity and its components. Children become roots.
    pub fn destroy_entity(&mut self, id: EntityId) -> EngineResult<()> {
        let entity = self
            .entities
            .remove(id)
            .ok_or(EngineError::EntityNotFound(id))?;
        self.order.retain(|&other| other != id);

        if let Some(parent) = entity.parent.and_then(|p| self.entities.get_mut(p)) {
            parent.children.retain(|&child| child != id);
        }
        for &child in &entity.children {
            if let Some(child_entity) = self.entities.get_mut(child) {
                child_entity.parent = None;
            }
            self.mark_subtree_dirty(child);
        }

        log::trace!("Destroyed entity '{}'", entity.name());
        Ok(())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entity_count(&self) -> usize {
        self.order.len()
    }

    /// All entities in registration order
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.order
            .iter()
            .filter_map(|&id| self.entities.get(id).map(|entity| (id, entity)))
    }

    /// Parentless entities in registration order
    pub fn roots(&self) -> Vec<EntityId> {
        self.entities()
            .filter(|(_, entity)| entity.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// First entity with the given name, in registration order
    pub fn find_entity(&self, name: &str) -> Option<EntityId> {
        self.entities()
            .find(|(_, entity)| entity.name() == name)
            .map(|(id, _)| id)
    }

    pub fn set_active(&mut self, id: EntityId, active: bool) -> EngineResult<()> {
        self.entities
            .get_mut(id)
            .ok_or(EngineError::EntityNotFound(id))?
            .set_active(active);
        Ok(())
    }

    // Hierarchy

    /// Reparent `child` under `parent`, or make it a root with `None`.
    ///
    /// Fails with [`EngineError::InvalidHierarchy`] when `parent` is `child`
    /// itself or one of its descendants; links are left untouched then.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> EngineResult<()> {
        if !self.entities.contains_key(child) {
            return Err(EngineError::EntityNotFound(child));
        }
        if let Some(parent) = parent {
            if !self.entities.contains_key(parent) {
                return Err(EngineError::EntityNotFound(parent));
            }
            if parent == child || self.is_descendant_of(parent, child) {
                return Err(EngineError::InvalidHierarchy { child, parent });
            }
        }

        let old_parent = self.entities[child].parent;
        if old_parent == parent {
            return Ok(());
        }
        if let Some(old) = old_parent.and_then(|p| self.entities.get_mut(p)) {
            old.children.retain(|&c| c != child);
        }
        if let Some(new) = parent {
            self.entities[new].children.push(child);
        }
        self.entities[child].parent = parent;
        self.mark_subtree_dirty(child);
        Ok(())
    }

    /// Whether `ancestor` appears on the parent chain of `id`
    pub fn is_descendant_of(&self, id: EntityId, ancestor: EntityId) -> bool {
        let mut current = self.entities.get(id).and_then(|e| e.parent);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.entities.get(node).and_then(|e| e.parent);
        }
        false
    }

    // Transforms

    pub fn transform(&self, id: EntityId) -> Option<&Transform> {
        self.entities.get(id).map(|entity| &entity.transform)
    }

    /// Mutate an entity's transform and invalidate its subtree
    pub fn modify_transform(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Transform),
    ) -> EngineResult<()> {
        let entity = self
            .entities
            .get_mut(id)
            .ok_or(EngineError::EntityNotFound(id))?;
        f(&mut entity.transform);
        self.mark_subtree_dirty(id);
        Ok(())
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec3) -> EngineResult<()> {
        self.modify_transform(id, |t| t.set_position(position))
    }

    pub fn set_rotation(&mut self, id: EntityId, rotation: Vec3) -> EngineResult<()> {
        self.modify_transform(id, |t| t.set_rotation(rotation))
    }

    pub fn set_scale(&mut self, id: EntityId, scale: Vec3) -> EngineResult<()> {
        self.modify_transform(id, |t| t.set_scale(scale))
    }

    pub fn translate(&mut self, id: EntityId, offset: Vec3) -> EngineResult<()> {
        self.modify_transform(id, |t| t.translate(offset))
    }

    pub fn rotate(&mut self, id: EntityId, delta: Vec3) -> EngineResult<()> {
        self.modify_transform(id, |t| t.rotate(delta))
    }

    /// World matrix of `id`, resolving dirty ancestors first
    pub fn world_matrix(&mut self, id: EntityId) -> EngineResult<Mat4> {
        if !self.entities.contains_key(id) {
            return Err(EngineError::EntityNotFound(id));
        }

        let mut chain = vec![id];
        let mut current = self.entities[id].parent;
        while let Some(node) = current {
            chain.push(node);
            current = self.entities.get(node).and_then(|e| e.parent);
        }

        let mut parent_world: Option<Mat4> = None;
        for node in chain.into_iter().rev() {
            let world = self.entities[node].transform.resolve_world(parent_world.as_ref());
            parent_world = Some(world);
        }
        Ok(parent_world.unwrap_or(Mat4::IDENTITY))
    }

    /// Transposed world matrix, for row-major shader conventions
    pub fn world_matrix_transpose(&mut self, id: EntityId) -> EngineResult<Mat4> {
        self.world_matrix(id).map(|m| m.transpose())
    }

    /// Resolve every dirty world matrix, parents before children
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(EntityId, Option<Mat4>)> =
            self.roots().into_iter().rev().map(|id| (id, None)).collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let world = entity.transform.resolve_world(parent_world.as_ref());
            stack.extend(entity.children.iter().rev().map(|&child| (child, Some(world))));
        }
    }

    fn mark_subtree_dirty(&mut self, id: EntityId) {
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if let Some(entity) = self.entities.get_mut(node) {
                entity.transform.mark_dirty();
                stack.extend_from_slice(&entity.children);
            }
        }
    }

    // Components

    /// Attach a component; it is enabled and runs after those added before it.
    pub fn add_component<T: Component>(
        &mut self,
        entity: EntityId,
        mut component: T,
    ) -> EngineResult<ComponentHandle<T>> {
        let target = self
            .entities
            .get_mut(entity)
            .ok_or(EngineError::EntityNotFound(entity))?;

        let id = ComponentId(self.next_component_id);
        self.next_component_id += 1;

        component.on_attach(entity);
        target.components.push(id, Box::new(component));
        Ok(ComponentHandle::new(entity, id))
    }

    /// First component of type `T` on the entity, in insertion order
    pub fn component<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.entities.get(entity)?.components.first::<T>()
    }

    pub fn component_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.entities.get_mut(entity)?.components.first_mut::<T>()
    }

    pub fn components<T: Component>(&self, entity: EntityId) -> impl Iterator<Item = &T> {
        self.entities
            .get(entity)
            .into_iter()
            .flat_map(|e| e.components.all::<T>())
    }

    pub fn get<T: Component>(&self, handle: ComponentHandle<T>) -> Option<&T> {
        self.entities.get(handle.entity)?.components.get::<T>(handle.id)
    }

    pub fn get_mut<T: Component>(&mut self, handle: ComponentHandle<T>) -> Option<&mut T> {
        self.entities
            .get_mut(handle.entity)?
            .components
            .get_mut::<T>(handle.id)
    }

    /// Remove every component of type `T`; returns how many were removed
    pub fn remove_components<T: Component>(&mut self, entity: EntityId) -> usize {
        self.entities
            .get_mut(entity)
            .map_or(0, |e| e.components.remove_all::<T>())
    }

    pub fn remove_component<T>(&mut self, handle: ComponentHandle<T>) -> bool {
        self.entities
            .get_mut(handle.entity)
            .is_some_and(|e| e.components.remove(handle.id))
    }

    pub fn set_component_enabled<T>(&mut self, handle: ComponentHandle<T>, enabled: bool) -> bool {
        self.entities
            .get_mut(handle.entity)
            .is_some_and(|e| e.components.set_enabled(handle.id, enabled))
    }

    pub fn is_component_enabled<T>(&self, handle: ComponentHandle<T>) -> Option<bool> {
        self.entities
            .get(handle.entity)?
            .components
            .is_enabled(handle.id)
    }

    // Cameras

    /// Add a camera; the first one added becomes active.
    pub fn add_camera(&mut self, camera: Camera) -> CameraId {
        let id = self.cameras.insert(camera);
        if self.active_camera.is_none() {
            self.active_camera = Some(id);
        }
        id
    }

    pub fn remove_camera(&mut self, id: CameraId) -> Option<Camera> {
        if self.active_camera == Some(id) {
            self.active_camera = None;
        }
        self.cameras.remove(id)
    }

    pub fn camera(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.get(id)
    }

    pub fn camera_mut(&mut self, id: CameraId) -> Option<&mut Camera> {
        self.cameras.get_mut(id)
    }

    /// Select the active camera. Returns `false` for an unknown id.
    pub fn set_active_camera(&mut self, id: Option<CameraId>) -> bool {
        match id {
            Some(id) if !self.cameras.contains_key(id) => false,
            _ => {
                self.active_camera = id;
                true
            }
        }
    }

    pub fn active_camera_id(&self) -> Option<CameraId> {
        self.active_camera
    }

    pub fn active_camera(&self) -> Option<&Camera> {
        self.cameras.get(self.active_camera?)
    }

    pub fn active_camera_mut(&mut self) -> Option<&mut Camera> {
        self.cameras.get_mut(self.active_camera?)
    }

    // Lifecycle

    pub(crate) fn load(&mut self, ctx: &mut LoadContext<'_>) -> EngineResult<()> {
        if let Some(mut lifecycle) = self.lifecycle.take() {
            let result = lifecycle.on_load(self, ctx);
            self.lifecycle = Some(lifecycle);
            result?;
        }
        self.state = SceneState::Loaded;
        log::info!(
            "Scene '{}' loaded with {} entities",
            self.name,
            self.entity_count()
        );
        Ok(())
    }

    pub(crate) fn unload(&mut self, context: &mut EngineContext) {
        if let Some(mut lifecycle) = self.lifecycle.take() {
            lifecycle.on_unload(self, context);
            self.lifecycle = Some(lifecycle);
        }
        self.entities.clear();
        self.order.clear();
        self.cameras.clear();
        self.active_camera = None;
        context.lights.clear();
        self.state = SceneState::Unloaded;
        log::info!("Scene '{}' unloaded", self.name);
    }

    // Traversal

    /// Run enabled components depth-first from the roots. No-op unless loaded.
    pub fn update(&mut self, context: &mut EngineContext) {
        if self.state != SceneState::Loaded {
            return;
        }
        for root in self.roots() {
            self.update_entity(root, context);
        }
    }

    fn update_entity(&mut self, id: EntityId, context: &mut EngineContext) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        if !entity.is_active() {
            return;
        }

        let dt = context.time.delta();
        for component_id in entity.components.enabled_ids() {
            let Some(mut component) = self
                .entities
                .get_mut(id)
                .and_then(|e| e.components.take(component_id))
            else {
                continue;
            };

            component.update(&mut UpdateContext {
                entity: id,
                dt,
                scene: self,
                context,
            });

            // Dropped here if the component or its entity went away meanwhile
            if let Some(entity) = self.entities.get_mut(id) {
                entity.components.restore(component_id, component);
            }
        }

        let children = match self.entities.get(id) {
            Some(entity) => entity.children.clone(),
            None => return,
        };
        for child in children {
            self.update_entity(child, context);
        }
    }

    /// Resolve world matrices, hand the active camera to `target`, then let
    /// enabled components draw depth-first from the roots. No-op unless loaded.
    pub fn render(&mut self, target: &mut dyn DrawTarget) {
        if self.state != SceneState::Loaded {
            return;
        }
        self.update_world_matrices();
        target.set_camera(self.active_camera());
        for root in self.roots() {
            self.render_entity(root, Mat4::IDENTITY, target);
        }
    }

    fn render_entity(&self, id: EntityId, parent_world: Mat4, target: &mut dyn DrawTarget) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        if !entity.is_active() {
            return;
        }

        let world = entity
            .transform
            .cached_world_matrix()
            .unwrap_or_else(|| parent_world * entity.transform.local_matrix());

        for component in entity.components.enabled() {
            component.render(&mut RenderContext {
                entity: id,
                world,
                target: &mut *target,
            });
        }
        for &child in entity.children() {
            self.render_entity(child, world, target);
        }
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("entities", &self.order.len())
            .field("cameras", &self.cameras.len())
            .field("active_camera", &self.active_camera)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::resources::{Material, Mesh, NoGpu};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records update and render calls under a label
    pub(crate) struct Recorder {
        label: String,
        log: Log,
    }

    impl Recorder {
        pub(crate) fn new(label: &str, log: &Log) -> Self {
            Self {
                label: label.to_string(),
                log: log.clone(),
            }
        }
    }

    impl Component for Recorder {
        fn update(&mut self, _ctx: &mut UpdateContext<'_>) {
            self.log.borrow_mut().push(format!("update {}", self.label));
        }

        fn render(&self, ctx: &mut RenderContext<'_>) {
            self.log.borrow_mut().push(format!("render {}", self.label));
            ctx.target.render_mesh(None, None, &ctx.world);
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingTarget {
        pub camera_set: Vec<bool>,
        pub draws: Vec<Mat4>,
    }

    impl DrawTarget for RecordingTarget {
        fn set_camera(&mut self, camera: Option<&Camera>) {
            self.camera_set.push(camera.is_some());
        }

        fn render_mesh(&mut self, _mesh: Option<&Mesh>, _material: Option<&Material>, world: &Mat4) {
            self.draws.push(*world);
        }
    }

    fn loaded(name: &str) -> Scene {
        let mut scene = Scene::new(name);
        let mut context = EngineContext::default();
        let mut factory = NoGpu;
        scene
            .load(&mut LoadContext {
                context: &mut context,
                factory: &mut factory,
            })
            .unwrap();
        scene
    }

    fn approx_mat(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn world_is_parent_times_local() {
        let mut scene = Scene::new("test");
        let parent = scene.create_entity("parent");
        let child = scene.create_entity("child");
        scene.set_parent(child, Some(parent)).unwrap();

        scene
            .modify_transform(parent, |t| {
                t.set_position(Vec3::new(1.0, 2.0, 3.0));
                t.set_rotation(Vec3::new(0.2, 0.7, -0.1));
                t.set_scale(Vec3::new(2.0, 1.0, 0.5));
            })
            .unwrap();
        scene.set_position(child, Vec3::new(0.0, 1.0, 4.0)).unwrap();
        scene.set_rotation(child, Vec3::new(0.0, 0.3, 0.0)).unwrap();

        let parent_world = scene.world_matrix(parent).unwrap();
        let child_local = scene.transform(child).unwrap().local_matrix();
        let child_world = scene.world_matrix(child).unwrap();
        assert!(approx_mat(child_world, parent_world * child_local));

        // Moving the parent invalidates the child
        scene.translate(parent, Vec3::X).unwrap();
        assert!(scene.transform(child).unwrap().is_dirty());
        let parent_world = scene.world_matrix(parent).unwrap();
        assert!(approx_mat(
            scene.world_matrix(child).unwrap(),
            parent_world * child_local
        ));
        assert!(approx_mat(
            scene.world_matrix_transpose(child).unwrap(),
            (parent_world * child_local).transpose()
        ));
    }

    #[test]
    fn grandchild_composes_whole_chain() {
        let mut scene = Scene::new("test");
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        let c = scene.create_entity("c");
        scene.set_parent(b, Some(a)).unwrap();
        scene.set_parent(c, Some(b)).unwrap();
        scene.set_position(a, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        scene.set_scale(b, Vec3::splat(2.0)).unwrap();
        scene.set_position(c, Vec3::new(0.0, 1.0, 0.0)).unwrap();

        scene.update_world_matrices();
        let world = scene.transform(c).unwrap().cached_world_matrix().unwrap();
        assert!(world
            .w_axis
            .truncate()
            .abs_diff_eq(Vec3::new(1.0, 2.0, 0.0), 1e-5));
    }

    #[test]
    fn create_then_destroy_round_trips() {
        let mut scene = Scene::new("test");
        let a = scene.create_entity("a");
        let before: Vec<EntityId> = scene.entities().map(|(id, _)| id).collect();

        let temp = scene.create_entity("temp");
        scene.destroy_entity(temp).unwrap();

        let after: Vec<EntityId> = scene.entities().map(|(id, _)| id).collect();
        assert_eq!(before, after);
        assert_eq!(after, vec![a]);
        assert!(matches!(
            scene.destroy_entity(temp),
            Err(EngineError::EntityNotFound(_))
        ));
    }

    #[test]
    fn destroying_parent_promotes_children() {
        let mut scene = Scene::new("test");
        let root = scene.create_entity("root");
        let middle = scene.create_entity("middle");
        let leaf = scene.create_entity("leaf");
        scene.set_parent(middle, Some(root)).unwrap();
        scene.set_parent(leaf, Some(middle)).unwrap();
        scene.set_position(middle, Vec3::X).unwrap();
        scene.world_matrix(leaf).unwrap();

        scene.destroy_entity(middle).unwrap();

        assert_eq!(scene.entity(leaf).unwrap().parent(), None);
        assert!(scene.entity(root).unwrap().children().is_empty());
        assert_eq!(scene.roots(), vec![root, leaf]);
        assert_eq!(scene.world_matrix(leaf).unwrap(), Mat4::IDENTITY);
    }

    #[test]
    fn cycles_are_rejected_without_changes() {
        let mut scene = Scene::new("test");
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        let c = scene.create_entity("c");
        scene.set_parent(b, Some(a)).unwrap();
        scene.set_parent(c, Some(b)).unwrap();

        assert!(matches!(
            scene.set_parent(a, Some(c)),
            Err(EngineError::InvalidHierarchy { .. })
        ));
        assert!(matches!(
            scene.set_parent(a, Some(a)),
            Err(EngineError::InvalidHierarchy { .. })
        ));

        assert_eq!(scene.entity(a).unwrap().parent(), None);
        assert_eq!(scene.entity(a).unwrap().children(), &[b]);
        assert_eq!(scene.entity(c).unwrap().parent(), Some(b));
        assert!(scene.entity(c).unwrap().children().is_empty());
    }

    #[test]
    fn reparenting_moves_child_between_lists() {
        let mut scene = Scene::new("test");
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        let child = scene.create_entity("child");
        scene.set_parent(child, Some(a)).unwrap();
        scene.set_parent(child, Some(b)).unwrap();

        assert!(scene.entity(a).unwrap().children().is_empty());
        assert_eq!(scene.entity(b).unwrap().children(), &[child]);
        assert!(scene.is_descendant_of(child, b));

        scene.set_parent(child, None).unwrap();
        assert!(scene.entity(b).unwrap().children().is_empty());
        assert_eq!(scene.roots(), vec![a, b, child]);
    }

    #[test]
    fn traversal_visits_roots_then_children_once() {
        let log = Log::default();
        let mut scene = loaded("test");
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        let a1 = scene.create_entity("a1");
        let a2 = scene.create_entity("a2");
        scene.set_parent(a2, Some(a)).unwrap();
        scene.set_parent(a1, Some(a)).unwrap();
        for (id, label) in [(a, "a"), (b, "b"), (a1, "a1"), (a2, "a2")] {
            scene.add_component(id, Recorder::new(label, &log)).unwrap();
        }

        let mut context = EngineContext::default();
        scene.update(&mut context);
        assert_eq!(
            *log.borrow(),
            vec!["update a", "update a2", "update a1", "update b"]
        );
    }

    #[test]
    fn inactive_entity_prunes_subtree() {
        let log = Log::default();
        let mut scene = loaded("test");
        let parent = scene.create_entity("parent");
        let child = scene.create_entity("child");
        scene.set_parent(child, Some(parent)).unwrap();
        scene.add_component(parent, Recorder::new("parent", &log)).unwrap();
        scene.add_component(child, Recorder::new("child", &log)).unwrap();

        scene.set_active(parent, false).unwrap();
        let mut context = EngineContext::default();
        let mut target = RecordingTarget::default();
        scene.update(&mut context);
        scene.render(&mut target);

        assert!(log.borrow().is_empty());
        assert!(target.draws.is_empty());
    }

    #[test]
    fn components_run_in_insertion_order_when_enabled() {
        let log = Log::default();
        let mut scene = loaded("test");
        let e = scene.create_entity("e");
        let first = scene.add_component(e, Recorder::new("first", &log)).unwrap();
        scene.add_component(e, Recorder::new("second", &log)).unwrap();

        assert_eq!(scene.component::<Recorder>(e).unwrap().label, "first");
        assert_eq!(scene.components::<Recorder>(e).count(), 2);

        scene.set_component_enabled(first, false);
        scene.update(&mut EngineContext::default());
        assert_eq!(*log.borrow(), vec!["update second"]);
        assert_eq!(scene.is_component_enabled(first), Some(false));

        assert_eq!(scene.remove_components::<Recorder>(e), 2);
        assert!(scene.get(first).is_none());
    }

    #[test]
    fn render_passes_world_matrix_and_camera() {
        let log = Log::default();
        let mut scene = loaded("test");
        let parent = scene.create_entity("parent");
        let child = scene.create_entity("child");
        scene.set_parent(child, Some(parent)).unwrap();
        scene.set_position(parent, Vec3::new(0.0, 0.0, 5.0)).unwrap();
        scene.set_position(child, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        scene.add_component(child, Recorder::new("child", &log)).unwrap();

        let mut target = RecordingTarget::default();
        scene.render(&mut target);
        assert_eq!(target.camera_set, vec![false]);
        assert_eq!(target.draws.len(), 1);
        assert!(target.draws[0]
            .w_axis
            .truncate()
            .abs_diff_eq(Vec3::new(1.0, 0.0, 5.0), 1e-5));

        scene.add_camera(Camera::default());
        scene.render(&mut target);
        assert_eq!(target.camera_set, vec![false, true]);
    }

    #[test]
    fn nothing_runs_before_load() {
        let log = Log::default();
        let mut scene = Scene::new("test");
        let e = scene.create_entity("e");
        scene.add_component(e, Recorder::new("e", &log)).unwrap();

        let mut target = RecordingTarget::default();
        scene.update(&mut EngineContext::default());
        scene.render(&mut target);
        assert!(log.borrow().is_empty());
        assert!(target.camera_set.is_empty());
    }

    struct Spawner {
        spawned: bool,
    }

    impl Component for Spawner {
        fn update(&mut self, ctx: &mut UpdateContext<'_>) {
            if !self.spawned {
                let child = ctx.scene.create_entity("spawned");
                ctx.scene.set_parent(child, Some(ctx.entity)).unwrap();
                ctx.scene.translate(ctx.entity, Vec3::Y).unwrap();
                self.spawned = true;
            }
        }
    }

    struct SelfDestruct;

    impl Component for SelfDestruct {
        fn update(&mut self, ctx: &mut UpdateContext<'_>) {
            ctx.scene.destroy_entity(ctx.entity).unwrap();
        }
    }

    #[test]
    fn components_can_edit_the_scene_during_update() {
        let mut scene = loaded("test");
        let spawner = scene.create_entity("spawner");
        scene.add_component(spawner, Spawner { spawned: false }).unwrap();
        let doomed = scene.create_entity("doomed");
        scene.add_component(doomed, SelfDestruct).unwrap();

        scene.update(&mut EngineContext::default());

        assert!(!scene.contains(doomed));
        assert_eq!(scene.entity(spawner).unwrap().children().len(), 1);
        assert!(scene.component::<Spawner>(spawner).unwrap().spawned);
        assert_eq!(
            scene.transform(spawner).unwrap().position(),
            Vec3::Y
        );
    }

    #[test]
    fn first_camera_becomes_active() {
        let mut scene = Scene::new("test");
        let first = scene.add_camera(Camera::default());
        let second = scene.add_camera(Camera::default());
        assert_eq!(scene.active_camera_id(), Some(first));

        assert!(scene.set_active_camera(Some(second)));
        scene.remove_camera(second);
        assert!(scene.active_camera().is_none());
        assert!(!scene.set_active_camera(Some(second)));
    }
}
