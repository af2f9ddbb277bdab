//! Scene graph nodes

use slotmap::new_key_type;

use super::component::ComponentList;
use super::Transform;

new_key_type! {
    /// Handle to an entity stored in a [`Scene`](super::Scene).
    pub struct EntityId;
}

/// A node of the scene graph.
///
/// Parent and children are handles into the owning scene's arena; the scene
/// keeps both directions consistent.
pub struct Entity {
    name: String,
    pub(crate) transform: Transform,
    active: bool,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: Vec<EntityId>,
    pub(crate) components: ComponentList,
}

impl Entity {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            active: true,
            parent: None,
            children: Vec::new(),
            components: ComponentList::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// An inactive entity skips itself and its whole subtree during traversal
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn children(&self) -> &[EntityId] {
        &self.children
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("active", &self.active)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("components", &self.components.len())
            .finish()
    }
}
