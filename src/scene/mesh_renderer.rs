//! Component drawing a mesh with a material

use std::sync::Arc;

use crate::resources::{Material, Mesh};

use super::{Component, RenderContext};

/// Draws `mesh` with `material` at the owning entity's world matrix.
///
/// Either may be unset; the renderer then skips the draw.
#[derive(Debug, Default, Clone)]
pub struct MeshRenderer {
    pub mesh: Option<Arc<Mesh>>,
    pub material: Option<Arc<Material>>,
}

impl MeshRenderer {
    pub fn new(mesh: Arc<Mesh>, material: Arc<Material>) -> Self {
        Self {
            mesh: Some(mesh),
            material: Some(material),
        }
    }

    pub fn set_mesh(&mut self, mesh: Option<Arc<Mesh>>) {
        self.mesh = mesh;
    }

    pub fn set_material(&mut self, material: Option<Arc<Material>>) {
        self.material = material;
    }
}

impl Component for MeshRenderer {
    fn render(&self, ctx: &mut RenderContext<'_>) {
        ctx.target
            .render_mesh(self.mesh.as_deref(), self.material.as_deref(), &ctx.world);
    }
}
