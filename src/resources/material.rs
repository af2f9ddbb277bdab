//! Materials: a shader plus constants and texture slots

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use parking_lot::Mutex;

use crate::backend::{
    BackendResult, BindGroupEntry, BindGroupHandle, BindGroupLayoutHandle, BufferDescriptor,
    BufferHandle, BufferUsage, GraphicsBackend, SamplerHandle, TextureViewHandle,
};

use super::{Shader, Texture};

/// Number of texture slots a material binds
pub const TEXTURE_SLOT_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSlot {
    Albedo,
    Normal,
    Metallic,
    Roughness,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; TEXTURE_SLOT_COUNT] = [
        TextureSlot::Albedo,
        TextureSlot::Normal,
        TextureSlot::Metallic,
        TextureSlot::Roughness,
    ];

    pub fn index(self) -> usize {
        match self {
            TextureSlot::Albedo => 0,
            TextureSlot::Normal => 1,
            TextureSlot::Metallic => 2,
            TextureSlot::Roughness => 3,
        }
    }
}

/// Surface parameters uploaded to the material constant buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialProperties {
    pub albedo: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
    /// Multiplier on albedo added unlit
    pub emissive: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            albedo: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            ao: 1.0,
            emissive: 0.0,
        }
    }
}

impl MaterialProperties {
    pub fn with_albedo(mut self, albedo: Vec4) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_ao(mut self, ao: f32) -> Self {
        self.ao = ao;
        self
    }

    pub fn with_emissive(mut self, emissive: f32) -> Self {
        self.emissive = emissive;
        self
    }

    pub fn to_constants(&self) -> MaterialConstants {
        MaterialConstants {
            albedo: self.albedo,
            metallic: self.metallic,
            roughness: self.roughness,
            ao: self.ao,
            emissive: self.emissive,
        }
    }

    // Preset materials

    pub fn plastic(color: Vec3) -> Self {
        Self::default()
            .with_albedo(color.extend(1.0))
            .with_roughness(0.4)
    }

    pub fn metal(color: Vec3, roughness: f32) -> Self {
        Self::default()
            .with_albedo(color.extend(1.0))
            .with_metallic(1.0)
            .with_roughness(roughness)
    }

    pub fn gold() -> Self {
        Self::metal(Vec3::new(1.0, 0.766, 0.336), 0.3)
    }

    pub fn silver() -> Self {
        Self::metal(Vec3::new(0.972, 0.960, 0.915), 0.2)
    }

    pub fn copper() -> Self {
        Self::metal(Vec3::new(0.955, 0.637, 0.538), 0.4)
    }

    pub fn iron() -> Self {
        Self::metal(Vec3::new(0.56, 0.57, 0.58), 0.5)
    }

    pub fn rubber(color: Vec3) -> Self {
        Self::default()
            .with_albedo(color.extend(1.0))
            .with_roughness(0.9)
    }

    /// Translucent; pair with a blending shader
    pub fn glass() -> Self {
        Self::default()
            .with_albedo(Vec4::new(1.0, 1.0, 1.0, 0.3))
            .with_roughness(0.1)
    }

    pub fn emissive(color: Vec3, strength: f32) -> Self {
        Self::default()
            .with_albedo(color.extend(1.0))
            .with_emissive(strength)
    }
}

/// Material uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub albedo: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub ao: f32,
    pub emissive: f32,
}

/// Views bound for empty texture slots, and the shared sampler
#[derive(Debug, Clone, Copy)]
pub(crate) struct MaterialDefaults {
    pub textures: [TextureViewHandle; TEXTURE_SLOT_COUNT],
    pub sampler: SamplerHandle,
}

struct MaterialInner {
    properties: MaterialProperties,
    textures: [Option<Arc<Texture>>; TEXTURE_SLOT_COUNT],
    constants_dirty: bool,
    bind_group: Option<BindGroupHandle>,
    /// Bind groups replaced by a texture change, destroyed after the frame
    retired: Vec<BindGroupHandle>,
}

/// A shader with constants and textures.
///
/// Shared as `Arc<Material>` between mesh renderers; edits go through an
/// internal lock and are uploaded the next time the material is bound.
pub struct Material {
    name: String,
    shader: Arc<Shader>,
    constant_buffer: BufferHandle,
    inner: Mutex<MaterialInner>,
}

impl Material {
    pub(crate) fn create<B: GraphicsBackend>(
        backend: &mut B,
        name: &str,
        shader: Arc<Shader>,
        properties: MaterialProperties,
    ) -> BackendResult<Self> {
        let constants = properties.to_constants();
        let constant_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{name} constants")),
                size: std::mem::size_of::<MaterialConstants>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
            bytemuck::bytes_of(&constants),
        )?;

        Ok(Self {
            name: name.to_string(),
            shader,
            constant_buffer,
            inner: Mutex::new(MaterialInner {
                properties,
                textures: Default::default(),
                constants_dirty: false,
                bind_group: None,
                retired: Vec::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shader(&self) -> &Arc<Shader> {
        &self.shader
    }

    pub fn properties(&self) -> MaterialProperties {
        self.inner.lock().properties
    }

    pub fn set_properties(&self, properties: MaterialProperties) {
        let mut inner = self.inner.lock();
        inner.properties = properties;
        inner.constants_dirty = true;
    }

    pub fn modify_properties(&self, f: impl FnOnce(&mut MaterialProperties)) {
        let mut inner = self.inner.lock();
        f(&mut inner.properties);
        inner.constants_dirty = true;
    }

    pub fn set_albedo(&self, albedo: Vec4) {
        self.modify_properties(|p| p.albedo = albedo);
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<Arc<Texture>> {
        self.inner.lock().textures[slot.index()].clone()
    }

    /// Assign or clear a texture slot; takes effect at the next bind
    pub fn set_texture(&self, slot: TextureSlot, texture: Option<Arc<Texture>>) {
        let mut inner = self.inner.lock();
        inner.textures[slot.index()] = texture;
        if let Some(old) = inner.bind_group.take() {
            inner.retired.push(old);
        }
    }

    /// Whether edited constants are waiting for upload
    pub fn needs_upload(&self) -> bool {
        self.inner.lock().constants_dirty
    }

    /// Upload pending constants, then bind pipeline and group 2.
    ///
    /// A failed constant upload keeps the previous contents bound and is
    /// retried on the next bind. Replaced bind groups are moved to `garbage`
    /// for the caller to destroy once the frame has been submitted.
    pub(crate) fn bind<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        layout: BindGroupLayoutHandle,
        defaults: &MaterialDefaults,
        garbage: &mut Vec<BindGroupHandle>,
    ) -> BackendResult<()> {
        let mut inner = self.inner.lock();
        garbage.append(&mut inner.retired);

        if inner.constants_dirty {
            let constants = inner.properties.to_constants();
            match backend.write_buffer(self.constant_buffer, 0, bytemuck::bytes_of(&constants)) {
                Ok(()) => inner.constants_dirty = false,
                Err(err) => log::warn!("Material '{}' constant upload failed: {}", self.name, err),
            }
        }

        let existing = inner.bind_group;
        let bind_group = match existing {
            Some(bind_group) => bind_group,
            None => {
                let mut entries = vec![(
                    0,
                    BindGroupEntry::Buffer {
                        buffer: self.constant_buffer,
                        offset: 0,
                        size: None,
                    },
                )];
                for slot in TextureSlot::ALL {
                    let view = inner.textures[slot.index()]
                        .as_ref()
                        .map_or(defaults.textures[slot.index()], |t| t.view());
                    entries.push((1 + slot.index() as u32, BindGroupEntry::Texture(view)));
                }
                entries.push((
                    1 + TEXTURE_SLOT_COUNT as u32,
                    BindGroupEntry::Sampler(defaults.sampler),
                ));

                let bind_group = backend.create_bind_group(layout, &entries)?;
                inner.bind_group = Some(bind_group);
                bind_group
            }
        };

        backend.set_render_pipeline(self.shader.pipeline());
        backend.set_bind_group(2, bind_group, &[]);
        Ok(())
    }
}

impl std::fmt::Debug for Material {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Material")
            .field("name", &self.name)
            .field("shader", &self.shader.name())
            .field("properties", &inner.properties)
            .field("constants_dirty", &inner.constants_dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_properties() {
        let p = MaterialProperties::default();
        assert_eq!(p.albedo, Vec4::ONE);
        assert_eq!((p.metallic, p.roughness, p.ao, p.emissive), (0.0, 0.5, 1.0, 0.0));
    }

    #[test]
    fn presets() {
        assert_eq!(MaterialProperties::gold().metallic, 1.0);
        assert_eq!(MaterialProperties::rubber(Vec3::ONE).roughness, 0.9);
        assert!(MaterialProperties::glass().albedo.w < 1.0);
        assert_eq!(MaterialProperties::emissive(Vec3::X, 2.0).emissive, 2.0);
    }

    #[test]
    fn constants_are_tightly_packed() {
        assert_eq!(std::mem::size_of::<MaterialConstants>(), 32);
        let c = MaterialProperties::iron().to_constants();
        assert_eq!(c.metallic, 1.0);
        assert_eq!(c.roughness, 0.5);
    }

    #[test]
    fn slots_map_to_bindings_in_order() {
        let indices: Vec<usize> = TextureSlot::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
