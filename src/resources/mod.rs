//! Resource management
//!
//! Meshes, textures, shaders and materials are created on the GPU through a
//! [`ResourceFactory`] (the renderer) and shared through name-keyed
//! [`ResourceCache`]s bundled in [`Resources`].

mod cache;
mod material;
mod mesh;
mod shader;
mod texture;

pub use cache::*;
pub use material::*;
pub use mesh::*;
pub use shader::*;
pub use texture::*;

use std::path::PathBuf;
use std::sync::Arc;

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};

/// Creates GPU resources from CPU data
pub trait ResourceFactory {
    fn create_mesh(&mut self, name: &str, data: &MeshData) -> EngineResult<Mesh>;

    fn create_texture(&mut self, name: &str, data: &TextureData) -> EngineResult<Texture>;

    fn create_shader(
        &mut self,
        name: &str,
        source: &str,
        options: ShaderOptions,
    ) -> EngineResult<Shader>;

    fn create_material(
        &mut self,
        name: &str,
        shader: Arc<Shader>,
        properties: MaterialProperties,
    ) -> EngineResult<Material>;
}

/// Where mesh geometry comes from
#[derive(Debug, Clone)]
pub enum MeshSource {
    Data(MeshData),
    Triangle,
    Quad,
    Cube,
    Sphere { segments: u32 },
    Cylinder { segments: u32 },
    Plane { width: f32, depth: f32, divisions: u32 },
}

impl MeshSource {
    pub fn build(self) -> MeshData {
        match self {
            MeshSource::Data(data) => data,
            MeshSource::Triangle => MeshData::triangle(),
            MeshSource::Quad => MeshData::quad(),
            MeshSource::Cube => MeshData::cube(),
            MeshSource::Sphere { segments } => MeshData::sphere(segments),
            MeshSource::Cylinder { segments } => MeshData::cylinder(segments),
            MeshSource::Plane {
                width,
                depth,
                divisions,
            } => MeshData::plane(width, depth, divisions),
        }
    }
}

/// Where texture pixels come from
#[derive(Debug, Clone)]
pub enum TextureSource {
    File(PathBuf),
    Bytes(Vec<u8>),
    Data(TextureData),
    SolidColor([u8; 4]),
    Checkerboard {
        size: u32,
        color1: [u8; 4],
        color2: [u8; 4],
    },
}

impl TextureSource {
    pub fn build(self, name: &str) -> EngineResult<TextureData> {
        let data = match self {
            TextureSource::File(path) => TextureData::from_file(path)?,
            TextureSource::Bytes(bytes) => TextureData::from_bytes(&bytes, name)?,
            TextureSource::Data(data) => data,
            TextureSource::SolidColor(color) => TextureData::solid_color(color, name),
            TextureSource::Checkerboard {
                size,
                color1,
                color2,
            } => TextureData::checkerboard(size, color1, color2),
        };
        data.validate()?;
        Ok(data)
    }
}

/// Where WGSL source comes from
#[derive(Debug, Clone)]
pub enum ShaderSource {
    /// The built-in lit shader
    Default,
    Wgsl(String),
    File(PathBuf),
}

impl ShaderSource {
    pub fn read(self, name: &str) -> EngineResult<String> {
        match self {
            ShaderSource::Default => Ok(DEFAULT_SHADER.to_string()),
            ShaderSource::Wgsl(source) => Ok(source),
            ShaderSource::File(path) => {
                std::fs::read_to_string(&path).map_err(|e| EngineError::ResourceLoad {
                    name: name.to_string(),
                    reason: format!("{}: {}", path.display(), e),
                })
            }
        }
    }
}

/// Everything needed to build a material
#[derive(Debug, Clone)]
pub struct MaterialDesc {
    pub shader: Arc<Shader>,
    pub properties: MaterialProperties,
    pub textures: Vec<(TextureSlot, Arc<Texture>)>,
}

impl MaterialDesc {
    pub fn new(shader: Arc<Shader>) -> Self {
        Self {
            shader,
            properties: MaterialProperties::default(),
            textures: Vec::new(),
        }
    }

    pub fn with_properties(mut self, properties: MaterialProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_texture(mut self, slot: TextureSlot, texture: Arc<Texture>) -> Self {
        self.textures.push((slot, texture));
        self
    }
}

/// Caches for every resource kind
#[derive(Debug)]
pub struct Resources {
    pub meshes: ResourceCache<Mesh>,
    pub textures: ResourceCache<Texture>,
    pub shaders: ResourceCache<Shader>,
    pub materials: ResourceCache<Material>,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            meshes: ResourceCache::new("Mesh"),
            textures: ResourceCache::new("Texture"),
            shaders: ResourceCache::new("Shader"),
            materials: ResourceCache::new("Material"),
        }
    }
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_mesh(
        &mut self,
        factory: &mut dyn ResourceFactory,
        name: &str,
        source: MeshSource,
    ) -> EngineResult<Arc<Mesh>> {
        self.meshes
            .load_or_get(name, || factory.create_mesh(name, &source.build()))
    }

    pub fn load_texture(
        &mut self,
        factory: &mut dyn ResourceFactory,
        name: &str,
        source: TextureSource,
    ) -> EngineResult<Arc<Texture>> {
        self.textures
            .load_or_get(name, || factory.create_texture(name, &source.build(name)?))
    }

    pub fn load_shader(
        &mut self,
        factory: &mut dyn ResourceFactory,
        name: &str,
        source: ShaderSource,
        options: ShaderOptions,
    ) -> EngineResult<Arc<Shader>> {
        self.shaders
            .load_or_get(name, || factory.create_shader(name, &source.read(name)?, options))
    }

    pub fn load_material(
        &mut self,
        factory: &mut dyn ResourceFactory,
        name: &str,
        desc: MaterialDesc,
    ) -> EngineResult<Arc<Material>> {
        self.materials.load_or_get(name, || {
            let material = factory.create_material(name, desc.shader, desc.properties)?;
            for (slot, texture) in desc.textures {
                material.set_texture(slot, Some(texture));
            }
            Ok(material)
        })
    }

    pub fn clear(&mut self) {
        self.materials.clear();
        self.shaders.clear();
        self.textures.clear();
        self.meshes.clear();
    }
}

/// Handed to [`SceneLifecycle::on_load`](crate::scene::SceneLifecycle::on_load)
pub struct LoadContext<'a> {
    pub context: &'a mut EngineContext,
    pub factory: &'a mut dyn ResourceFactory,
}

impl LoadContext<'_> {
    pub fn load_mesh(&mut self, name: &str, source: MeshSource) -> EngineResult<Arc<Mesh>> {
        self.context
            .resources
            .load_mesh(&mut *self.factory, name, source)
    }

    pub fn load_texture(&mut self, name: &str, source: TextureSource) -> EngineResult<Arc<Texture>> {
        self.context
            .resources
            .load_texture(&mut *self.factory, name, source)
    }

    pub fn load_shader(
        &mut self,
        name: &str,
        source: ShaderSource,
        options: ShaderOptions,
    ) -> EngineResult<Arc<Shader>> {
        self.context
            .resources
            .load_shader(&mut *self.factory, name, source, options)
    }

    pub fn load_material(&mut self, name: &str, desc: MaterialDesc) -> EngineResult<Arc<Material>> {
        self.context
            .resources
            .load_material(&mut *self.factory, name, desc)
    }

    /// The built-in shader, compiled once under the name `"default"`
    pub fn default_shader(&mut self) -> EngineResult<Arc<Shader>> {
        self.load_shader("default", ShaderSource::Default, ShaderOptions::default())
    }
}

/// Factory for tests that never touch a GPU
#[cfg(test)]
pub(crate) struct NoGpu;

#[cfg(test)]
impl ResourceFactory for NoGpu {
    fn create_mesh(&mut self, _name: &str, _data: &MeshData) -> EngineResult<Mesh> {
        Err(EngineError::NotInitialized)
    }

    fn create_texture(&mut self, _name: &str, _data: &TextureData) -> EngineResult<Texture> {
        Err(EngineError::NotInitialized)
    }

    fn create_shader(
        &mut self,
        _name: &str,
        _source: &str,
        _options: ShaderOptions,
    ) -> EngineResult<Shader> {
        Err(EngineError::NotInitialized)
    }

    fn create_material(
        &mut self,
        _name: &str,
        _shader: Arc<Shader>,
        _properties: MaterialProperties,
    ) -> EngineResult<Material> {
        Err(EngineError::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_creation_leaves_cache_empty() {
        let mut resources = Resources::new();
        let result = resources.load_mesh(&mut NoGpu, "cube", MeshSource::Cube);
        assert!(matches!(result, Err(EngineError::NotInitialized)));
        assert!(resources.meshes.is_empty());
    }

    #[test]
    fn invalid_texture_source_fails_before_factory() {
        let mut resources = Resources::new();
        let bad = TextureData {
            width: 2,
            height: 2,
            format: crate::backend::TextureFormat::Rgba8Unorm,
            data: vec![0; 3],
            name: "bad".into(),
        };
        let result = resources.load_texture(&mut NoGpu, "bad", TextureSource::Data(bad));
        assert!(matches!(result, Err(EngineError::ResourceLoad { .. })));
    }

    #[test]
    fn missing_shader_file_is_a_load_error() {
        let source = ShaderSource::File("/definitely/not/here.wgsl".into());
        assert!(matches!(
            source.read("missing"),
            Err(EngineError::ResourceLoad { .. })
        ));
        assert_eq!(ShaderSource::Default.read("d").unwrap(), DEFAULT_SHADER);
    }

    #[test]
    fn mesh_sources_build_primitives() {
        assert_eq!(MeshSource::Cube.build().vertex_count(), 24);
        assert_eq!(
            MeshSource::Plane {
                width: 1.0,
                depth: 1.0,
                divisions: 1
            }
            .build()
            .triangle_count(),
            2
        );
    }
}
