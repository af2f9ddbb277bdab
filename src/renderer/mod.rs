//! Frame-lifecycle renderer
//!
//! [`Renderer`] owns the backend together with the per-frame and per-object
//! constant buffers. A frame is `begin_frame`, any number of `render_mesh`
//! calls, then `end_frame`.
//!
//! Per-object constants live in a ring of `max_objects_per_frame` slots
//! addressed by dynamic offsets, so every draw of a frame keeps its own world
//! matrix even though all uploads are submitted together.

mod constants;

pub use constants::*;

use std::sync::Arc;

use glam::Mat4;

use crate::backend::{
    AddressMode, BackendError, BindGroupEntry, BindGroupHandle, BindGroupLayoutEntry,
    BindGroupLayoutHandle, BindingType, BlendState, BufferDescriptor, BufferHandle, BufferUsage,
    ColorAttachment, CompareFunction, DepthStencilAttachment, DepthStencilState, GraphicsBackend,
    LoadOp, RasterState, RenderPassDescriptor, SamplerDescriptor,
    SamplerHandle, ShaderStageFlags, StoreOp, TextureDescriptor, TextureFormat, TextureHandle, TextureUsage, TextureViewHandle,
};
use crate::error::{EngineError, EngineResult};
use crate::resources::{
    Material, MaterialDefaults, MaterialProperties, Mesh, MeshData, PipelineTarget,
    ResourceFactory, Shader, ShaderOptions, Texture, TextureData,
};
use crate::scene::{Camera, GpuLightData, MAX_LIGHTS};
use crate::RenderSettings;

/// Receiver of draw submissions during scene rendering
pub trait DrawTarget {
    /// Camera used for draws that follow; `None` suppresses drawing
    fn set_camera(&mut self, camera: Option<&Camera>);

    /// Draw `mesh` with `material` at `world`. Missing pieces make this a no-op.
    fn render_mesh(&mut self, mesh: Option<&Mesh>, material: Option<&Material>, world: &Mat4);
}

/// Counters for the current (or last finished) frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub object_uploads: u32,
    pub upload_failures: u32,
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth24PlusStencil8;

/// A texture and the view the renderer attaches
#[derive(Debug, Clone, Copy)]
struct RenderTarget {
    texture: TextureHandle,
    view: TextureViewHandle,
}

impl RenderTarget {
    fn create<B: GraphicsBackend>(backend: &mut B, desc: &TextureDescriptor) -> Result<Self, BackendError> {
        let texture = backend.create_texture(desc)?;
        match backend.create_texture_view(texture) {
            Ok(view) => Ok(Self { texture, view }),
            Err(err) => {
                backend.destroy_texture(texture);
                Err(err)
            }
        }
    }

    fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.texture);
    }
}

/// Size-dependent attachments
#[derive(Debug)]
struct FrameTargets {
    depth: RenderTarget,
    msaa: Option<RenderTarget>,
}

impl FrameTargets {
    fn create<B: GraphicsBackend>(
        backend: &mut B,
        width: u32,
        height: u32,
        sample_count: u32,
    ) -> Result<Self, BackendError> {
        let color_format = backend.swapchain_format();
        let msaa = if sample_count > 1 {
            Some(RenderTarget::create(
                backend,
                &TextureDescriptor {
                    label: Some("MSAA Color".into()),
                    width,
                    height,
                    sample_count,
                    format: color_format,
                    usage: TextureUsage::RENDER_ATTACHMENT,
                },
            )?)
        } else {
            None
        };

        let depth = match RenderTarget::create(
            backend,
            &TextureDescriptor {
                label: Some("Depth Stencil".into()),
                width,
                height,
                sample_count,
                format: DEPTH_FORMAT,
                usage: TextureUsage::RENDER_ATTACHMENT,
            },
        ) {
            Ok(depth) => depth,
            Err(err) => {
                if let Some(msaa) = msaa {
                    msaa.destroy(backend);
                }
                return Err(err);
            }
        };

        Ok(Self { depth, msaa })
    }

    fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        self.depth.destroy(backend);
        if let Some(msaa) = self.msaa {
            msaa.destroy(backend);
        }
    }
}

/// Fixed-function states baked into pipelines
#[derive(Debug, Clone, Copy)]
struct PipelineStates {
    depth_test: DepthStencilState,
    depth_disabled: DepthStencilState,
    raster: RasterState,
    alpha_blend: BlendState,
}

/// A GPU object the renderer owns from initialize until shutdown
#[derive(Debug, Clone, Copy)]
enum GpuObject {
    Texture(TextureHandle),
    View(TextureViewHandle),
    Sampler(SamplerHandle),
    Layout(BindGroupLayoutHandle),
    Buffer(BufferHandle),
    BindGroup(BindGroupHandle),
}

impl GpuObject {
    fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        match self {
            GpuObject::Texture(texture) => backend.destroy_texture(texture),
            GpuObject::View(view) => backend.destroy_texture_view(view),
            GpuObject::Sampler(sampler) => backend.destroy_sampler(sampler),
            GpuObject::Layout(layout) => backend.destroy_bind_group_layout(layout),
            GpuObject::Buffer(buffer) => backend.destroy_buffer(buffer),
            GpuObject::BindGroup(bind_group) => backend.destroy_bind_group(bind_group),
        }
    }
}

/// Destroys, newest first, whatever was acquired before an early return.
/// [`Rollback::disarm`] hands ownership over instead.
struct Rollback<'a, B: GraphicsBackend> {
    backend: &'a mut B,
    targets: Option<FrameTargets>,
    owned: Vec<GpuObject>,
}

impl<'a, B: GraphicsBackend> Rollback<'a, B> {
    fn new(backend: &'a mut B) -> Self {
        Self {
            backend,
            targets: None,
            owned: Vec::new(),
        }
    }

    fn track(&mut self, object: GpuObject) {
        self.owned.push(object);
    }

    fn disarm(mut self) -> (Option<FrameTargets>, Vec<GpuObject>) {
        (self.targets.take(), std::mem::take(&mut self.owned))
    }
}

impl<B: GraphicsBackend> Drop for Rollback<'_, B> {
    fn drop(&mut self) {
        if self.targets.is_none() && self.owned.is_empty() {
            return;
        }
        log::debug!("Releasing {} partially created GPU objects", self.owned.len());
        for object in self.owned.drain(..).rev() {
            object.destroy(&mut *self.backend);
        }
        if let Some(targets) = self.targets.take() {
            targets.destroy(&mut *self.backend);
        }
    }
}

/// Bookkeeping for the frame between `begin_frame` and `end_frame`
#[derive(Debug, Default)]
struct FrameState {
    frame_constants_uploaded: bool,
    next_object: u64,
    last_object_offset: Option<u32>,
    ring_exhausted: bool,
}

/// Everything that exists only while initialized
struct GpuState<B: GraphicsBackend> {
    backend: B,
    width: u32,
    height: u32,
    sample_count: u32,
    targets: Option<FrameTargets>,
    states: PipelineStates,

    frame_layout: BindGroupLayoutHandle,
    object_layout: BindGroupLayoutHandle,
    material_layout: BindGroupLayoutHandle,

    frame_buffer: BufferHandle,
    light_buffer: BufferHandle,
    frame_bind_group: BindGroupHandle,
    object_buffer: BufferHandle,
    object_bind_group: BindGroupHandle,
    object_stride: u64,
    object_capacity: u64,

    material_defaults: MaterialDefaults,
    owned: Vec<GpuObject>,
    garbage: Vec<BindGroupHandle>,
    frame: Option<FrameState>,
}

impl<B: GraphicsBackend> GpuState<B> {
    /// Acquisition order: render targets, pipeline states and sampler,
    /// constant buffers, then the default material textures. A failed step
    /// destroys every object acquired before it.
    fn create(mut backend: B, settings: &RenderSettings) -> Result<Self, BackendError> {
        let (width, height) = backend.surface_size();

        let sample_count = if settings.msaa {
            backend.supported_sample_count(settings.msaa_samples)
        } else {
            1
        };
        if settings.msaa && sample_count < settings.msaa_samples {
            log::warn!(
                "{}x MSAA not supported, using {}x",
                settings.msaa_samples,
                sample_count
            );
        }

        let mut rollback = Rollback::new(&mut backend);
        rollback.targets = Some(FrameTargets::create(
            &mut *rollback.backend,
            width,
            height,
            sample_count,
        )?);
        log::debug!("Render targets created ({}x{}, {} samples)", width, height, sample_count);

        let raster = if settings.wireframe && rollback.backend.supports_wireframe() {
            RasterState::wireframe()
        } else {
            if settings.wireframe {
                log::warn!("Wireframe requested but not supported, rendering solid");
            }
            RasterState::solid()
        };
        let states = PipelineStates {
            depth_test: DepthStencilState {
                format: DEPTH_FORMAT,
                depth_test_enabled: true,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            },
            depth_disabled: DepthStencilState {
                format: DEPTH_FORMAT,
                depth_test_enabled: false,
                depth_write_enabled: false,
                depth_compare: CompareFunction::Always,
            },
            raster,
            alpha_blend: BlendState::alpha_blending(),
        };
        let sampler = rollback.backend.create_sampler(&SamplerDescriptor {
            label: Some("Linear Wrap".into()),
            address_mode: AddressMode::Repeat,
            ..Default::default()
        })?;
        rollback.track(GpuObject::Sampler(sampler));
        log::debug!("Pipeline states created");

        let frame_layout = rollback.backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::VERTEX_FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
        ])?;
        rollback.track(GpuObject::Layout(frame_layout));
        let object_size = std::mem::size_of::<ObjectConstants>() as u64;
        let object_layout = rollback.backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::VERTEX,
            ty: BindingType::DynamicUniformBuffer {
                min_binding_size: object_size,
            },
        }])?;
        rollback.track(GpuObject::Layout(object_layout));
        let mut material_entries = vec![BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::UniformBuffer,
        }];
        for binding in 1..=4 {
            material_entries.push(BindGroupLayoutEntry {
                binding,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture,
            });
        }
        material_entries.push(BindGroupLayoutEntry {
            binding: 5,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Sampler,
        });
        let material_layout = rollback.backend.create_bind_group_layout(&material_entries)?;
        rollback.track(GpuObject::Layout(material_layout));

        let frame_buffer = rollback.backend.create_buffer(&BufferDescriptor {
            label: Some("Frame Constants".into()),
            size: std::mem::size_of::<FrameConstants>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        rollback.track(GpuObject::Buffer(frame_buffer));
        let light_buffer = rollback.backend.create_buffer(&BufferDescriptor {
            label: Some("Light Constants".into()),
            size: std::mem::size_of::<LightConstants>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        rollback.track(GpuObject::Buffer(light_buffer));
        let frame_bind_group = rollback.backend.create_bind_group(
            frame_layout,
            &[
                (
                    0,
                    BindGroupEntry::Buffer {
                        buffer: frame_buffer,
                        offset: 0,
                        size: None,
                    },
                ),
                (
                    1,
                    BindGroupEntry::Buffer {
                        buffer: light_buffer,
                        offset: 0,
                        size: None,
                    },
                ),
            ],
        )?;
        rollback.track(GpuObject::BindGroup(frame_bind_group));

        let object_stride = align_to(object_size, rollback.backend.uniform_offset_alignment());
        let object_capacity = settings.max_objects_per_frame.max(1) as u64;
        let object_buffer = rollback.backend.create_buffer(&BufferDescriptor {
            label: Some("Object Constants".into()),
            size: object_stride * object_capacity,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        rollback.track(GpuObject::Buffer(object_buffer));
        let object_bind_group = rollback.backend.create_bind_group(
            object_layout,
            &[(
                0,
                BindGroupEntry::Buffer {
                    buffer: object_buffer,
                    offset: 0,
                    size: Some(object_size),
                },
            )],
        )?;
        rollback.track(GpuObject::BindGroup(object_bind_group));
        log::debug!(
            "Constant buffers created ({} object slots of {} bytes)",
            object_capacity,
            object_stride
        );

        let mut default_texture = |data: TextureData| -> Result<TextureViewHandle, BackendError> {
            let texture = Texture::upload(&mut *rollback.backend, &data)?;
            rollback.track(GpuObject::Texture(texture.handle()));
            rollback.track(GpuObject::View(texture.view()));
            Ok(texture.view())
        };
        let white = default_texture(TextureData::white())?;
        let normal = default_texture(TextureData::default_normal())?;
        let material_defaults = MaterialDefaults {
            textures: [white, normal, white, white],
            sampler,
        };

        let (targets, owned) = rollback.disarm();

        Ok(Self {
            backend,
            width,
            height,
            sample_count,
            targets,
            states,
            frame_layout,
            object_layout,
            material_layout,
            frame_buffer,
            light_buffer,
            frame_bind_group,
            object_buffer,
            object_bind_group,
            object_stride,
            object_capacity,
            material_defaults,
            owned,
            garbage: Vec::new(),
            frame: None,
        })
    }

    fn pipeline_target<'a>(&self, layouts: &'a [BindGroupLayoutHandle]) -> PipelineTarget<'a> {
        PipelineTarget {
            bind_group_layouts: layouts,
            color_format: self.backend.swapchain_format(),
            sample_count: self.sample_count,
            raster: self.states.raster,
            depth_test: self.states.depth_test,
            depth_disabled: self.states.depth_disabled,
            blend: self.states.alpha_blend,
        }
    }

    /// Destroy every object acquired in `create`, then drop the backend
    fn release(mut self) {
        for bind_group in self.garbage.drain(..) {
            self.backend.destroy_bind_group(bind_group);
        }
        for object in self.owned.drain(..).rev() {
            object.destroy(&mut self.backend);
        }
        if let Some(targets) = self.targets.take() {
            targets.destroy(&mut self.backend);
        }
    }

    fn recreate_targets(&mut self) -> Result<(), BackendError> {
        if let Some(targets) = self.targets.take() {
            targets.destroy(&mut self.backend);
        }
        self.targets = Some(FrameTargets::create(
            &mut self.backend,
            self.width,
            self.height,
            self.sample_count,
        )?);
        Ok(())
    }
}

enum RendererState<B: GraphicsBackend> {
    Uninitialized,
    Initialized(Box<GpuState<B>>),
    ShutDown,
}

/// Turns draw submissions into GPU work through a [`GraphicsBackend`]
pub struct Renderer<B: GraphicsBackend> {
    settings: RenderSettings,
    state: RendererState<B>,
    camera: Option<FrameCamera>,
    lights: Vec<GpuLightData>,
    time: f32,
    delta_time: f32,
    stats: FrameStats,
}

impl<B: GraphicsBackend> Renderer<B> {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            state: RendererState::Uninitialized,
            camera: None,
            lights: Vec::new(),
            time: 0.0,
            delta_time: 0.0,
            stats: FrameStats::default(),
        }
    }

    /// Acquire the device and every GPU object the renderer needs.
    ///
    /// Any failed step fails the whole call with
    /// [`EngineError::InitializationFailure`]; whatever was acquired is
    /// released and the renderer stays uninitialized. Calling this on an
    /// initialized renderer shuts it down first.
    pub fn initialize(&mut self, surface: B::Surface, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            return Err(EngineError::InitializationFailure(format!(
                "invalid surface size {}x{}",
                width, height
            )));
        }
        if self.is_initialized() {
            self.shutdown();
        }

        let backend = B::create(surface, width, height, &self.settings)
            .map_err(|e| EngineError::InitializationFailure(e.to_string()))?;
        log::debug!("Device and swapchain acquired");

        let gpu = GpuState::create(backend, &self.settings)
            .map_err(|e| EngineError::InitializationFailure(e.to_string()))?;

        log::info!(
            "Renderer initialized ({}x{}, vsync {}, {}x MSAA)",
            gpu.width,
            gpu.height,
            self.settings.vsync,
            gpu.sample_count
        );
        self.state = RendererState::Initialized(Box::new(gpu));
        self.stats = FrameStats::default();
        Ok(())
    }

    /// Release all GPU objects. Resources created through this renderer become invalid.
    pub fn shutdown(&mut self) {
        if !self.is_initialized() {
            return;
        }
        if let RendererState::Initialized(gpu) =
            std::mem::replace(&mut self.state, RendererState::ShutDown)
        {
            let mut gpu = *gpu;
            if gpu.frame.take().is_some() {
                gpu.backend.end_render_pass();
                log::warn!("Renderer shut down in the middle of a frame");
            }
            gpu.release();
            log::info!("Renderer shut down");
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, RendererState::Initialized(_))
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(self.state, RendererState::ShutDown)
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn width(&self) -> u32 {
        self.gpu().map_or(0, |gpu| gpu.width)
    }

    pub fn height(&self) -> u32 {
        self.gpu().map_or(0, |gpu| gpu.height)
    }

    pub fn aspect_ratio(&self) -> Option<f32> {
        let gpu = self.gpu()?;
        Some(gpu.width as f32 / gpu.height.max(1) as f32)
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.gpu().is_some_and(|gpu| gpu.frame.is_some())
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.settings.clear_color = color;
    }

    /// Takes effect at the next present
    pub fn set_vsync(&mut self, vsync: bool) {
        self.settings.vsync = vsync;
    }

    /// Snapshot the camera for the following draws
    pub fn set_camera(&mut self, camera: Option<&Camera>) {
        self.camera = camera.map(FrameCamera::from);
    }

    pub fn camera(&self) -> Option<&FrameCamera> {
        self.camera.as_ref()
    }

    /// Lights for the following frames; only the first [`MAX_LIGHTS`] are used
    pub fn set_lights(&mut self, lights: &[GpuLightData]) {
        self.lights.clear();
        self.lights
            .extend_from_slice(&lights[..lights.len().min(MAX_LIGHTS)]);
    }

    pub fn set_frame_time(&mut self, time: f32, delta_time: f32) {
        self.time = time;
        self.delta_time = delta_time;
    }

    /// Recreate size-dependent attachments. No-op before initialization or for a zero size.
    pub fn resize(&mut self, width: u32, height: u32) {
        let RendererState::Initialized(gpu) = &mut self.state else {
            return;
        };
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return;
        }
        if gpu.frame.is_some() {
            log::warn!("Resize during a frame; ending the render pass early");
            gpu.backend.end_render_pass();
            gpu.frame = None;
        }

        if let Some(targets) = gpu.targets.take() {
            targets.destroy(&mut gpu.backend);
        }
        gpu.backend.resize(width, height);
        let (width, height) = gpu.backend.surface_size();
        gpu.width = width;
        gpu.height = height;

        match gpu.recreate_targets() {
            Ok(()) => log::info!("Renderer resized to {}x{}", width, height),
            Err(err) => log::error!("Failed to recreate render targets: {}", err),
        }
    }

    /// Clear color to the configured clear color and depth/stencil to 1/0.
    pub fn begin_frame(&mut self) -> EngineResult<()> {
        let clear_color = self.settings.clear_color;
        let gpu = self.gpu_mut()?;
        if gpu.frame.is_some() {
            return Err(EngineError::FrameInProgress);
        }
        if gpu.targets.is_none() {
            gpu.recreate_targets()?;
        }

        let frame = gpu.backend.begin_frame()?;
        let Some(targets) = gpu.targets.as_ref() else {
            return Err(EngineError::NotInitialized);
        };

        let color = match targets.msaa {
            Some(msaa) => ColorAttachment {
                view: msaa.view,
                resolve_target: Some(frame.swapchain_view),
                load_op: LoadOp::Clear(clear_color),
                store_op: StoreOp::Discard,
            },
            None => ColorAttachment {
                view: frame.swapchain_view,
                resolve_target: None,
                load_op: LoadOp::Clear(clear_color),
                store_op: StoreOp::Store,
            },
        };
        let depth_view = targets.depth.view;

        gpu.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Main Pass".into()),
            color_attachments: vec![color],
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: depth_view,
                depth_clear_value: Some(1.0),
                stencil_clear_value: DEPTH_FORMAT.has_stencil().then_some(0),
                store_op: StoreOp::Discard,
            }),
        });
        gpu.backend
            .set_viewport(0.0, 0.0, frame.width as f32, frame.height as f32, 0.0, 1.0);

        gpu.frame = Some(FrameState::default());
        self.stats = FrameStats::default();
        Ok(())
    }

    /// Draw `mesh` with `material` at `world` using the current camera.
    ///
    /// Does nothing when the mesh, material or camera is missing, or outside
    /// a frame. Constant upload failures are logged and the draw proceeds
    /// with whatever the buffer held before.
    pub fn render_mesh(&mut self, mesh: Option<&Mesh>, material: Option<&Material>, world: &Mat4) {
        let (Some(mesh), Some(material), Some(camera)) = (mesh, material, self.camera) else {
            log::trace!("Draw skipped: mesh, material or camera missing");
            return;
        };
        let RendererState::Initialized(gpu) = &mut self.state else {
            log::trace!("Draw skipped: renderer not initialized");
            return;
        };
        let gpu = &mut **gpu;
        let Some(frame) = gpu.frame.as_mut() else {
            log::trace!("Draw skipped: no frame in progress");
            return;
        };

        if !frame.frame_constants_uploaded {
            frame.frame_constants_uploaded = true;
            let constants =
                FrameConstants::new(&camera, self.time, self.delta_time, self.lights.len());
            let lights = LightConstants::new(&self.lights);
            let uploads = [
                gpu.backend
                    .write_buffer(gpu.frame_buffer, 0, bytemuck::bytes_of(&constants)),
                gpu.backend
                    .write_buffer(gpu.light_buffer, 0, bytemuck::bytes_of(&lights)),
            ];
            for result in uploads {
                if let Err(err) = result {
                    log::warn!("Frame constant upload failed, using stale data: {}", err);
                    self.stats.upload_failures += 1;
                }
            }
        }

        let object_offset = if frame.next_object < gpu.object_capacity {
            let offset = frame.next_object * gpu.object_stride;
            frame.next_object += 1;
            let constants = ObjectConstants::new(world);
            match gpu
                .backend
                .write_buffer(gpu.object_buffer, offset, bytemuck::bytes_of(&constants))
            {
                Ok(()) => self.stats.object_uploads += 1,
                Err(err) => {
                    log::warn!("Object constant upload failed, using stale data: {}", err);
                    self.stats.upload_failures += 1;
                }
            }
            offset as u32
        } else {
            if !frame.ring_exhausted {
                frame.ring_exhausted = true;
                log::warn!(
                    "More than {} objects this frame; reusing the last object slot",
                    gpu.object_capacity
                );
            }
            self.stats.upload_failures += 1;
            frame.last_object_offset.unwrap_or(0)
        };
        frame.last_object_offset = Some(object_offset);

        if let Err(err) = material.bind(
            &mut gpu.backend,
            gpu.material_layout,
            &gpu.material_defaults,
            &mut gpu.garbage,
        ) {
            log::warn!("Failed to bind material '{}': {}", material.name(), err);
            return;
        }
        gpu.backend.set_bind_group(0, gpu.frame_bind_group, &[]);
        gpu.backend
            .set_bind_group(1, gpu.object_bind_group, &[object_offset]);
        mesh.draw(&mut gpu.backend);

        self.stats.draw_calls += 1;
        log::trace!("Drew '{}' with '{}'", mesh.name(), material.name());
    }

    /// Finish the pass and present with the configured vsync interval
    pub fn end_frame(&mut self) -> EngineResult<()> {
        let sync_interval = self.settings.sync_interval();
        let gpu = self.gpu_mut()?;
        if gpu.frame.take().is_none() {
            return Err(EngineError::NoFrameInProgress);
        }

        gpu.backend.end_render_pass();
        let presented = gpu.backend.end_frame(sync_interval);

        for bind_group in gpu.garbage.drain(..) {
            gpu.backend.destroy_bind_group(bind_group);
        }
        presented?;
        Ok(())
    }

    fn gpu(&self) -> Option<&GpuState<B>> {
        match &self.state {
            RendererState::Initialized(gpu) => Some(gpu),
            _ => None,
        }
    }

    fn gpu_mut(&mut self) -> EngineResult<&mut GpuState<B>> {
        match &mut self.state {
            RendererState::Initialized(gpu) => Ok(gpu),
            _ => Err(EngineError::NotInitialized),
        }
    }
}

impl<B: GraphicsBackend> DrawTarget for Renderer<B> {
    fn set_camera(&mut self, camera: Option<&Camera>) {
        Renderer::set_camera(self, camera);
    }

    fn render_mesh(&mut self, mesh: Option<&Mesh>, material: Option<&Material>, world: &Mat4) {
        Renderer::render_mesh(self, mesh, material, world);
    }
}

impl<B: GraphicsBackend> ResourceFactory for Renderer<B> {
    fn create_mesh(&mut self, name: &str, data: &MeshData) -> EngineResult<Mesh> {
        if data.vertices.is_empty() || data.indices.is_empty() {
            return Err(EngineError::ResourceLoad {
                name: name.to_string(),
                reason: "mesh has no geometry".into(),
            });
        }
        let gpu = self.gpu_mut()?;
        Ok(Mesh::upload(&mut gpu.backend, data)?)
    }

    fn create_texture(&mut self, _name: &str, data: &TextureData) -> EngineResult<Texture> {
        data.validate()?;
        let gpu = self.gpu_mut()?;
        Ok(Texture::upload(&mut gpu.backend, data)?)
    }

    fn create_shader(
        &mut self,
        name: &str,
        source: &str,
        options: ShaderOptions,
    ) -> EngineResult<Shader> {
        let gpu = self.gpu_mut()?;
        let layouts = [gpu.frame_layout, gpu.object_layout, gpu.material_layout];
        let target = gpu.pipeline_target(&layouts);
        Shader::compile(&mut gpu.backend, name, source, options, &target).map_err(|e| {
            EngineError::ResourceLoad {
                name: name.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn create_material(
        &mut self,
        name: &str,
        shader: Arc<Shader>,
        properties: MaterialProperties,
    ) -> EngineResult<Material> {
        let gpu = self.gpu_mut()?;
        Ok(Material::create(&mut gpu.backend, name, shader, properties)?)
    }
}

impl<B: GraphicsBackend> std::fmt::Debug for Renderer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            RendererState::Uninitialized => "uninitialized",
            RendererState::Initialized(_) => "initialized",
            RendererState::ShutDown => "shut down",
        };
        f.debug_struct("Renderer")
            .field("state", &state)
            .field("settings", &self.settings)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, HeadlessFailure, HeadlessSurface};
    use crate::resources::DEFAULT_SHADER;
    use glam::Vec3;

    type TestRenderer = Renderer<HeadlessBackend>;

    fn renderer(settings: RenderSettings) -> (TestRenderer, HeadlessSurface) {
        let surface = HeadlessSurface::new();
        let mut renderer = TestRenderer::new(settings);
        renderer.initialize(surface.clone(), 800, 600).unwrap();
        (renderer, surface)
    }

    fn drawables(renderer: &mut TestRenderer) -> (Mesh, Material) {
        let mesh = renderer.create_mesh("cube", &MeshData::cube()).unwrap();
        let shader = renderer
            .create_shader("default", DEFAULT_SHADER, ShaderOptions::default())
            .unwrap();
        let material = renderer
            .create_material("plain", Arc::new(shader), MaterialProperties::default())
            .unwrap();
        (mesh, material)
    }

    fn gpu(renderer: &TestRenderer) -> &GpuState<HeadlessBackend> {
        renderer.gpu().unwrap()
    }

    #[test]
    fn zero_size_initialize_fails_and_retains_nothing() {
        for (w, h) in [(0, 600), (800, 0)] {
            let surface = HeadlessSurface::new();
            let mut renderer = TestRenderer::new(RenderSettings::default());
            assert!(matches!(
                renderer.initialize(surface.clone(), w, h),
                Err(EngineError::InitializationFailure(_))
            ));
            assert!(!renderer.is_initialized());
            let log = surface.log();
            assert_eq!(log.live_resources(), 0);
            assert_eq!(log.live_at_drop, 0);
            assert!(!log.backend_alive);
        }
    }

    #[test]
    fn any_failed_acquisition_fails_initialize_cleanly() {
        let full = HeadlessSurface::new();
        TestRenderer::new(RenderSettings::default().with_msaa(4))
            .initialize(full.clone(), 800, 600)
            .unwrap();
        let steps = full.log().creations_attempted;
        assert!(steps > 10);

        for step in 1..=steps {
            let surface = HeadlessSurface::with_failure(HeadlessFailure {
                fail_resource_at: Some(step),
                ..Default::default()
            });
            let mut renderer = TestRenderer::new(RenderSettings::default().with_msaa(4));
            let result = renderer.initialize(surface.clone(), 800, 600);

            assert!(
                matches!(result, Err(EngineError::InitializationFailure(_))),
                "step {step} should fail"
            );
            assert!(!renderer.is_initialized());
            let log = surface.log();
            assert_eq!(log.live_resources(), 0);
            assert_eq!(log.live_at_drop, 0, "step {step} left objects for the backend to drop");
        }

        let surface = HeadlessSurface::with_failure(HeadlessFailure {
            fail_create: true,
            ..Default::default()
        });
        let mut renderer = TestRenderer::new(RenderSettings::default());
        assert!(renderer.initialize(surface, 800, 600).is_err());
    }

    #[test]
    fn begin_frame_clears_color_depth_and_stencil() {
        let settings = RenderSettings::default().with_clear_color([0.3, 0.2, 0.1, 1.0]);
        let (mut renderer, surface) = renderer(settings);

        renderer.begin_frame().unwrap();
        renderer.end_frame().unwrap();

        let log = surface.log();
        assert_eq!(
            log.clears,
            vec![crate::backend::headless::ClearRecord {
                color: Some([0.3, 0.2, 0.1, 1.0]),
                depth: Some(1.0),
                stencil: Some(0),
                resolves: false,
            }]
        );
        assert_eq!(log.viewports, vec![[0.0, 0.0, 800.0, 600.0, 0.0, 1.0]]);
    }

    #[test]
    fn msaa_renders_into_resolved_target() {
        let (mut renderer, surface) = renderer(RenderSettings::default().with_msaa(4));
        renderer.begin_frame().unwrap();
        renderer.end_frame().unwrap();

        let log = surface.log();
        assert!(log.clears[0].resolves);
        assert!(log
            .textures
            .iter()
            .any(|t| t.sample_count == 4 && t.format == TextureFormat::Bgra8UnormSrgb));
    }

    #[test]
    fn present_uses_vsync_interval() {
        let (mut renderer, surface) = renderer(RenderSettings::default());
        renderer.begin_frame().unwrap();
        renderer.end_frame().unwrap();

        renderer.set_vsync(false);
        renderer.begin_frame().unwrap();
        renderer.end_frame().unwrap();

        assert_eq!(surface.log().presents, vec![1, 0]);
    }

    #[test]
    fn frame_calls_must_pair() {
        let mut uninit = TestRenderer::new(RenderSettings::default());
        assert!(matches!(uninit.begin_frame(), Err(EngineError::NotInitialized)));

        let (mut renderer, _surface) = renderer(RenderSettings::default());
        assert!(matches!(renderer.end_frame(), Err(EngineError::NoFrameInProgress)));

        renderer.begin_frame().unwrap();
        assert!(matches!(renderer.begin_frame(), Err(EngineError::FrameInProgress)));
        renderer.end_frame().unwrap();
        assert!(!renderer.is_frame_in_progress());
    }

    #[test]
    fn missing_mesh_material_or_camera_draws_nothing() {
        let (mut renderer, surface) = renderer(RenderSettings::default());
        let (mesh, material) = drawables(&mut renderer);
        let world = Mat4::IDENTITY;

        renderer.begin_frame().unwrap();
        let writes_before = surface.log().buffer_writes;

        renderer.render_mesh(Some(&mesh), Some(&material), &world);
        renderer.set_camera(Some(&Camera::default()));
        renderer.render_mesh(None, Some(&material), &world);
        renderer.render_mesh(Some(&mesh), None, &world);
        renderer.end_frame().unwrap();

        let log = surface.log();
        assert!(log.draws.is_empty());
        assert_eq!(log.buffer_writes, writes_before);
        assert_eq!(renderer.stats(), FrameStats::default());
    }

    #[test]
    fn draws_get_their_own_object_slot() {
        let (mut renderer, surface) = renderer(RenderSettings::default());
        let (mesh, material) = drawables(&mut renderer);
        renderer.set_camera(Some(&Camera::default()));

        let a = Mat4::from_translation(Vec3::X);
        let b = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        renderer.begin_frame().unwrap();
        renderer.render_mesh(Some(&mesh), Some(&material), &a);
        renderer.render_mesh(Some(&mesh), Some(&material), &b);
        renderer.end_frame().unwrap();

        let stride = gpu(&renderer).object_stride;
        let object_buffer = gpu(&renderer).object_buffer;
        let log = surface.log();
        assert_eq!(log.draws.len(), 2);
        assert_eq!(log.draws[0].index_count, 36);
        assert_eq!(log.draws[0].bind_groups[&1].1, vec![0]);
        assert_eq!(log.draws[1].bind_groups[&1].1, vec![stride as u32]);
        assert!(log.draws[0].bind_groups.contains_key(&0));
        assert!(log.draws[0].bind_groups.contains_key(&2));

        let data = log.buffer_data(object_buffer).unwrap();
        let second: ObjectConstants =
            bytemuck::pod_read_unaligned(&data[stride as usize..stride as usize + 128]);
        assert_eq!(second, ObjectConstants::new(&b));

        assert_eq!(renderer.stats().draw_calls, 2);
        assert_eq!(renderer.stats().object_uploads, 2);
    }

    #[test]
    fn frame_constants_upload_once_per_frame() {
        let (mut renderer, surface) = renderer(RenderSettings::default());
        let (mesh, material) = drawables(&mut renderer);
        let camera = Camera::default();
        renderer.set_camera(Some(&camera));
        renderer.set_frame_time(3.0, 0.5);

        renderer.begin_frame().unwrap();
        let before = surface.log().buffer_writes;
        for _ in 0..3 {
            renderer.render_mesh(Some(&mesh), Some(&material), &Mat4::IDENTITY);
        }
        renderer.end_frame().unwrap();

        let frame_buffer = gpu(&renderer).frame_buffer;
        let log = surface.log();
        // frame + lights, then three object slots
        assert_eq!(log.buffer_writes - before, 5);

        let frame: FrameConstants =
            bytemuck::pod_read_unaligned(log.buffer_data(frame_buffer).unwrap());
        assert_eq!(frame.view_projection, camera.view_projection_matrix());
        assert_eq!(frame.camera_position.truncate(), camera.position());
        assert_eq!((frame.time, frame.delta_time), (3.0, 0.5));
    }

    #[test]
    fn upload_failures_are_swallowed() {
        let (mut renderer, surface) = renderer(RenderSettings::default());
        let (mesh, material) = drawables(&mut renderer);
        renderer.set_camera(Some(&Camera::default()));
        surface.log().failure.fail_writes = true;

        renderer.begin_frame().unwrap();
        renderer.render_mesh(Some(&mesh), Some(&material), &Mat4::IDENTITY);
        renderer.end_frame().unwrap();

        assert_eq!(surface.log().draws.len(), 1);
        let stats = renderer.stats();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.upload_failures, 3);
        assert_eq!(stats.object_uploads, 0);
    }

    #[test]
    fn exhausted_ring_reuses_last_slot() {
        let settings = RenderSettings::default().with_max_objects_per_frame(2);
        let (mut renderer, surface) = renderer(settings);
        let (mesh, material) = drawables(&mut renderer);
        renderer.set_camera(Some(&Camera::default()));

        renderer.begin_frame().unwrap();
        for _ in 0..3 {
            renderer.render_mesh(Some(&mesh), Some(&material), &Mat4::IDENTITY);
        }
        renderer.end_frame().unwrap();

        let log = surface.log();
        assert_eq!(log.draws.len(), 3);
        assert_eq!(log.draws[2].bind_groups[&1].1, log.draws[1].bind_groups[&1].1);
        assert_eq!(renderer.stats().upload_failures, 1);
    }

    #[test]
    fn resize_recreates_targets_without_leaking() {
        let (mut renderer, surface) = renderer(RenderSettings::default().with_msaa(4));
        let live = surface.log().live_resources();

        renderer.resize(1024, 768);
        assert_eq!(surface.log().live_resources(), live);
        assert_eq!((renderer.width(), renderer.height()), (1024, 768));

        renderer.resize(0, 768);
        assert_eq!(renderer.width(), 1024);

        renderer.begin_frame().unwrap();
        renderer.end_frame().unwrap();
        let log = surface.log();
        assert_eq!(log.resizes, vec![(1024, 768)]);
        assert_eq!(log.viewports.last().unwrap()[2..4], [1024.0, 768.0]);
        assert!(log
            .textures
            .iter()
            .any(|t| t.format == DEPTH_FORMAT && t.width == 1024 && t.height == 768));
    }

    #[test]
    fn resize_before_initialize_is_ignored() {
        let mut renderer = TestRenderer::new(RenderSettings::default());
        renderer.resize(640, 480);
        assert_eq!(renderer.width(), 0);
    }

    #[test]
    fn material_edits_upload_on_next_bind() {
        let (mut renderer, surface) = renderer(RenderSettings::default());
        let (mesh, material) = drawables(&mut renderer);
        renderer.set_camera(Some(&Camera::default()));

        material.set_albedo(glam::Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!(material.needs_upload());

        renderer.begin_frame().unwrap();
        renderer.render_mesh(Some(&mesh), Some(&material), &Mat4::IDENTITY);
        renderer.end_frame().unwrap();
        assert!(!material.needs_upload());

        // Swapping a texture retires the old bind group after the frame
        let texture = renderer
            .create_texture("white", &TextureData::white())
            .unwrap();
        let live = surface.log().live_resources();
        material.set_texture(crate::resources::TextureSlot::Albedo, Some(Arc::new(texture)));
        renderer.begin_frame().unwrap();
        renderer.render_mesh(Some(&mesh), Some(&material), &Mat4::IDENTITY);
        renderer.end_frame().unwrap();
        assert_eq!(surface.log().live_resources(), live);
    }

    #[test]
    fn wireframe_and_depth_options_reach_pipelines() {
        let (mut renderer, surface) = renderer(RenderSettings::default().with_wireframe(true));
        renderer
            .create_shader(
                "overlay",
                DEFAULT_SHADER,
                ShaderOptions::default().without_depth_test().with_blend(),
            )
            .unwrap();

        let log = surface.log();
        let pipeline = log.pipelines.last().unwrap();
        assert_eq!(pipeline.raster, RasterState::wireframe());
        assert!(!pipeline.depth_test);
        assert!(pipeline.blend);
    }

    #[test]
    fn shutdown_releases_backend_and_allows_reinitialize() {
        let (mut renderer, surface) = renderer(RenderSettings::default());
        renderer.begin_frame().unwrap();
        renderer.shutdown();

        assert!(renderer.is_shut_down());
        assert!(!surface.log().backend_alive);
        assert_eq!(surface.log().live_at_drop, 0);
        assert!(matches!(renderer.begin_frame(), Err(EngineError::NotInitialized)));

        renderer.initialize(surface.clone(), 320, 240).unwrap();
        assert!(renderer.is_initialized());
        assert_eq!(renderer.width(), 320);
    }

    #[test]
    fn empty_mesh_is_rejected() {
        let (mut renderer, _surface) = renderer(RenderSettings::default());
        assert!(matches!(
            renderer.create_mesh("empty", &MeshData::new("empty")),
            Err(EngineError::ResourceLoad { .. })
        ));
    }
}
