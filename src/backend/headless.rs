//! Headless backend for tests and tooling.
//!
//! Performs no GPU work. Every call is recorded into a [`HeadlessLog`] that
//! is shared with the [`HeadlessSurface`] the backend was created from, so a
//! caller can inspect what the renderer did after handing the surface over.
//! Failures can be injected through [`HeadlessFailure`].

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::RenderSettings;

/// Failure injection switches, read on every backend call.
#[derive(Debug, Clone, Default)]
pub struct HeadlessFailure {
    /// Fail device creation
    pub fail_create: bool,
    /// Fail the Nth resource creation (1-based, counted across all kinds)
    pub fail_resource_at: Option<usize>,
    /// Fail every buffer write
    pub fail_writes: bool,
    /// Fail back buffer acquisition
    pub fail_acquire: bool,
}

/// A cleared render pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ClearRecord {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
    pub stencil: Option<u32>,
    pub resolves: bool,
}

/// A created texture.
#[derive(Debug, Clone)]
pub struct TextureRecord {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub format: TextureFormat,
}

/// A created pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRecord {
    pub label: Option<String>,
    pub raster: RasterState,
    pub depth_test: bool,
    pub blend: bool,
    pub sample_count: u32,
}

/// A single indexed draw together with the state bound at the time.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub pipeline: Option<u64>,
    pub index_count: u32,
    pub bind_groups: HashMap<u32, (u64, Vec<u32>)>,
}

/// Everything a [`HeadlessBackend`] has been asked to do.
#[derive(Debug, Default)]
pub struct HeadlessLog {
    pub failure: HeadlessFailure,
    pub backend_alive: bool,
    pub creations_attempted: usize,
    /// Last handle id issued; shared so ids stay unique across backends on one surface
    pub last_id: u64,
    pub live: HashSet<u64>,
    /// Resources that were still live when the backend was dropped
    pub live_at_drop: usize,
    pub textures: Vec<TextureRecord>,
    pub pipelines: Vec<PipelineRecord>,
    pub buffers: HashMap<u64, Vec<u8>>,
    pub buffer_writes: usize,
    pub clears: Vec<ClearRecord>,
    pub viewports: Vec<[f32; 6]>,
    pub draws: Vec<DrawRecord>,
    pub resizes: Vec<(u32, u32)>,
    pub frames_begun: usize,
    pub presents: Vec<u32>,
}

impl HeadlessLog {
    /// Number of resources created and not yet destroyed
    pub fn live_resources(&self) -> usize {
        self.live.len()
    }

    /// Contents of a buffer as last written
    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|data| data.as_slice())
    }
}

/// Stand-in for a window: owns the shared log.
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    log: Arc<Mutex<HeadlessLog>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(failure: HeadlessFailure) -> Self {
        let surface = Self::default();
        surface.log().failure = failure;
        surface
    }

    pub fn log(&self) -> MutexGuard<'_, HeadlessLog> {
        self.log.lock()
    }
}

/// Recording backend.
pub struct HeadlessBackend {
    log: Arc<Mutex<HeadlessLog>>,
    width: u32,
    height: u32,
    in_pass: bool,
    pipeline: Option<u64>,
    bind_groups: HashMap<u32, (u64, Vec<u32>)>,
}

impl HeadlessBackend {
    const SWAPCHAIN_VIEW: u64 = 0;

    fn allocate(&mut self, kind: &str) -> BackendResult<u64> {
        let mut log = self.log.lock();
        log.creations_attempted += 1;
        if log.failure.fail_resource_at == Some(log.creations_attempted) {
            log::debug!(
                "HeadlessBackend: injected failure creating {} (#{})",
                kind,
                log.creations_attempted
            );
            return Err(BackendError::OutOfMemory);
        }

        log.last_id += 1;
        let id = log.last_id;
        log.live.insert(id);
        log::trace!("HeadlessBackend: created {} {}", kind, id);
        Ok(id)
    }

    fn release(&mut self, id: u64) {
        self.log.lock().live.remove(&id);
    }
}

impl GraphicsBackend for HeadlessBackend {
    type Surface = HeadlessSurface;

    fn create(
        surface: HeadlessSurface,
        width: u32,
        height: u32,
        _settings: &RenderSettings,
    ) -> BackendResult<Self> {
        {
            let mut log = surface.log.lock();
            if log.failure.fail_create {
                return Err(BackendError::DeviceCreationFailed(
                    "injected device failure".into(),
                ));
            }
            log.backend_alive = true;
        }

        log::debug!("HeadlessBackend: created {}x{}", width, height);
        Ok(Self {
            log: surface.log,
            width,
            height,
            in_pass: false,
            pipeline: None,
            bind_groups: HashMap::new(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.log.lock().resizes.push((width, height));
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn supported_sample_count(&self, requested: u32) -> u32 {
        match requested {
            0 | 1 => 1,
            2 | 3 => 2,
            _ => 4,
        }
    }

    fn uniform_offset_alignment(&self) -> u64 {
        256
    }

    fn supports_wireframe(&self) -> bool {
        true
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let mut log = self.log.lock();
        if log.failure.fail_acquire {
            return Err(BackendError::AcquireImageFailed(
                "injected acquire failure".into(),
            ));
        }
        log.frames_begun += 1;

        Ok(FrameContext {
            swapchain_view: TextureViewHandle(Self::SWAPCHAIN_VIEW),
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self, sync_interval: u32) -> BackendResult<()> {
        self.log.lock().presents.push(sync_interval);
        Ok(())
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::Bgra8UnormSrgb
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let id = self.allocate("buffer")?;
        self.log.lock().buffers.insert(id, vec![0; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        _desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let id = self.allocate("buffer")?;
        self.log.lock().buffers.insert(id, data.to_vec());
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> BackendResult<()> {
        let mut log = self.log.lock();
        if log.failure.fail_writes {
            return Err(BackendError::UploadFailed("injected write failure".into()));
        }

        let contents = log
            .buffers
            .get_mut(&buffer.0)
            .ok_or_else(|| BackendError::UploadFailed(format!("unknown buffer {}", buffer.0)))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(BackendError::UploadFailed(format!(
                "write of {} bytes at {} overruns buffer of {} bytes",
                data.len(),
                offset,
                contents.len()
            )));
        }
        contents[start..end].copy_from_slice(data);
        log.buffer_writes += 1;
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let id = self.allocate("texture")?;
        self.log.lock().textures.push(TextureRecord {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            sample_count: desc.sample_count,
            format: desc.format,
        });
        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, _texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        self.allocate("texture view").map(TextureViewHandle)
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        log::trace!(
            "HeadlessBackend: texture {} <- {} bytes ({}x{})",
            texture.0,
            data.len(),
            width,
            height
        );
    }

    fn create_sampler(&mut self, _desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        self.allocate("sampler").map(SamplerHandle)
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        self.allocate("bind group layout").map(BindGroupLayoutHandle)
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        _entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        self.allocate("bind group").map(BindGroupHandle)
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let id = self.allocate("render pipeline")?;
        self.log.lock().pipelines.push(PipelineRecord {
            label: desc.label.clone(),
            raster: desc.raster,
            depth_test: desc
                .depth_stencil
                .map(|ds| ds.depth_test_enabled)
                .unwrap_or(false),
            blend: desc.color_targets.iter().any(|t| t.blend.is_some()),
            sample_count: desc.sample_count,
        });
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.in_pass = true;
        self.pipeline = None;
        self.bind_groups.clear();

        let color = desc.color_attachments.first();
        let depth = desc.depth_stencil_attachment.as_ref();
        self.log.lock().clears.push(ClearRecord {
            color: color.and_then(|c| match c.load_op {
                LoadOp::Clear(rgba) => Some(rgba),
                LoadOp::Load => None,
            }),
            depth: depth.and_then(|d| d.depth_clear_value),
            stencil: depth.and_then(|d| d.stencil_clear_value),
            resolves: color.map(|c| c.resolve_target.is_some()).unwrap_or(false),
        });
    }

    fn end_render_pass(&mut self) {
        self.in_pass = false;
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.pipeline = Some(pipeline.0);
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle, offsets: &[u32]) {
        self.bind_groups
            .insert(index, (bind_group.0, offsets.to_vec()));
    }

    fn set_vertex_buffer(&mut self, _slot: u32, _buffer: BufferHandle, _offset: u64) {}

    fn set_index_buffer(&mut self, _buffer: BufferHandle, _offset: u64, _format: IndexFormat) {}

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32) {
        self.log
            .lock()
            .viewports
            .push([x, y, width, height, min_depth, max_depth]);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, _instances: Range<u32>) {
        if !self.in_pass {
            log::warn!("HeadlessBackend: draw outside of a render pass ignored");
            return;
        }
        self.log.lock().draws.push(DrawRecord {
            pipeline: self.pipeline,
            index_count: indices.end - indices.start,
            bind_groups: self.bind_groups.clone(),
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.log.lock().buffers.remove(&buffer.0);
        self.release(buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.release(texture.0);
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.release(view.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.release(bind_group.0);
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.release(sampler.0);
    }

    fn destroy_bind_group_layout(&mut self, layout: BindGroupLayoutHandle) {
        self.release(layout.0);
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        let mut log = self.log.lock();
        log.live_at_drop = log.live.len();
        log.live.clear();
        log.backend_alive = false;
        log::debug!("HeadlessBackend: dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(surface: &HeadlessSurface) -> HeadlessBackend {
        HeadlessBackend::create(surface.clone(), 64, 32, &RenderSettings::default()).unwrap()
    }

    fn uniform(size: u64) -> BufferDescriptor {
        BufferDescriptor {
            label: None,
            size,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        }
    }

    #[test]
    fn nth_creation_fails() {
        let surface = HeadlessSurface::with_failure(HeadlessFailure {
            fail_resource_at: Some(2),
            ..Default::default()
        });
        let mut backend = backend(&surface);

        assert!(backend.create_buffer(&uniform(16)).is_ok());
        assert!(backend.create_buffer(&uniform(16)).is_err());
        assert!(backend.create_buffer(&uniform(16)).is_ok());
        assert_eq!(surface.log().live_resources(), 2);
    }

    #[test]
    fn writes_land_at_offset() {
        let surface = HeadlessSurface::new();
        let mut backend = backend(&surface);
        let buffer = backend.create_buffer(&uniform(8)).unwrap();

        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert!(backend.write_buffer(buffer, 6, &[1, 2, 3, 4]).is_err());

        let log = surface.log();
        assert_eq!(log.buffer_data(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(log.buffer_writes, 1);
    }

    #[test]
    fn drop_releases_everything() {
        let surface = HeadlessSurface::new();
        {
            let mut backend = backend(&surface);
            backend.create_buffer(&uniform(4)).unwrap();
            backend
                .create_texture(&TextureDescriptor::default())
                .unwrap();
            assert_eq!(surface.log().live_resources(), 2);
            assert!(surface.log().backend_alive);
        }
        let log = surface.log();
        assert_eq!(log.live_resources(), 0);
        assert_eq!(log.live_at_drop, 2);
        assert!(!log.backend_alive);
    }

    #[test]
    fn ids_stay_unique_across_backends() {
        let surface = HeadlessSurface::new();
        let first = backend(&surface).create_buffer(&uniform(4)).unwrap();
        let second = backend(&surface).create_buffer(&uniform(4)).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn every_kind_can_be_destroyed() {
        let surface = HeadlessSurface::new();
        let mut backend = backend(&surface);
        let sampler = backend.create_sampler(&SamplerDescriptor::default()).unwrap();
        let layout = backend.create_bind_group_layout(&[]).unwrap();
        assert_eq!(surface.log().live_resources(), 2);

        backend.destroy_sampler(sampler);
        backend.destroy_bind_group_layout(layout);
        assert_eq!(surface.log().live_resources(), 0);
    }

    #[test]
    fn draws_outside_pass_are_not_recorded() {
        let surface = HeadlessSurface::new();
        let mut backend = backend(&surface);
        backend.draw_indexed(0..3, 0, 0..1);
        assert!(surface.log().draws.is_empty());
    }
}
