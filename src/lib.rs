//! Scene Engine - a hierarchical scene graph driving a frame-lifecycle renderer
//!
//! Entities live in an arena owned by a [`scene::Scene`], carry a
//! [`scene::Transform`] whose world matrix is composed through the parent
//! chain, and own [`scene::Component`]s that are updated and rendered in a
//! deterministic depth-first order. The [`renderer::Renderer`] turns those
//! traversals into GPU submissions through a [`backend::GraphicsBackend`]:
//!
//! - **wgpu**: the windowed backend used by [`window::run`]
//! - **headless**: records every call, used for tests and tooling
//!
//! # Features
//! - Lazy world-matrix caching with subtree invalidation
//! - Cycle-checked reparenting over handle-based hierarchy links
//! - Per-frame and per-object constant buffers with discard-and-rewrite uploads
//! - Name-keyed resource caches for meshes, textures, shaders and materials
//! - Explicit [`context::EngineContext`] instead of global singletons

pub mod backend;
pub mod context;
pub mod engine;
pub mod error;
pub mod input;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod time;
pub mod window;

pub use context::EngineContext;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use renderer::Renderer;

/// Renderer configuration
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Present with vsync (sync interval 1) or immediately (0)
    pub vsync: bool,
    /// Render into a multisampled target resolved into the back buffer
    pub msaa: bool,
    /// Requested sample count, clamped to what the device supports
    pub msaa_samples: u32,
    /// Color the back buffer is cleared to in BeginFrame
    pub clear_color: [f32; 4],
    /// Rasterize the default shader as lines when the device allows it
    pub wireframe: bool,
    /// Per-object constant slots available in one frame
    pub max_objects_per_frame: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            msaa: false,
            msaa_samples: 4,
            clear_color: [0.1, 0.1, 0.3, 1.0],
            wireframe: false,
            max_objects_per_frame: 1024,
        }
    }
}

impl RenderSettings {
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_msaa(mut self, samples: u32) -> Self {
        self.msaa = samples > 1;
        self.msaa_samples = samples;
        self
    }

    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_wireframe(mut self, wireframe: bool) -> Self {
        self.wireframe = wireframe;
        self
    }

    pub fn with_max_objects_per_frame(mut self, max: u32) -> Self {
        self.max_objects_per_frame = max;
        self
    }

    /// Sync interval passed to present
    pub fn sync_interval(&self) -> u32 {
        if self.vsync {
            1
        } else {
            0
        }
    }
}

/// Configuration for initializing the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Renderer settings
    pub render: RenderSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "Scene Engine".to_string(),
            width: 1280,
            height: 720,
            render: RenderSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_render(mut self, render: RenderSettings) -> Self {
        self.render = render;
        self
    }
}
