//! Backend abstraction layer
//!
//! Provides the handle-based GPU interface the renderer is written against,
//! a wgpu implementation and a headless recording implementation.

pub mod headless;
pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use headless::{HeadlessBackend, HeadlessFailure, HeadlessLog, HeadlessSurface};
pub use traits::*;
pub use types::*;
pub use wgpu_backend::WgpuBackend;
