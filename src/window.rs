//! Window management using winit

use std::sync::Arc;
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window as WinitWindow, WindowBuilder},
};

use crate::backend::WgpuBackend;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::scene::Scene;
use crate::EngineConfig;

/// Wrapper around winit window with additional state
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resized: bool,
    close_requested: bool,
}

impl Window {
    /// Create a new window with the given title and dimensions
    pub fn new(event_loop: &EventLoop<()>, title: &str, width: u32, height: u32) -> EngineResult<Self> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .build(event_loop)
            .map_err(|e| EngineError::InitializationFailure(format!("window creation: {}", e)))?;
        let size = window.inner_size();

        Ok(Self {
            window: Arc::new(window),
            width: size.width,
            height: size.height,
            resized: false,
            close_requested: false,
        })
    }

    /// Get arc reference to window, used as the wgpu surface target
    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    /// Current inner size in physical pixels
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_minimized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if window was resized since last frame
    pub fn was_resized(&self) -> bool {
        self.resized
    }

    pub fn clear_resize_flag(&mut self) {
        self.resized = false;
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Track size and close requests
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.resized = true;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            _ => {}
        }
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// Open a window, load `scene` and tick the engine until the window closes.
///
/// Window events feed the engine's input state; resizes are applied before
/// the next tick. The scene is unloaded and the renderer shut down on close.
pub fn run(config: EngineConfig, scene: Scene) -> EngineResult<()> {
    let event_loop = EventLoop::new()
        .map_err(|e| EngineError::InitializationFailure(format!("event loop: {}", e)))?;
    let mut window = Window::new(&event_loop, &config.title, config.width, config.height)?;

    let mut engine: Engine<WgpuBackend> = Engine::new(config.render.clone());
    let (width, height) = window.dimensions();
    engine.initialize(window.window_arc(), width.max(1), height.max(1))?;
    engine.load_scene(scene)?;

    event_loop
        .run(move |event, elwt: &EventLoopWindowTarget<()>| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => {
                    engine.context_mut().input.handle_window_event(&event);
                    window.handle_event(&event);

                    match event {
                        WindowEvent::CloseRequested => {
                            engine.shutdown();
                            elwt.exit();
                        }
                        WindowEvent::RedrawRequested => {
                            if window.was_resized() {
                                let (width, height) = window.dimensions();
                                engine.resize(width, height);
                                window.clear_resize_flag();
                            }
                            if window.is_minimized() {
                                engine.idle();
                            } else {
                                engine.tick();
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    if !window.should_close() {
                        window.request_redraw();
                    }
                }
                _ => {}
            }
        })
        .map_err(|e| EngineError::InitializationFailure(format!("event loop: {}", e)))
}
