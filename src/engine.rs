//! Main engine orchestrator

use crate::backend::GraphicsBackend;
use crate::context::EngineContext;
use crate::error::EngineResult;
use crate::renderer::Renderer;
use crate::resources::LoadContext;
use crate::scene::{Scene, SceneManager};
use crate::RenderSettings;

/// Owns the renderer, the scene manager and the engine context, and runs ticks.
///
/// A tick advances time, updates the current scene, then renders it between
/// `begin_frame` and `end_frame`. Input edges are rolled over last so
/// components see this tick's presses exactly once.
pub struct Engine<B: GraphicsBackend> {
    renderer: Renderer<B>,
    scenes: SceneManager,
    context: EngineContext,
}

impl<B: GraphicsBackend> Engine<B> {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            renderer: Renderer::new(settings),
            scenes: SceneManager::new(),
            context: EngineContext::new(),
        }
    }

    /// Bring up the renderer on `surface`.
    ///
    /// Calling this again unloads the current scene and drops cached
    /// resources first; they belong to the previous device.
    pub fn initialize(&mut self, surface: B::Surface, width: u32, height: u32) -> EngineResult<()> {
        if self.renderer.is_initialized() || self.renderer.is_shut_down() || self.scenes.has_scene() {
            log::info!("Re-initializing: unloading scene and cached resources");
            self.scenes.unload_current_scene(&mut self.context);
            self.context.resources.clear();
        }
        self.renderer.initialize(surface, width, height)
    }

    /// Replace the current scene with `scene`, creating its resources on this renderer
    pub fn load_scene(&mut self, scene: Scene) -> EngineResult<()> {
        let mut ctx = LoadContext {
            context: &mut self.context,
            factory: &mut self.renderer,
        };
        self.scenes.load_scene(scene, &mut ctx)?;
        self.sync_camera_aspect();
        Ok(())
    }

    pub fn unload_scene(&mut self) {
        self.scenes.unload_current_scene(&mut self.context);
    }

    /// Resize the render targets and keep the active camera's aspect in step
    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
        self.sync_camera_aspect();
    }

    /// Run one tick using wall-clock time
    pub fn tick(&mut self) {
        self.context.time.update();
        self.run_tick();
    }

    /// Run one tick with a fixed step of `dt` seconds
    pub fn tick_with(&mut self, dt: f32) {
        self.context.time.advance(dt);
        self.run_tick();
    }

    /// Stand in for a tick that is not run, e.g. while the window is minimized.
    ///
    /// Input edges are rolled over and the wall clock restarts, so the next
    /// [`Engine::tick`] neither replays stale presses nor sees the whole gap
    /// as its delta.
    pub fn idle(&mut self) {
        self.context.input.finish_tick();
        self.context.time.pause();
    }

    fn run_tick(&mut self) {
        self.scenes.update(&mut self.context);

        let time = &self.context.time;
        self.renderer
            .set_frame_time(time.total() as f32, time.delta());
        self.renderer.set_lights(&self.context.lights.gpu_lights());

        if self.renderer.is_initialized() {
            match self.renderer.begin_frame() {
                Ok(()) => {
                    self.scenes.render(&mut self.renderer);
                    if let Err(err) = self.renderer.end_frame() {
                        log::warn!("Failed to present frame: {}", err);
                    }
                }
                Err(err) => log::warn!("Skipping frame: {}", err),
            }
        }

        self.context.input.finish_tick();
    }

    /// Unload the scene, drop cached resources, then release the GPU
    pub fn shutdown(&mut self) {
        self.scenes.unload_current_scene(&mut self.context);
        self.context.resources.clear();
        self.renderer.shutdown();
        log::info!("Engine shut down");
    }

    fn sync_camera_aspect(&mut self) {
        let Some(aspect) = self.renderer.aspect_ratio() else {
            return;
        };
        if let Some(camera) = self
            .scenes
            .current_scene_mut()
            .and_then(Scene::active_camera_mut)
        {
            camera.set_aspect_ratio(aspect);
        }
    }

    pub fn renderer(&self) -> &Renderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<B> {
        &mut self.renderer
    }

    pub fn scenes(&self) -> &SceneManager {
        &self.scenes
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scenes.current_scene()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scenes.current_scene_mut()
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HeadlessBackend, HeadlessFailure, HeadlessSurface};
    use crate::resources::{MaterialDesc, MaterialProperties, MeshSource};
    use crate::scene::{
        Camera, Component, LightType, MeshRenderer, Projection, SceneLifecycle, UpdateContext,
    };
    use glam::Vec3;
    use winit::keyboard::KeyCode;

    struct Spin;

    impl Component for Spin {
        fn update(&mut self, ctx: &mut UpdateContext<'_>) {
            let delta = Vec3::Y * ctx.dt;
            if let Err(err) = ctx.scene.rotate(ctx.entity, delta) {
                panic!("spin target vanished: {err}");
            }
        }
    }

    /// Counts ticks where the space key was freshly pressed
    #[derive(Default)]
    struct PressCounter {
        presses: u32,
    }

    impl Component for PressCounter {
        fn update(&mut self, ctx: &mut UpdateContext<'_>) {
            if ctx.input().is_key_pressed(KeyCode::Space) {
                self.presses += 1;
            }
        }
    }

    struct CubeScene;

    impl SceneLifecycle for CubeScene {
        fn on_load(&mut self, scene: &mut Scene, ctx: &mut LoadContext<'_>) -> EngineResult<()> {
            let mesh = ctx.load_mesh("cube", MeshSource::Cube)?;
            let shader = ctx.default_shader()?;
            let material = ctx.load_material(
                "gold",
                MaterialDesc::new(shader).with_properties(MaterialProperties::gold()),
            )?;

            let cube = scene.create_entity("cube");
            scene.add_component(cube, MeshRenderer::new(mesh, material))?;
            scene.add_component(cube, Spin)?;
            scene.add_component(cube, PressCounter::default())?;

            let mut camera = Camera::new();
            camera.look_at_from(Vec3::new(0.0, 2.0, -5.0), Vec3::ZERO);
            scene.add_camera(camera);

            ctx.context.lights.create_light(LightType::Directional);
            Ok(())
        }
    }

    fn engine() -> (Engine<HeadlessBackend>, HeadlessSurface) {
        let surface = HeadlessSurface::new();
        let mut engine = Engine::new(RenderSettings::default());
        engine.initialize(surface.clone(), 800, 400).unwrap();
        engine
            .load_scene(Scene::new("cubes").with_lifecycle(CubeScene))
            .unwrap();
        (engine, surface)
    }

    fn cube(engine: &Engine<HeadlessBackend>) -> crate::scene::EntityId {
        engine.scene().unwrap().find_entity("cube").unwrap()
    }

    #[test]
    fn tick_updates_then_renders_the_scene() {
        let (mut engine, surface) = engine();

        engine.tick_with(0.5);

        let id = cube(&engine);
        let rotation = engine.scene().unwrap().transform(id).unwrap().rotation();
        assert!((rotation.y - 0.5).abs() < 1e-6);

        let log = surface.log();
        assert_eq!(log.frames_begun, 1);
        assert_eq!(log.draws.len(), 1);
        assert_eq!(log.presents, vec![1]);
        assert_eq!(engine.renderer().stats().draw_calls, 1);
    }

    #[test]
    fn loaded_scene_camera_matches_surface_aspect() {
        let (mut engine, _surface) = engine();
        let aspect = |engine: &Engine<HeadlessBackend>| match engine
            .scene()
            .and_then(Scene::active_camera)
            .map(Camera::projection)
        {
            Some(Projection::Perspective { aspect, .. }) => aspect,
            other => panic!("unexpected projection {other:?}"),
        };
        assert_eq!(aspect(&engine), 2.0);

        engine.resize(300, 300);
        assert_eq!(aspect(&engine), 1.0);
    }

    #[test]
    fn resources_are_cached_across_reloads() {
        let (mut engine, _surface) = engine();
        engine
            .load_scene(Scene::new("again").with_lifecycle(CubeScene))
            .unwrap();

        let resources = &engine.context().resources;
        assert_eq!(resources.meshes.len(), 1);
        assert_eq!(resources.shaders.len(), 1);
        assert_eq!(resources.materials.len(), 1);
        // Lights from the first scene were cleared on unload
        assert_eq!(engine.context().lights.len(), 1);
    }

    #[test]
    fn key_press_is_seen_for_exactly_one_tick() {
        let (mut engine, _surface) = engine();
        engine.context_mut().input.press_key(KeyCode::Space);
        engine.tick_with(0.1);
        engine.tick_with(0.1);

        let id = cube(&engine);
        let counter = engine
            .scene()
            .unwrap()
            .component::<PressCounter>(id)
            .unwrap();
        assert_eq!(counter.presses, 1);
    }

    #[test]
    fn tick_without_scene_still_clears_and_presents() {
        let surface = HeadlessSurface::new();
        let mut engine: Engine<HeadlessBackend> = Engine::new(RenderSettings::default());
        engine.initialize(surface.clone(), 640, 480).unwrap();

        engine.tick_with(0.016);

        let log = surface.log();
        assert_eq!(log.clears.len(), 1);
        assert!(log.draws.is_empty());
        assert_eq!(log.presents.len(), 1);
    }

    #[test]
    fn failed_acquire_skips_the_frame() {
        let surface = HeadlessSurface::with_failure(HeadlessFailure {
            fail_acquire: true,
            ..Default::default()
        });
        let mut engine: Engine<HeadlessBackend> = Engine::new(RenderSettings::default());
        engine.initialize(surface.clone(), 640, 480).unwrap();

        engine.tick_with(0.016);
        assert!(surface.log().presents.is_empty());
        assert!(!engine.renderer().is_frame_in_progress());

        surface.log().failure.fail_acquire = false;
        engine.tick_with(0.016);
        assert_eq!(surface.log().presents.len(), 1);
    }

    #[test]
    fn ticking_before_initialize_only_advances_time() {
        let mut engine: Engine<HeadlessBackend> = Engine::new(RenderSettings::default());
        engine.tick_with(0.25);
        assert_eq!(engine.context().time.frame_count(), 1);
        assert!(!engine.renderer().is_initialized());
    }

    #[test]
    fn reinitialize_binds_only_objects_of_the_new_device() {
        let (mut engine, surface) = engine();
        engine.tick_with(0.1);

        engine.initialize(surface.clone(), 640, 480).unwrap();
        assert!(!engine.scenes().has_scene());
        assert!(engine.context().resources.meshes.is_empty());
        assert!(engine.context().resources.materials.is_empty());

        engine
            .load_scene(Scene::new("cubes").with_lifecycle(CubeScene))
            .unwrap();
        engine.tick_with(0.1);

        let log = surface.log();
        assert_eq!(log.draws.len(), 2);
        let draw = log.draws.last().unwrap();
        assert!(log.live.contains(&draw.pipeline.unwrap()));
        for (group, (bind_group, _)) in &draw.bind_groups {
            assert!(log.live.contains(bind_group), "group {group} is stale");
        }
    }

    #[test]
    fn idle_consumes_presses_and_restarts_the_clock() {
        let (mut engine, _surface) = engine();
        engine.tick();
        engine.context_mut().input.press_key(KeyCode::Space);
        std::thread::sleep(std::time::Duration::from_millis(30));

        engine.idle();
        engine.tick();

        assert_eq!(engine.context().time.delta(), 0.0);
        let id = cube(&engine);
        let counter = engine
            .scene()
            .unwrap()
            .component::<PressCounter>(id)
            .unwrap();
        assert_eq!(counter.presses, 0);
    }

    #[test]
    fn shutdown_unloads_scene_and_releases_gpu() {
        let (mut engine, surface) = engine();
        engine.shutdown();

        assert!(!engine.scenes().has_scene());
        assert!(engine.context().resources.meshes.is_empty());
        assert!(engine.context().lights.is_empty());
        assert!(engine.renderer().is_shut_down());
        assert!(!surface.log().backend_alive);
    }
}
