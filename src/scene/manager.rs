//! Scene load/unload sequencing

use crate::context::EngineContext;
use crate::error::EngineResult;
use crate::renderer::DrawTarget;
use crate::resources::LoadContext;

use super::Scene;

/// Holds at most one live scene.
///
/// Loading a new scene fully unloads and drops the current one first, so
/// two scenes never overlap.
#[derive(Debug, Default)]
pub struct SceneManager {
    current: Option<Scene>,
}

impl SceneManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unload the current scene, then load `scene` and make it current.
    ///
    /// If `on_load` fails the half-loaded scene is unloaded (its `on_unload`
    /// runs and its lights are removed), then dropped; no scene is current.
    pub fn load_scene(&mut self, mut scene: Scene, ctx: &mut LoadContext<'_>) -> EngineResult<()> {
        self.unload_current_scene(ctx.context);

        if let Err(err) = scene.load(ctx) {
            log::error!("Failed to load scene '{}': {}", scene.name(), err);
            scene.unload(ctx.context);
            return Err(err);
        }
        self.current = Some(scene);
        Ok(())
    }

    pub fn unload_current_scene(&mut self, context: &mut EngineContext) {
        if let Some(mut scene) = self.current.take() {
            scene.unload(context);
        }
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.current.as_ref()
    }

    pub fn current_scene_mut(&mut self) -> Option<&mut Scene> {
        self.current.as_mut()
    }

    pub fn has_scene(&self) -> bool {
        self.current.is_some()
    }

    pub fn update(&mut self, context: &mut EngineContext) {
        if let Some(scene) = &mut self.current {
            scene.update(context);
        }
    }

    pub fn render(&mut self, target: &mut dyn DrawTarget) {
        if let Some(scene) = &mut self.current {
            scene.render(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::resources::NoGpu;
    use crate::scene::{LightType, SceneLifecycle, SceneState};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Hooks {
        name: &'static str,
        log: Log,
        fail: bool,
    }

    impl SceneLifecycle for Hooks {
        fn on_load(&mut self, scene: &mut Scene, ctx: &mut LoadContext<'_>) -> EngineResult<()> {
            self.log.borrow_mut().push(format!("load {}", self.name));
            scene.create_entity("spawned");
            ctx.context.lights.create_light(LightType::Point);
            if self.fail {
                return Err(EngineError::ResourceLoad {
                    name: "missing".into(),
                    reason: "not found".into(),
                });
            }
            Ok(())
        }

        fn on_unload(&mut self, scene: &mut Scene, _context: &mut EngineContext) {
            self.log.borrow_mut().push(format!(
                "unload {} ({} entities)",
                self.name,
                scene.entity_count()
            ));
        }
    }

    fn scene(name: &'static str, log: &Log, fail: bool) -> Scene {
        Scene::new(name).with_lifecycle(Hooks {
            name,
            log: log.clone(),
            fail,
        })
    }

    #[test]
    fn old_scene_unloads_before_new_one_loads() {
        let log = Log::default();
        let mut context = EngineContext::default();
        let mut factory = NoGpu;
        let mut manager = SceneManager::new();

        let mut ctx = LoadContext {
            context: &mut context,
            factory: &mut factory,
        };
        manager.load_scene(scene("a", &log, false), &mut ctx).unwrap();
        manager.load_scene(scene("b", &log, false), &mut ctx).unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["load a", "unload a (1 entities)", "load b"]
        );
        let current = manager.current_scene().unwrap();
        assert_eq!(current.name(), "b");
        assert_eq!(current.state(), SceneState::Loaded);
    }

    #[test]
    fn failed_load_leaves_no_current_scene() {
        let log = Log::default();
        let mut context = EngineContext::default();
        let mut factory = NoGpu;
        let mut manager = SceneManager::new();
        let mut ctx = LoadContext {
            context: &mut context,
            factory: &mut factory,
        };

        manager.load_scene(scene("a", &log, false), &mut ctx).unwrap();
        assert!(manager.load_scene(scene("b", &log, true), &mut ctx).is_err());
        assert!(!manager.has_scene());
        assert_eq!(log.borrow()[1], "unload a (1 entities)");
    }

    #[test]
    fn failed_load_removes_its_lights() {
        let log = Log::default();
        let mut context = EngineContext::default();
        let mut factory = NoGpu;
        let mut manager = SceneManager::new();
        let mut ctx = LoadContext {
            context: &mut context,
            factory: &mut factory,
        };

        assert!(manager.load_scene(scene("broken", &log, true), &mut ctx).is_err());
        assert!(ctx.context.lights.is_empty());
        assert_eq!(
            *log.borrow(),
            vec!["load broken", "unload broken (1 entities)"]
        );

        manager.load_scene(scene("next", &log, false), &mut ctx).unwrap();
        assert_eq!(ctx.context.lights.len(), 1);
    }

    #[test]
    fn unload_clears_current() {
        let log = Log::default();
        let mut context = EngineContext::default();
        let mut factory = NoGpu;
        let mut manager = SceneManager::new();
        manager
            .load_scene(
                scene("a", &log, false),
                &mut LoadContext {
                    context: &mut context,
                    factory: &mut factory,
                },
            )
            .unwrap();

        manager.unload_current_scene(&mut context);
        manager.unload_current_scene(&mut context);
        assert!(manager.current_scene().is_none());
        assert_eq!(log.borrow().len(), 2);
    }
}
