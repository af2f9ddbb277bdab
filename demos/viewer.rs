//! # Scene Viewer
//!
//! Demonstrates:
//! - A scene lifecycle that loads meshes, textures and materials by name
//! - Parent/child transforms (moons orbiting a spinning planet)
//! - An orbit camera driven by mouse input
//! - Directional, point and spot lights
//!
//! Controls: drag with the left mouse button to orbit, scroll to zoom.

use clap::Parser;
use glam::Vec3;
use scene_engine::resources::{
    LoadContext, MaterialDesc, MaterialProperties, MeshSource, TextureSlot, TextureSource,
};
use scene_engine::scene::{
    Camera, CameraRig, Component, LightType, MeshRenderer, OrbitController, Scene, SceneLifecycle,
    UpdateContext,
};
use scene_engine::{EngineConfig, EngineResult, RenderSettings};

#[derive(Parser, Debug)]
#[command(name = "viewer", about = "Scene engine viewer")]
struct Args {
    /// Window width in pixels
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Window height in pixels
    #[arg(long, default_value = "720")]
    height: u32,

    /// Present without waiting for vertical blank
    #[arg(long)]
    no_vsync: bool,

    /// MSAA sample count (1 disables)
    #[arg(long, default_value = "4")]
    msaa: u32,

    /// Rasterize as wireframe
    #[arg(long)]
    wireframe: bool,
}

/// Rotates its entity around the Y axis
struct Spinner {
    speed: f32,
}

impl Component for Spinner {
    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        let delta = Vec3::Y * self.speed * ctx.dt;
        if let Err(err) = ctx.scene.rotate(ctx.entity, delta) {
            log::warn!("Spinner lost its entity: {}", err);
        }
    }
}

struct SolarScene;

impl SceneLifecycle for SolarScene {
    fn on_load(&mut self, scene: &mut Scene, ctx: &mut LoadContext<'_>) -> EngineResult<()> {
        let shader = ctx.default_shader()?;

        let sphere = ctx.load_mesh("sphere", MeshSource::Sphere { segments: 32 })?;
        let cube = ctx.load_mesh("cube", MeshSource::Cube)?;
        let cylinder = ctx.load_mesh("cylinder", MeshSource::Cylinder { segments: 24 })?;
        let ground = ctx.load_mesh(
            "ground",
            MeshSource::Plane {
                width: 20.0,
                depth: 20.0,
                divisions: 10,
            },
        )?;

        let checker = ctx.load_texture(
            "checker",
            TextureSource::Checkerboard {
                size: 256,
                color1: [200, 200, 200, 255],
                color2: [90, 90, 90, 255],
            },
        )?;

        let floor = ctx.load_material(
            "floor",
            MaterialDesc::new(shader.clone())
                .with_properties(MaterialProperties::rubber(Vec3::ONE))
                .with_texture(TextureSlot::Albedo, checker),
        )?;
        let gold = ctx.load_material(
            "gold",
            MaterialDesc::new(shader.clone()).with_properties(MaterialProperties::gold()),
        )?;
        let copper = ctx.load_material(
            "copper",
            MaterialDesc::new(shader.clone()).with_properties(MaterialProperties::copper()),
        )?;
        let plastic = ctx.load_material(
            "blue plastic",
            MaterialDesc::new(shader.clone())
                .with_properties(MaterialProperties::plastic(Vec3::new(0.2, 0.4, 0.9))),
        )?;
        let glow = ctx.load_material(
            "glow",
            MaterialDesc::new(shader)
                .with_properties(MaterialProperties::emissive(Vec3::new(1.0, 0.8, 0.4), 1.0)),
        )?;

        let floor_entity = scene.create_entity("floor");
        scene.set_position(floor_entity, Vec3::new(0.0, -1.0, 0.0))?;
        scene.add_component(floor_entity, MeshRenderer::new(ground, floor))?;

        let planet = scene.create_entity("planet");
        scene.set_scale(planet, Vec3::splat(1.5))?;
        scene.add_component(planet, MeshRenderer::new(sphere.clone(), gold))?;
        scene.add_component(planet, Spinner { speed: 0.5 })?;

        for (i, material) in [copper, plastic].into_iter().enumerate() {
            let moon = scene.create_entity(format!("moon {i}"));
            scene.set_parent(moon, Some(planet))?;
            let side = if i == 0 { 1.0 } else { -1.0 };
            scene.set_position(moon, Vec3::new(1.5 * side, 0.3, 0.0))?;
            scene.set_scale(moon, Vec3::splat(0.3))?;
            let mesh = if i == 0 { cube.clone() } else { cylinder.clone() };
            scene.add_component(moon, MeshRenderer::new(mesh, material))?;
            scene.add_component(moon, Spinner { speed: -2.0 })?;
        }

        let lamp = scene.create_entity("lamp");
        scene.set_position(lamp, Vec3::new(3.0, 2.0, -2.0))?;
        scene.set_scale(lamp, Vec3::splat(0.2))?;
        scene.add_component(lamp, MeshRenderer::new(sphere, glow))?;

        let mut camera = Camera::new();
        camera.look_at_from(Vec3::new(0.0, 3.0, -8.0), Vec3::ZERO);
        let mut orbit = OrbitController::new(Vec3::ZERO, 8.0).with_angles(0.0, 20.0);
        orbit.sync_with_camera(&camera);
        scene.add_camera(camera);

        let rig = scene.create_entity("camera rig");
        scene.add_component(rig, CameraRig::new(orbit))?;

        let lights = &mut ctx.context.lights;
        let sun = lights.create_light(LightType::Directional);
        if let Some(sun) = lights.get_mut(sun) {
            sun.intensity = 0.8;
        }
        let point = lights.create_light(LightType::Point);
        if let Some(point) = lights.get_mut(point) {
            point.transform.set_position(Vec3::new(3.0, 2.0, -2.0));
            point.color = Vec3::new(1.0, 0.8, 0.4);
            point.range = 12.0;
        }
        let spot = lights.create_light(LightType::Spot);
        if let Some(spot) = lights.get_mut(spot) {
            spot.transform.set_position(Vec3::new(0.0, 6.0, 0.0));
            spot.transform.set_rotation(Vec3::new(std::f32::consts::FRAC_PI_2, 0.0, 0.0));
            spot.intensity = 2.0;
        }

        Ok(())
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let render = RenderSettings::default()
        .with_vsync(!args.no_vsync)
        .with_msaa(args.msaa)
        .with_wireframe(args.wireframe);
    let config = EngineConfig::default()
        .with_title("Scene Viewer")
        .with_size(args.width, args.height)
        .with_render(render);

    let scene = Scene::new("solar").with_lifecycle(SolarScene);
    if let Err(err) = scene_engine::window::run(config, scene) {
        log::error!("Viewer failed: {}", err);
        std::process::exit(1);
    }
}
