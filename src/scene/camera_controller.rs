//! Camera controller system
//!
//! Provides abstract camera control with implementations for:
//! - FreeFly: WASD movement, mouse look, scroll speed
//! - Orbit: Rotate around a target point

use glam::{Vec2, Vec3};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::input::Input;

use super::component::{Component, UpdateContext};
use super::Camera;

/// Input state for camera controllers
#[derive(Debug, Clone, Default)]
pub struct CameraInput {
    /// Movement keys (WASD, QE for up/down)
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,

    /// Sprint modifier (shift)
    pub sprint: bool,

    /// Mouse delta since last frame (in pixels)
    pub mouse_delta: Vec2,

    /// Mouse scroll delta (positive = scroll up)
    pub scroll_delta: f32,

    /// Whether mouse look is active (right mouse button held)
    pub mouse_look_active: bool,
}

impl CameraInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample the bindings from the current input state
    pub fn from_input(input: &Input) -> Self {
        Self {
            forward: input.is_key_held(KeyCode::KeyW),
            backward: input.is_key_held(KeyCode::KeyS),
            left: input.is_key_held(KeyCode::KeyA),
            right: input.is_key_held(KeyCode::KeyD),
            up: input.is_key_held(KeyCode::KeyE) || input.is_key_held(KeyCode::Space),
            down: input.is_key_held(KeyCode::KeyQ) || input.is_key_held(KeyCode::ControlLeft),
            sprint: input.is_key_held(KeyCode::ShiftLeft) || input.is_key_held(KeyCode::ShiftRight),
            mouse_delta: input.mouse_delta(),
            scroll_delta: input.wheel_delta(),
            mouse_look_active: input.is_button_held(MouseButton::Right),
        }
    }
}

/// Abstract camera controller trait
pub trait CameraController {
    /// Update the camera based on input and delta time
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32);

    /// Get the controller name for debugging
    fn name(&self) -> &'static str;

    /// Reset the controller to default state
    fn reset(&mut self);
}

/// Free-fly camera controller (FPS-style)
///
/// - WASD: Move forward/backward/left/right
/// - QE or Space/Ctrl: Move up/down
/// - Mouse: Look around (while the right button is held)
/// - Scroll: Adjust movement speed
/// - Shift: Sprint
pub struct FreeFlyController {
    /// Current yaw angle (horizontal rotation) in radians
    pub yaw: f32,
    /// Current pitch angle (vertical rotation) in radians, positive looks down
    pub pitch: f32,
    /// Base movement speed in units per second
    pub move_speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Mouse sensitivity (radians per pixel)
    pub mouse_sensitivity: f32,
    pub sprint_multiplier: f32,
    /// Speed change per scroll unit
    pub scroll_speed_factor: f32,
}

impl Default for FreeFlyController {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            move_speed: 5.0,
            min_speed: 0.5,
            max_speed: 50.0,
            mouse_sensitivity: 0.003,
            sprint_multiplier: 2.0,
            scroll_speed_factor: 1.2,
        }
    }
}

impl FreeFlyController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.move_speed = speed;
        self
    }

    pub fn with_sensitivity(mut self, sensitivity: f32) -> Self {
        self.mouse_sensitivity = sensitivity;
        self
    }

    /// Initialize yaw/pitch from camera's current orientation
    pub fn sync_with_camera(&mut self, camera: &Camera) {
        let rotation = camera.transform.rotation();
        self.pitch = rotation.x;
        self.yaw = rotation.y;
    }
}

impl CameraController for FreeFlyController {
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32) {
        if input.scroll_delta != 0.0 {
            if input.scroll_delta > 0.0 {
                self.move_speed *= self.scroll_speed_factor;
            } else {
                self.move_speed /= self.scroll_speed_factor;
            }
            self.move_speed = self.move_speed.clamp(self.min_speed, self.max_speed);
        }

        if input.mouse_look_active && input.mouse_delta != Vec2::ZERO {
            self.yaw += input.mouse_delta.x * self.mouse_sensitivity;
            self.pitch += input.mouse_delta.y * self.mouse_sensitivity;

            let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
            self.pitch = self.pitch.clamp(-max_pitch, max_pitch);
            self.yaw %= std::f32::consts::TAU;
        }

        camera
            .transform
            .set_rotation(Vec3::new(self.pitch, self.yaw, 0.0));

        let forward = camera.transform.forward();
        let right = camera.transform.right();

        let mut velocity = Vec3::ZERO;
        if input.forward {
            velocity += forward;
        }
        if input.backward {
            velocity -= forward;
        }
        if input.right {
            velocity += right;
        }
        if input.left {
            velocity -= right;
        }
        if input.up {
            velocity += Vec3::Y;
        }
        if input.down {
            velocity -= Vec3::Y;
        }

        if velocity.length_squared() > 0.0 {
            let speed = if input.sprint {
                self.move_speed * self.sprint_multiplier
            } else {
                self.move_speed
            };
            camera.transform.translate(velocity.normalize() * speed * dt);
        }
    }

    fn name(&self) -> &'static str {
        "FreeFly"
    }

    fn reset(&mut self) {
        self.yaw = 0.0;
        self.pitch = 0.0;
        self.move_speed = 5.0;
    }
}

/// Orbit camera controller
///
/// Rotates around a target point at a fixed distance.
/// - Mouse drag (right button): Orbit around target
/// - Scroll: Zoom in/out
/// - WASD: Pan the target point
pub struct OrbitController {
    pub target: Vec3,
    pub distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Horizontal angle in radians; zero places the camera on -Z of the target
    pub azimuth: f32,
    /// Vertical angle in radians above the target's horizontal plane
    pub elevation: f32,
    pub min_elevation: f32,
    pub max_elevation: f32,
    /// Orbit sensitivity (radians per pixel)
    pub orbit_sensitivity: f32,
    /// Zoom factor per scroll unit
    pub zoom_factor: f32,
    pub pan_speed: f32,
}

impl Default for OrbitController {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 10.0,
            min_distance: 1.0,
            max_distance: 100.0,
            azimuth: 0.0,
            elevation: std::f32::consts::FRAC_PI_6,
            min_elevation: -std::f32::consts::FRAC_PI_2 + 0.05,
            max_elevation: std::f32::consts::FRAC_PI_2 - 0.05,
            orbit_sensitivity: 0.005,
            zoom_factor: 1.1,
            pan_speed: 5.0,
        }
    }
}

impl OrbitController {
    pub fn new(target: Vec3, distance: f32) -> Self {
        Self {
            target,
            distance,
            ..Default::default()
        }
    }

    pub fn with_angles(mut self, azimuth_degrees: f32, elevation_degrees: f32) -> Self {
        self.azimuth = azimuth_degrees.to_radians();
        self.elevation = elevation_degrees.to_radians();
        self
    }

    /// Initialize from the camera position, keeping the current target
    pub fn sync_with_camera(&mut self, camera: &Camera) {
        let offset = camera.position() - self.target;
        let distance = offset.length();
        if distance <= f32::EPSILON {
            return;
        }
        self.distance = distance.clamp(self.min_distance, self.max_distance);
        self.elevation = (offset.y / distance).clamp(-1.0, 1.0).asin();
        self.azimuth = offset.x.atan2(-offset.z);
    }

    fn calculate_position(&self) -> Vec3 {
        let horizontal = self.distance * self.elevation.cos();
        self.target
            + Vec3::new(
                horizontal * self.azimuth.sin(),
                self.distance * self.elevation.sin(),
                -horizontal * self.azimuth.cos(),
            )
    }

    /// Horizontal direction from the camera towards the target
    fn forward_direction(&self) -> Vec3 {
        Vec3::new(-self.azimuth.sin(), 0.0, self.azimuth.cos())
    }

    fn right_direction(&self) -> Vec3 {
        Vec3::Y.cross(self.forward_direction())
    }
}

impl CameraController for OrbitController {
    fn update(&mut self, camera: &mut Camera, input: &CameraInput, dt: f32) {
        if input.scroll_delta != 0.0 {
            if input.scroll_delta > 0.0 {
                self.distance /= self.zoom_factor;
            } else {
                self.distance *= self.zoom_factor;
            }
            self.distance = self.distance.clamp(self.min_distance, self.max_distance);
        }

        if input.mouse_look_active && input.mouse_delta != Vec2::ZERO {
            self.azimuth += input.mouse_delta.x * self.orbit_sensitivity;
            self.elevation += input.mouse_delta.y * self.orbit_sensitivity;
            self.elevation = self.elevation.clamp(self.min_elevation, self.max_elevation);
            self.azimuth %= std::f32::consts::TAU;
        }

        let forward = self.forward_direction();
        let right = self.right_direction();

        let mut pan = Vec3::ZERO;
        if input.forward {
            pan += forward;
        }
        if input.backward {
            pan -= forward;
        }
        if input.right {
            pan += right;
        }
        if input.left {
            pan -= right;
        }
        if input.up {
            pan += Vec3::Y;
        }
        if input.down {
            pan -= Vec3::Y;
        }

        if pan.length_squared() > 0.0 {
            let speed = if input.sprint {
                self.pan_speed * 2.0
            } else {
                self.pan_speed
            };
            self.target += pan.normalize() * speed * dt;
        }

        camera.look_at_from(self.calculate_position(), self.target);
    }

    fn name(&self) -> &'static str {
        "Orbit"
    }

    fn reset(&mut self) {
        self.target = Vec3::ZERO;
        self.distance = 10.0;
        self.azimuth = 0.0;
        self.elevation = std::f32::consts::FRAC_PI_6;
    }
}

/// Component that drives the scene's active camera with a controller
pub struct CameraRig<C> {
    pub controller: C,
}

impl<C: CameraController> CameraRig<C> {
    pub fn new(controller: C) -> Self {
        Self { controller }
    }
}

impl<C: CameraController + 'static> Component for CameraRig<C> {
    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        let input = CameraInput::from_input(ctx.input());
        let dt = ctx.dt;
        if let Some(camera) = ctx.scene.active_camera_mut() {
            self.controller.update(camera, &input, dt);
        }
    }
}
