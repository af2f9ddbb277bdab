//! Camera system

use glam::{Mat4, Vec3};
use slotmap::new_key_type;

use super::Transform;

new_key_type! {
    /// Handle to a camera owned by a [`Scene`](super::Scene).
    pub struct CameraId;
}

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        width: f32,
        height: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        Projection::Orthographic {
            width,
            height,
            near,
            far,
        }
    }

    /// Left-handed projection mapping depth to [0, 1]
    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_lh(fov_y, aspect, near, far),
            Projection::Orthographic {
                width,
                height,
                near,
                far,
            } => Mat4::orthographic_lh(
                -width / 2.0,
                width / 2.0,
                -height / 2.0,
                height / 2.0,
                near,
                far,
            ),
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { far, .. } => *far,
        }
    }
}

/// Camera viewing the scene through its own transform
#[derive(Debug, Clone)]
pub struct Camera {
    pub transform: Transform,
    projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::from_position(Vec3::new(0.0, 0.0, -5.0)),
            projection: Projection::default(),
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_perspective(&mut self, fov_y_degrees: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::perspective(fov_y_degrees, aspect, near, far);
    }

    pub fn set_orthographic(&mut self, width: f32, height: f32, near: f32, far: f32) {
        self.projection = Projection::orthographic(width, height, near, far);
    }

    /// Update aspect ratio; orthographic projections are left untouched
    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = &mut self.projection {
            *a = aspect;
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position()
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.transform.set_position(position);
    }

    /// Look-at from the transform's position along its forward vector
    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.transform.position();
        Mat4::look_at_lh(eye, eye + self.transform.forward(), self.transform.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Orient towards `target` with zero roll. No-op when `target` is the camera position.
    pub fn look_at(&mut self, target: Vec3) {
        let delta = target - self.transform.position();
        if delta.length_squared() <= f32::EPSILON {
            return;
        }

        let forward = delta.normalize();
        let pitch = (-forward.y).clamp(-1.0, 1.0).asin();
        let yaw = forward.x.atan2(forward.z);
        self.transform.set_rotation(Vec3::new(pitch, yaw, 0.0));
    }

    pub fn look_at_from(&mut self, position: Vec3, target: Vec3) {
        self.transform.set_position(position);
        self.look_at(target);
    }

    pub fn move_forward(&mut self, distance: f32) {
        let forward = self.transform.forward();
        self.transform.translate(forward * distance);
    }

    pub fn move_right(&mut self, distance: f32) {
        let right = self.transform.right();
        self.transform.translate(right * distance);
    }

    pub fn move_up(&mut self, distance: f32) {
        let up = self.transform.up();
        self.transform.translate(up * distance);
    }
}
