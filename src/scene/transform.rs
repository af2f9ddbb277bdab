//! Transform with a cached world matrix

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Local position, rotation and scale of a scene node.
///
/// Rotation is stored as Euler angles in radians: `x` is pitch, `y` is yaw
/// and `z` is roll, applied roll first, then pitch, then yaw. Coordinates are
/// left-handed with +Z forward.
///
/// The world matrix is cached. Any mutator marks the transform dirty; the
/// owning [`Scene`](super::Scene) also marks every descendant dirty and
/// resolves world matrices top-down through the parent chain.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    position: Vec3,
    rotation: Vec3,
    scale: Vec3,
    world: Mat4,
    dirty: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            world: Mat4::IDENTITY,
            dirty: true,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create transform from position, rotation (euler angles in radians), and scale
    pub fn from_components(position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.set_rotation(rotation);
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.set_scale(scale);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Euler angles in radians (pitch, yaw, roll)
    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
        self.dirty = true;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.dirty = true;
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.set_scale(Vec3::splat(scale));
    }

    /// Translate by an offset
    pub fn translate(&mut self, offset: Vec3) {
        self.set_position(self.position + offset);
    }

    /// Add to the Euler angles (radians)
    pub fn rotate(&mut self, delta: Vec3) {
        self.set_rotation(self.rotation + delta);
    }

    /// Rotation as a quaternion (roll, then pitch, then yaw)
    pub fn rotation_quat(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }

    /// Scale, then rotation, then translation, ignoring any parent
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation_quat(), self.position)
    }

    /// Get forward direction (local +Z in world space)
    pub fn forward(&self) -> Vec3 {
        self.rotation_quat() * Vec3::Z
    }

    /// Get right direction (local +X in world space)
    pub fn right(&self) -> Vec3 {
        self.rotation_quat() * Vec3::X
    }

    /// Get up direction (local +Y in world space)
    pub fn up(&self) -> Vec3 {
        self.rotation_quat() * Vec3::Y
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The cached world matrix, if it is valid for the current data
    pub fn cached_world_matrix(&self) -> Option<Mat4> {
        (!self.dirty).then_some(self.world)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Recompute the world matrix if dirty. `parent_world` must already be resolved.
    pub(crate) fn resolve_world(&mut self, parent_world: Option<&Mat4>) -> Mat4 {
        if self.dirty {
            let local = self.local_matrix();
            self.world = match parent_world {
                Some(parent) => *parent * local,
                None => local,
            };
            self.dirty = false;
        }
        self.world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn approx_vec(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn default_is_identity_and_dirty() {
        let mut t = Transform::new();
        assert!(t.is_dirty());
        assert_eq!(t.resolve_world(None), Mat4::IDENTITY);
        assert!(!t.is_dirty());
    }

    #[test]
    fn local_matrix_scales_then_rotates_then_translates() {
        let t = Transform::from_components(
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(0.0, FRAC_PI_2, 0.0),
            Vec3::splat(2.0),
        );

        // +X scaled to 2, yawed 90 degrees onto -Z, then moved
        let p = t.local_matrix().transform_point3(Vec3::X);
        assert!(approx_vec(p, Vec3::new(10.0, 0.0, -2.0)));
    }

    #[test]
    fn yaw_turns_forward_towards_right() {
        let t = Transform::new().with_rotation(Vec3::new(0.0, FRAC_PI_2, 0.0));
        assert!(approx_vec(t.forward(), Vec3::X));
        assert!(approx_vec(t.right(), -Vec3::Z));
        assert!(approx_vec(t.up(), Vec3::Y));
    }

    #[test]
    fn positive_pitch_looks_down() {
        let t = Transform::new().with_rotation(Vec3::new(0.3, 0.0, 0.0));
        assert!(t.forward().y < 0.0);
    }

    #[test]
    fn roll_is_applied_before_yaw() {
        let t = Transform::new().with_rotation(Vec3::new(0.0, FRAC_PI_2, FRAC_PI_2));

        // Roll takes +X to +Y, yaw leaves +Y alone
        let p = t.local_matrix().transform_vector3(Vec3::X);
        assert!(approx_vec(p, Vec3::Y));
    }

    #[test]
    fn mutators_invalidate_cache() {
        let mut t = Transform::new();
        t.resolve_world(None);

        t.translate(Vec3::new(1.0, 2.0, 3.0));
        assert!(t.cached_world_matrix().is_none());

        let world = t.resolve_world(None);
        assert!(approx_vec(world.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(t.cached_world_matrix(), Some(world));

        t.rotate(Vec3::new(0.0, 0.1, 0.0));
        assert!(t.is_dirty());
        t.resolve_world(None);
        t.set_uniform_scale(3.0);
        assert!(t.is_dirty());
        assert_eq!(t.scale(), Vec3::splat(3.0));
    }

    #[test]
    fn clean_transform_ignores_new_parent_until_dirty() {
        let mut t = Transform::from_position(Vec3::X);
        let first = t.resolve_world(None);

        let parent = Mat4::from_translation(Vec3::Y);
        assert_eq!(t.resolve_world(Some(&parent)), first);

        t.mark_dirty();
        let world = t.resolve_world(Some(&parent));
        assert!(approx_vec(world.w_axis.truncate(), Vec3::new(1.0, 1.0, 0.0)));
    }
}
