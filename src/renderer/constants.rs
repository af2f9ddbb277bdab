//! GPU-visible constant blocks

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use crate::scene::{Camera, GpuLightData, MAX_LIGHTS};

/// Fixed ambient term applied to every lit surface
pub const AMBIENT: Vec4 = Vec4::new(0.2, 0.2, 0.2, 1.0);

/// Camera state captured when the camera is handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl From<&Camera> for FrameCamera {
    fn from(camera: &Camera) -> Self {
        Self {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            position: camera.position(),
        }
    }
}

/// Per-frame constants (group 0, binding 0)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameConstants {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub camera_position: Vec4,
    pub ambient: Vec4,
    pub time: f32,
    pub delta_time: f32,
    pub light_count: u32,
    pub _pad: u32,
}

impl FrameConstants {
    pub fn new(camera: &FrameCamera, time: f32, delta_time: f32, light_count: usize) -> Self {
        Self {
            view: camera.view,
            projection: camera.projection,
            view_projection: camera.projection * camera.view,
            camera_position: camera.position.extend(1.0),
            ambient: AMBIENT,
            time,
            delta_time,
            light_count: light_count.min(MAX_LIGHTS) as u32,
            _pad: 0,
        }
    }
}

/// Light array (group 0, binding 1)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightConstants {
    pub lights: [GpuLightData; MAX_LIGHTS],
}

impl LightConstants {
    pub fn new(lights: &[GpuLightData]) -> Self {
        let mut constants = Self::zeroed();
        for (slot, light) in constants.lights.iter_mut().zip(lights) {
            *slot = *light;
        }
        constants
    }
}

/// Per-object constants (group 1, dynamic offset)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: Mat4,
    /// Transforms normals correctly under non-uniform scale
    pub world_inverse_transpose: Mat4,
}

impl ObjectConstants {
    pub fn new(world: &Mat4) -> Self {
        Self {
            world: *world,
            world_inverse_transpose: world.inverse().transpose(),
        }
    }
}

/// Round `size` up to a multiple of `alignment`
pub fn align_to(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<FrameConstants>(), 240);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 128);
        assert_eq!(std::mem::size_of::<LightConstants>(), 64 * MAX_LIGHTS);
    }

    #[test]
    fn frame_constants_compose_view_projection() {
        let camera = Camera::default();
        let frame = FrameConstants::new(&FrameCamera::from(&camera), 1.5, 0.016, 20);

        assert_eq!(frame.view_projection, camera.view_projection_matrix());
        assert_eq!(frame.camera_position, Vec4::new(0.0, 0.0, -5.0, 1.0));
        assert_eq!(frame.ambient, AMBIENT);
        assert_eq!(frame.light_count, MAX_LIGHTS as u32);
    }

    #[test]
    fn inverse_transpose_undoes_non_uniform_scale_on_normals() {
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let object = ObjectConstants::new(&world);

        // A 45 degree surface normal stays perpendicular to the stretched surface
        let tangent = world.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        let normal = object
            .world_inverse_transpose
            .transform_vector3(Vec3::new(1.0, 1.0, 0.0));
        assert!(tangent.dot(normal).abs() < 1e-6);
    }

    #[test]
    fn alignment_rounds_up() {
        assert_eq!(align_to(128, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(300, 256), 512);
        assert_eq!(align_to(128, 0), 128);
    }

    #[test]
    fn lights_are_truncated_to_capacity() {
        let light = GpuLightData {
            color_intensity: Vec4::ONE,
            ..Default::default()
        };
        let constants = LightConstants::new(&[light; 12]);
        assert!(constants.lights.iter().all(|l| *l == light));
    }
}
