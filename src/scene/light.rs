//! Light types for the scene

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use slotmap::{new_key_type, SlotMap};

use super::Transform;

/// Maximum number of enabled lights uploaded per frame
pub const MAX_LIGHTS: usize = 8;

new_key_type! {
    /// Handle to a light owned by a [`LightManager`].
    pub struct LightId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Point,
    Spot,
}

impl LightType {
    fn gpu_tag(self) -> f32 {
        match self {
            LightType::Directional => 0.0,
            LightType::Point => 1.0,
            LightType::Spot => 2.0,
        }
    }
}

/// A light placed with its own transform.
///
/// Position comes from the transform; direction is the transform's forward
/// vector, so a directional light shines along +Z rotated by its pitch/yaw.
#[derive(Debug, Clone)]
pub struct Light {
    pub transform: Transform,
    pub light_type: LightType,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    /// Full cone angle in radians
    pub spot_angle: f32,
    pub enabled: bool,
}

impl Light {
    pub fn new(light_type: LightType) -> Self {
        let mut transform = Transform::new();
        if light_type == LightType::Directional {
            // Tilted 45 degrees down
            transform.set_rotation(Vec3::new(45f32.to_radians(), 0.0, 0.0));
        }

        Self {
            transform,
            light_type,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            spot_angle: 45f32.to_radians(),
            enabled: true,
        }
    }

    pub fn direction(&self) -> Vec3 {
        self.transform.forward()
    }

    /// Convert to GPU data format
    pub fn to_gpu_data(&self) -> GpuLightData {
        GpuLightData {
            position_range: self.transform.position().extend(self.range),
            direction_type: self.direction().extend(self.light_type.gpu_tag()),
            color_intensity: self.color.extend(self.intensity),
            spot_params: Vec4::new((self.spot_angle * 0.5).cos(), 0.0, 0.0, 0.0),
        }
    }
}

/// GPU-friendly light data structure
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLightData {
    /// xyz = position, w = range
    pub position_range: Vec4,
    /// xyz = direction, w = light type (0=directional, 1=point, 2=spot)
    pub direction_type: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
    /// x = cos(half spot angle)
    pub spot_params: Vec4,
}

/// Owns the lights of the running engine, iterated in creation order
#[derive(Debug, Default)]
pub struct LightManager {
    lights: SlotMap<LightId, Light>,
    order: Vec<LightId>,
}

impl LightManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_light(&mut self, light_type: LightType) -> LightId {
        let id = self.lights.insert(Light::new(light_type));
        self.order.push(id);
        id
    }

    pub fn remove_light(&mut self, id: LightId) -> Option<Light> {
        let light = self.lights.remove(id)?;
        self.order.retain(|&other| other != id);
        Some(light)
    }

    pub fn clear(&mut self) {
        self.lights.clear();
        self.order.clear();
    }

    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id)
    }

    pub fn get_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LightId, &Light)> {
        self.order
            .iter()
            .filter_map(|&id| self.lights.get(id).map(|light| (id, light)))
    }

    /// Enabled lights in creation order, capped at [`MAX_LIGHTS`]
    pub fn gpu_lights(&self) -> Vec<GpuLightData> {
        self.iter()
            .map(|(_, light)| light)
            .filter(|light| light.enabled)
            .take(MAX_LIGHTS)
            .map(Light::to_gpu_data)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_default_points_down() {
        let light = Light::new(LightType::Directional);
        assert!(light.direction().y < 0.0);
        assert_eq!(light.intensity, 1.0);
        assert_eq!(light.range, 10.0);

        let point = Light::new(LightType::Point);
        assert_eq!(point.direction(), Vec3::Z);
    }

    #[test]
    fn manager_keeps_creation_order() {
        let mut lights = LightManager::new();
        let a = lights.create_light(LightType::Point);
        let b = lights.create_light(LightType::Spot);
        let c = lights.create_light(LightType::Directional);

        lights.remove_light(b);
        let d = lights.create_light(LightType::Point);

        let ids: Vec<LightId> = lights.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, c, d]);
        assert!(lights.get(b).is_none());
    }

    #[test]
    fn gpu_lights_skip_disabled_and_cap() {
        let mut lights = LightManager::new();
        for _ in 0..12 {
            lights.create_light(LightType::Point);
        }
        let first = lights.iter().map(|(id, _)| id).next().unwrap();
        lights.get_mut(first).unwrap().enabled = false;

        assert_eq!(lights.gpu_lights().len(), MAX_LIGHTS);

        lights.clear();
        assert!(lights.gpu_lights().is_empty());
    }

    #[test]
    fn gpu_data_packs_type_and_cone() {
        let mut light = Light::new(LightType::Spot);
        light.spot_angle = 90f32.to_radians();
        let gpu = light.to_gpu_data();
        assert_eq!(gpu.direction_type.w, 2.0);
        assert!((gpu.spot_params.x - 45f32.to_radians().cos()).abs() < 1e-6);
    }
}
