//! Shader programs compiled into render pipelines

use crate::backend::{
    BackendResult, BindGroupLayoutHandle, BlendState, ColorTargetState, ColorWrites,
    DepthStencilState, GraphicsBackend, PrimitiveTopology, RasterState, RenderPipelineDescriptor,
    RenderPipelineHandle, TextureFormat, Vertex,
};

/// Built-in lit shader.
///
/// Group 0 holds per-frame constants and lights, group 1 the per-object
/// constants (dynamic offset), group 2 the material constants, its four
/// texture slots and the sampler.
pub const DEFAULT_SHADER: &str = r#"
struct FrameConstants {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_projection: mat4x4<f32>,
    camera_position: vec4<f32>,
    ambient: vec4<f32>,
    time: f32,
    delta_time: f32,
    light_count: u32,
    _pad: u32,
};

struct Light {
    position_range: vec4<f32>,
    direction_type: vec4<f32>,
    color_intensity: vec4<f32>,
    spot_params: vec4<f32>,
};

struct Lights {
    items: array<Light, 8>,
};

struct ObjectConstants {
    world: mat4x4<f32>,
    world_inverse_transpose: mat4x4<f32>,
};

struct MaterialConstants {
    albedo: vec4<f32>,
    metallic: f32,
    roughness: f32,
    ao: f32,
    emissive: f32,
};

@group(0) @binding(0) var<uniform> frame: FrameConstants;
@group(0) @binding(1) var<uniform> lights: Lights;

@group(1) @binding(0) var<uniform> object: ObjectConstants;

@group(2) @binding(0) var<uniform> material: MaterialConstants;
@group(2) @binding(1) var albedo_map: texture_2d<f32>;
@group(2) @binding(2) var normal_map: texture_2d<f32>;
@group(2) @binding(3) var metallic_map: texture_2d<f32>;
@group(2) @binding(4) var roughness_map: texture_2d<f32>;
@group(2) @binding(5) var material_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) color: vec4<f32>,
};

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world = object.world * vec4<f32>(in.position, 1.0);
    out.clip_position = frame.view_projection * world;
    out.world_position = world.xyz;
    out.normal = normalize((object.world_inverse_transpose * vec4<f32>(in.normal, 0.0)).xyz);
    out.uv = in.uv;
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = material.albedo * in.color * textureSample(albedo_map, material_sampler, in.uv);
    let metallic = material.metallic * textureSample(metallic_map, material_sampler, in.uv).r;
    let roughness = clamp(
        material.roughness * textureSample(roughness_map, material_sampler, in.uv).r,
        0.04,
        1.0,
    );

    let n = normalize(in.normal);
    let v = normalize(frame.camera_position.xyz - in.world_position);
    let shininess = mix(256.0, 4.0, roughness);
    let specular_color = mix(vec3<f32>(0.04), albedo.rgb, metallic);

    var color = frame.ambient.rgb * albedo.rgb * material.ao;

    let count = min(frame.light_count, 8u);
    for (var i = 0u; i < count; i = i + 1u) {
        let light = lights.items[i];
        let kind = light.direction_type.w;

        var l = normalize(-light.direction_type.xyz);
        var attenuation = 1.0;
        if (kind > 0.5) {
            let to_light = light.position_range.xyz - in.world_position;
            let distance = length(to_light);
            l = to_light / max(distance, 0.0001);
            let falloff = clamp(1.0 - distance / light.position_range.w, 0.0, 1.0);
            attenuation = falloff * falloff;
            if (kind > 1.5) {
                let cos_angle = dot(-l, normalize(light.direction_type.xyz));
                let inner = min(light.spot_params.x + 0.05, 1.0);
                attenuation = attenuation * smoothstep(light.spot_params.x, inner, cos_angle);
            }
        }

        let radiance = light.color_intensity.rgb * light.color_intensity.w * attenuation;
        let n_dot_l = max(dot(n, l), 0.0);
        let h = normalize(l + v);
        let specular = pow(max(dot(n, h), 0.0), shininess) * specular_color;
        color = color + (albedo.rgb * (1.0 - metallic) + specular) * n_dot_l * radiance;
    }

    color = color + albedo.rgb * material.emissive;
    return vec4<f32>(color, albedo.a);
}
"#;

/// Fixed-function state a shader is compiled with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderOptions {
    pub depth_test: bool,
    /// Alpha blending instead of opaque writes
    pub blend: bool,
}

impl Default for ShaderOptions {
    fn default() -> Self {
        Self {
            depth_test: true,
            blend: false,
        }
    }
}

impl ShaderOptions {
    pub fn without_depth_test(mut self) -> Self {
        self.depth_test = false;
        self
    }

    pub fn with_blend(mut self) -> Self {
        self.blend = true;
        self
    }
}

/// Renderer state a pipeline is built against
pub(crate) struct PipelineTarget<'a> {
    pub bind_group_layouts: &'a [BindGroupLayoutHandle],
    pub color_format: TextureFormat,
    pub sample_count: u32,
    pub raster: RasterState,
    pub depth_test: DepthStencilState,
    pub depth_disabled: DepthStencilState,
    pub blend: BlendState,
}

/// A compiled shader program
#[derive(Debug)]
pub struct Shader {
    name: String,
    pipeline: RenderPipelineHandle,
    options: ShaderOptions,
}

impl Shader {
    pub(crate) fn compile<B: GraphicsBackend>(
        backend: &mut B,
        name: &str,
        source: &str,
        options: ShaderOptions,
        target: &PipelineTarget<'_>,
    ) -> BackendResult<Self> {
        let depth_stencil = if options.depth_test {
            target.depth_test
        } else {
            target.depth_disabled
        };

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(name.to_string()),
            shader_source: source.to_string(),
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: target.bind_group_layouts.to_vec(),
            primitive_topology: PrimitiveTopology::TriangleList,
            raster: target.raster,
            depth_stencil: Some(depth_stencil),
            color_targets: vec![ColorTargetState {
                format: target.color_format,
                blend: options.blend.then_some(target.blend),
                write_mask: ColorWrites::ALL,
            }],
            sample_count: target.sample_count,
        })?;

        log::debug!("Compiled shader '{}' ({:?})", name, options);
        Ok(Self {
            name: name.to_string(),
            pipeline,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> ShaderOptions {
        self.options
    }

    pub(crate) fn pipeline(&self) -> RenderPipelineHandle {
        self.pipeline
    }
}
