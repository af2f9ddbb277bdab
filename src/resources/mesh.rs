//! Mesh data structures and generation
//!
//! Primitives use a left-handed frame and wind front faces clockwise as seen
//! from outside, matching the renderer's back-face culling.

use std::f32::consts::PI;

use glam::{Vec2, Vec3, Vec4};

use crate::backend::{
    BackendResult, BufferDescriptor, BufferHandle, BufferUsage, GraphicsBackend, IndexFormat,
    Vertex,
};

/// CPU-side geometry
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub name: String,
}

impl MeshData {
    pub fn new(name: &str) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            name: name.to_string(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Tint every vertex
    pub fn with_color(mut self, color: Vec4) -> Self {
        for vertex in &mut self.vertices {
            vertex.color = color;
        }
        self
    }

    /// Single triangle in the XY plane facing -Z
    pub fn triangle() -> Self {
        let mut mesh = MeshData::new("triangle");
        let normal = -Vec3::Z;
        mesh.vertices = vec![
            Vertex::new(Vec3::new(0.0, 0.5, 0.0), normal, Vec2::new(0.5, 0.0)),
            Vertex::new(Vec3::new(0.5, -0.5, 0.0), normal, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(-0.5, -0.5, 0.0), normal, Vec2::new(0.0, 1.0)),
        ];
        mesh.indices = vec![0, 1, 2];
        mesh
    }

    /// Unit quad in the XY plane facing -Z
    pub fn quad() -> Self {
        let mut mesh = MeshData::new("quad");
        mesh.push_face(Vec3::ZERO, -Vec3::Z, Vec3::Y, Vec3::X, 0.5);
        mesh
    }

    /// Unit cube centered at origin
    pub fn cube() -> Self {
        let mut mesh = MeshData::new("cube");
        let faces = [
            (-Vec3::Z, Vec3::Y),
            (Vec3::Z, Vec3::Y),
            (Vec3::X, Vec3::Y),
            (-Vec3::X, Vec3::Y),
            (Vec3::Y, Vec3::Z),
            (-Vec3::Y, -Vec3::Z),
        ];
        for (normal, up) in faces {
            let right = up.cross(-normal);
            mesh.push_face(normal * 0.5, normal, up, right, 0.5);
        }
        mesh
    }

    /// Square face centered at `center`; `right` and `up` span it with `up x right == normal`
    fn push_face(&mut self, center: Vec3, normal: Vec3, up: Vec3, right: Vec3, half: f32) {
        let base = self.vertices.len() as u32;
        let (r, u) = (right * half, up * half);
        let corners = [
            (center - r - u, Vec2::new(0.0, 1.0)),
            (center - r + u, Vec2::new(0.0, 0.0)),
            (center + r + u, Vec2::new(1.0, 0.0)),
            (center + r - u, Vec2::new(1.0, 1.0)),
        ];
        for (position, uv) in corners {
            self.vertices.push(Vertex::new(position, normal, uv));
        }
        self.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    /// UV sphere of radius 0.5 with `segments` slices and `segments` stacks
    pub fn sphere(segments: u32) -> Self {
        let mut mesh = MeshData::new("sphere");
        let segments = segments.max(3);
        let rings = segments;

        for ring in 0..=rings {
            let phi = PI * ring as f32 / rings as f32;
            for segment in 0..=segments {
                let theta = 2.0 * PI * segment as f32 / segments as f32;
                let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                let uv = Vec2::new(
                    segment as f32 / segments as f32,
                    ring as f32 / rings as f32,
                );
                mesh.vertices.push(Vertex::new(normal * 0.5, normal, uv));
            }
        }

        mesh.push_grid(rings, segments);
        mesh
    }

    /// Cylinder of radius 0.5 and height 1 along Y, with caps
    pub fn cylinder(segments: u32) -> Self {
        let mut mesh = MeshData::new("cylinder");
        let segments = segments.max(3);
        let (radius, half_height) = (0.5, 0.5);

        // Side: row 0 on top, row 1 at the bottom
        for (row, y) in [half_height, -half_height].into_iter().enumerate() {
            for segment in 0..=segments {
                let theta = 2.0 * PI * segment as f32 / segments as f32;
                let normal = Vec3::new(theta.cos(), 0.0, theta.sin());
                let position = Vec3::new(normal.x * radius, y, normal.z * radius);
                let uv = Vec2::new(segment as f32 / segments as f32, row as f32);
                mesh.vertices.push(Vertex::new(position, normal, uv));
            }
        }
        mesh.push_grid(1, segments);

        for (y, normal) in [(half_height, Vec3::Y), (-half_height, -Vec3::Y)] {
            let center = mesh.vertices.len() as u32;
            mesh.vertices
                .push(Vertex::new(Vec3::new(0.0, y, 0.0), normal, Vec2::splat(0.5)));

            for segment in 0..=segments {
                let theta = 2.0 * PI * segment as f32 / segments as f32;
                let (sin, cos) = theta.sin_cos();
                mesh.vertices.push(Vertex::new(
                    Vec3::new(cos * radius, y, sin * radius),
                    normal,
                    Vec2::new(0.5 + cos * 0.5, 0.5 + sin * 0.5),
                ));
            }

            for segment in 0..segments {
                let current = center + 1 + segment;
                let next = current + 1;
                if normal.y > 0.0 {
                    mesh.indices.extend_from_slice(&[center, next, current]);
                } else {
                    mesh.indices.extend_from_slice(&[center, current, next]);
                }
            }
        }

        mesh
    }

    /// Rows of `columns + 1` vertices, row index growing towards -Y / +phi
    fn push_grid(&mut self, rows: u32, columns: u32) {
        let stride = columns + 1;
        for row in 0..rows {
            for column in 0..columns {
                let a = row * stride + column;
                let b = a + stride;
                let c = b + 1;
                let d = a + 1;
                self.indices.extend_from_slice(&[a, c, b, a, d, c]);
            }
        }
    }

    /// Plane on the XZ axis facing +Y
    pub fn plane(width: f32, depth: f32, divisions: u32) -> Self {
        let mut mesh = MeshData::new("plane");
        let divisions = divisions.max(1);

        let half_width = width / 2.0;
        let half_depth = depth / 2.0;

        for z in 0..=divisions {
            for x in 0..=divisions {
                let u = x as f32 / divisions as f32;
                let v = z as f32 / divisions as f32;
                mesh.vertices.push(Vertex::new(
                    Vec3::new(-half_width + width * u, 0.0, -half_depth + depth * v),
                    Vec3::Y,
                    Vec2::new(u, v),
                ));
            }
        }

        let stride = divisions + 1;
        for z in 0..divisions {
            for x in 0..divisions {
                let a = z * stride + x;
                let b = a + stride;
                let c = b + 1;
                let d = a + 1;
                mesh.indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }

        mesh
    }
}

/// Geometry uploaded to GPU buffers
#[derive(Debug)]
pub struct Mesh {
    name: String,
    vertex_buffer: BufferHandle,
    index_buffer: BufferHandle,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    pub(crate) fn upload<B: GraphicsBackend>(backend: &mut B, data: &MeshData) -> BackendResult<Self> {
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} vertices", data.name)),
                size: data.vertex_bytes().len() as u64,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            },
            data.vertex_bytes(),
        )?;
        let index_buffer = match backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{} indices", data.name)),
                size: data.index_bytes().len() as u64,
                usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
            },
            data.index_bytes(),
        ) {
            Ok(buffer) => buffer,
            Err(err) => {
                backend.destroy_buffer(vertex_buffer);
                return Err(err);
            }
        };

        Ok(Self {
            name: data.name.clone(),
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.len() as u32,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Bind the buffers and issue one indexed draw
    pub(crate) fn draw<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.set_vertex_buffer(0, self.vertex_buffer, 0);
        backend.set_index_buffer(self.index_buffer, 0, IndexFormat::Uint32);
        backend.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every non-degenerate triangle must wind clockwise seen from the side its normals face
    fn assert_outward_winding(mesh: &MeshData) {
        for tri in mesh.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| mesh.vertices[i as usize]);
            let cross = (b.position - a.position).cross(c.position - a.position);
            if cross.length_squared() < 1e-12 {
                continue;
            }
            let normal = a.normal + b.normal + c.normal;
            assert!(
                cross.dot(normal) > 0.0,
                "{}: triangle {:?} winds inwards",
                mesh.name,
                tri
            );
        }
    }

    fn assert_indices_in_range(mesh: &MeshData) {
        assert_eq!(mesh.indices.len() % 3, 0);
        assert!(mesh
            .indices
            .iter()
            .all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn primitives_wind_outwards() {
        for mesh in [
            MeshData::triangle(),
            MeshData::quad(),
            MeshData::cube(),
            MeshData::sphere(16),
            MeshData::cylinder(12),
            MeshData::plane(4.0, 2.0, 3),
        ] {
            assert_indices_in_range(&mesh);
            assert_outward_winding(&mesh);
        }
    }

    #[test]
    fn cube_has_six_faces() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube
            .vertices
            .iter()
            .all(|v| v.position.abs().max_element() <= 0.5 + 1e-6));
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let sphere = MeshData::sphere(8);
        assert_eq!(sphere.vertex_count(), 81);
        assert_eq!(sphere.index_count(), 8 * 8 * 6);
        for v in &sphere.vertices {
            assert!((v.position.length() - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn plane_spans_requested_extent() {
        let plane = MeshData::plane(10.0, 4.0, 2);
        assert_eq!(plane.vertex_count(), 9);
        assert_eq!(plane.triangle_count(), 8);
        let max = plane
            .vertices
            .iter()
            .fold(Vec3::splat(f32::MIN), |m, v| m.max(v.position));
        assert_eq!(max, Vec3::new(5.0, 0.0, 2.0));
    }

    #[test]
    fn with_color_tints_all_vertices() {
        let quad = MeshData::quad().with_color(Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!(quad.vertices.iter().all(|v| v.color.x == 1.0 && v.color.y == 0.0));
    }
}
