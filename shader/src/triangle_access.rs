use glam::{Vec2, Vec3};
use meshtracer_shared::MeshInstance;

use crate::scene_access::SceneAccessor;
use crate::transform::InstanceTransform;

/// Identifies one triangle: the mesh instance and the triangle index local to its mesh
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TriangleRef {
    pub mesh: u32,
    pub triangle: u32,
}

/// Triangle with its vertices moved into world space
#[derive(Clone, Copy, Debug)]
pub struct WorldTriangle {
    pub positions: [Vec3; 3],
    pub vertices: [u32; 3],
}

impl TriangleRef {
    pub fn new(mesh: u32, triangle: u32) -> Self {
        Self { mesh, triangle }
    }
}

impl WorldTriangle {
    /// Reconstruct a triangle of an instance from the geometry buffers
    pub fn fetch(
        scene: &SceneAccessor,
        instance: &MeshInstance,
        transform: &InstanceTransform,
        triangle: u32,
    ) -> Option<Self> {
        let vertices = scene.triangle_vertices(instance, triangle)?;
        let a = scene.vertex_position(vertices[0])?;
        let b = scene.vertex_position(vertices[1])?;
        let c = scene.vertex_position(vertices[2])?;
        Some(Self {
            positions: [
                transform.point_to_world(a),
                transform.point_to_world(b),
                transform.point_to_world(c),
            ],
            vertices,
        })
    }

    pub fn geometric_normal(&self) -> Vec3 {
        let [a, b, c] = self.positions;
        (b - a).cross(c - a)
    }

    /// Barycentric interpolation of the vertex normals (local space) and texcoords
    pub fn interpolate_attributes(&self, scene: &SceneAccessor, weights: Vec3) -> (Vec3, Vec2) {
        let mut normal = Vec3::ZERO;
        let mut texcoord = Vec2::ZERO;
        for (vertex, weight) in self.vertices.iter().zip(weights.to_array()) {
            if let Some(attributes) = scene.vertex_attributes(*vertex) {
                normal += Vec3::from_array(attributes.normal) * weight;
                texcoord += Vec2::from_array(attributes.texcoord) * weight;
            }
        }
        (normal, texcoord)
    }
}
