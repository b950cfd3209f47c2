use glam::Vec3;
use meshtracer_shared::{BvhNode, MeshInstance};

use crate::intersection::{ray_aabb_intersect, test_triangle_intersection, Hit, TriangleSample};
use crate::ray::Ray;
use crate::scene_access::SceneAccessor;
use crate::transform::InstanceTransform;
use crate::triangle_access::{TriangleRef, WorldTriangle};

/// Walks the per-instance BVH nodes and tests their triangles
pub struct BvhTraverser<'a> {
    scene: &'a SceneAccessor<'a>,
}

impl<'a> BvhTraverser<'a> {
    pub fn new(scene: &'a SceneAccessor<'a>) -> Self {
        Self { scene }
    }

    /// Closest hit over every node. Ties keep the lowest node index, then
    /// the lowest triangle index.
    pub fn closest_hit(&self, ray: &Ray) -> Option<Hit> {
        if ray.is_degenerate() {
            return None;
        }

        let mut closest: Option<(TriangleRef, WorldTriangle, TriangleSample)> = None;
        let mut closest_t = f32::INFINITY;

        for node_index in 0..self.scene.bvh_node_count() {
            let Some((node, instance)) = self.node(node_index) else {
                continue;
            };
            let transform = InstanceTransform::of_node(node, instance);
            if !Self::node_hit(node, &transform, ray, closest_t) {
                continue;
            }

            let world = InstanceTransform::of_instance(instance);
            for triangle in 0..instance.triangle_count {
                let Some(world_triangle) = WorldTriangle::fetch(self.scene, instance, &world, triangle) else {
                    continue;
                };
                let [a, b, c] = world_triangle.positions;
                if let Some(sample) = test_triangle_intersection(ray, a, b, c) {
                    if sample.distance < closest_t {
                        closest_t = sample.distance;
                        closest = Some((TriangleRef::new(node.mesh, triangle), world_triangle, sample));
                    }
                }
            }
        }

        closest.map(|(triangle, world_triangle, sample)| self.make_hit(ray, triangle, &world_triangle, &sample))
    }

    /// Any hit closer than `max_distance`, ignoring `excluded`
    pub fn occluded(&self, ray: &Ray, max_distance: f32, excluded: TriangleRef) -> bool {
        if ray.is_degenerate() {
            return false;
        }

        for node_index in 0..self.scene.bvh_node_count() {
            let Some((node, instance)) = self.node(node_index) else {
                continue;
            };
            let transform = InstanceTransform::of_node(node, instance);
            if !Self::node_hit(node, &transform, ray, max_distance) {
                continue;
            }

            let world = InstanceTransform::of_instance(instance);
            for triangle in 0..instance.triangle_count {
                if TriangleRef::new(node.mesh, triangle) == excluded {
                    continue;
                }
                let Some(world_triangle) = WorldTriangle::fetch(self.scene, instance, &world, triangle) else {
                    continue;
                };
                let [a, b, c] = world_triangle.positions;
                if let Some(sample) = test_triangle_intersection(ray, a, b, c) {
                    if sample.distance < max_distance {
                        return true;
                    }
                }
            }
        }

        false
    }

    fn node(&self, index: u32) -> Option<(&'a BvhNode, &'a MeshInstance)> {
        let node = self.scene.bvh_node(index)?;
        let instance = self.scene.mesh(node.mesh)?;
        Some((node, instance))
    }

    /// Test the node's local-space bounds against the ray moved into that space
    fn node_hit(node: &BvhNode, transform: &InstanceTransform, ray: &Ray, max_t: f32) -> bool {
        match transform.ray_to_local(ray) {
            Some((origin, direction)) => ray_aabb_intersect(
                origin,
                direction,
                node.bounds.min_corner(),
                node.bounds.max_corner(),
                max_t,
            ),
            None => false,
        }
    }

    fn make_hit(&self, ray: &Ray, triangle: TriangleRef, world_triangle: &WorldTriangle, sample: &TriangleSample) -> Hit {
        let (local_normal, texcoord) = world_triangle.interpolate_attributes(self.scene, sample.weights());
        let (transform, material_id) = match self.scene.mesh(triangle.mesh) {
            Some(instance) => (InstanceTransform::of_instance(instance), instance.material_id),
            None => (InstanceTransform::new(Default::default(), Vec3::ZERO, Vec3::ONE), 0),
        };

        let mut normal = transform.normal_to_world(local_normal);
        if normal.length_squared() <= 0.0 || !normal.is_finite() {
            normal = world_triangle.geometric_normal();
        }
        normal = normal.normalize_or_zero();
        if normal.dot(ray.direction) > 0.0 {
            normal = -normal;
        }

        Hit {
            distance: sample.distance,
            point: ray.at(sample.distance),
            normal,
            texcoord,
            material_id,
            triangle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_access::TextureLayers;
    use approx::assert_relative_eq;
    use glam::Quat;
    use meshtracer_shared::{Aabb, TriangleIndices, Vertex, VertexAttributes};

    struct TestScene {
        vertices: Vec<Vertex>,
        attributes: Vec<VertexAttributes>,
        indices: Vec<TriangleIndices>,
        meshes: Vec<MeshInstance>,
        bvh: Vec<BvhNode>,
    }

    impl TestScene {
        /// Unit right triangle in the XY plane, facing +Z, one copy per placement
        fn triangles(placements: &[(Vec3, Quat, Vec3)]) -> Self {
            let vertices = vec![Vertex::new(Vec3::ZERO), Vertex::new(Vec3::X), Vertex::new(Vec3::Y)];
            let attributes = vec![
                VertexAttributes::new(Vec3::Z, [0.0, 0.0]),
                VertexAttributes::new(Vec3::Z, [1.0, 0.0]),
                VertexAttributes::new(Vec3::Z, [0.0, 1.0]),
            ];
            let indices = vec![TriangleIndices::new([0, 1, 2])];
            let bounds = Aabb::from_points(vertices.iter().map(|v| Vec3::from_array(v.position)));
            let meshes: Vec<MeshInstance> = placements
                .iter()
                .enumerate()
                .map(|(i, (position, rotation, scale))| MeshInstance::new(*rotation, *position, *scale, i as u32, 1, 0, 0))
                .collect();
            let bvh = meshes
                .iter()
                .enumerate()
                .map(|(i, instance)| BvhNode::new(bounds, instance, i as u32))
                .collect();
            Self {
                vertices,
                attributes,
                indices,
                meshes,
                bvh,
            }
        }

        fn accessor(&self) -> SceneAccessor<'_> {
            SceneAccessor {
                lights: &[],
                vertices: &self.vertices,
                attributes: &self.attributes,
                indices: &self.indices,
                meshes: &self.meshes,
                bvh: &self.bvh,
                materials: &[],
                textures: TextureLayers::empty(),
            }
        }
    }

    #[test]
    fn test_empty_scene_has_no_hits() {
        let scene = TestScene::triangles(&[]);
        let accessor = scene.accessor();
        let traverser = BvhTraverser::new(&accessor);
        assert!(traverser.closest_hit(&Ray::new(Vec3::Z, Vec3::NEG_Z)).is_none());
    }

    #[test]
    fn test_miss_every_node() {
        let scene = TestScene::triangles(&[(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)]);
        let accessor = scene.accessor();
        let traverser = BvhTraverser::new(&accessor);
        assert!(traverser.closest_hit(&Ray::new(Vec3::new(5.0, 5.0, 1.0), Vec3::NEG_Z)).is_none());
        assert!(traverser.closest_hit(&Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::ZERO)).is_none());
    }

    #[test]
    fn test_hit_interpolates_attributes() {
        let scene = TestScene::triangles(&[(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)]);
        let accessor = scene.accessor();
        let traverser = BvhTraverser::new(&accessor);
        let hit = traverser
            .closest_hit(&Ray::new(Vec3::new(0.25, 0.5, 3.0), Vec3::NEG_Z))
            .expect("ray crosses the triangle");
        assert_relative_eq!(hit.distance, 3.0, epsilon = 1e-5);
        assert_relative_eq!(hit.texcoord.x, 0.25, epsilon = 1e-5);
        assert_relative_eq!(hit.texcoord.y, 0.5, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.z, 1.0, epsilon = 1e-5);
        assert_eq!(hit.triangle, TriangleRef::new(0, 0));
    }

    #[test]
    fn test_closest_of_two_overlapping_triangles() {
        let scene = TestScene::triangles(&[
            (Vec3::new(0.0, 0.0, -2.0), Quat::IDENTITY, Vec3::ONE),
            (Vec3::new(0.0, 0.0, -1.0), Quat::IDENTITY, Vec3::ONE),
        ]);
        let accessor = scene.accessor();
        let traverser = BvhTraverser::new(&accessor);
        let hit = traverser
            .closest_hit(&Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z))
            .expect("ray crosses both triangles");
        assert_relative_eq!(hit.distance, 2.0, epsilon = 1e-5);
        assert_eq!(hit.triangle.mesh, 1);
        assert_eq!(hit.material_id, 1);
    }

    #[test]
    fn test_ties_go_to_lowest_node() {
        let scene = TestScene::triangles(&[
            (Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
            (Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
        ]);
        let accessor = scene.accessor();
        let traverser = BvhTraverser::new(&accessor);
        let hit = traverser
            .closest_hit(&Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z))
            .expect("ray crosses the triangles");
        assert_eq!(hit.triangle.mesh, 0);
    }

    #[test]
    fn test_translation_invariance() {
        let offset = Vec3::new(3.0, -1.5, 2.0);
        let ray = Ray::new(Vec3::new(3.2, -1.3, 6.0), Vec3::new(0.01, 0.02, -1.0));

        let moved = TestScene::triangles(&[(offset, Quat::IDENTITY, Vec3::ONE)]);
        let moved_accessor = moved.accessor();
        let moved_hit = BvhTraverser::new(&moved_accessor).closest_hit(&ray).expect("hits translated instance");

        let origin = TestScene::triangles(&[(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)]);
        let origin_accessor = origin.accessor();
        let shifted = Ray::new(ray.origin - offset, ray.direction);
        let origin_hit = BvhTraverser::new(&origin_accessor).closest_hit(&shifted).expect("hits shifted ray");

        assert_relative_eq!(moved_hit.distance, origin_hit.distance, epsilon = 1e-4);
    }

    #[test]
    fn test_rotated_and_scaled_instance() {
        // rotated a quarter turn about Y the triangle faces +X, scaled by 2
        let scene = TestScene::triangles(&[(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2), Vec3::splat(2.0))]);
        let accessor = scene.accessor();
        let traverser = BvhTraverser::new(&accessor);
        let hit = traverser
            .closest_hit(&Ray::new(Vec3::new(4.0, 0.5, -0.5), Vec3::NEG_X))
            .expect("ray crosses the rotated triangle");
        assert_relative_eq!(hit.distance, 4.0, epsilon = 1e-4);
        assert_relative_eq!(hit.normal.x, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_occluded_skips_excluded_triangle() {
        let scene = TestScene::triangles(&[(Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)]);
        let accessor = scene.accessor();
        let traverser = BvhTraverser::new(&accessor);
        let ray = Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z);

        assert!(traverser.occluded(&ray, 10.0, TriangleRef::new(5, 5)));
        assert!(!traverser.occluded(&ray, 10.0, TriangleRef::new(0, 0)));
        assert!(!traverser.occluded(&ray, 0.5, TriangleRef::new(5, 5)));
    }
}
