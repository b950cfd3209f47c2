use glam::{Quat, Vec3};
use meshtracer_shared::{BvhNode, MeshInstance};

use crate::ray::Ray;

/// Rotation, translation and non-uniform scale of a mesh instance
#[derive(Clone, Copy, Debug)]
pub struct InstanceTransform {
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
}

impl InstanceTransform {
    pub fn new(rotation: Quat, translation: Vec3, scale: Vec3) -> Self {
        Self {
            rotation,
            translation,
            scale,
        }
    }

    pub fn of_instance(instance: &MeshInstance) -> Self {
        Self::new(
            instance.rotation(),
            Vec3::from_array(instance.position),
            Vec3::from_array(instance.scale),
        )
    }

    /// Node placement; the node carries position and scale, the instance its rotation
    pub fn of_node(node: &BvhNode, instance: &MeshInstance) -> Self {
        Self::new(
            instance.rotation(),
            Vec3::from_array(node.position),
            Vec3::from_array(node.scale),
        )
    }

    pub fn point_to_world(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.translation
    }

    /// Inverse-transpose transform of a normal; the result is not normalized
    pub fn normal_to_world(&self, normal: Vec3) -> Vec3 {
        self.rotation * (normal / self.scale)
    }

    /// Ray origin and direction in local space. The direction keeps its
    /// length so a local t equals the world t. None for a collapsed scale.
    pub fn ray_to_local(&self, ray: &Ray) -> Option<(Vec3, Vec3)> {
        if self.scale.cmpeq(Vec3::ZERO).any() {
            return None;
        }
        let inverse_rotation = self.rotation.conjugate();
        let origin = inverse_rotation * (ray.origin - self.translation) / self.scale;
        let direction = inverse_rotation * ray.direction / self.scale;
        Some((origin, direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_local_ray_round_trip() {
        let transform = InstanceTransform::new(
            Quat::from_rotation_y(0.7),
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(2.0, 0.5, 4.0),
        );
        let ray = Ray::new(Vec3::new(0.3, 0.1, -5.0), Vec3::new(0.2, 0.1, 1.0));
        let (origin, direction) = transform.ray_to_local(&ray).expect("non-zero scale");

        let local_point = origin + direction * 2.5;
        let world_point = transform.point_to_world(local_point);
        let expected = ray.at(2.5);
        assert_relative_eq!(world_point.x, expected.x, epsilon = 1e-4);
        assert_relative_eq!(world_point.y, expected.y, epsilon = 1e-4);
        assert_relative_eq!(world_point.z, expected.z, epsilon = 1e-4);
    }

    #[test]
    fn test_zero_scale_has_no_local_space() {
        let transform = InstanceTransform::new(Quat::IDENTITY, Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0));
        assert!(transform.ray_to_local(&Ray::new(Vec3::ZERO, Vec3::Z)).is_none());
    }
}
