use glam::{Vec2, Vec3};
use meshtracer_shared::RaytracerConfig;

use crate::ray::Ray;
use crate::triangle_access::TriangleRef;

/// Closest intersection along a ray
#[derive(Clone, Copy, Debug)]
pub struct Hit {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3, // unit length, facing the incoming ray
    pub texcoord: Vec2,
    pub material_id: u32,
    pub triangle: TriangleRef,
}

/// Parametric hit on a triangle: distance and barycentric (u, v)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleSample {
    pub distance: f32,
    pub u: f32,
    pub v: f32,
}

impl TriangleSample {
    /// Weights of the three vertices
    pub fn weights(&self) -> Vec3 {
        Vec3::new(1.0 - self.u - self.v, self.u, self.v)
    }
}

/// Test ray-triangle intersection using Möller-Trumbore algorithm
pub fn test_triangle_intersection(ray: &Ray, a: Vec3, b: Vec3, c: Vec3) -> Option<TriangleSample> {
    let edge1 = b - a;
    let edge2 = c - a;
    let h = ray.direction.cross(edge2);
    let det = edge1.dot(h);

    if det.abs() < RaytracerConfig::DEGENERATE_EPSILON {
        return None;
    }

    let f = 1.0 / det;
    let s = ray.origin - a;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    if t > RaytracerConfig::MIN_RAY_DISTANCE {
        Some(TriangleSample { distance: t, u, v })
    } else {
        None
    }
}

/// Slab test: does the ray overlap the box anywhere in [0, max_t]
pub fn ray_aabb_intersect(ray_origin: Vec3, ray_dir: Vec3, aabb_min: Vec3, aabb_max: Vec3, max_t: f32) -> bool {
    let inv_dir = ray_dir.recip();

    let t1 = (aabb_min - ray_origin) * inv_dir;
    let t2 = (aabb_max - ray_origin) * inv_dir;

    let tmin = t1.min(t2);
    let tmax = t1.max(t2);

    let entry = tmin.max_element();
    let exit = tmax.min_element();

    exit >= entry.max(0.0) && entry <= max_t
}
