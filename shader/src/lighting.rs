use glam::Vec3;
use meshtracer_shared::{Light, RaytracerConfig};

use crate::brdf::{diffuse_energy_ratio, distribution, fresnel, geometry};
use crate::bvh::BvhTraverser;
use crate::intersection::Hit;
use crate::material::MaterialEvaluator;
use crate::ray::Ray;
use crate::scene_access::SceneAccessor;

/// Direct lighting with a microfacet specular lobe and an energy-conserving diffuse lobe
pub struct LightingCalculator<'a> {
    scene: &'a SceneAccessor<'a>,
}

impl<'a> LightingCalculator<'a> {
    pub fn new(scene: &'a SceneAccessor<'a>) -> Self {
        Self { scene }
    }

    /// Sum of every light's contribution at a hit
    pub fn gather_light(&self, ray: &Ray, hit: &Hit, shadows: bool) -> Vec3 {
        let material = MaterialEvaluator::new(self.scene.material(hit.material_id), self.scene.textures);
        let diffuse = material.diffuse(hit.texcoord);
        let view = -ray.direction;
        let traverser = BvhTraverser::new(self.scene);

        let mut color = Vec3::ZERO;
        for light in self.scene.lights {
            color += self.calculate_light_contribution(hit, view, light, diffuse, &material, shadows, &traverser);
        }
        color
    }

    #[allow(clippy::too_many_arguments)]
    fn calculate_light_contribution(
        &self,
        hit: &Hit,
        view: Vec3,
        light: &Light,
        diffuse: Vec3,
        material: &MaterialEvaluator,
        shadows: bool,
        traverser: &BvhTraverser,
    ) -> Vec3 {
        let to_light = Vec3::from_array(light.location) - hit.point;
        let distance = to_light.length();
        if distance <= 0.0 {
            return Vec3::ZERO;
        }
        let light_dir = to_light / distance;
        if hit.normal.dot(light_dir) <= 0.0 {
            return Vec3::ZERO;
        }

        if shadows {
            let shadow_ray = Ray::new(hit.point + hit.normal * RaytracerConfig::RAY_EPSILON, light_dir);
            if traverser.occluded(&shadow_ray, distance, hit.triangle) {
                return Vec3::ZERO;
            }
        }

        let half_vec = (light_dir + view).normalize_or_zero();
        shade(
            hit.normal,
            view,
            light_dir,
            half_vec,
            Vec3::from_array(light.color),
            diffuse,
            material.roughness(),
            material.fresnel0(),
        ) * falloff(distance, light.radius)
    }
}

/// BRDF-weighted radiance from one light, before falloff
#[allow(clippy::too_many_arguments)]
pub fn shade(
    normal: Vec3,
    view: Vec3,
    light_dir: Vec3,
    half_vec: Vec3,
    light_color: Vec3,
    diffuse: Vec3,
    roughness: f32,
    fresnel0: f32,
) -> Vec3 {
    let n_dot_l = normal.dot(light_dir).max(0.0);
    let n_dot_v = normal.dot(view).max(0.0);
    let specular = distribution(normal, half_vec, roughness)
        * geometry(normal, view, light_dir, roughness)
        * fresnel(fresnel0, half_vec, light_dir)
        / (4.0 * n_dot_l * n_dot_v).max(1e-4);
    let kd = diffuse_energy_ratio(fresnel0, normal, light_dir);
    (diffuse * kd + Vec3::splat(specular)) * light_color * n_dot_l
}

/// Windowed falloff: 1 near the light, 0 at `radius`; no falloff for radius <= 0
pub fn falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 1.0;
    }
    let ratio = distance / radius;
    let ratio2 = ratio * ratio;
    let windowed = (1.0 - ratio2 * ratio2).clamp(0.0, 1.0);
    windowed * windowed
}
