use std::f32::consts::PI;

use glam::Vec3;

/// GGX normal distribution with alpha = roughness^2
pub fn distribution(n: Vec3, h: Vec3, roughness: f32) -> f32 {
    let alpha = roughness * roughness;
    let alpha2 = alpha * alpha;
    let n_dot_h = n.dot(h).max(0.0);
    let d = n_dot_h * n_dot_h * (alpha2 - 1.0) + 1.0;
    alpha2 / (PI * d * d).max(1e-7)
}

fn geometry_schlick(x: f32, k: f32) -> f32 {
    x / (x * (1.0 - k) + k).max(1e-7)
}

/// Smith shadow-masking term using the Schlick-GGX approximation
pub fn geometry(n: Vec3, v: Vec3, l: Vec3, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    geometry_schlick(n.dot(v).max(0.0), k) * geometry_schlick(n.dot(l).max(0.0), k)
}

/// Schlick's Fresnel approximation
pub fn fresnel(f0: f32, n: Vec3, l: Vec3) -> f32 {
    let m = 1.0 - n.dot(l).clamp(0.0, 1.0);
    let m2 = m * m;
    f0 + (1.0 - f0) * m2 * m2 * m
}

/// Share of the incoming light left for the diffuse lobe
pub fn diffuse_energy_ratio(f0: f32, n: Vec3, l: Vec3) -> f32 {
    1.0 - fresnel(f0, n, l)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fresnel_limits() {
        assert_relative_eq!(fresnel(0.04, Vec3::Y, Vec3::Y), 0.04);
        assert_relative_eq!(fresnel(0.04, Vec3::Y, Vec3::X), 1.0);
        assert_relative_eq!(diffuse_energy_ratio(0.0, Vec3::Y, Vec3::Y), 1.0);
    }

    #[test]
    fn test_distribution_normalized_for_rough_surface() {
        // alpha = 1 makes GGX uniform: 1 / pi
        assert_relative_eq!(distribution(Vec3::Y, Vec3::Y, 1.0), 1.0 / PI, epsilon = 1e-6);
        let smooth_peak = distribution(Vec3::Y, Vec3::Y, 0.1);
        assert!(smooth_peak > distribution(Vec3::Y, Vec3::Y, 0.5));
    }

    #[test]
    fn test_geometry_in_unit_range() {
        let l = Vec3::new(0.3, 0.8, 0.0).normalize();
        let g = geometry(Vec3::Y, Vec3::Y, l, 0.6);
        assert!(g > 0.0 && g <= 1.0);
        assert_eq!(geometry(Vec3::Y, Vec3::NEG_Y, l, 0.6), 0.0);
    }
}
