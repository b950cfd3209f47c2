use glam::{Vec2, Vec3};
use meshtracer_shared::{FilterMode, Material, WrapMode};

use crate::scene_access::TextureLayers;

/// Resolves a material's diffuse color, sampling its texture layer when it has one
pub struct MaterialEvaluator<'a> {
    material: Material,
    textures: TextureLayers<'a>,
}

impl<'a> MaterialEvaluator<'a> {
    pub fn new(material: Material, textures: TextureLayers<'a>) -> Self {
        Self { material, textures }
    }

    pub fn roughness(&self) -> f32 {
        self.material.roughness
    }

    pub fn fresnel0(&self) -> f32 {
        self.material.fresnel_zero
    }

    /// Diffuse color at a texture coordinate
    pub fn diffuse(&self, texcoord: Vec2) -> Vec3 {
        let layer = self.material.diffuse;
        if !self.material.is_textured() || layer >= self.textures.layers || self.textures.size == 0 {
            return Vec3::from_array(self.material.color);
        }

        let wrap = WrapMode::from_u32(self.material.wrap);
        let size = self.textures.size as i32;
        let uv = wrap_texcoord(texcoord, wrap);
        match FilterMode::from_u32(self.material.filter) {
            FilterMode::Nearest => {
                let x = ((uv.x * size as f32) as i32).min(size - 1);
                let y = ((uv.y * size as f32) as i32).min(size - 1);
                self.textures.texel(layer, x as u32, y as u32)
            }
            FilterMode::Bilinear => {
                let position = uv * size as f32 - Vec2::splat(0.5);
                let base = position.floor();
                let f = position - base;
                let (x, y) = (base.x as i32, base.y as i32);
                let fetch = |dx: i32, dy: i32| {
                    let tx = wrap_texel(x + dx, size, wrap);
                    let ty = wrap_texel(y + dy, size, wrap);
                    self.textures.texel(layer, tx, ty)
                };
                let top = fetch(0, 0).lerp(fetch(1, 0), f.x);
                let bottom = fetch(0, 1).lerp(fetch(1, 1), f.x);
                top.lerp(bottom, f.y)
            }
        }
    }
}

fn wrap_texcoord(uv: Vec2, wrap: WrapMode) -> Vec2 {
    match wrap {
        WrapMode::Repeat => uv - uv.floor(),
        WrapMode::Clamp => uv.clamp(Vec2::ZERO, Vec2::ONE),
    }
}

fn wrap_texel(coord: i32, size: i32, wrap: WrapMode) -> u32 {
    match wrap {
        WrapMode::Repeat => coord.rem_euclid(size) as u32,
        WrapMode::Clamp => coord.clamp(0, size - 1) as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// 2x2 texture: red, green / blue, white
    const CHECKER: [u8; 16] = [
        255, 0, 0, 255, 0, 255, 0, 255, //
        0, 0, 255, 255, 255, 255, 255, 255,
    ];

    fn checker() -> TextureLayers<'static> {
        TextureLayers {
            data: &CHECKER,
            size: 2,
            layers: 1,
        }
    }

    #[test]
    fn test_color_material_ignores_textures() {
        let material = Material::with_color(Vec3::new(0.1, 0.2, 0.3), 0.04, 0.5);
        let evaluator = MaterialEvaluator::new(material, checker());
        assert_eq!(evaluator.diffuse(Vec2::new(0.3, 0.7)), Vec3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_nearest_sampling() {
        let material = Material::with_texture(0, 0.04, 0.5, WrapMode::Clamp, FilterMode::Nearest);
        let evaluator = MaterialEvaluator::new(material, checker());
        assert_eq!(evaluator.diffuse(Vec2::new(0.1, 0.1)), Vec3::X);
        assert_eq!(evaluator.diffuse(Vec2::new(0.9, 0.1)), Vec3::Y);
        assert_eq!(evaluator.diffuse(Vec2::new(0.1, 0.9)), Vec3::Z);
        // clamped beyond the edge
        assert_eq!(evaluator.diffuse(Vec2::new(1.5, 1.5)), Vec3::ONE);
    }

    #[test]
    fn test_repeat_wraps_coordinates() {
        let material = Material::with_texture(0, 0.04, 0.5, WrapMode::Repeat, FilterMode::Nearest);
        let evaluator = MaterialEvaluator::new(material, checker());
        assert_eq!(evaluator.diffuse(Vec2::new(1.1, 2.1)), Vec3::X);
        assert_eq!(evaluator.diffuse(Vec2::new(-0.1, 0.1)), Vec3::Y);
    }

    #[test]
    fn test_bilinear_blends_neighbours() {
        let material = Material::with_texture(0, 0.04, 0.5, WrapMode::Clamp, FilterMode::Bilinear);
        let evaluator = MaterialEvaluator::new(material, checker());
        let center = evaluator.diffuse(Vec2::splat(0.5));
        assert_relative_eq!(center.x, 0.5, epsilon = 1e-5);
        assert_relative_eq!(center.y, 0.5, epsilon = 1e-5);
        assert_relative_eq!(center.z, 0.5, epsilon = 1e-5);
        // texel centers reproduce the texel
        assert_eq!(evaluator.diffuse(Vec2::splat(0.25)), Vec3::X);
    }

    #[test]
    fn test_missing_layer_falls_back_to_color() {
        let material = Material::with_texture(3, 0.04, 0.5, WrapMode::Clamp, FilterMode::Nearest);
        let evaluator = MaterialEvaluator::new(material, checker());
        assert_eq!(evaluator.diffuse(Vec2::ZERO), Vec3::ONE);
    }
}
