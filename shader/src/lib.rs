//! The ray tracing program: WGSL modules composed per option variant, and a
//! Rust mirror of the same kernel for the software device.

pub mod brdf;
pub mod bvh;
pub mod intersection;
pub mod lighting;
pub mod material;
pub mod program;
pub mod ray;
pub mod scene_access;
pub mod transform;
pub mod triangle_access;

use glam::{UVec2, Vec3, Vec4};
use meshtracer_shared::{DisplayMode, FrameUniforms, RaytracerConfig, RenderOptions};

pub use bvh::BvhTraverser;
pub use intersection::Hit;
pub use lighting::LightingCalculator;
pub use material::MaterialEvaluator;
pub use program::{ProgramComposer, ProgramError, ProgramModule, ProgramSources, ENTRY_POINT};
pub use ray::Ray;
pub use scene_access::{SceneAccessor, TextureLayers};
pub use triangle_access::TriangleRef;

/// One specialized kernel: pixel coordinate to RGBA color
pub type KernelFn = fn(UVec2, &FrameUniforms, &SceneAccessor<'_>) -> Vec4;

/// Trace one pixel; `DISPLAY` is a `DisplayMode` discriminant
pub fn trace_pixel<const DISPLAY: u32, const SHADOWS: bool>(
    pixel: UVec2,
    uniforms: &FrameUniforms,
    scene: &SceneAccessor<'_>,
) -> Vec4 {
    let ray = Ray::from_screen_coordinates(pixel, uniforms);
    let color = match BvhTraverser::new(scene).closest_hit(&ray) {
        Some(hit) => display::<DISPLAY, SHADOWS>(&ray, &hit, scene),
        None => Vec3::from_array(RaytracerConfig::BACKGROUND),
    };
    color.extend(1.0)
}

/// Color of a hit for a display mode
pub fn display<const DISPLAY: u32, const SHADOWS: bool>(ray: &Ray, hit: &Hit, scene: &SceneAccessor<'_>) -> Vec3 {
    match DisplayMode::from_u32(DISPLAY) {
        DisplayMode::Shaded => LightingCalculator::new(scene).gather_light(ray, hit, SHADOWS),
        DisplayMode::Unlit => MaterialEvaluator::new(scene.material(hit.material_id), scene.textures).diffuse(hit.texcoord),
        DisplayMode::Normals => hit.normal * 0.5 + Vec3::splat(0.5),
        DisplayMode::Texcoords => hit.texcoord.extend(0.0),
        DisplayMode::Depth => Vec3::splat(1.0 - (hit.distance / RaytracerConfig::DEPTH_FAR).clamp(0.0, 1.0)),
    }
}

/// Pick the kernel compiled for an option variant
pub fn select_kernel(options: RenderOptions) -> KernelFn {
    const SHADED: u32 = DisplayMode::Shaded as u32;
    const UNLIT: u32 = DisplayMode::Unlit as u32;
    const NORMALS: u32 = DisplayMode::Normals as u32;
    const TEXCOORDS: u32 = DisplayMode::Texcoords as u32;
    const DEPTH: u32 = DisplayMode::Depth as u32;

    let kernel: KernelFn = match (options.display, options.shadows) {
        (DisplayMode::Shaded, true) => trace_pixel::<SHADED, true>,
        (DisplayMode::Shaded, false) => trace_pixel::<SHADED, false>,
        (DisplayMode::Unlit, true) => trace_pixel::<UNLIT, true>,
        (DisplayMode::Unlit, false) => trace_pixel::<UNLIT, false>,
        (DisplayMode::Normals, true) => trace_pixel::<NORMALS, true>,
        (DisplayMode::Normals, false) => trace_pixel::<NORMALS, false>,
        (DisplayMode::Texcoords, true) => trace_pixel::<TEXCOORDS, true>,
        (DisplayMode::Texcoords, false) => trace_pixel::<TEXCOORDS, false>,
        (DisplayMode::Depth, true) => trace_pixel::<DEPTH, true>,
        (DisplayMode::Depth, false) => trace_pixel::<DEPTH, false>,
    };
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Quat, Vec3};
    use meshtracer_shared::{
        Aabb, BvhNode, Camera, Light, Material, MeshInstance, TriangleIndices, Vertex, VertexAttributes,
    };

    /// Floor quad at y = 0 spanning [-1, 1] in x and z, an optional blocker
    /// triangle at y = 1 over its +x half, and a light above.
    struct Fixture {
        vertices: Vec<Vertex>,
        attributes: Vec<VertexAttributes>,
        indices: Vec<TriangleIndices>,
        meshes: Vec<MeshInstance>,
        bvh: Vec<BvhNode>,
        lights: Vec<Light>,
        materials: Vec<Material>,
        uniforms: FrameUniforms,
    }

    impl Fixture {
        fn new(with_blocker: bool) -> Self {
            let corners = [
                Vec3::new(-1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, -1.0),
                Vec3::new(1.0, 0.0, 1.0),
                Vec3::new(-1.0, 0.0, 1.0),
            ];
            let mut vertices: Vec<Vertex> = corners.iter().map(|c| Vertex::new(*c)).collect();
            let mut attributes: Vec<VertexAttributes> = corners
                .iter()
                .map(|c| VertexAttributes::new(Vec3::Y, [(c.x + 1.0) * 0.5, (c.z + 1.0) * 0.5]))
                .collect();
            let mut indices = vec![TriangleIndices::new([0, 2, 1]), TriangleIndices::new([0, 3, 2])];
            let floor_bounds = Aabb::from_points(corners);
            let mut meshes = vec![MeshInstance::new(Quat::IDENTITY, Vec3::ZERO, Vec3::ONE, 0, 2, 0, 0)];
            let mut bvh = vec![BvhNode::new(floor_bounds, &meshes[0], 0)];

            if with_blocker {
                let blocker = [Vec3::new(0.0, 0.0, -2.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0)];
                vertices.extend(blocker.iter().map(|c| Vertex::new(*c)));
                attributes.extend(blocker.iter().map(|_| VertexAttributes::new(Vec3::NEG_Y, [0.0, 0.0])));
                indices.push(TriangleIndices::new([0, 1, 2]));
                meshes.push(MeshInstance::new(Quat::IDENTITY, Vec3::new(0.0, 1.0, 0.0), Vec3::ONE, 0, 1, 4, 2));
                bvh.push(BvhNode::new(Aabb::from_points(blocker), &meshes[1], 1));
            }

            let camera = Camera::new(Vec3::new(0.2, 3.0, -0.1), Vec3::NEG_Y, Vec3::NEG_Z, 60.0);
            let uniforms = FrameUniforms {
                camera,
                resolution: [9, 9],
                num_lights: 1,
                num_meshes: meshes.len() as u32,
                num_bvh_nodes: bvh.len() as u32,
                num_materials: 1,
                _padding: [0; 2],
            };

            Self {
                vertices,
                attributes,
                indices,
                meshes,
                bvh,
                lights: vec![Light::new(Vec3::ONE, Vec3::new(0.0, 5.0, 0.0), 0.0)],
                materials: vec![Material::with_color(Vec3::new(0.8, 0.6, 0.4), 0.0, 1.0)],
                uniforms,
            }
        }

        fn accessor(&self) -> SceneAccessor<'_> {
            SceneAccessor {
                lights: &self.lights,
                vertices: &self.vertices,
                attributes: &self.attributes,
                indices: &self.indices,
                meshes: &self.meshes,
                bvh: &self.bvh,
                materials: &self.materials,
                textures: TextureLayers::empty(),
            }
        }
    }

    #[test]
    fn test_center_pixel_unlit_is_raw_diffuse() {
        let fixture = Fixture::new(false);
        let kernel = select_kernel(RenderOptions::new(DisplayMode::Unlit, true));
        let color = kernel(UVec2::new(4, 4), &fixture.uniforms, &fixture.accessor());
        assert_relative_eq!(color.x, 0.8, epsilon = 1e-6);
        assert_relative_eq!(color.y, 0.6, epsilon = 1e-6);
        assert_relative_eq!(color.z, 0.4, epsilon = 1e-6);
        assert_eq!(color.w, 1.0);
    }

    #[test]
    fn test_center_pixel_shaded_is_lit() {
        let fixture = Fixture::new(false);
        let kernel = select_kernel(RenderOptions::new(DisplayMode::Shaded, true));
        let color = kernel(UVec2::new(4, 4), &fixture.uniforms, &fixture.accessor());
        // light straight above, rough and zero f0: the Lambertian value
        assert_relative_eq!(color.x, 0.8, epsilon = 1e-2);
        assert_relative_eq!(color.y, 0.6, epsilon = 1e-2);
    }

    #[test]
    fn test_corner_pixel_is_background() {
        let fixture = Fixture::new(false);
        for options in RenderOptions::variants() {
            let color = select_kernel(options)(UVec2::new(0, 0), &fixture.uniforms, &fixture.accessor());
            assert_eq!(color, Vec4::new(0.0, 0.0, 0.0, 1.0), "{options:?}");
        }
    }

    #[test]
    fn test_shadow_toggle() {
        let fixture = Fixture::new(true);
        // camera between the floor and the blocker, looking at the shadowed floor
        let mut uniforms = fixture.uniforms;
        uniforms.camera = Camera::new(Vec3::new(0.5, 0.5, 0.0), Vec3::NEG_Y, Vec3::NEG_Z, 60.0);
        let accessor = fixture.accessor();

        let lit = select_kernel(RenderOptions::new(DisplayMode::Shaded, false))(UVec2::new(4, 4), &uniforms, &accessor);
        let shadowed = select_kernel(RenderOptions::new(DisplayMode::Shaded, true))(UVec2::new(4, 4), &uniforms, &accessor);
        assert!(lit.x > 0.5);
        assert_eq!(shadowed.truncate(), Vec3::ZERO);
    }

    #[test]
    fn test_debug_display_modes() {
        let fixture = Fixture::new(false);
        let accessor = fixture.accessor();
        let pixel = UVec2::new(4, 4);

        let normals = select_kernel(RenderOptions::new(DisplayMode::Normals, false))(pixel, &fixture.uniforms, &accessor);
        assert_relative_eq!(normals.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(normals.x, 0.5, epsilon = 1e-5);

        let texcoords = select_kernel(RenderOptions::new(DisplayMode::Texcoords, false))(pixel, &fixture.uniforms, &accessor);
        assert_relative_eq!(texcoords.x, 0.6, epsilon = 1e-3);
        assert_relative_eq!(texcoords.y, 0.45, epsilon = 1e-3);
        assert_eq!(texcoords.z, 0.0);

        let depth = select_kernel(RenderOptions::new(DisplayMode::Depth, false))(pixel, &fixture.uniforms, &accessor);
        assert_relative_eq!(depth.x, 1.0 - 3.0 / RaytracerConfig::DEPTH_FAR, epsilon = 1e-4);
    }
}
