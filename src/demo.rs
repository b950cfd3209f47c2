use std::f32::consts::{FRAC_1_PI, FRAC_PI_2, PI};

use glam::{Quat, Vec3};
use image::{Rgba, RgbaImage};
use meshtracer_shared::{FilterMode, WrapMode};

use crate::geometry::MeshData;
use crate::scene::{
    Animation, CameraDesc, DiffuseDesc, InMemoryAssets, LightDesc, MaterialDesc, MeshDesc, SceneDescription,
};

const ROOM_HALF: f32 = 40.0;
const ROOM_BACK: f32 = -120.0;
const ROOM_FRONT: f32 = -40.0;

/// Reflectance at normal incidence for an index of refraction against air
fn fresnel0_from_ior(ior: f32) -> f32 {
    ((1.0 - ior) / (1.0 + ior)).powi(2)
}

fn checker_texture() -> RgbaImage {
    RgbaImage::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            Rgba([230, 230, 230, 255])
        } else {
            Rgba([60, 60, 70, 255])
        }
    })
}

fn color_material(albedo: [f32; 3], roughness: f32) -> MaterialDesc {
    MaterialDesc {
        diffuse: DiffuseDesc::Color(albedo.map(|c| c * FRAC_1_PI)),
        fresnel0: fresnel0_from_ior(1.5),
        roughness,
        ..MaterialDesc::default()
    }
}

fn wall(material: u32, position: Vec3, rotation: Quat, span: f32) -> MeshDesc {
    MeshDesc {
        mesh: "quad".to_string(),
        material,
        position: position.to_array(),
        scale: [span, 1.0, span],
        orientation: rotation.to_array(),
        animation: None,
    }
}

/// Closed box lit by one moving light, with a static and a spinning block
pub fn cornell_box() -> (SceneDescription, InMemoryAssets) {
    let depth = ROOM_FRONT - ROOM_BACK;
    let center_z = (ROOM_FRONT + ROOM_BACK) * 0.5;
    let span = ROOM_HALF * 2.0;

    let materials = vec![
        color_material([0.9, 0.9, 0.9], 0.8),  // white
        color_material([0.8, 0.15, 0.1], 0.8), // red
        color_material([0.1, 0.7, 0.2], 0.8),  // green
        MaterialDesc {
            diffuse: DiffuseDesc::Texture("checker".to_string()),
            fresnel0: fresnel0_from_ior(1.5),
            roughness: 0.6,
            wrap: WrapMode::Repeat,
            filter: FilterMode::Bilinear,
        },
        color_material([0.9, 0.75, 0.3], 0.25), // polished block
    ];

    let mut meshes = vec![
        wall(3, Vec3::new(0.0, -ROOM_HALF, center_z), Quat::IDENTITY, span.max(depth)),
        wall(0, Vec3::new(0.0, ROOM_HALF, center_z), Quat::from_rotation_x(PI), span.max(depth)),
        wall(1, Vec3::new(-ROOM_HALF, 0.0, center_z), Quat::from_rotation_z(-FRAC_PI_2), span.max(depth)),
        wall(2, Vec3::new(ROOM_HALF, 0.0, center_z), Quat::from_rotation_z(FRAC_PI_2), span.max(depth)),
        wall(0, Vec3::new(0.0, 0.0, ROOM_BACK), Quat::from_rotation_x(FRAC_PI_2), span),
    ];
    meshes.push(MeshDesc {
        mesh: "cube".to_string(),
        material: 0,
        position: [-15.0, -ROOM_HALF + 15.0, -95.0],
        scale: [20.0, 30.0, 20.0],
        orientation: Quat::from_rotation_y(0.3).to_array(),
        animation: None,
    });
    meshes.push(MeshDesc {
        mesh: "cube".to_string(),
        material: 4,
        position: [14.0, -ROOM_HALF + 8.0, -70.0],
        scale: [16.0; 3],
        orientation: Quat::IDENTITY.to_array(),
        animation: Some(Animation::Spin {
            axis: [0.0, 1.0, 0.0],
            speed: 0.5,
        }),
    });

    let description = SceneDescription {
        camera: CameraDesc {
            position: [0.0, 0.0, 30.0],
            direction: [0.0, 0.0, -1.0],
            up: [0.0, 1.0, 0.0],
            fov: 60.0,
        },
        lights: vec![LightDesc {
            color: [PI; 3],
            location: [0.0, ROOM_HALF - 10.0, -70.0],
            radius: 120.0,
            animation: Some(Animation::Oscillate {
                amplitude: [0.0, 0.0, 20.0],
                frequency: 0.1,
                phase: 0.0,
            }),
        }],
        materials,
        meshes,
    };

    let assets = InMemoryAssets::new()
        .with_mesh("quad", MeshData::quad())
        .with_mesh("cube", MeshData::cube())
        .with_texture("checker", checker_texture());

    (description, assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{DirtyFlags, Scene};

    #[test]
    fn test_demo_scene_loads() {
        let (description, mut assets) = cornell_box();
        let scene = Scene::load(&description, &mut assets).expect("demo scene loads");
        assert_eq!(scene.instances().len(), 7);
        assert_eq!(scene.bvh().len(), 7);
        assert_eq!(scene.geometry().mesh_count(), 2);
        assert_eq!(scene.textures().layer_count(), 1);
    }

    #[test]
    fn test_demo_animation_touches_lights_and_instances() {
        let (description, mut assets) = cornell_box();
        let mut scene = Scene::load(&description, &mut assets).expect("demo scene loads");
        let before = scene.instances()[6].orientation;
        let fixed = scene.instances()[5].orientation;

        scene.update(1.0);
        assert_eq!(
            scene.dirty(),
            DirtyFlags {
                lights: true,
                instances: true
            }
        );
        assert_ne!(scene.instances()[6].orientation, before);
        assert_eq!(scene.instances()[5].orientation, fixed);
    }

    #[test]
    fn test_glass_reflectance() {
        assert!((fresnel0_from_ior(1.5) - 0.04).abs() < 1e-6);
    }
}
