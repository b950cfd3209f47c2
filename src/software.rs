use glam::UVec2;
use image::RgbaImage;
use log::{debug, info, trace};
use meshtracer_shader::{select_kernel, KernelFn, ProgramComposer, SceneAccessor, TextureLayers};
use meshtracer_shared::{
    BvhNode, FrameUniforms, Light, Material, MeshInstance, RaytracerConfig, RenderOptions, TriangleIndices, Vertex,
    VertexAttributes,
};
use rayon::prelude::*;

use crate::device::ComputeDevice;
use crate::error::TracerError;
use crate::scene::{DirtyFlags, Scene};

/// Software compute device: validated WGSL variants, traced by the matching Rust kernel on rayon workers
pub struct CpuDevice {
    max_group_size: u32,
}

/// A validated program variant and its specialized kernel
#[derive(Clone, Copy)]
pub struct CpuProgram {
    pub options: RenderOptions,
    kernel: KernelFn,
}

/// Host copies of the scene buffers
#[derive(Clone, Debug, Default)]
pub struct CpuResources {
    lights: Vec<Light>,
    vertices: Vec<Vertex>,
    attributes: Vec<VertexAttributes>,
    indices: Vec<TriangleIndices>,
    meshes: Vec<MeshInstance>,
    bvh: Vec<BvhNode>,
    materials: Vec<Material>,
    texture_data: Vec<u8>,
    texture_layers: u32,
}

#[derive(Clone, Copy)]
pub struct CpuBinding {
    kernel: KernelFn,
}

impl CpuDevice {
    pub fn new() -> Self {
        Self::with_max_group_size(RaytracerConfig::CPU_MAX_GROUP_SIZE)
    }

    pub fn with_max_group_size(max_group_size: u32) -> Self {
        Self {
            max_group_size: max_group_size.max(1),
        }
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuResources {
    fn accessor(&self) -> SceneAccessor<'_> {
        SceneAccessor {
            lights: &self.lights,
            vertices: &self.vertices,
            attributes: &self.attributes,
            indices: &self.indices,
            meshes: &self.meshes,
            bvh: &self.bvh,
            materials: &self.materials,
            textures: if self.texture_layers == 0 {
                TextureLayers::empty()
            } else {
                TextureLayers {
                    data: &self.texture_data,
                    size: RaytracerConfig::TEXTURE_SIZE,
                    layers: self.texture_layers,
                }
            },
        }
    }
}

impl ComputeDevice for CpuDevice {
    type Program = CpuProgram;
    type Resources = CpuResources;
    type Binding = CpuBinding;
    type Target = RgbaImage;

    fn name(&self) -> &str {
        "cpu"
    }

    fn max_group_size(&self) -> u32 {
        self.max_group_size
    }

    fn build_program(
        &mut self,
        composer: &mut ProgramComposer,
        options: RenderOptions,
        group_side: u32,
    ) -> Result<CpuProgram, TracerError> {
        // the composed module is only validated; tracing runs the Rust kernel
        composer
            .compose(options, group_side)
            .map_err(|err| TracerError::build(options, err))?;
        Ok(CpuProgram {
            options,
            kernel: select_kernel(options),
        })
    }

    fn upload_scene(&mut self, scene: &Scene) -> Result<CpuResources, TracerError> {
        let geometry = scene.geometry();
        let resources = CpuResources {
            lights: scene.lights().to_vec(),
            vertices: geometry.vertices().to_vec(),
            attributes: geometry.attributes().to_vec(),
            indices: geometry.indices().to_vec(),
            meshes: scene.instances().to_vec(),
            bvh: scene.bvh().to_vec(),
            materials: scene.materials().to_vec(),
            texture_data: scene.textures().as_bytes().to_vec(),
            texture_layers: scene.textures().layer_count(),
        };
        info!(
            "Uploaded scene to {}: {} triangles, {} nodes",
            self.name(),
            resources.indices.len(),
            resources.bvh.len()
        );
        Ok(resources)
    }

    fn upload_dynamic(
        &mut self,
        resources: &mut CpuResources,
        scene: &Scene,
        dirty: DirtyFlags,
    ) -> Result<(), TracerError> {
        if resources.lights.len() != scene.lights().len()
            || resources.meshes.len() != scene.instances().len()
            || resources.bvh.len() != scene.bvh().len()
        {
            return Err(TracerError::InvalidScene(format!(
                "dynamic upload of {} lights and {} instances into buffers sized for {} and {}",
                scene.lights().len(),
                scene.instances().len(),
                resources.lights.len(),
                resources.meshes.len()
            )));
        }
        if dirty.lights {
            resources.lights.copy_from_slice(scene.lights());
        }
        if dirty.instances {
            resources.meshes.copy_from_slice(scene.instances());
            resources.bvh.copy_from_slice(scene.bvh());
        }
        debug!("Dynamic upload: {dirty:?}");
        Ok(())
    }

    fn bind(&mut self, program: &CpuProgram, _resources: &CpuResources) -> Result<CpuBinding, TracerError> {
        Ok(CpuBinding {
            kernel: program.kernel,
        })
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<RgbaImage, TracerError> {
        Ok(RgbaImage::new(width, height))
    }

    fn dispatch(
        &mut self,
        _program: &CpuProgram,
        binding: &CpuBinding,
        resources: &CpuResources,
        uniforms: &FrameUniforms,
        target: &mut RgbaImage,
        group_side: u32,
    ) -> Result<(), TracerError> {
        let width = target.width();
        if width == 0 || target.height() == 0 {
            return Ok(());
        }
        let kernel = binding.kernel;
        let scene = resources.accessor();
        let side = group_side.max(1);
        let band_bytes = (width * side) as usize * 4;

        // one row band of tiles per task
        target
            .par_chunks_mut(band_bytes)
            .enumerate()
            .for_each(|(band, pixels)| {
                for (offset, texel) in pixels.chunks_exact_mut(4).enumerate() {
                    let offset = offset as u32;
                    let pixel = UVec2::new(offset % width, band as u32 * side + offset / width);
                    let color = kernel(pixel, uniforms, &scene);
                    let rgba = (color.clamp(glam::Vec4::ZERO, glam::Vec4::ONE) * 255.0).round();
                    texel.copy_from_slice(&[rgba.x as u8, rgba.y as u8, rgba.z as u8, rgba.w as u8]);
                }
            });

        trace!("Traced {}x{} on {} with side {}", width, target.height(), self.name(), side);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TracerError> {
        Ok(())
    }

    fn read_target(&mut self, target: &RgbaImage) -> Result<RgbaImage, TracerError> {
        Ok(target.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MeshData;
    use crate::scene::{CameraDesc, InMemoryAssets, LightDesc, MaterialDesc, MeshDesc, SceneDescription};
    use meshtracer_shared::DisplayMode;

    fn floor_scene() -> Scene {
        let desc = SceneDescription {
            camera: CameraDesc {
                position: [0.1, 3.0, -0.05],
                direction: [0.0, -1.0, 0.0],
                up: [0.0, 0.0, -1.0],
                fov: 60.0,
            },
            lights: vec![LightDesc {
                location: [0.0, 5.0, 0.0],
                ..LightDesc::default()
            }],
            materials: vec![MaterialDesc::default()],
            meshes: vec![MeshDesc {
                mesh: "quad".to_string(),
                material: 0,
                position: [0.0; 3],
                scale: [2.0, 1.0, 2.0],
                orientation: [0.0, 0.0, 0.0, 1.0],
                animation: None,
            }],
        };
        Scene::load(&desc, &mut InMemoryAssets::new().with_mesh("quad", MeshData::quad())).expect("floor scene")
    }

    fn render(device: &mut CpuDevice, scene: &Scene, options: RenderOptions, size: u32) -> RgbaImage {
        let mut composer = ProgramComposer::new().expect("modules register");
        let program = device.build_program(&mut composer, options, 4).expect("variant builds");
        let resources = device.upload_scene(scene).expect("upload");
        let binding = device.bind(&program, &resources).expect("bind");
        let mut target = device.create_target(size, size).expect("target");
        device
            .dispatch(&program, &binding, &resources, &scene.uniforms(size, size), &mut target, 4)
            .expect("dispatch");
        device.finish().expect("finish");
        device.read_target(&target).expect("readback")
    }

    #[test]
    fn test_unlit_center_and_background_corner() {
        let scene = floor_scene();
        let image = render(&mut CpuDevice::new(), &scene, RenderOptions::new(DisplayMode::Unlit, true), 9);

        assert_eq!(image.get_pixel(4, 4).0, [204, 204, 204, 255]);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_partial_bands_cover_every_row() {
        // 10 rows with 4-row bands leaves a 2-row band at the bottom
        let scene = floor_scene();
        let image = render(&mut CpuDevice::new(), &scene, RenderOptions::new(DisplayMode::Depth, false), 10);
        assert_eq!(image.dimensions(), (10, 10));
        assert!(image.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn test_dynamic_upload_copies_only_flagged_buffers() {
        let scene = floor_scene();
        let mut device = CpuDevice::new();
        let mut resources = device.upload_scene(&scene).expect("upload");
        resources.lights[0].color = [9.0; 3];
        resources.meshes[0].position = [9.0; 3];

        device
            .upload_dynamic(
                &mut resources,
                &scene,
                DirtyFlags {
                    lights: true,
                    instances: false,
                },
            )
            .expect("dynamic upload");
        assert_eq!(resources.lights[0].color, scene.lights()[0].color);
        assert_eq!(resources.meshes[0].position, [9.0; 3]);
    }

    #[test]
    fn test_dynamic_upload_rejects_other_scene() {
        let floor = floor_scene();
        let (description, mut assets) = crate::demo::cornell_box();
        let cornell = Scene::load(&description, &mut assets).expect("demo scene");
        let mut device = CpuDevice::new();
        let mut resources = device.upload_scene(&floor).expect("upload");

        let all = DirtyFlags {
            lights: true,
            instances: true,
        };
        assert!(matches!(
            device.upload_dynamic(&mut resources, &cornell, all),
            Err(TracerError::InvalidScene(_))
        ));
        assert_eq!(resources.meshes.len(), 1);
    }
}
