use bytemuck::{Pod, Zeroable};
use log::debug;
use meshtracer_shared::{FrameUniforms, RaytracerConfig};
use wgpu::util::DeviceExt;

use crate::error::TracerError;
use crate::scene::{DirtyFlags, Scene};
use crate::texture::TextureArray;

/// Device-resident scene buffers, one per kernel binding
pub struct BufferManager {
    pub uniforms_buffer: wgpu::Buffer,
    pub lights_buffer: wgpu::Buffer,
    pub vertices_buffer: wgpu::Buffer,
    pub attributes_buffer: wgpu::Buffer,
    pub indices_buffer: wgpu::Buffer,
    pub meshes_buffer: wgpu::Buffer,
    pub bvh_buffer: wgpu::Buffer,
    pub materials_buffer: wgpu::Buffer,
    pub diffuse_maps: wgpu::Texture,
    pub diffuse_maps_view: wgpu::TextureView,
    light_count: usize,
    instance_count: usize,
}

impl BufferManager {
    /// Create and fill every buffer from a loaded scene
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, scene: &Scene) -> Self {
        let geometry = scene.geometry();

        let uniforms_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms Buffer"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let (diffuse_maps, diffuse_maps_view) = Self::create_diffuse_maps(device, queue, scene.textures());

        let buffers = Self {
            uniforms_buffer,
            lights_buffer: Self::storage_buffer(device, "Lights Buffer", scene.lights()),
            vertices_buffer: Self::storage_buffer(device, "Vertices Buffer", geometry.vertices()),
            attributes_buffer: Self::storage_buffer(device, "Vertex Attributes Buffer", geometry.attributes()),
            indices_buffer: Self::storage_buffer(device, "Indices Buffer", geometry.indices()),
            meshes_buffer: Self::storage_buffer(device, "Mesh Instances Buffer", scene.instances()),
            bvh_buffer: Self::storage_buffer(device, "BVH Buffer", scene.bvh()),
            materials_buffer: Self::storage_buffer(device, "Materials Buffer", scene.materials()),
            diffuse_maps,
            diffuse_maps_view,
            light_count: scene.lights().len(),
            instance_count: scene.instances().len(),
        };

        debug!(
            "Created scene buffers: {} vertices, {} triangles, {} instances, {} texture layers",
            geometry.vertices().len(),
            geometry.triangle_count(),
            scene.instances().len(),
            scene.textures().layer_count()
        );
        buffers
    }

    /// Storage buffer holding `data`; WGSL runtime arrays need at least one element
    fn storage_buffer<T: Pod + Zeroable>(device: &wgpu::Device, label: &str, data: &[T]) -> wgpu::Buffer {
        let placeholder = [T::zeroed()];
        let contents: &[T] = if data.is_empty() { &placeholder } else { data };
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(contents),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        })
    }

    fn create_diffuse_maps(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        textures: &TextureArray,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        // an empty array still binds a single black texel
        let (side, layers) = if textures.is_empty() {
            (1, 1)
        } else {
            (TextureArray::SIZE, textures.layer_count())
        };
        let size = wgpu::Extent3d {
            width: side,
            height: side,
            depth_or_array_layers: layers,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Diffuse Maps"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        if !textures.is_empty() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                textures.as_bytes(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(side * RaytracerConfig::TEXTURE_BYTES_PER_PIXEL),
                    rows_per_image: Some(side),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Diffuse Maps View"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        (texture, view)
    }

    /// Rewrite the buffers flagged dirty. Element counts must match the uploaded scene.
    pub fn update_dynamic(&self, queue: &wgpu::Queue, scene: &Scene, dirty: DirtyFlags) -> Result<(), TracerError> {
        if scene.lights().len() != self.light_count || scene.instances().len() != self.instance_count {
            return Err(TracerError::InvalidScene(format!(
                "dynamic upload of {} lights and {} instances into buffers sized for {} and {}",
                scene.lights().len(),
                scene.instances().len(),
                self.light_count,
                self.instance_count
            )));
        }
        if dirty.lights && !scene.lights().is_empty() {
            queue.write_buffer(&self.lights_buffer, 0, bytemuck::cast_slice(scene.lights()));
        }
        if dirty.instances && !scene.instances().is_empty() {
            queue.write_buffer(&self.meshes_buffer, 0, bytemuck::cast_slice(scene.instances()));
            queue.write_buffer(&self.bvh_buffer, 0, bytemuck::cast_slice(scene.bvh()));
        }
        Ok(())
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.uniforms_buffer, 0, bytemuck::bytes_of(uniforms));
    }
}
