use std::borrow::Cow;

use image::RgbaImage;
use log::{debug, info, trace};
use meshtracer_shader::{ProgramComposer, ENTRY_POINT};
use meshtracer_shared::{FrameUniforms, RenderOptions, TileHelper};

use crate::buffers::BufferManager;
use crate::device::ComputeDevice;
use crate::error::TracerError;
use crate::scene::{DirtyFlags, Scene};

/// wgpu compute device running the composed WGSL program
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_name: String,
    scene_layout: wgpu::BindGroupLayout,
    output_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
}

/// Compute pipeline compiled for one option variant
pub struct GpuProgram {
    pub options: RenderOptions,
    pipeline: wgpu::ComputePipeline,
}

/// Scene bind group (group 0)
pub struct GpuBinding {
    scene_group: wgpu::BindGroup,
}

/// Storage texture written by the tracer, with its output bind group (group 1)
pub struct GpuTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    output_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

impl GpuDevice {
    /// Open the first adapter matching `power_preference`; no window surface is needed
    pub async fn new(power_preference: wgpu::PowerPreference) -> Result<Self, TracerError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let adapter_info = adapter.get_info();
        info!("Using adapter {} ({:?})", adapter_info.name, adapter_info.backend);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Tracer Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                ..Default::default()
            })
            .await?;

        Ok(Self::from_device(device, queue, adapter_info.name))
    }

    /// Wrap a device owned by the embedding application
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, adapter_name: String) -> Self {
        let (scene_layout, output_layout) = Self::create_layouts(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Tracer Pipeline Layout"),
            bind_group_layouts: &[&scene_layout, &output_layout],
            push_constant_ranges: &[],
        });

        Self {
            device,
            queue,
            adapter_name,
            scene_layout,
            output_layout,
            pipeline_layout,
        }
    }

    fn create_layouts(device: &wgpu::Device) -> (wgpu::BindGroupLayout, wgpu::BindGroupLayout) {
        let storage = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let mut scene_entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        // 1..=7: lights, vertices, vertex attributes, indices, meshes, bvh, materials
        scene_entries.extend((1..=7).map(storage));
        scene_entries.push(wgpu::BindGroupLayoutEntry {
            binding: 8,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2Array,
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
            },
            count: None,
        });

        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scene Bind Group Layout"),
            entries: &scene_entries,
        });

        let output_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Output Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            }],
        });

        (scene_layout, output_layout)
    }

    /// Run `f` inside validation and out-of-memory error scopes
    fn scoped<T>(&self, context: &'static str, f: impl FnOnce(&Self) -> T) -> Result<T, TracerError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(self);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(err) => Err(TracerError::Gpu {
                context,
                message: err.to_string(),
            }),
            None => Ok(value),
        }
    }

    fn wait_idle(&self) -> Result<(), TracerError> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|err| TracerError::Gpu {
                context: "device poll",
                message: err.to_string(),
            })
    }
}

impl ComputeDevice for GpuDevice {
    type Program = GpuProgram;
    type Resources = BufferManager;
    type Binding = GpuBinding;
    type Target = GpuTarget;

    fn name(&self) -> &str {
        &self.adapter_name
    }

    fn max_group_size(&self) -> u32 {
        let limits = self.device.limits();
        let side = limits
            .max_compute_workgroup_size_x
            .min(limits.max_compute_workgroup_size_y);
        limits.max_compute_invocations_per_workgroup.min(side.saturating_mul(side))
    }

    fn build_program(
        &mut self,
        composer: &mut ProgramComposer,
        options: RenderOptions,
        group_side: u32,
    ) -> Result<GpuProgram, TracerError> {
        let module = composer
            .compose(options, group_side)
            .map_err(|err| TracerError::build(options, err))?;

        let pipeline = self
            .scoped("program build", |gpu| {
                let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Tracer Program"),
                    source: wgpu::ShaderSource::Naga(Cow::Owned(module)),
                });
                gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some("Tracer Pipeline"),
                    layout: Some(&gpu.pipeline_layout),
                    module: &shader,
                    entry_point: Some(ENTRY_POINT),
                    compilation_options: Default::default(),
                    cache: None,
                })
            })
            .map_err(|err| match err {
                TracerError::Gpu { message, .. } => TracerError::Build {
                    options,
                    diagnostics: message,
                },
                other => other,
            })?;

        Ok(GpuProgram { options, pipeline })
    }

    fn upload_scene(&mut self, scene: &Scene) -> Result<BufferManager, TracerError> {
        let buffers = self.scoped("scene upload", |gpu| BufferManager::new(&gpu.device, &gpu.queue, scene))?;
        // later dispatches must not observe a partial upload
        self.queue.submit(std::iter::empty());
        self.wait_idle()?;
        info!("Uploaded scene to {}", self.adapter_name);
        Ok(buffers)
    }

    fn upload_dynamic(
        &mut self,
        resources: &mut BufferManager,
        scene: &Scene,
        dirty: DirtyFlags,
    ) -> Result<(), TracerError> {
        self.scoped("dynamic upload", |gpu| resources.update_dynamic(&gpu.queue, scene, dirty))??;
        debug!("Dynamic upload: {dirty:?}");
        Ok(())
    }

    fn bind(&mut self, _program: &GpuProgram, resources: &BufferManager) -> Result<GpuBinding, TracerError> {
        let scene_group = self.scoped("scene binding", |gpu| {
            gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Scene Bind Group"),
                layout: &gpu.scene_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: resources.uniforms_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: resources.lights_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: resources.vertices_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: resources.attributes_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: resources.indices_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: resources.meshes_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: resources.bvh_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: resources.materials_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 8,
                        resource: wgpu::BindingResource::TextureView(&resources.diffuse_maps_view),
                    },
                ],
            })
        })?;
        Ok(GpuBinding { scene_group })
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<GpuTarget, TracerError> {
        self.scoped("output target", |gpu| {
            let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Tracer Output"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::STORAGE_BINDING
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let output_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Output Bind Group"),
                layout: &gpu.output_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                }],
            });
            GpuTarget {
                texture,
                view,
                output_group,
                width,
                height,
            }
        })
    }

    fn dispatch(
        &mut self,
        program: &GpuProgram,
        binding: &GpuBinding,
        resources: &BufferManager,
        uniforms: &FrameUniforms,
        target: &mut GpuTarget,
        group_side: u32,
    ) -> Result<(), TracerError> {
        let (groups_x, groups_y) = TileHelper::group_count(target.width, target.height, group_side);
        self.scoped("dispatch", |gpu| {
            resources.write_uniforms(&gpu.queue, uniforms);

            let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Tracer Encoder"),
            });
            {
                let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Tracer Pass"),
                    timestamp_writes: None,
                });
                compute_pass.set_pipeline(&program.pipeline);
                compute_pass.set_bind_group(0, &binding.scene_group, &[]);
                compute_pass.set_bind_group(1, &target.output_group, &[]);
                compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            gpu.queue.submit(std::iter::once(encoder.finish()));
        })?;

        trace!("Dispatched {}x{} groups of side {}", groups_x, groups_y, group_side);
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TracerError> {
        self.wait_idle()
    }

    fn read_target(&mut self, target: &GpuTarget) -> Result<RgbaImage, TracerError> {
        let unpadded_row = target.width * 4;
        let padded_row = unpadded_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging_buffer = self.scoped("readback", |gpu| {
            let staging_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Readback Buffer"),
                size: (padded_row * target.height) as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });
            let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &target.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &staging_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_row),
                        rows_per_image: Some(target.height),
                    },
                },
                wgpu::Extent3d {
                    width: target.width,
                    height: target.height,
                    depth_or_array_layers: 1,
                },
            );
            gpu.queue.submit(std::iter::once(encoder.finish()));
            staging_buffer
        })?;

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.wait_idle()?;

        receiver
            .recv()
            .map_err(|err| err.to_string())
            .and_then(|mapped| mapped.map_err(|err| err.to_string()))
            .map_err(|message| TracerError::Gpu {
                context: "readback",
                message,
            })?;

        let data = buffer_slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_row * target.height) as usize);
        for row in data.chunks(padded_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_row as usize]);
        }
        drop(data);
        staging_buffer.unmap();

        RgbaImage::from_raw(target.width, target.height, pixels).ok_or(TracerError::Gpu {
            context: "readback",
            message: "pixel data does not match the target size".to_string(),
        })
    }
}
