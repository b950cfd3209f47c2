//! Mesh ray tracer on a compute device: scene and BVH construction on the
//! host, a composed WGSL program on the GPU or its Rust mirror on the CPU.

pub mod binder;
pub mod buffers;
pub mod bvh;
pub mod compute;
pub mod config;
pub mod demo;
pub mod device;
pub mod error;
pub mod geometry;
pub mod renderer;
pub mod scene;
pub mod software;
pub mod surface;
pub mod texture;

pub use binder::{BinderState, ResourceBinder};
pub use bvh::BvhBuilder;
pub use compute::{FrameDriver, FrameStats};
pub use config::{Backend, TracerConfig};
pub use device::ComputeDevice;
pub use error::TracerError;
pub use geometry::{GeometryStore, MeshData, MeshHandle};
pub use renderer::GpuDevice;
pub use scene::{AssetSource, DirtyFlags, InMemoryAssets, Scene, SceneDescription, SceneShape};
pub use software::CpuDevice;
pub use surface::{SharedSurface, SurfaceGuard, SurfaceOwner};
pub use texture::TextureArray;

pub use meshtracer_shader::{ProgramComposer, ProgramError, ProgramSources};
pub use meshtracer_shared::{DisplayMode, RenderOptions};
