use image::RgbaImage;
use meshtracer_shader::ProgramComposer;
use meshtracer_shared::{FrameUniforms, RenderOptions};

use crate::error::TracerError;
use crate::scene::{DirtyFlags, Scene};

/// An explicit compute device session: program builds, scene uploads,
/// resource binding and dispatch over an output target.
///
/// Every call blocks until the device has accepted the work; `finish`
/// blocks until submitted dispatches have completed.
pub trait ComputeDevice {
    /// One compiled program variant
    type Program;
    /// Scene buffers resident on the device
    type Resources;
    /// Resource handles bound to one program
    type Binding;
    /// Output image written by a dispatch
    type Target;

    fn name(&self) -> &str;

    /// Largest work-group size (invocations) the device supports
    fn max_group_size(&self) -> u32;

    /// Compile the program variant for `options` with square tiles of `group_side`
    fn build_program(
        &mut self,
        composer: &mut ProgramComposer,
        options: RenderOptions,
        group_side: u32,
    ) -> Result<Self::Program, TracerError>;

    /// Upload every scene buffer into a fresh resource set
    fn upload_scene(&mut self, scene: &Scene) -> Result<Self::Resources, TracerError>;

    /// Re-upload only the buffers flagged in `dirty`
    fn upload_dynamic(
        &mut self,
        resources: &mut Self::Resources,
        scene: &Scene,
        dirty: DirtyFlags,
    ) -> Result<(), TracerError>;

    /// Attach a resource set to a program
    fn bind(&mut self, program: &Self::Program, resources: &Self::Resources) -> Result<Self::Binding, TracerError>;

    fn create_target(&mut self, width: u32, height: u32) -> Result<Self::Target, TracerError>;

    /// Trace every pixel of `target`
    fn dispatch(
        &mut self,
        program: &Self::Program,
        binding: &Self::Binding,
        resources: &Self::Resources,
        uniforms: &FrameUniforms,
        target: &mut Self::Target,
        group_side: u32,
    ) -> Result<(), TracerError>;

    /// Block until every submitted dispatch has completed
    fn finish(&mut self) -> Result<(), TracerError>;

    /// Copy a target back to host memory
    fn read_target(&mut self, target: &Self::Target) -> Result<RgbaImage, TracerError>;
}
