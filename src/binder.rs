use log::{info, warn};
use meshtracer_shader::ProgramComposer;
use meshtracer_shared::{FrameUniforms, RenderOptions};

use crate::device::ComputeDevice;
use crate::error::TracerError;
use crate::scene::{Scene, SceneShape};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinderState {
    Unbound,
    Bound,
}

/// Keeps the device program, scene resources and their binding consistent
/// with the loaded scene and the current render options
pub struct ResourceBinder<D: ComputeDevice> {
    composer: ProgramComposer,
    options: RenderOptions,
    group_side: u32,
    program: Option<D::Program>,
    resources: Option<D::Resources>,
    binding: Option<D::Binding>,
    shape: Option<SceneShape>,
    rebuild_count: u64,
}

impl<D: ComputeDevice> ResourceBinder<D> {
    pub fn new(composer: ProgramComposer, options: RenderOptions, group_side: u32) -> Self {
        Self {
            composer,
            options,
            group_side,
            program: None,
            resources: None,
            binding: None,
            shape: None,
            rebuild_count: 0,
        }
    }

    pub fn state(&self) -> BinderState {
        match (&self.program, &self.binding) {
            (Some(_), Some(_)) => BinderState::Bound,
            _ => BinderState::Unbound,
        }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    pub fn group_side(&self) -> u32 {
        self.group_side
    }

    /// Successful program builds caused by option changes, bound or not.
    /// Failed builds and the first build on scene load are not counted.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    pub fn program(&self) -> Option<&D::Program> {
        self.program.as_ref()
    }

    /// Upload `scene` into a fresh resource set and bind it. The previous
    /// scene stays bound when any step fails.
    pub fn load_scene(&mut self, device: &mut D, scene: &mut Scene) -> Result<(), TracerError> {
        let fresh = match self.program {
            Some(_) => None,
            None => Some(device.build_program(&mut self.composer, self.options, self.group_side)?),
        };
        let resources = device.upload_scene(scene)?;
        let program = fresh.as_ref().or(self.program.as_ref()).ok_or(TracerError::Unbound)?;
        let binding = device.bind(program, &resources)?;

        if let Some(program) = fresh {
            self.program = Some(program);
        }
        self.resources = Some(resources);
        self.binding = Some(binding);
        self.shape = Some(scene.shape());
        scene.clear_dirty();
        info!("Scene bound with {:?}", self.options);
        Ok(())
    }

    /// Switch render options. Rebuilds only when `options` differ from the
    /// current ones; returns whether a rebuild happened. On failure the
    /// previous program and options remain active.
    pub fn set_options(&mut self, device: &mut D, options: RenderOptions) -> Result<bool, TracerError> {
        if options == self.options {
            return Ok(false);
        }

        let result = device
            .build_program(&mut self.composer, options, self.group_side)
            .and_then(|program| {
                let binding = match &self.resources {
                    Some(resources) => Some(device.bind(&program, resources)?),
                    None => None,
                };
                Ok((program, binding))
            });

        match result {
            Ok((program, binding)) => {
                self.program = Some(program);
                if binding.is_some() {
                    self.binding = binding;
                }
                self.options = options;
                self.rebuild_count += 1;
                info!("Rebuilt program for {:?} (rebuild #{})", options, self.rebuild_count);
                Ok(true)
            }
            Err(err) => {
                warn!("Keeping {:?} after failed switch to {:?}: {}", self.options, options, err);
                Err(err)
            }
        }
    }

    /// Re-upload the scene buffers marked dirty since the last frame.
    /// `scene` must have the shape of the scene passed to `load_scene`.
    pub fn sync_dynamic(&mut self, device: &mut D, scene: &mut Scene) -> Result<(), TracerError> {
        let resources = self.resources.as_mut().ok_or(TracerError::Unbound)?;
        let given = scene.shape();
        match self.shape {
            Some(bound) if bound != given => return Err(TracerError::SceneMismatch { bound, given }),
            _ => {}
        }
        let dirty = scene.dirty();
        if dirty.any() {
            device.upload_dynamic(resources, scene, dirty)?;
            scene.clear_dirty();
        }
        Ok(())
    }

    /// Run the bound program over `target`
    pub fn dispatch(&self, device: &mut D, uniforms: &FrameUniforms, target: &mut D::Target) -> Result<(), TracerError> {
        match (&self.program, &self.binding, &self.resources) {
            (Some(program), Some(binding), Some(resources)) => {
                device.dispatch(program, binding, resources, uniforms, target, self.group_side)
            }
            _ => Err(TracerError::Unbound),
        }
    }
}
