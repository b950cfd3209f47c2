use std::borrow::Cow;
use std::collections::HashMap;

use log::{debug, info};
use meshtracer_shared::RenderOptions;
use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, ComposerError, NagaModuleDescriptor, ShaderDefValue, ShaderLanguage,
    ShaderType,
};
use thiserror::Error;

/// Entry point of the composed compute program
pub const ENTRY_POINT: &str = "tracer";

const TRACER_SOURCE: &str = include_str!("../wgsl/tracer.wgsl");
const TRACER_PATH: &str = "tracer.wgsl";

/// Errors raised while assembling the compute program
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("failed to register program module `{module}`:\n{diagnostics}")]
    Register { module: &'static str, diagnostics: String },
    #[error("failed to build program variant {options:?}:\n{diagnostics}")]
    Compose { options: RenderOptions, diagnostics: String },
}

/// Named WGSL modules imported by the tracer entry point
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProgramModule {
    Primitives,
    Quaternion,
    Scene,
    Intersect,
    Brdf,
    Shader,
}

impl ProgramModule {
    /// Registration order; every module comes after the modules it imports
    pub const ALL: [ProgramModule; 6] = [
        ProgramModule::Primitives,
        ProgramModule::Quaternion,
        ProgramModule::Scene,
        ProgramModule::Intersect,
        ProgramModule::Brdf,
        ProgramModule::Shader,
    ];

    pub fn file_path(self) -> &'static str {
        match self {
            Self::Primitives => "primitives.wgsl",
            Self::Quaternion => "quaternion.wgsl",
            Self::Scene => "scene.wgsl",
            Self::Intersect => "intersect.wgsl",
            Self::Brdf => "brdf.wgsl",
            Self::Shader => "shader.wgsl",
        }
    }

    pub fn default_source(self) -> &'static str {
        match self {
            Self::Primitives => include_str!("../wgsl/primitives.wgsl"),
            Self::Quaternion => include_str!("../wgsl/quaternion.wgsl"),
            Self::Scene => include_str!("../wgsl/scene.wgsl"),
            Self::Intersect => include_str!("../wgsl/intersect.wgsl"),
            Self::Brdf => include_str!("../wgsl/brdf.wgsl"),
            Self::Shader => include_str!("../wgsl/shader.wgsl"),
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Program text: the imported modules plus the tracer entry module
#[derive(Clone, Debug)]
pub struct ProgramSources {
    modules: [Cow<'static, str>; 6],
    tracer: Cow<'static, str>,
}

impl Default for ProgramSources {
    fn default() -> Self {
        Self {
            modules: ProgramModule::ALL.map(|module| Cow::Borrowed(module.default_source())),
            tracer: Cow::Borrowed(TRACER_SOURCE),
        }
    }
}

impl ProgramSources {
    /// Replace the entry module's source
    pub fn with_tracer(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.tracer = source.into();
        self
    }

    pub fn module(&self, module: ProgramModule) -> &str {
        &self.modules[module.slot()]
    }

    pub fn tracer(&self) -> &str {
        &self.tracer
    }
}

/// Builds one naga module per option variant from the registered WGSL modules
pub struct ProgramComposer {
    composer: Composer,
    tracer: Cow<'static, str>,
}

impl ProgramComposer {
    /// Composer over the built-in program text
    pub fn new() -> Result<Self, ProgramError> {
        Self::with_sources(ProgramSources::default())
    }

    pub fn with_sources(sources: ProgramSources) -> Result<Self, ProgramError> {
        let mut composer = Composer::default();
        for module in ProgramModule::ALL {
            composer
                .add_composable_module(ComposableModuleDescriptor {
                    source: sources.module(module),
                    file_path: module.file_path(),
                    language: ShaderLanguage::Wgsl,
                    ..Default::default()
                })
                .map(|_| ())
                .map_err(|err| ProgramError::Register {
                    module: module.file_path(),
                    diagnostics: diagnostics(&composer, &err),
                })?;
            debug!("Registered program module {}", module.file_path());
        }

        Ok(Self {
            composer,
            tracer: sources.tracer,
        })
    }

    /// Shader defines selecting the display mode, shadow toggle and work-group side
    pub fn shader_defs(options: RenderOptions, group_side: u32) -> HashMap<String, ShaderDefValue> {
        let mut defs = HashMap::new();
        defs.insert(options.display.define().to_string(), ShaderDefValue::Bool(true));
        if options.shadows {
            defs.insert("SHADOWS".to_string(), ShaderDefValue::Bool(true));
        }
        defs.insert("GROUP_SIDE".to_string(), ShaderDefValue::Int(group_side.max(1) as i32));
        defs
    }

    /// Compose and validate the program variant for `options`
    pub fn compose(&mut self, options: RenderOptions, group_side: u32) -> Result<naga::Module, ProgramError> {
        let module = self
            .composer
            .make_naga_module(NagaModuleDescriptor {
                source: &self.tracer,
                file_path: TRACER_PATH,
                shader_type: ShaderType::Wgsl,
                shader_defs: Self::shader_defs(options, group_side),
                ..Default::default()
            })
            .map_err(|err| ProgramError::Compose {
                options,
                diagnostics: diagnostics(&self.composer, &err),
            })?;

        info!(
            "Composed program variant {:?} (shadows: {}, group side {})",
            options.display, options.shadows, group_side
        );
        Ok(module)
    }
}

fn diagnostics(composer: &Composer, err: &ComposerError) -> String {
    err.emit_to_string(composer)
}
