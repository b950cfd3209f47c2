use meshtracer_shader::ProgramError;
use meshtracer_shared::RenderOptions;
use thiserror::Error;

use crate::scene::SceneShape;

/// Errors surfaced by the host side of the tracer
#[derive(Debug, Error)]
pub enum TracerError {
    #[error("program build failed for {options:?}:\n{diagnostics}")]
    Build { options: RenderOptions, diagnostics: String },
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error("no compatible GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to open GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("GPU error during {context}: {message}")]
    Gpu { context: &'static str, message: String },
    #[error("invalid mesh `{name}`: {reason}")]
    InvalidMesh { name: String, reason: String },
    #[error("invalid texture `{name}`: {reason}")]
    InvalidTexture { name: String, reason: String },
    #[error("invalid scene: {0}")]
    InvalidScene(String),
    #[error("unknown asset `{0}`")]
    MissingAsset(String),
    #[error("no scene is bound")]
    Unbound,
    #[error("scene shape {given:?} does not match the bound scene {bound:?}; load it first")]
    SceneMismatch { bound: SceneShape, given: SceneShape },
    #[error("output surface is already acquired for compute")]
    SurfaceBusy,
    #[error("output surface is held by compute and cannot be displayed")]
    SurfaceAcquired,
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl TracerError {
    /// Build error for an option variant, keeping the composer's diagnostics
    pub fn build(options: RenderOptions, err: ProgramError) -> Self {
        let diagnostics = match err {
            ProgramError::Compose { diagnostics, .. } => diagnostics,
            other => other.to_string(),
        };
        Self::Build { options, diagnostics }
    }
}
