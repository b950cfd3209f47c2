use std::path::{Path, PathBuf};

use meshtracer_shared::RenderOptions;
use serde::{Deserialize, Serialize};

use crate::error::TracerError;

/// Which compute device renders the frames
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// GPU when an adapter is available, otherwise the software device
    #[default]
    Auto,
    Gpu,
    Cpu,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub width: u32,
    pub height: u32,
    pub path: PathBuf,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: Backend,
    pub power_preference: PowerPreference,
}

/// Runtime configuration, every field optional in the TOML file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerConfig {
    pub output: OutputConfig,
    pub render: RenderOptions,
    pub device: DeviceConfig,
    pub frames: u32,
    /// Seconds between rendered frames, drives the scene animation
    pub frame_time: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 512,
            path: PathBuf::from("meshtracer.png"),
        }
    }
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            render: RenderOptions::default(),
            device: DeviceConfig::default(),
            frames: 1,
            frame_time: 1.0 / 60.0,
        }
    }
}

impl TracerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TracerError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, TracerError> {
        Ok(toml::from_str(text)?)
    }
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(preference: PowerPreference) -> Self {
        match preference {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        }
    }
}
