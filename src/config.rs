use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::camera::CameraSettings;
use crate::cli::Cli;
use crate::core::frame_loop::FrameLoopOptions;

pub const DEFAULT_WIDTH: u32 = 1024;
pub const DEFAULT_HEIGHT: u32 = 768;
pub const DEFAULT_WORKGROUP_SIZE: u32 = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{name} must be non-zero")]
    Zero { name: &'static str },
    #[error("{axis} of {size} is not a multiple of the work-group size {group}")]
    NotDivisible {
        axis: &'static str,
        size: u32,
        group: u32,
    },
    #[error("camera pitch_limit must be a finite, non-negative angle, got {0}")]
    PitchLimit(f32),
}

/// Startup configuration, read from JSON and overridden by command-line flags
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub workgroup_size: u32,
    pub shader_dir: PathBuf,
    pub vsync: bool,
    pub camera_position: [f32; 3],
    pub camera: CameraSettings,
    pub frame_limit: Option<u64>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
            shader_dir: PathBuf::from("shaders"),
            vsync: true,
            camera_position: [0.0; 3],
            camera: CameraSettings::default(),
            frame_limit: None,
        }
    }
}

impl RenderConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the `--config` file, then individual flags; validated
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(width) = cli.width {
            self.width = width;
        }
        if let Some(height) = cli.height {
            self.height = height;
        }
        if let Some(size) = cli.workgroup_size {
            self.workgroup_size = size;
        }
        if let Some(dir) = &cli.shader_dir {
            self.shader_dir = dir.clone();
        }
        if cli.no_vsync {
            self.vsync = false;
        }
        if let Some(sensitivity) = cli.sensitivity {
            self.camera.sensitivity = sensitivity;
        }
        if let Some(speed) = cli.speed {
            self.camera.speed = speed;
        }
        if cli.free_pitch {
            self.camera.pitch_limit = None;
        }
        if cli.frames.is_some() {
            self.frame_limit = cli.frames;
        }
    }

    /// The output image must split evenly into work-groups and the pitch limit must be usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("width", self.width),
            ("height", self.height),
            ("workgroup_size", self.workgroup_size),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name });
            }
        }
        for (axis, size) in [("width", self.width), ("height", self.height)] {
            if size % self.workgroup_size != 0 {
                return Err(ConfigError::NotDivisible {
                    axis,
                    size,
                    group: self.workgroup_size,
                });
            }
        }
        if let Some(limit) = self.camera.pitch_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(ConfigError::PitchLimit(limit));
            }
        }
        Ok(())
    }

    pub fn frame_loop_options(&self) -> FrameLoopOptions {
        FrameLoopOptions {
            width: self.width,
            height: self.height,
            workgroup_size: self.workgroup_size,
            shader_dir: self.shader_dir.clone(),
            frame_limit: self.frame_limit,
        }
    }
}
