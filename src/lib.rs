pub mod camera;
pub mod cli;
pub mod config;
pub mod core;
pub mod input;

pub use camera::{Camera, CameraSettings};
pub use config::{ConfigError, RenderConfig};
pub use input::{InputSample, InputSource, MovementState, Sample};
