// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "compute-raytracer")]
#[command(about = "GPU compute ray tracer with a free-flying camera", long_about = None)]
pub struct Cli {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output image width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Output image height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Compute work-group edge length; must divide width and height
    #[arg(long = "workgroup-size")]
    pub workgroup_size: Option<u32>,

    /// Directory holding compute.wgsl, present_vs.wgsl and present_fs.wgsl
    #[arg(long = "shader-dir")]
    pub shader_dir: Option<PathBuf>,

    /// Present without waiting for vertical sync
    #[arg(long = "no-vsync", default_value = "false")]
    pub no_vsync: bool,

    /// Radians of turn per pixel of cursor travel
    #[arg(long)]
    pub sensitivity: Option<f32>,

    /// World units moved per frame
    #[arg(long)]
    pub speed: Option<f32>,

    /// Let the pitch pass straight up or down and flip the view
    #[arg(long = "free-pitch", default_value = "false")]
    pub free_pitch: bool,

    /// Quit after this many frames
    #[arg(long)]
    pub frames: Option<u64>,
}
