pub mod clock;
pub mod environment;
pub mod frame_loop;
pub mod gpu_context;
pub mod input_adapter;
pub mod present;
pub mod program;
pub mod quad;
pub mod render_target;
pub mod uniforms;

pub use frame_loop::{FrameCommand, FrameError, FrameLoop, FrameLoopOptions, LoopState};
pub use gpu_context::{GpuContext, GpuError};
pub use present::{OffscreenTarget, PresentTarget, SurfaceTarget};
pub use program::{GpuProgram, ProgramError, ProgramHandle, ProgramStage, StageKind};
pub use render_target::{DispatchGrid, RenderTarget};
pub use uniforms::UniformValue;
