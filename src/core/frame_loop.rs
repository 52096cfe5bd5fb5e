//! The per-frame sequence: sample input, update the camera, ray-trace into the
//! output image, then draw that image onto the present target.
//!
//! Each frame is first written down as a list of [`FrameCommand`]s and then
//! encoded. The compute pass ends at [`FrameCommand::Barrier`]; the present
//! pass that samples the output image can only start after it, so every write
//! of the dispatch is visible to the draw.

use std::path::PathBuf;

use thiserror::Error;

use super::clock::FrameClock;
use super::environment::{Environment, DEFAULT_FACE_SIZE};
use super::gpu_context::{GpuContext, GpuError};
use super::present::{AcquiredFrame, PresentTarget};
use super::program::{GpuProgram, LinkOptions, ProgramStage};
use super::quad::{FullscreenQuad, QUAD_TOPOLOGY, QUAD_VERTEX_COUNT};
use super::render_target::{DispatchGrid, RenderTarget};
use super::uniforms::UniformValue;
use crate::camera::Camera;
use crate::input::{InputSource, Sample};

pub const CAMERA_POSITION: &str = "cameraPosition";
pub const CAMERA_ORIENTATION: &str = "cameraOrientation";

pub const OUTPUT_IMAGE_GROUP: u32 = 1;
pub const ENVIRONMENT_GROUP: u32 = 2;
pub const FRAME_TEXTURE_GROUP: u32 = 1;

pub const COMPUTE_SHADER: &str = "compute.wgsl";
pub const PRESENT_VERTEX_SHADER: &str = "present_vs.wgsl";
pub const PRESENT_FRAGMENT_SHADER: &str = "present_fs.wgsl";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramRole {
    Compute,
    Present,
}

/// One step of a frame, in submission order
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameCommand {
    UseProgram(ProgramRole),
    /// Set a uniform of the program in use
    SetUniform(&'static str, UniformValue),
    BindOutputImage,
    BindEnvironment,
    Dispatch(DispatchGrid),
    /// All output image writes complete and become visible to later reads
    Barrier,
    BindOutputTexture,
    DrawQuad { vertices: u32 },
    Swap,
}

/// Commands for one frame seen from `camera`
pub fn frame_plan(camera: &Camera, grid: DispatchGrid, environment: bool) -> Vec<FrameCommand> {
    let mut plan = vec![
        FrameCommand::UseProgram(ProgramRole::Compute),
        FrameCommand::SetUniform(CAMERA_POSITION, camera.position.into()),
        FrameCommand::SetUniform(CAMERA_ORIENTATION, camera.orientation().into()),
        FrameCommand::BindOutputImage,
    ];
    if environment {
        plan.push(FrameCommand::BindEnvironment);
    }
    plan.extend([
        FrameCommand::Dispatch(grid),
        FrameCommand::Barrier,
        FrameCommand::UseProgram(ProgramRole::Present),
        FrameCommand::BindOutputTexture,
        FrameCommand::DrawQuad {
            vertices: QUAD_VERTEX_COUNT,
        },
        FrameCommand::Swap,
    ]);
    plan
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct FrameLoopOptions {
    pub width: u32,
    pub height: u32,
    pub workgroup_size: u32,
    pub shader_dir: PathBuf,
    /// Stop after this many frames
    pub frame_limit: Option<u64>,
}

impl FrameLoopOptions {
    pub fn compute_stages(&self) -> Vec<ProgramStage> {
        vec![ProgramStage::compute(self.shader_dir.join(COMPUTE_SHADER))]
    }

    pub fn present_stages(&self) -> Vec<ProgramStage> {
        vec![
            ProgramStage::vertex(self.shader_dir.join(PRESENT_VERTEX_SHADER)),
            ProgramStage::fragment(self.shader_dir.join(PRESENT_FRAGMENT_SHADER)),
        ]
    }

    pub fn grid(&self) -> DispatchGrid {
        DispatchGrid::covering(self.width, self.height, [self.workgroup_size; 2])
    }
}

enum ActivePass {
    Idle,
    Compute(wgpu::ComputePass<'static>),
    Render(wgpu::RenderPass<'static>),
}

pub struct FrameLoop<T: PresentTarget> {
    gpu: GpuContext,
    camera: Camera,
    compute: GpuProgram,
    present: GpuProgram,
    output: RenderTarget,
    environment: Environment,
    output_bind_group: Option<wgpu::BindGroup>,
    environment_bind_group: Option<wgpu::BindGroup>,
    frame_bind_group: Option<wgpu::BindGroup>,
    quad: FullscreenQuad,
    target: T,
    grid: DispatchGrid,
    clock: FrameClock,
    frame_limit: Option<u64>,
    state: LoopState,
}

impl<T: PresentTarget> FrameLoop<T> {
    /// Build both programs and every frame resource.
    ///
    /// A program that fails to build is logged and kept as an invalid program;
    /// the loop still runs and the failure shows up as GPU errors each frame.
    pub fn new(
        gpu: &GpuContext,
        options: &FrameLoopOptions,
        camera: Camera,
        target: T,
    ) -> Result<Self, FrameError> {
        let compute = GpuProgram::build_or_invalid(
            gpu,
            "Ray Trace Program",
            &options.compute_stages(),
            &LinkOptions::compute(),
        );
        let quad_layout = [FullscreenQuad::layout()];
        let present = GpuProgram::build_or_invalid(
            gpu,
            "Present Program",
            &options.present_stages(),
            &LinkOptions::render(target.format(), &quad_layout, QUAD_TOPOLOGY),
        );

        if let Some(size) = compute.workgroup_size() {
            let expected = [options.workgroup_size, options.workgroup_size, 1];
            if size != expected {
                log::warn!(
                    "Compute shader work-group size {:?} differs from configured {:?}",
                    size,
                    expected
                );
            }
        }

        let output = RenderTarget::new(gpu, options.width, options.height);
        let environment = Environment::gradient(gpu, DEFAULT_FACE_SIZE)?;
        let frame_sampler = gpu.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let output_bind_group = make_bind_group(
            gpu,
            "Output Image Bind Group",
            compute.bind_group_layout(OUTPUT_IMAGE_GROUP),
            &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(output.view()),
            }],
        );
        let environment_bind_group = make_bind_group(
            gpu,
            "Environment Bind Group",
            compute.bind_group_layout(ENVIRONMENT_GROUP),
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(environment.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(environment.sampler()),
                },
            ],
        );
        let frame_bind_group = make_bind_group(
            gpu,
            "Frame Texture Bind Group",
            present.bind_group_layout(FRAME_TEXTURE_GROUP),
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(output.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&frame_sampler),
                },
            ],
        );

        let grid = options.grid();
        log::info!(
            "Frame loop ready: {}x{} output, dispatch grid {:?}",
            options.width,
            options.height,
            grid.as_tuple()
        );

        Ok(Self {
            gpu: gpu.clone(),
            camera,
            compute,
            present,
            output,
            environment,
            output_bind_group,
            environment_bind_group,
            frame_bind_group,
            quad: FullscreenQuad::new(gpu),
            target,
            grid,
            clock: FrameClock::new(),
            frame_limit: options.frame_limit,
            state: LoopState::Running,
        })
    }

    /// Run one iteration: Sample, Update, Compute, Present
    pub fn step(&mut self, input: &mut impl InputSource) -> LoopState {
        if self.state == LoopState::Shutdown {
            return self.state;
        }

        let sample = match input.sample() {
            Sample::Quit => {
                log::info!("Quit requested");
                self.state = LoopState::Shutdown;
                return self.state;
            }
            Sample::Input(sample) => sample,
        };
        self.camera.apply_input(&sample);

        let plan = self.plan();
        match self.target.acquire() {
            Ok(Some(frame)) => self.submit(&plan, frame),
            Ok(None) => {}
            Err(e) => log::error!("Frame skipped: {}", e),
        }

        if let Some(fps) = self.clock.tick() {
            log::info!("FPS: {:.1}", fps);
        }
        if self
            .frame_limit
            .is_some_and(|limit| self.clock.frames() >= limit)
        {
            log::info!("Frame limit of {} reached", self.clock.frames());
            self.state = LoopState::Shutdown;
        }
        self.state
    }

    /// Commands the next frame will execute
    pub fn plan(&self) -> Vec<FrameCommand> {
        frame_plan(
            &self.camera,
            self.grid,
            self.environment_bind_group.is_some(),
        )
    }

    fn submit(&mut self, plan: &[FrameCommand], frame: AcquiredFrame) {
        let gpu = self.gpu.clone();
        let (swap, error) = gpu.validation_scope(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
            let swap = self.encode(&mut encoder, plan, frame.view());
            gpu.queue().submit(std::iter::once(encoder.finish()));
            swap
        });
        if let Some(error) = error {
            log::error!("GPU error: {}", error);
        }
        if swap {
            frame.present();
        }
    }

    /// Record `plan` into `encoder`; returns whether the plan ends in a swap
    fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        plan: &[FrameCommand],
        frame_view: &wgpu::TextureView,
    ) -> bool {
        let mut pass = ActivePass::Idle;
        let mut active = None;
        let mut swap = false;

        for command in plan {
            match *command {
                FrameCommand::UseProgram(ProgramRole::Compute) => {
                    let mut compute = encoder
                        .begin_compute_pass(&wgpu::ComputePassDescriptor {
                            label: Some("Ray Trace Pass"),
                            timestamp_writes: None,
                        })
                        .forget_lifetime();
                    self.compute.activate_compute(&mut compute);
                    pass = ActivePass::Compute(compute);
                    active = Some(ProgramRole::Compute);
                }
                FrameCommand::UseProgram(ProgramRole::Present) => {
                    let mut render = encoder
                        .begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("Present Pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: frame_view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                    store: wgpu::StoreOp::Store,
                                },
                                depth_slice: None,
                            })],
                            depth_stencil_attachment: None,
                            occlusion_query_set: None,
                            timestamp_writes: None,
                        })
                        .forget_lifetime();
                    self.present.activate_render(&mut render);
                    pass = ActivePass::Render(render);
                    active = Some(ProgramRole::Present);
                }
                FrameCommand::SetUniform(name, value) => match active {
                    Some(ProgramRole::Compute) => self.compute.set_uniform(name, value),
                    Some(ProgramRole::Present) => self.present.set_uniform(name, value),
                    None => log::warn!("Uniform {} set with no program in use", name),
                },
                FrameCommand::BindOutputImage => {
                    if let (ActivePass::Compute(p), Some(bind_group)) =
                        (&mut pass, &self.output_bind_group)
                    {
                        p.set_bind_group(OUTPUT_IMAGE_GROUP, bind_group, &[]);
                    }
                }
                FrameCommand::BindEnvironment => {
                    if let (ActivePass::Compute(p), Some(bind_group)) =
                        (&mut pass, &self.environment_bind_group)
                    {
                        p.set_bind_group(ENVIRONMENT_GROUP, bind_group, &[]);
                    }
                }
                FrameCommand::Dispatch(grid) => {
                    if let ActivePass::Compute(p) = &mut pass {
                        p.dispatch_workgroups(grid.x, grid.y, grid.z);
                    }
                }
                FrameCommand::Barrier => {
                    pass = ActivePass::Idle;
                }
                FrameCommand::BindOutputTexture => {
                    if let ActivePass::Render(p) = &mut pass {
                        if let Some(bind_group) = &self.frame_bind_group {
                            p.set_bind_group(FRAME_TEXTURE_GROUP, bind_group, &[]);
                        }
                        p.set_vertex_buffer(0, self.quad.buffer().slice(..));
                    }
                }
                FrameCommand::DrawQuad { vertices } => {
                    if let ActivePass::Render(p) = &mut pass {
                        p.draw(0..vertices, 0..1);
                    }
                }
                FrameCommand::Swap => {
                    pass = ActivePass::Idle;
                    swap = true;
                }
            }
        }
        drop(pass);
        swap
    }

    /// Window size changed; the output image keeps its resolution and is stretched
    pub fn resize(&mut self, width: u32, height: u32) {
        self.target.resize(width, height);
    }

    /// Release every GPU resource once
    pub fn shutdown(self) {
        log::info!(
            "Shutting down after {} frames, releasing GPU resources",
            self.clock.frames()
        );
        if let Err(e) = self.gpu.device().poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        }) {
            log::warn!("Device poll during shutdown failed: {}", e);
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn compute_program(&self) -> &GpuProgram {
        &self.compute
    }

    pub fn present_program(&self) -> &GpuProgram {
        &self.present
    }

    pub fn output(&self) -> &RenderTarget {
        &self.output
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn grid(&self) -> DispatchGrid {
        self.grid
    }

    pub fn frames(&self) -> u64 {
        self.clock.frames()
    }
}

fn make_bind_group(
    gpu: &GpuContext,
    label: &str,
    layout: Option<wgpu::BindGroupLayout>,
    entries: &[wgpu::BindGroupEntry<'_>],
) -> Option<wgpu::BindGroup> {
    let Some(layout) = layout else {
        log::warn!("{} skipped: program does not use that group", label);
        return None;
    };
    let (bind_group, error) = gpu.validation_scope(|device| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &layout,
            entries,
        })
    });
    match error {
        Some(error) => {
            log::error!("{}: {}", label, error);
            None
        }
        None => Some(bind_group),
    }
}
