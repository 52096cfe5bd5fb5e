//! Building and using GPU programs.
//!
//! A program is one or more WGSL stages linked into a single wgpu pipeline.
//! Building goes through three steps: every stage source is read, parsed and
//! validated on the CPU; the modules are created on the device; the pipeline is
//! created from them. The first failing step ends the build, and the whole
//! program is then invalid. Shader modules never outlive the build call.
//!
//! Bind group 0 belongs to the program and holds its uniform buffers. Any
//! higher group is bound by whoever drives the pass.

pub mod reflect;
pub mod stage;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use thiserror::Error;

use super::gpu_context::GpuContext;
use super::uniforms::{UniformBlock, UniformLayout, UniformMiss, UniformValue};
pub use reflect::{reflect_bindings, ReflectedBindings};
pub use stage::{CompiledStage, ProgramStage, StageKind};

pub const UNIFORM_GROUP: u32 = 0;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("cannot open {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("shader compilation error for {}: {log}", path.display())]
    Compile { path: PathBuf, log: String },
    #[error("{} has no {stage} entry point", path.display())]
    MissingEntryPoint { path: PathBuf, stage: StageKind },
    #[error("linking problem: {0}")]
    Link(String),
}

/// Program identity; 0 is reserved for "no program"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(u32);

impl ProgramHandle {
    pub const INVALID: Self = Self(0);

    fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(self) -> u32 {
        self.0
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

/// Fixed-function state needed to turn compiled stages into a pipeline
#[derive(Debug, Clone)]
pub struct LinkOptions<'a> {
    pub color_format: Option<wgpu::TextureFormat>,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub topology: wgpu::PrimitiveTopology,
}

impl LinkOptions<'static> {
    pub fn compute() -> Self {
        Self {
            color_format: None,
            vertex_buffers: &[],
            topology: wgpu::PrimitiveTopology::TriangleList,
        }
    }
}

impl<'a> LinkOptions<'a> {
    pub fn render(
        color_format: wgpu::TextureFormat,
        vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
        topology: wgpu::PrimitiveTopology,
    ) -> Self {
        Self {
            color_format: Some(color_format),
            vertex_buffers,
            topology,
        }
    }
}

enum Pipeline {
    Compute(wgpu::ComputePipeline),
    Render(wgpu::RenderPipeline),
}

struct Linked {
    gpu: GpuContext,
    pipeline: Pipeline,
    uniforms: UniformBlock,
    uniform_buffers: HashMap<u32, wgpu::Buffer>,
    uniform_bind_group: Option<wgpu::BindGroup>,
    workgroup_size: Option<[u32; 3]>,
    max_group: Option<u32>,
}

enum ProgramState {
    Linked(Box<Linked>),
    Invalid(ProgramError),
}

/// A compiled and linked GPU program with exactly one owner
pub struct GpuProgram {
    handle: ProgramHandle,
    label: String,
    state: ProgramState,
}

impl GpuProgram {
    /// Compile every stage and link them into one pipeline
    pub fn compile_and_link(
        gpu: &GpuContext,
        label: &str,
        stages: &[ProgramStage],
        options: &LinkOptions<'_>,
    ) -> Result<Self, ProgramError> {
        let compiled = CompiledStage::compile_all(stages)?;
        Self::link(gpu, label, &compiled, options)
    }

    /// Like `compile_and_link`, but a failure is logged and yields an invalid program
    pub fn build_or_invalid(
        gpu: &GpuContext,
        label: &str,
        stages: &[ProgramStage],
        options: &LinkOptions<'_>,
    ) -> Self {
        match Self::compile_and_link(gpu, label, stages, options) {
            Ok(program) => {
                log::info!("Linked program '{}' (handle {})", label, program.handle.id());
                program
            }
            Err(e) => {
                log::error!("Program '{}': {}", label, e);
                Self::invalid(label, e)
            }
        }
    }

    pub fn invalid(label: &str, diagnostic: ProgramError) -> Self {
        Self {
            handle: ProgramHandle::INVALID,
            label: label.to_string(),
            state: ProgramState::Invalid(diagnostic),
        }
    }

    /// Link already compiled stages
    pub fn link(
        gpu: &GpuContext,
        label: &str,
        stages: &[CompiledStage],
        options: &LinkOptions<'_>,
    ) -> Result<Self, ProgramError> {
        let count = |kind: StageKind| stages.iter().filter(|s| s.kind == kind).count();
        let (compute, vertex, fragment) = (
            count(StageKind::Compute),
            count(StageKind::Vertex),
            count(StageKind::Fragment),
        );
        let is_compute = match (compute, vertex, fragment) {
            (1, 0, 0) => true,
            (0, 1, 1) => false,
            _ => {
                return Err(ProgramError::Link(format!(
                    "unsupported stage set: {} compute, {} vertex, {} fragment",
                    compute, vertex, fragment
                )))
            }
        };

        let bindings = reflect_bindings(stages)?;
        let device = gpu.device();

        let mut modules = Vec::with_capacity(stages.len());
        for stage in stages {
            let module_label = stage.path.to_string_lossy();
            let (module, error) = gpu.validation_scope(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(module_label.as_ref()),
                    source: wgpu::ShaderSource::Wgsl(stage.source.as_str().into()),
                })
            });
            if let Some(error) = error {
                return Err(ProgramError::Compile {
                    path: stage.path.clone(),
                    log: error.to_string(),
                });
            }
            modules.push(module);
        }
        let module_of = |kind: StageKind| {
            stages
                .iter()
                .position(|s| s.kind == kind)
                .map(|i| (&modules[i], stages[i].entry_point_name()))
        };

        let (pipeline, error) = gpu.validation_scope(|device| {
            if is_compute {
                let (module, entry_point) = module_of(StageKind::Compute)?;
                Some(Pipeline::Compute(device.create_compute_pipeline(
                    &wgpu::ComputePipelineDescriptor {
                        label: Some(label),
                        layout: None,
                        module,
                        entry_point: Some(entry_point),
                        compilation_options: Default::default(),
                        cache: None,
                    },
                )))
            } else {
                let (vs_module, vs_entry) = module_of(StageKind::Vertex)?;
                let (fs_module, fs_entry) = module_of(StageKind::Fragment)?;
                let format = options.color_format?;
                Some(Pipeline::Render(device.create_render_pipeline(
                    &wgpu::RenderPipelineDescriptor {
                        label: Some(label),
                        layout: None,
                        vertex: wgpu::VertexState {
                            module: vs_module,
                            entry_point: Some(vs_entry),
                            buffers: options.vertex_buffers,
                            compilation_options: Default::default(),
                        },
                        fragment: Some(wgpu::FragmentState {
                            module: fs_module,
                            entry_point: Some(fs_entry),
                            targets: &[Some(wgpu::ColorTargetState {
                                format,
                                blend: Some(wgpu::BlendState::REPLACE),
                                write_mask: wgpu::ColorWrites::ALL,
                            })],
                            compilation_options: Default::default(),
                        }),
                        primitive: wgpu::PrimitiveState {
                            topology: options.topology,
                            ..Default::default()
                        },
                        depth_stencil: None,
                        multisample: wgpu::MultisampleState::default(),
                        multiview: None,
                        cache: None,
                    },
                )))
            }
        });
        if let Some(error) = error {
            return Err(ProgramError::Link(error.to_string()));
        }
        let pipeline = pipeline.ok_or_else(|| {
            ProgramError::Link("render program needs a color target format".to_string())
        })?;
        // The per-stage modules are only needed until the pipeline exists
        drop(modules);

        let uniform_buffers: HashMap<u32, wgpu::Buffer> = bindings
            .uniforms
            .buffers
            .iter()
            .map(|buffer| {
                let gpu_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{} Uniforms {}", label, buffer.binding)),
                    size: buffer.size as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                (buffer.binding, gpu_buffer)
            })
            .collect();

        let uniform_bind_group = match bindings.max_group {
            Some(_) => {
                let layout = match &pipeline {
                    Pipeline::Compute(p) => p.get_bind_group_layout(UNIFORM_GROUP),
                    Pipeline::Render(p) => p.get_bind_group_layout(UNIFORM_GROUP),
                };
                let entries: Vec<wgpu::BindGroupEntry> = bindings
                    .uniforms
                    .buffers
                    .iter()
                    .map(|buffer| wgpu::BindGroupEntry {
                        binding: buffer.binding,
                        resource: uniform_buffers[&buffer.binding].as_entire_binding(),
                    })
                    .collect();
                let (bind_group, error) = gpu.validation_scope(|device| {
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(&format!("{} Uniform Bind Group", label)),
                        layout: &layout,
                        entries: &entries,
                    })
                });
                if let Some(error) = error {
                    return Err(ProgramError::Link(error.to_string()));
                }
                Some(bind_group)
            }
            None => None,
        };

        let workgroup_size = stages.iter().find_map(CompiledStage::workgroup_size);

        Ok(Self {
            handle: ProgramHandle::next(),
            label: label.to_string(),
            state: ProgramState::Linked(Box::new(Linked {
                gpu: gpu.clone(),
                pipeline,
                uniforms: UniformBlock::new(bindings.uniforms),
                uniform_buffers,
                uniform_bind_group,
                workgroup_size,
                max_group: bindings.max_group,
            })),
        })
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Why the build failed, for an invalid program
    pub fn diagnostic(&self) -> Option<&ProgramError> {
        match &self.state {
            ProgramState::Invalid(e) => Some(e),
            ProgramState::Linked(_) => None,
        }
    }

    pub fn uniform_layout(&self) -> Option<&UniformLayout> {
        self.linked().map(|l| l.uniforms.layout())
    }

    /// CPU copy of a uniform buffer's current contents
    pub fn uniform_bytes(&self, binding: u32) -> Option<&[u8]> {
        self.linked().and_then(|l| l.uniforms.bytes(binding))
    }

    /// Reflected `@workgroup_size` of a compute program
    pub fn workgroup_size(&self) -> Option<[u32; 3]> {
        self.linked().and_then(|l| l.workgroup_size)
    }

    /// Derived layout of a resource group, for building bind groups against it.
    /// `None` when the program is invalid or never touches that group.
    pub fn bind_group_layout(&self, group: u32) -> Option<wgpu::BindGroupLayout> {
        let linked = self.linked()?;
        if linked.max_group.is_none_or(|max| group > max) {
            return None;
        }
        Some(match &linked.pipeline {
            Pipeline::Compute(p) => p.get_bind_group_layout(group),
            Pipeline::Render(p) => p.get_bind_group_layout(group),
        })
    }

    /// Make this program current in a compute pass
    pub fn activate_compute(&self, pass: &mut wgpu::ComputePass<'_>) {
        let Some(linked) = self.linked() else {
            return;
        };
        match &linked.pipeline {
            Pipeline::Compute(pipeline) => {
                pass.set_pipeline(pipeline);
                if let Some(bind_group) = &linked.uniform_bind_group {
                    pass.set_bind_group(UNIFORM_GROUP, bind_group, &[]);
                }
            }
            Pipeline::Render(_) => {
                log::error!("Program '{}' is a render program, not a compute program", self.label)
            }
        }
    }

    /// Make this program current in a render pass
    pub fn activate_render(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(linked) = self.linked() else {
            return;
        };
        match &linked.pipeline {
            Pipeline::Render(pipeline) => {
                pass.set_pipeline(pipeline);
                if let Some(bind_group) = &linked.uniform_bind_group {
                    pass.set_bind_group(UNIFORM_GROUP, bind_group, &[]);
                }
            }
            Pipeline::Compute(_) => {
                log::error!("Program '{}' is a compute program, not a render program", self.label)
            }
        }
    }

    /// Set a named uniform. Unknown or mistyped names are skipped with a warning
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let value = value.into();
        let linked = match &mut self.state {
            ProgramState::Linked(linked) => linked,
            ProgramState::Invalid(_) => {
                log::warn!("Unable to set uniform {} on invalid program '{}'", name, self.label);
                return;
            }
        };

        match linked.uniforms.set(name, value) {
            Ok(write) => {
                let buffer = &linked.uniform_buffers[&write.binding];
                linked
                    .gpu
                    .queue()
                    .write_buffer(buffer, write.offset as u64, linked.uniforms.written(&write));
            }
            Err(UniformMiss::NotFound) => log::warn!(
                "Unable to find uniform variable {} in program '{}', make sure the shader uses it",
                name,
                self.label
            ),
            Err(UniformMiss::KindMismatch { expected, found }) => log::warn!(
                "Uniform {} in program '{}' is {:?}, not {:?}",
                name,
                self.label,
                expected,
                found
            ),
        }
    }

    fn linked(&self) -> Option<&Linked> {
        match &self.state {
            ProgramState::Linked(linked) => Some(linked),
            ProgramState::Invalid(_) => None,
        }
    }
}

impl std::fmt::Debug for GpuProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuProgram")
            .field("handle", &self.handle)
            .field("label", &self.label)
            .field("diagnostic", &self.diagnostic())
            .finish()
    }
}
