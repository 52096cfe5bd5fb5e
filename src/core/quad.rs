use wgpu::util::DeviceExt;

use super::gpu_context::GpuContext;

/// Clip-space corners drawn as a triangle strip
pub const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, 1.0], [-1.0, -1.0], [1.0, 1.0], [1.0, -1.0]];
pub const QUAD_VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;
pub const QUAD_TOPOLOGY: wgpu::PrimitiveTopology = wgpu::PrimitiveTopology::TriangleStrip;

static ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// Vertex buffer for the two-triangle full-screen quad
pub struct FullscreenQuad {
    buffer: wgpu::Buffer,
}

impl FullscreenQuad {
    pub fn new(gpu: &GpuContext) -> Self {
        let buffer = gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Fullscreen Quad"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });
        Self { buffer }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}
