use glam::Vec3;

use super::gpu_context::{GpuContext, GpuError};

pub const FACE_COUNT: usize = 6;
pub const DEFAULT_FACE_SIZE: u32 = 64;

/// Cubemap sampled by the compute stage when a ray leaves the scene.
///
/// Faces are in wgpu layer order: +X, -X, +Y, -Y, +Z, -Z.
pub struct Environment {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl Environment {
    /// Build a cubemap from six square RGBA8 faces of `size` x `size` texels
    pub fn from_faces(
        gpu: &GpuContext,
        size: u32,
        faces: [&[u8]; FACE_COUNT],
    ) -> Result<Self, GpuError> {
        let expected = (size * size * 4) as usize;
        if let Some((face, pixels)) = faces
            .iter()
            .enumerate()
            .find(|(_, f)| f.len() != expected)
        {
            return Err(GpuError::FaceSize {
                face,
                expected,
                actual: pixels.len(),
            });
        }

        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Environment Cubemap"),
            size: wgpu::Extent3d {
                width: size,
                height: size,
                depth_or_array_layers: FACE_COUNT as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, pixels) in faces.iter().enumerate() {
            gpu.queue().write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * size),
                    rows_per_image: Some(size),
                },
                wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Environment Cube View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = gpu.device().create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            _texture: texture,
            view,
            sampler,
        })
    }

    /// Procedural sky: horizon haze fading to blue overhead, dark ground below
    pub fn gradient(gpu: &GpuContext, size: u32) -> Result<Self, GpuError> {
        let faces: Vec<Vec<u8>> = (0..FACE_COUNT).map(|face| gradient_face(face, size)).collect();
        Self::from_faces(
            gpu,
            size,
            [&faces[0], &faces[1], &faces[2], &faces[3], &faces[4], &faces[5]],
        )
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }
}

/// World direction through texel (`u`, `v`) in [-1, 1] of a cube face
pub fn face_direction(face: usize, u: f32, v: f32) -> Vec3 {
    match face {
        0 => Vec3::new(1.0, -v, -u),
        1 => Vec3::new(-1.0, -v, u),
        2 => Vec3::new(u, 1.0, v),
        3 => Vec3::new(u, -1.0, -v),
        4 => Vec3::new(u, -v, 1.0),
        _ => Vec3::new(-u, -v, -1.0),
    }
    .normalize()
}

pub fn sky_color(direction: Vec3) -> Vec3 {
    const HORIZON: Vec3 = Vec3::new(0.85, 0.88, 0.92);
    const ZENITH: Vec3 = Vec3::new(0.25, 0.45, 0.85);
    const GROUND: Vec3 = Vec3::new(0.2, 0.18, 0.16);

    if direction.y >= 0.0 {
        HORIZON.lerp(ZENITH, direction.y.sqrt())
    } else {
        HORIZON.lerp(GROUND, (-direction.y * 4.0).min(1.0))
    }
}

fn gradient_face(face: usize, size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let u = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
            let v = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
            let color = sky_color(face_direction(face, u, v));
            pixels.extend(color.to_array().map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8));
            pixels.push(255);
        }
    }
    pixels
}
