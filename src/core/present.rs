//! Destinations for the present pass: a window surface or an offscreen texture.

use super::frame_loop::FrameError;
use super::gpu_context::{GpuContext, GpuError};
use super::render_target::read_texture_rgba8;

/// A color attachment acquired for one frame
pub struct AcquiredFrame {
    view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl AcquiredFrame {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    /// Swap the display buffer; a no-op for offscreen frames
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

pub trait PresentTarget {
    fn format(&self) -> wgpu::TextureFormat;

    /// Color attachment for the next frame, `None` when this frame must be skipped
    fn acquire(&mut self) -> Result<Option<AcquiredFrame>, FrameError>;

    fn resize(&mut self, _width: u32, _height: u32) {}
}

/// Window surface, presented with vsync when requested
pub struct SurfaceTarget {
    gpu: GpuContext,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl SurfaceTarget {
    pub fn new(
        gpu: &GpuContext,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Self {
        let caps = surface.get_capabilities(gpu.adapter());
        // The compute stage writes display-ready values, so avoid a second sRGB encode
        let format = caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);
        let present_mode = if vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(gpu.device(), &config);
        log::info!(
            "Surface configured: {}x{} {:?} {:?}",
            config.width,
            config.height,
            config.format,
            config.present_mode
        );

        Self {
            gpu: gpu.clone(),
            surface,
            config,
        }
    }

    fn reconfigure(&self) {
        self.surface.configure(self.gpu.device(), &self.config);
    }
}

impl PresentTarget for SurfaceTarget {
    fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn acquire(&mut self) -> Result<Option<AcquiredFrame>, FrameError> {
        match self.surface.get_current_texture() {
            Ok(texture) => {
                let view = texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(Some(AcquiredFrame {
                    view,
                    surface_texture: Some(texture),
                }))
            }
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Surface lost or outdated, reconfiguring");
                self.reconfigure();
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timed out, skipping frame");
                Ok(None)
            }
            Err(e) => Err(FrameError::Surface(e)),
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
    }
}

/// Offscreen color texture for headless runs
pub struct OffscreenTarget {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let texture = gpu.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Present Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        Self {
            texture,
            width,
            height,
        }
    }

    /// What the last present pass drew, as tightly packed RGBA8 rows
    pub fn read_pixels(&self, gpu: &GpuContext) -> Result<Vec<u8>, GpuError> {
        read_texture_rgba8(gpu, &self.texture, self.width, self.height)
    }
}

impl PresentTarget for OffscreenTarget {
    fn format(&self) -> wgpu::TextureFormat {
        Self::FORMAT
    }

    fn acquire(&mut self) -> Result<Option<AcquiredFrame>, FrameError> {
        Ok(Some(AcquiredFrame {
            view: self.texture.create_view(&wgpu::TextureViewDescriptor::default()),
            surface_texture: None,
        }))
    }
}
