use std::sync::Arc;

use thiserror::Error;
use wgpu::{Adapter, Buffer, Device, DeviceDescriptor, Features, Instance, Queue, Surface};
use winit::window::Window;

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("failed to find an appropriate adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("buffer mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("channel closed before the mapping result arrived")]
    ChannelClosed,
    #[error("cubemap face {face} holds {actual} bytes, expected {expected}")]
    FaceSize {
        face: usize,
        expected: usize,
        actual: usize,
    },
}

/// Shared GPU context
///
/// Device and queue are reference counted so the frame loop and every program
/// can hold a cheap clone.
#[derive(Clone)]
pub struct GpuContext {
    adapter: Arc<Adapter>,
    device: Arc<Device>,
    queue: Arc<Queue>,
}

impl GpuContext {
    /// Create a context without a surface (offscreen rendering and tests)
    pub async fn new() -> Result<Self, GpuError> {
        let instance = Self::create_instance();
        let adapter = Self::request_adapter(&instance, None).await?;
        Self::from_adapter(adapter).await
    }

    /// Create a context and a surface for `window` from the same instance
    ///
    /// The adapter is chosen to be compatible with the returned surface.
    pub async fn for_window(window: Arc<Window>) -> Result<(Self, Surface<'static>), GpuError> {
        let instance = Self::create_instance();
        let surface = instance.create_surface(window)?;
        let adapter = Self::request_adapter(&instance, Some(&surface)).await?;
        let context = Self::from_adapter(adapter).await?;
        Ok((context, surface))
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Run device calls inside a validation error scope and return what it caught
    pub fn validation_scope<T>(
        &self,
        create: impl FnOnce(&Device) -> T,
    ) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error)
    }

    /// Synchronously read a mappable buffer back to the CPU
    ///
    /// Blocks the calling thread until the GPU is idle.
    pub fn read_buffer_sync(&self, buffer: &Buffer) -> Result<Vec<u8>, GpuError> {
        let buffer_slice = buffer.slice(..);

        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).ok();
        });

        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })?;

        receiver.recv().map_err(|_| GpuError::ChannelClosed)??;
        let data = buffer_slice.get_mapped_range();
        let result = data.to_vec();
        drop(data);
        buffer.unmap();
        Ok(result)
    }

    fn create_instance() -> Instance {
        Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        })
    }

    async fn request_adapter(
        instance: &Instance,
        surface: Option<&Surface<'_>>,
    ) -> Result<Adapter, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: surface,
                force_fallback_adapter: false,
            })
            .await?;

        let info = adapter.get_info();
        log::info!(
            "Adapter: {} ({:?}, {:?})",
            info.name,
            info.backend,
            info.device_type
        );
        Ok(adapter)
    }

    async fn from_adapter(adapter: Adapter) -> Result<Self, GpuError> {
        let limits = adapter.limits();
        log::info!(
            "Max compute workgroups per dimension: {}",
            limits.max_compute_workgroups_per_dimension
        );
        log::info!(
            "Max compute workgroup size: {}x{}x{}, max invocations: {}",
            limits.max_compute_workgroup_size_x,
            limits.max_compute_workgroup_size_y,
            limits.max_compute_workgroup_size_z,
            limits.max_compute_invocations_per_workgroup
        );

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("GPU Context Device"),
                required_features: Features::empty(),
                required_limits: limits,
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await?;

        Ok(Self {
            adapter: Arc::new(adapter),
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }
}

/// Headless context for GPU tests, `None` when the machine has no usable adapter
pub fn test_context() -> Option<GpuContext> {
    match pollster::block_on(GpuContext::new()) {
        Ok(gpu) => Some(gpu),
        Err(e) => {
            log::warn!("No GPU available: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_semantics() {
        fn assert_clone<T: Clone + Send + Sync>() {}
        assert_clone::<GpuContext>();
    }

    #[test]
    fn test_face_size_message() {
        let err = GpuError::FaceSize {
            face: 3,
            expected: 16,
            actual: 12,
        };
        assert_eq!(err.to_string(), "cubemap face 3 holds 12 bytes, expected 16");
    }

    #[test]
    fn test_validation_scope_catches_bad_buffer() {
        let Some(gpu) = test_context() else {
            eprintln!("skipping: no GPU adapter");
            return;
        };
        // MAP_READ cannot be combined with STORAGE without a feature
        let (_buffer, error) = gpu.validation_scope(|device| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: None,
                size: 16,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });
        assert!(error.is_some());
    }
}
