use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use glam::Vec3;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use compute_raytracer::camera::Camera;
use compute_raytracer::cli::Cli;
use compute_raytracer::config::RenderConfig;
use compute_raytracer::core::frame_loop::{FrameLoop, LoopState};
use compute_raytracer::core::gpu_context::GpuContext;
use compute_raytracer::core::input_adapter::WinitInput;
use compute_raytracer::core::present::SurfaceTarget;

struct App {
    config: RenderConfig,
    window: Option<Arc<Window>>,
    frame_loop: Option<FrameLoop<SurfaceTarget>>,
    input: WinitInput,
}

impl App {
    fn new(config: RenderConfig) -> Self {
        Self {
            config,
            window: None,
            frame_loop: None,
            input: WinitInput::new(),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window = Arc::new(
            event_loop.create_window(
                Window::default_attributes()
                    .with_title("Compute Ray Tracer")
                    .with_inner_size(winit::dpi::PhysicalSize::new(
                        self.config.width,
                        self.config.height,
                    )),
            )?,
        );

        let (gpu, surface) = pollster::block_on(GpuContext::for_window(window.clone()))
            .context("GPU initialisation failed")?;
        let size = window.inner_size();
        let target = SurfaceTarget::new(&gpu, surface, size.width, size.height, self.config.vsync);
        let camera = Camera::new(
            Vec3::from_array(self.config.camera_position),
            self.config.camera,
        );
        let frame_loop =
            FrameLoop::new(&gpu, &self.config.frame_loop_options(), camera, target)?;

        self.window = Some(window);
        self.frame_loop = Some(frame_loop);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(frame_loop) = self.frame_loop.take() {
            frame_loop.shutdown();
        }
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                log::error!("Failed to initialize: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        self.input.process_event(&event);

        match event {
            WindowEvent::Resized(size) => {
                if let Some(frame_loop) = &mut self.frame_loop {
                    frame_loop.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let state = match &mut self.frame_loop {
                    Some(frame_loop) => frame_loop.step(&mut self.input),
                    None => LoopState::Shutdown,
                };
                if state == LoopState::Shutdown {
                    self.shutdown(event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = RenderConfig::from_cli(&cli)?;
    log::info!(
        "Rendering {}x{} with {}x{} work-groups, shaders from {}",
        config.width,
        config.height,
        config.workgroup_size,
        config.workgroup_size,
        config.shader_dir.display()
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);

    log::info!("Controls: WASD or arrow keys to move, mouse to look, Escape to quit");
    event_loop.run_app(&mut app)?;

    Ok(())
}
