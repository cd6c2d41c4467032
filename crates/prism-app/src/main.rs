// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;
mod scene;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use prism_core::{describe_chain, init_tracing, report_fatal};
use prism_platform::{drawable_size, quit_requested};
use prism_render::{FrameStatus, RenderSettings, RenderSize, Renderer, SceneDesc};
use prism_render_vk::VkRenderer;
use tracing::{debug, info, warn};

use prism_platform::winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    raw_window_handle::{HasDisplayHandle, HasWindowHandle},
    window::{Window, WindowId},
};

use config::{load_cfg, AppCfg, PresentModeCfg};
use scene::{assemble_scene, render_settings};

const ASSET_ROOT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets");

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene and renderer configuration
    #[arg(long, default_value = "prism.toml")]
    config: PathBuf,
    /// Root for relative model, texture and shader paths
    #[arg(long, default_value = ASSET_ROOT)]
    assets: PathBuf,
    /// Force Vulkan validation layers on or off
    #[arg(long)]
    validation: Option<bool>,
    /// Override the configured present mode
    #[arg(long, value_enum)]
    present_mode: Option<PresentModeCfg>,
}

struct App {
    // Declared before `window`: the surface must go before the window it targets.
    renderer: Option<VkRenderer>,
    window: Option<Window>,

    cfg: AppCfg,
    scene: SceneDesc,
    settings: RenderSettings,
    failure: Option<anyhow::Error>,

    started: Instant,
    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn new(cfg: AppCfg, scene: SceneDesc, settings: RenderSettings) -> Self {
        let now = Instant::now();
        App {
            renderer: None,
            window: None,
            cfg,
            scene,
            settings,
            failure: None,
            started: now,
            frames: 0,
            last_fps_instant: now,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.cfg.window.title.clone())
            .with_inner_size(PhysicalSize::new(
                self.cfg.window.width,
                self.cfg.window.height,
            ));
        let window = event_loop.create_window(attrs).context("create_window")?;
        let size = drawable_size(&window);
        info!("window {}x{}", size.width, size.height);

        // CPU copies are not needed once uploaded.
        let scene = std::mem::take(&mut self.scene);
        let renderer = {
            let wh = window
                .window_handle()
                .map_err(|e| anyhow!("window_handle: {e}"))?;
            let dh = window
                .display_handle()
                .map_err(|e| anyhow!("display_handle: {e}"))?;
            VkRenderer::new(&wh, &dh, size, &scene, &self.settings)
                .context("initialize renderer")?
        };

        self.started = Instant::now();
        self.last_fps_instant = self.started;
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        warn!("shutting down: {}", describe_chain(&err));
        self.failure = Some(err);
        self.shutdown(event_loop);
    }

    fn redraw(&mut self) -> Result<()> {
        let Some(renderer) = &mut self.renderer else {
            return Ok(());
        };
        match renderer.render(self.started.elapsed().as_secs_f32())? {
            FrameStatus::Presented => self.frames = self.frames.saturating_add(1),
            FrameStatus::Recreated => debug!("frame dropped for swapchain rebuild"),
            FrameStatus::Skipped => {}
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        if quit_requested(&event) {
            info!("quit requested");
            self.shutdown(event_loop);
            return;
        }

        match event {
            WindowEvent::Resized(new_size) => {
                let size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                if let Some(renderer) = &mut self.renderer {
                    if let Err(e) = renderer.resize(size) {
                        self.fail(event_loop, e);
                        return;
                    }
                }
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e.context("render frame"));
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = &self.window else {
            return;
        };

        if drawable_size(window).is_zero() {
            // Minimized: sleep until the next resize.
            event_loop.set_control_flow(ControlFlow::Wait);
            self.frames = 0;
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        window.request_redraw();

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let mut cfg = load_cfg(&args.config);
    if let Some(validation) = args.validation {
        cfg.render.validation = Some(validation);
    }
    if let Some(mode) = args.present_mode {
        cfg.render.present_mode = mode;
    }
    info!("assets = {}", args.assets.display());

    let scene = assemble_scene(&cfg, &args.assets).context("assemble scene")?;
    let settings = render_settings(&cfg, &args.assets)?;
    info!(
        "validation = {}, present = {:?}",
        settings.validation, settings.present
    );

    let event_loop: EventLoop<()> = EventLoop::new().context("create event loop")?;
    let mut app = App::new(cfg, scene, settings);
    event_loop.run_app(&mut app).context("event loop")?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_fatal(&e),
    }
}
