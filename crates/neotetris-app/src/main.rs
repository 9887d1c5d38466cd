// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::Parser;
use neotetris_core::{component_span, init_tracing, load_config};
use neotetris_platform::{drawable_size, settle, window_attributes};
use neotetris_render::{RenderSize, Renderer};
use neotetris_render_vk::VkRenderer;
use std::path::PathBuf;
use tracing::{error, info};

use neotetris_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

mod config;

use config::AppCfg;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config; missing file means defaults
    #[arg(long, default_value = "neotetris.toml")]
    config: PathBuf,
    /// Exit after this many presented frames (at least 1)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    frames: Option<u64>,
    /// Also accept integrated GPUs
    #[arg(long)]
    allow_integrated: bool,
}

struct App {
    cfg: AppCfg,
    frame_limit: Option<u64>,

    // Renderer first so it drops before the window it draws into.
    renderer: Option<VkRenderer>,
    window: Option<Window>,
    render_size: RenderSize,

    exiting: bool,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(cfg: AppCfg, frame_limit: Option<u64>) -> Self {
        App {
            cfg,
            frame_limit,
            renderer: None,
            window: None,
            render_size: RenderSize {
                width: 0,
                height: 0,
            },
            exiting: false,
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let wcfg = &self.cfg.window;
        let window = event_loop
            .create_window(window_attributes(&wcfg.title, wcfg.width, wcfg.height))
            .context("creating window")?;
        settle(wcfg.settle());

        let (width, height) = drawable_size(&window);
        self.render_size = RenderSize { width, height };
        let renderer = VkRenderer::new(&window, &window, self.render_size, &self.cfg.render)
            .context("initialising the vulkan renderer")?;

        info!("window {}x{} ready", width, height);
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        self.shutdown(event_loop);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if self.window.is_some() || self.exiting {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e);
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

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                self.render_size = RenderSize {
                    width: new_size.width,
                    height: new_size.height,
                };
                info!(
                    "resized to {}x{}",
                    self.render_size.width, self.render_size.height
                );
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                if let Err(e) = renderer.resize(self.render_size) {
                    self.fail(event_loop, e.context("resizing swap chain"));
                }
            }

            WindowEvent::RedrawRequested => {
                if self.exiting {
                    return;
                }
                let Some(renderer) = self.renderer.as_mut() else {
                    return;
                };
                let drawn = renderer.render().map(|()| renderer.frames());
                match drawn {
                    Ok(frames) if self.frame_limit.is_some_and(|n| frames >= n) => {
                        info!("presented {frames} frames, exiting");
                        self.shutdown(event_loop);
                    }
                    Ok(_) => {}
                    Err(e) => self.fail(event_loop, e.context("drawing frame")),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.exiting || self.render_size.is_empty() {
            return;
        }
        // FIFO presentation paces the loop.
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let _span = component_span("neotetris").entered();

    let mut cfg: AppCfg = load_config(&args.config)?;
    if args.allow_integrated {
        cfg.allow_integrated();
    }

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg, args.frames);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => {
            info!("exiting");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_limit_must_be_positive() {
        assert!(Args::try_parse_from(["neotetris", "--frames", "0"]).is_err());

        let args = Args::try_parse_from(["neotetris", "--frames", "1"]).unwrap();
        assert_eq!(args.frames, Some(1));
    }

    #[test]
    fn defaults_without_flags() {
        let args = Args::try_parse_from(["neotetris"]).unwrap();
        assert_eq!(args.config, PathBuf::from("neotetris.toml"));
        assert_eq!(args.frames, None);
        assert!(!args.allow_integrated);
    }
}
