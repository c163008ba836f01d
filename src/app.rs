// src/app.rs
// winit 0.30 host: owns the window and forwards input, resizes and redraws to the showroom.

use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::camera::Viewport;
use crate::catalog::CatalogEntry;
use crate::config::ShowroomConfig;
use crate::loader::{GltfModelLoader, ModelLoader};
use crate::renderer::{GpuContext, WgpuRenderer};
use crate::showroom::Showroom;

const WINDOW_TITLE: &str = "Showroom";
/// Pixels per wheel "line" for touchpads reporting pixel deltas.
const PIXELS_PER_LINE: f32 = 40.0;

#[derive(Default)]
struct DragState {
    active: bool,
    last: Option<(f64, f64)>,
}

pub struct ShowroomApp {
    gpu: GpuContext,
    config: ShowroomConfig,
    runtime: Handle,
    loader: Arc<dyn ModelLoader>,

    // Created inside the `resumed` event
    window: Option<Arc<Window>>,
    showroom: Option<Showroom<WgpuRenderer>>,

    drag: DragState,
    last_frame: Option<Instant>,
    current_entry: usize,
}

impl ShowroomApp {
    pub fn new(gpu: GpuContext, config: ShowroomConfig, runtime: Handle) -> Self {
        let loader: Arc<dyn ModelLoader> = Arc::new(GltfModelLoader::from_config(
            &config.asset_root,
            &config.decoder,
        ));
        Self {
            gpu,
            config,
            runtime,
            loader,
            window: None,
            showroom: None,
            drag: DragState::default(),
            last_frame: None,
            current_entry: 0,
        }
    }

    fn viewport(size: PhysicalSize<u32>, scale_factor: f64) -> Viewport {
        Viewport {
            width: size.width,
            height: size.height,
            scale_factor,
        }
    }

    fn model_entries(&self) -> Vec<&CatalogEntry> {
        self.config.catalog.iter().filter(|entry| entry.has_model()).collect()
    }

    /// Show the catalog entry `step` places away from the current one, wrapping around.
    fn cycle_entry(&mut self, step: isize) {
        let entries = self.model_entries();
        if entries.is_empty() {
            log::warn!("catalog has no entries with a model");
            return;
        }
        let count = entries.len() as isize;
        let next = (self.current_entry as isize + step).rem_euclid(count) as usize;
        let entry = entries[next].clone();
        self.current_entry = next;

        let Some(showroom) = self.showroom.as_mut() else { return };
        match showroom.load_entry(&entry) {
            Ok(ticket) => log::info!("Requested '{}' (load #{})", entry.title, ticket.raw()),
            Err(e) => log::warn!("cannot show '{}': {}", entry.title, e),
        }
    }

    fn create_showroom(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attrs = Window::default_attributes().with_title(WINDOW_TITLE);
        let window = Arc::new(event_loop.create_window(attrs)?);
        let viewport = Self::viewport(window.inner_size(), window.scale_factor());

        let renderer = WgpuRenderer::new(&self.gpu, window.clone(), &self.config.lighting)?;
        let mut showroom = Showroom::initialize(
            &self.config,
            renderer,
            viewport,
            Arc::clone(&self.loader),
            self.runtime.clone(),
        );

        let title_window = window.clone();
        showroom.on_loading(move |loading| {
            if loading {
                title_window.set_title(&format!("{WINDOW_TITLE} (loading...)"));
            } else {
                title_window.set_title(WINDOW_TITLE);
            }
        });

        self.window = Some(window.clone());
        self.showroom = Some(showroom);
        self.current_entry = 0;
        self.cycle_entry(0);
        window.request_redraw();
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(showroom) = self.showroom.as_mut() {
            showroom.dispose();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for ShowroomApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Poll);

        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_showroom(event_loop) {
            log::error!("Failed to start showroom: {:#}", e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.clone() else { return };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),
            WindowEvent::Resized(new_size) => {
                if let Some(showroom) = self.showroom.as_mut() {
                    showroom.resize(Self::viewport(new_size, window.scale_factor()));
                }
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::debug!("Scale factor changed: {}", scale_factor);
                if let Some(showroom) = self.showroom.as_mut() {
                    showroom.resize(Self::viewport(window.inner_size(), scale_factor));
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.drag.active = state == ElementState::Pressed;
                if !self.drag.active {
                    self.drag.last = None;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let current = (position.x, position.y);
                if self.drag.active {
                    if let (Some((x, y)), Some(controls)) = (
                        self.drag.last,
                        self.showroom.as_mut().and_then(|s| s.controls_mut()),
                    ) {
                        controls.drag((current.0 - x) as f32, (current.1 - y) as f32);
                    }
                }
                self.drag.last = Some(current);
            }
            WindowEvent::CursorLeft { .. } => {
                self.drag.last = None;
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                };
                if let Some(controls) = self.showroom.as_mut().and_then(|s| s.controls_mut()) {
                    controls.zoom(lines);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match code {
                KeyCode::ArrowRight => self.cycle_entry(1),
                KeyCode::ArrowLeft => self.cycle_entry(-1),
                KeyCode::Escape => self.shutdown(event_loop),
                _ => {}
            },
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = self
                    .last_frame
                    .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
                self.last_frame = Some(now);

                let running = self.showroom.as_mut().is_some_and(|s| s.tick(dt));
                if !running {
                    log::debug!("render loop stopped");
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let running = self.showroom.as_ref().is_some_and(|s| !s.is_disposed());
        if let (true, Some(window)) = (running, self.window.as_ref()) {
            window.request_redraw();
        }
    }
}
