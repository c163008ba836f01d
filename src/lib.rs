// src/lib.rs
//! Interactive 3D vehicle showroom: glTF models on a lit stage with orbit controls, paint and
//! glass surface swaps, and supersede-aware asynchronous model loading.

pub mod app;
pub mod camera;
pub mod camera_controller;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod error;
pub mod lighting;
pub mod loader;
pub mod materials;
pub mod renderer;
pub mod scene;
pub mod showroom;

pub use catalog::{builtin_catalog, CatalogEntry, ModelRules};
pub use config::{ShowroomConfig, SupersedePolicy};
pub use error::{Error, Result};
pub use loader::{GltfModelLoader, ModelLoader};
pub use showroom::{LoadTicket, RenderBackend, Showroom};

use winit::event_loop::EventLoop;

use crate::app::ShowroomApp;
use crate::renderer::GpuContext;

/// Open the showroom window and run until it is closed. Model loads are scheduled on `runtime`.
pub fn run_native(config: ShowroomConfig, runtime: tokio::runtime::Handle) -> anyhow::Result<()> {
    let event_loop = EventLoop::new()?;

    // Request the adapter before winit's loop takes over; the surface comes later in `resumed`.
    let gpu = pollster::block_on(GpuContext::new())?;

    let mut app = ShowroomApp::new(gpu, config, runtime);
    event_loop.run_app(&mut app)?;
    Ok(())
}
