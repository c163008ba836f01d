// src/showroom.rs
//! Scene orchestrator: owns the showroom scene, sequences model loads and drives the render loop.
//!
//! All scene mutation happens on the thread that owns [`Showroom`]. Loads run on tokio's blocking
//! pool and report back over a channel; completions are applied only from [`Showroom::tick`] and
//! [`Showroom::finish_pending_loads`].

use std::sync::Arc;

use glam::Vec3;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::camera::{PerspectiveCamera, Viewport};
use crate::camera_controller::OrbitController;
use crate::catalog::{CatalogEntry, ModelProfile, ModelRules};
use crate::classifier::{classify, SurfaceClass};
use crate::config::{ShowroomConfig, SupersedePolicy};
use crate::error::{Error, Result};
use crate::lighting::{showroom_rig, Environment};
use crate::loader::ModelLoader;
use crate::materials::{MaterialRef, MaterialSet};
use crate::scene::{NodeId, SceneGraph, SceneNode};

/// Everything a backend needs to draw one frame.
pub struct RenderFrame<'a> {
    pub camera: &'a PerspectiveCamera,
    pub graph: &'a SceneGraph,
    pub frame_index: u64,
}

/// Drawing surface the orchestrator renders into.
pub trait RenderBackend {
    fn render(&mut self, frame: &RenderFrame<'_>) -> anyhow::Result<()>;
    fn resize(&mut self, viewport: Viewport);
    /// Release GPU resources. Called once, from [`Showroom::dispose`].
    fn dispose(&mut self);
}

/// Identifies one `load_model` request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Render loop handle; once stopped it never restarts.
#[derive(Debug, Default)]
pub struct RenderLoop {
    running: bool,
    frames: u64,
}

impl RenderLoop {
    fn start(&mut self) {
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Scene-side state, created by `initialize` and torn down by `dispose`.
pub struct SceneState<B: RenderBackend> {
    pub graph: SceneGraph,
    pub camera: PerspectiveCamera,
    pub controls: OrbitController,
    pub active_model: Option<NodeId>,
    pub render_loop: RenderLoop,
    pub renderer: B,
    pub materials: MaterialSet,
}

struct LoadCompletion {
    ticket: LoadTicket,
    locator: String,
    profile: ModelProfile,
    result: Result<SceneNode>,
}

pub struct Showroom<B: RenderBackend> {
    state: Option<SceneState<B>>,
    rules: ModelRules,
    policy: SupersedePolicy,
    loader: Arc<dyn ModelLoader>,
    runtime: Handle,
    completions_tx: UnboundedSender<LoadCompletion>,
    completions_rx: UnboundedReceiver<LoadCompletion>,
    next_ticket: u64,
    latest_ticket: Option<LoadTicket>,
    in_flight: usize,
    on_loading: Option<Box<dyn FnMut(bool)>>,
    last_error: Option<Error>,
}

impl<B: RenderBackend> Showroom<B> {
    /// Build the scene, camera, controls and lighting rig and start the render loop.
    pub fn initialize(
        config: &ShowroomConfig,
        mut renderer: B,
        viewport: Viewport,
        loader: Arc<dyn ModelLoader>,
        runtime: Handle,
    ) -> Self {
        let mut graph = SceneGraph::new();
        for node in showroom_rig(&config.lighting) {
            graph.attach(node);
        }
        graph.environment = Some(Environment::room(config.lighting.environment_intensity));

        let mut camera = PerspectiveCamera::new(&config.camera, viewport.aspect());
        let controls = OrbitController::new(&camera, config.controls.clone());
        controls.apply(&mut camera);
        renderer.resize(viewport);

        let mut render_loop = RenderLoop::default();
        render_loop.start();

        let (completions_tx, completions_rx) = unbounded_channel();
        log::info!(
            "Showroom initialized ({}x{}, {} scene nodes, supersede policy {:?})",
            viewport.width,
            viewport.height,
            graph.top_level_count(),
            config.supersede
        );

        Self {
            state: Some(SceneState {
                graph,
                camera,
                controls,
                active_model: None,
                render_loop,
                renderer,
                materials: MaterialSet::new(),
            }),
            rules: ModelRules::new(&config.models),
            policy: config.supersede,
            loader,
            runtime,
            completions_tx,
            completions_rx,
            next_ticket: 1,
            latest_ticket: None,
            in_flight: 0,
            on_loading: None,
            last_error: None,
        }
    }

    /// Register the loading-state callback; it receives `true` when a load starts and `false`
    /// when it finishes, successful or not.
    pub fn on_loading<F: FnMut(bool) + 'static>(&mut self, callback: F) {
        self.on_loading = Some(Box::new(callback));
    }

    /// Replace the displayed model with the asset at `asset_path`.
    ///
    /// The current model is detached immediately and stays detached if the load fails.
    /// Failures are logged and kept in [`Showroom::last_error`]; they are never returned.
    pub fn load_model(&mut self, asset_path: &str) -> LoadTicket {
        let profile = self.rules.profile_for_path(asset_path);
        self.start_load(asset_path, profile)
    }

    /// Load a catalog entry's model, keyed by the entry id. Entries without a model are refused
    /// before anything is touched.
    pub fn load_entry(&mut self, entry: &CatalogEntry) -> Result<LoadTicket> {
        let path = entry
            .model_asset_path
            .as_deref()
            .ok_or_else(|| Error::NoModelAsset {
                id: entry.id.clone(),
            })?;
        let profile = self.rules.profile(&entry.id);
        Ok(self.start_load(path, profile))
    }

    fn start_load(&mut self, locator: &str, profile: ModelProfile) -> LoadTicket {
        let ticket = LoadTicket(self.next_ticket);
        self.next_ticket += 1;

        let Some(state) = self.state.as_mut() else {
            log::warn!("load of {} ignored: showroom disposed", locator);
            return ticket;
        };
        if let Some(previous) = state.active_model.take() {
            state.graph.detach(previous);
        }

        self.set_loading(true);
        self.latest_ticket = Some(ticket);
        self.in_flight += 1;
        log::debug!(
            "load #{} {} (identifier '{}', scale {})",
            ticket.raw(),
            locator,
            profile.identifier,
            profile.scale
        );

        let loader = Arc::clone(&self.loader);
        let tx = self.completions_tx.clone();
        let locator = locator.to_string();
        self.runtime.spawn(async move {
            let task_locator = locator.clone();
            let result = match tokio::task::spawn_blocking(move || loader.load(&task_locator)).await {
                Ok(result) => result,
                Err(join_error) => Err(Error::invalid(
                    locator.as_str(),
                    format!("loader task failed: {join_error}"),
                )),
            };
            // Receiver gone means the showroom was dropped.
            let _ = tx.send(LoadCompletion {
                ticket,
                locator,
                profile,
                result,
            });
        });
        ticket
    }

    /// One render-loop step: apply finished loads, advance the controls, draw.
    /// Returns `false` once the showroom has been disposed.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.state.is_none() {
            return false;
        }
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply_completion(completion);
        }

        let Some(state) = self.state.as_mut() else {
            return false;
        };
        if !state.render_loop.is_running() {
            return false;
        }
        if state.controls.update(dt) {
            state.controls.apply(&mut state.camera);
        }

        let frame = RenderFrame {
            camera: &state.camera,
            graph: &state.graph,
            frame_index: state.render_loop.frames,
        };
        if let Err(e) = state.renderer.render(&frame) {
            log::warn!("frame {} not rendered: {:#}", frame.frame_index, e);
        }
        state.render_loop.frames += 1;
        true
    }

    /// Wait for every in-flight load and apply it.
    pub async fn finish_pending_loads(&mut self) {
        while self.in_flight > 0 {
            match self.completions_rx.recv().await {
                Some(completion) => self.apply_completion(completion),
                None => break,
            }
        }
    }

    fn apply_completion(&mut self, completion: LoadCompletion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let LoadCompletion {
            ticket,
            locator,
            profile,
            result,
        } = completion;

        let Some(state) = self.state.as_mut() else {
            log::debug!("dropping load #{} of {}: showroom disposed", ticket.raw(), locator);
            return;
        };
        let superseded = self.policy == SupersedePolicy::LatestRequestWins
            && self.latest_ticket != Some(ticket);

        match result {
            Ok(model) if superseded => {
                log::debug!(
                    "discarding {} ({} meshes): superseded by a newer request",
                    locator,
                    model.mesh_count()
                );
            }
            Ok(model) => {
                let model = prepare_model(model, &profile, &state.materials);
                if let Some(previous) = state.active_model.take() {
                    state.graph.detach(previous);
                }
                let meshes = model.mesh_count();
                let id = state.graph.attach(model);
                state.active_model = Some(id);
                log::info!("Showing {} ({} meshes)", locator, meshes);
            }
            Err(e) if superseded => {
                log::warn!("superseded load of {} failed: {}", locator, e);
            }
            Err(e) => {
                let stage = if e.is_fetch() {
                    "fetch"
                } else if e.is_decode() {
                    "decode"
                } else {
                    "load"
                };
                log::error!("Failed to {} model {}: {}", stage, locator, e);
                self.last_error = Some(e);
            }
        }
        self.set_loading(false);
    }

    fn set_loading(&mut self, loading: bool) {
        if let Some(callback) = self.on_loading.as_mut() {
            callback(loading);
        }
    }

    /// Recompute the camera aspect and resize the renderer output.
    pub fn resize(&mut self, viewport: Viewport) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if viewport.is_empty() {
            log::debug!("ignoring zero-sized viewport");
            return;
        }
        state.camera.set_aspect(viewport.aspect());
        state.renderer.resize(viewport);
    }

    /// Stop the render loop and release renderer resources. In-flight loads are not cancelled;
    /// their completions are dropped.
    pub fn dispose(&mut self) {
        let Some(mut state) = self.state.take() else {
            log::warn!("dispose called on an already disposed showroom");
            return;
        };
        state.render_loop.stop();
        state.renderer.dispose();
        log::info!(
            "Showroom disposed after {} frames ({} loads still in flight)",
            state.render_loop.frames(),
            self.in_flight
        );
    }

    pub fn controls_mut(&mut self) -> Option<&mut OrbitController> {
        self.state.as_mut().map(|state| &mut state.controls)
    }

    pub fn scene(&self) -> Option<&SceneState<B>> {
        self.state.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.is_none()
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn active_model(&self) -> Option<NodeId> {
        self.state.as_ref().and_then(|state| state.active_model)
    }

    pub fn active_model_node(&self) -> Option<&SceneNode> {
        let state = self.state.as_ref()?;
        state.graph.get(state.active_model?)
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn frame_count(&self) -> u64 {
        self.state
            .as_ref()
            .map_or(0, |state| state.render_loop.frames())
    }
}

/// Apply showroom rules to a freshly decoded model: surface swaps for paintable assets,
/// shadows on every mesh, unit scale and ground placement.
pub fn prepare_model(mut model: SceneNode, profile: &ModelProfile, materials: &MaterialSet) -> SceneNode {
    let body = materials.body(profile.paint);
    let mut swapped = 0usize;
    model.for_each_mesh_mut(&mut |name, mesh| {
        if profile.paintable {
            let surface = match classify(name, mesh.material.name()) {
                SurfaceClass::Body => Some(body),
                SurfaceClass::Glass => Some(&materials.glass),
                SurfaceClass::Trim => Some(&materials.trim),
                SurfaceClass::Unchanged => None,
            };
            if let Some(surface) = surface {
                mesh.material = MaterialRef::Surface(Arc::clone(surface));
                swapped += 1;
            }
        }
        mesh.cast_shadow = true;
        mesh.receive_shadow = true;
    });
    if profile.paintable {
        log::debug!("{}: {} surfaces swapped", profile.identifier, swapped);
    }

    model.transform.scale = Vec3::splat(profile.scale);
    model.transform.translation = Vec3::new(0.0, profile.ground_offset, 0.0);
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_catalog;
    use crate::materials::AuthoredMaterial;
    use crate::scene::{Aabb, Geometry, GeometrySource, Mesh, NodeKind};
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Nodes the lighting rig attaches (4 lights + ground).
    const RIG_NODES: usize = 5;

    #[derive(Default)]
    struct BackendLog {
        frames: u64,
        meshes_last_frame: usize,
        resizes: Vec<Viewport>,
        disposed: usize,
    }

    struct RecordingBackend(Arc<Mutex<BackendLog>>);

    impl RenderBackend for RecordingBackend {
        fn render(&mut self, frame: &RenderFrame<'_>) -> anyhow::Result<()> {
            let mut log = self.0.lock();
            log.frames += 1;
            log.meshes_last_frame = frame.graph.draw_items().len();
            Ok(())
        }

        fn resize(&mut self, viewport: Viewport) {
            self.0.lock().resizes.push(viewport);
        }

        fn dispose(&mut self) {
            self.0.lock().disposed += 1;
        }
    }

    /// Builds a small car for any locator; `missing` locators fail, delayed ones sleep first.
    #[derive(Default)]
    struct StubLoader {
        delays_ms: HashMap<String, u64>,
        calls: AtomicUsize,
    }

    fn part(name: &str, material: &str) -> SceneNode {
        let geometry = Arc::new(Geometry::cuboid(
            Aabb {
                min: Vec3::splat(-0.5),
                max: Vec3::splat(0.5),
            },
            GeometrySource::Decoded,
        ));
        let material = MaterialRef::Authored(Arc::new(AuthoredMaterial {
            name: material.to_string(),
            ..AuthoredMaterial::default()
        }));
        SceneNode::mesh(name, Mesh::new(geometry, material))
    }

    impl ModelLoader for StubLoader {
        fn load(&self, locator: &str) -> Result<SceneNode> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(ms) = self.delays_ms.get(locator) {
                std::thread::sleep(Duration::from_millis(*ms));
            }
            if locator.contains("missing") {
                return Err(Error::Fetch {
                    locator: locator.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such asset"),
                });
            }
            Ok(SceneNode::group(
                crate::catalog::identifier_from_path(locator),
                vec![
                    part("Body_Main", "CarPaint_Red"),
                    part("Window_Front", "Glass_Clear"),
                    part("Chrome_Grill", "Metal"),
                    part("Seat_Driver", "Red_Leather"),
                    part("Wheel_FL", "Rubber"),
                ],
            ))
        }
    }

    struct Harness {
        showroom: Showroom<RecordingBackend>,
        backend: Arc<Mutex<BackendLog>>,
        loading: Arc<Mutex<Vec<bool>>>,
        loader: Arc<StubLoader>,
    }

    fn harness_with(policy: SupersedePolicy, loader: StubLoader) -> Harness {
        let config = ShowroomConfig {
            supersede: policy,
            ..ShowroomConfig::default()
        };
        let backend = Arc::new(Mutex::new(BackendLog::default()));
        let loader = Arc::new(loader);
        let mut showroom = Showroom::initialize(
            &config,
            RecordingBackend(backend.clone()),
            Viewport::new(1280, 720),
            loader.clone(),
            Handle::current(),
        );
        let loading = Arc::new(Mutex::new(Vec::new()));
        let sink = loading.clone();
        showroom.on_loading(move |flag| sink.lock().push(flag));
        Harness {
            showroom,
            backend,
            loading,
            loader,
        }
    }

    fn harness() -> Harness {
        harness_with(SupersedePolicy::LatestRequestWins, StubLoader::default())
    }

    fn delayed(locator: &str, ms: u64) -> StubLoader {
        StubLoader {
            delays_ms: HashMap::from([(locator.to_string(), ms)]),
            ..StubLoader::default()
        }
    }

    fn mesh<'a>(node: &'a SceneNode, name: &str) -> &'a Mesh {
        node.children()
            .iter()
            .find_map(|child| match &child.kind {
                NodeKind::Mesh(mesh) if child.name == name => Some(mesh),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no mesh {name}"))
    }

    #[tokio::test]
    async fn initialize_builds_rig_and_starts_loop() {
        let mut h = harness();
        let scene = h.showroom.scene().unwrap();
        assert_eq!(scene.graph.top_level_count(), RIG_NODES);
        assert!(scene.graph.environment.is_some());
        assert!(scene.render_loop.is_running());
        assert!(h.showroom.active_model().is_none());

        assert!(h.showroom.tick(1.0 / 60.0));
        assert_eq!(h.backend.lock().frames, 1);
        assert_eq!(h.backend.lock().meshes_last_frame, 1); // ground only
    }

    #[tokio::test]
    async fn successful_load_attaches_prepared_model() {
        let mut h = harness();
        h.showroom.load_model("/models/gallardo.glb");
        assert!(h.showroom.is_loading());
        h.showroom.finish_pending_loads().await;

        assert_eq!(*h.loading.lock(), vec![true, false]);
        assert!(!h.showroom.is_loading());
        let model = h.showroom.active_model_node().expect("model attached");
        assert_eq!(model.name, "gallardo");
        assert_eq!(model.transform.scale, Vec3::splat(100.0));
        assert_eq!(model.transform.translation.y, 0.0);

        h.showroom.tick(1.0 / 60.0);
        assert_eq!(h.backend.lock().meshes_last_frame, 1 + 5);
    }

    #[tokio::test]
    async fn paintable_models_get_showroom_surfaces() {
        let mut h = harness();
        h.showroom.load_model("/models/gallardo.glb");
        h.showroom.finish_pending_loads().await;

        let scene = h.showroom.scene().unwrap();
        let materials = &scene.materials;
        let model = h.showroom.active_model_node().unwrap();
        assert!(mesh(model, "Body_Main").material.is_surface(&materials.body_primary));
        assert!(mesh(model, "Window_Front").material.is_surface(&materials.glass));
        assert!(mesh(model, "Chrome_Grill").material.is_surface(&materials.trim));
        assert_eq!(mesh(model, "Seat_Driver").material.name(), "Red_Leather");
        assert_eq!(mesh(model, "Wheel_FL").material.name(), "Rubber");
        for child in model.children() {
            let NodeKind::Mesh(m) = &child.kind else { continue };
            assert!(m.cast_shadow && m.receive_shadow);
        }
    }

    #[tokio::test]
    async fn alternate_paint_and_non_paintable_models() {
        let mut h = harness();
        h.showroom.load_model("/models/mustang.glb");
        h.showroom.finish_pending_loads().await;
        {
            let materials = &h.showroom.scene().unwrap().materials;
            let model = h.showroom.active_model_node().unwrap();
            assert!(mesh(model, "Body_Main").material.is_surface(&materials.body_alternate));
            assert_eq!(model.transform.scale, Vec3::ONE);
        }

        h.showroom.load_model("/models/ferrari.glb");
        h.showroom.finish_pending_loads().await;
        let model = h.showroom.active_model_node().unwrap();
        assert_eq!(mesh(model, "Body_Main").material.name(), "CarPaint_Red");
        assert!(mesh(model, "Body_Main").cast_shadow);
    }

    #[tokio::test]
    async fn repeated_loads_keep_one_active_model() {
        let mut h = harness();
        for path in ["/models/gallardo.glb", "/models/porsche911.glb", "/models/gallardo.glb"] {
            h.showroom.load_model(path);
            h.showroom.finish_pending_loads().await;
            assert_eq!(h.showroom.scene().unwrap().graph.top_level_count(), RIG_NODES + 1);
        }
        assert_eq!(h.loading.lock().len(), 6);
        assert_eq!(h.showroom.active_model_node().unwrap().name, "gallardo");
    }

    #[tokio::test]
    async fn failed_load_leaves_previous_model_detached() {
        let mut h = harness();
        h.showroom.load_model("/models/gallardo.glb");
        h.showroom.finish_pending_loads().await;
        assert!(h.showroom.active_model().is_some());

        h.showroom.load_model("/models/missing.glb");
        // detach happens before the load resolves
        assert!(h.showroom.active_model().is_none());
        h.showroom.finish_pending_loads().await;

        assert_eq!(*h.loading.lock(), vec![true, false, true, false]);
        assert!(h.showroom.active_model().is_none());
        assert_eq!(h.showroom.scene().unwrap().graph.top_level_count(), RIG_NODES);
        let err = h.showroom.last_error().expect("error recorded");
        assert!(err.is_fetch());
        assert_eq!(err.locator(), Some("/models/missing.glb"));
        assert!(h.showroom.tick(0.016));
    }

    #[tokio::test]
    async fn latest_request_wins_by_default() {
        let mut h = harness_with(
            SupersedePolicy::LatestRequestWins,
            delayed("/models/gallardo.glb", 150),
        );
        let first = h.showroom.load_model("/models/gallardo.glb");
        let second = h.showroom.load_model("/models/porsche911.glb");
        assert!(second > first);
        h.showroom.finish_pending_loads().await;

        assert_eq!(*h.loading.lock(), vec![true, true, false, false]);
        assert_eq!(h.showroom.active_model_node().unwrap().name, "porsche911");
        assert_eq!(h.showroom.scene().unwrap().graph.top_level_count(), RIG_NODES + 1);
    }

    #[tokio::test]
    async fn superseded_failure_pairs_loading_and_keeps_no_error() {
        let mut h = harness_with(
            SupersedePolicy::LatestRequestWins,
            delayed("/models/missing.glb", 150),
        );
        h.showroom.load_model("/models/missing.glb");
        h.showroom.load_model("/models/gallardo.glb");
        h.showroom.finish_pending_loads().await;

        assert_eq!(*h.loading.lock(), vec![true, true, false, false]);
        assert!(h.showroom.last_error().is_none());
        assert_eq!(h.showroom.active_model_node().unwrap().name, "gallardo");
        assert_eq!(h.loader.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn last_completion_wins_when_configured() {
        let mut h = harness_with(
            SupersedePolicy::LastCompletionWins,
            delayed("/models/gallardo.glb", 150),
        );
        h.showroom.load_model("/models/gallardo.glb");
        h.showroom.load_model("/models/porsche911.glb");
        h.showroom.finish_pending_loads().await;

        assert_eq!(h.showroom.active_model_node().unwrap().name, "gallardo");
        assert_eq!(h.showroom.scene().unwrap().graph.top_level_count(), RIG_NODES + 1);
    }

    #[tokio::test]
    async fn dispose_stops_rendering_and_is_idempotent() {
        let mut h = harness();
        assert!(h.showroom.tick(0.016));
        h.showroom.dispose();
        assert!(!h.showroom.tick(0.016));
        assert!(!h.showroom.tick(0.016));
        assert_eq!(h.backend.lock().frames, 1);
        assert_eq!(h.backend.lock().disposed, 1);

        h.showroom.dispose();
        assert_eq!(h.backend.lock().disposed, 1);
        assert!(h.showroom.is_disposed());
        assert!(h.showroom.controls_mut().is_none());
    }

    #[tokio::test]
    async fn completion_after_dispose_is_dropped() {
        let mut h = harness_with(
            SupersedePolicy::LatestRequestWins,
            delayed("/models/gallardo.glb", 50),
        );
        h.showroom.load_model("/models/gallardo.glb");
        h.showroom.dispose();
        h.showroom.finish_pending_loads().await;

        assert_eq!(*h.loading.lock(), vec![true]);
        assert!(h.showroom.active_model().is_none());
        assert!(!h.showroom.is_loading());
        assert_eq!(h.backend.lock().frames, 0);
    }

    #[tokio::test]
    async fn entries_without_models_never_load() {
        let mut h = harness();
        let jetta = builtin_catalog()
            .into_iter()
            .find(|entry| entry.id == "jetta")
            .unwrap();
        let err = h.showroom.load_entry(&jetta).unwrap_err();
        assert!(matches!(err, Error::NoModelAsset { ref id } if id == "jetta"));
        assert!(h.loading.lock().is_empty());
        assert_eq!(h.loader.calls.load(Ordering::SeqCst), 0);
        assert!(!h.showroom.is_loading());
    }

    #[tokio::test]
    async fn entries_load_by_catalog_id() {
        let mut h = harness();
        let gallardo = builtin_catalog()
            .into_iter()
            .find(|entry| entry.id == "gallardo")
            .unwrap();
        h.showroom.load_entry(&gallardo).unwrap();
        h.showroom.finish_pending_loads().await;
        assert_eq!(
            h.showroom.active_model_node().unwrap().transform.scale,
            Vec3::splat(100.0)
        );
        assert_eq!(h.loader.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tick_applies_completions_without_blocking() {
        let mut h = harness();
        h.showroom.load_model("/models/porsche911.glb");
        for _ in 0..200 {
            h.showroom.tick(0.016);
            if h.showroom.active_model().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(h.showroom.active_model().is_some());
        assert_eq!(*h.loading.lock(), vec![true, false]);
    }

    #[tokio::test]
    async fn resize_updates_camera_and_backend() {
        let mut h = harness();
        h.showroom.resize(Viewport::new(800, 400));
        h.showroom.resize(Viewport::new(0, 400));
        let scene = h.showroom.scene().unwrap();
        assert!((scene.camera.aspect - 2.0).abs() < 1e-6);
        // initialize + one real resize
        assert_eq!(h.backend.lock().resizes.len(), 2);
    }

    #[tokio::test]
    async fn orbit_input_moves_camera_on_tick() {
        let mut h = harness();
        let before = h.showroom.scene().unwrap().camera.position;
        h.showroom.controls_mut().unwrap().rotate(0.4, 0.0);
        h.showroom.tick(0.1);
        assert_ne!(h.showroom.scene().unwrap().camera.position, before);
    }
}
