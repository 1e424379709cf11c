//! Viewer runtime.
//!
//! [`Viewer`] owns the scene graph, the GPU-backed resources, the camera
//! rig and the render surface, and drives them from host events:
//!
//! - model load / replace with a generation guard against stale decodes
//! - camera framing, focus and reset
//! - Orbit / Pan / Zoom interaction modes
//! - hover picking with floor highlighting
//! - the per-frame update + redraw, screenshots and resizes
//!
//! Everything runs on the host's thread. Decoding happens elsewhere (see
//! [`LoadBackend`]); its events are applied in [`Viewer::poll_loads`].

mod hover;
mod lifecycle;
pub mod modes;

pub use lifecycle::{LoadOutcome, ResetOutcome};
pub use modes::InteractionMode;

use crate::assets::{AssetError, DecodeWorker, GltfDecoder, LoadBackend, ModelSource};
use crate::config::ViewerConfig;
use crate::render::camera::{self, CameraPose, OrbitController, PerspectiveCamera, PointerButton};
use crate::render::highlight::{HighlightStyle, MaterialBindings};
use crate::render::lights::LightRig;
use crate::render::pick::SurfaceRect;
use crate::render::resources::ResourceRegistry;
use crate::render::{encode_png, Frame, RenderError, RenderSurface};
use crate::scene::floors::FloorCatalog;
use crate::scene::{NodeId, SceneGraph};
use crate::ui::{BrowserList, ViewerPorts};
use glam::{Vec2, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("failed to decode model: {0}")]
    Decode(#[from] AssetError),
    #[error("decoded {model} but it contains no scene")]
    EmptyScene { model: String },
    #[error("no render surface was provided")]
    MissingHostSurface,
    #[error("screenshot failed: {0}")]
    Screenshot(#[from] RenderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading { generation: u64 },
    Attached,
    LoadFailed,
}

/// Per-instance runtime state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    /// The attached model root, at most one at a time.
    pub root: Option<NodeId>,
    /// Most recently requested source, kept for reset-without-reload.
    pub last_source: Option<ModelSource>,
    pub mode: InteractionMode,
    /// Set iff a floor group is highlighted.
    pub hovered_key: Option<String>,
    pub load: LoadState,
}

impl Default for ViewerState {
    fn default() -> Self {
        Self {
            root: None,
            last_source: None,
            mode: InteractionMode::Orbit,
            hovered_key: None,
            load: LoadState::Idle,
        }
    }
}

/// Construction inputs. `surface` is mandatory; everything in `ports` is
/// optional.
pub struct ViewerParts {
    pub surface: Option<RenderSurface>,
    pub loader: Box<dyn LoadBackend>,
    pub ports: ViewerPorts,
    pub config: ViewerConfig,
    pub floors: FloorCatalog,
}

impl ViewerParts {
    /// glTF decoding on background threads, default config, no ports.
    pub fn new(surface: RenderSurface) -> Self {
        Self {
            surface: Some(surface),
            loader: Box::new(DecodeWorker::new(Arc::new(GltfDecoder::new()))),
            ports: ViewerPorts::default(),
            config: ViewerConfig::default(),
            floors: FloorCatalog::default(),
        }
    }
}

pub struct Viewer {
    config: ViewerConfig,
    graph: SceneGraph,
    resources: ResourceRegistry,
    surface: RenderSurface,
    camera: PerspectiveCamera,
    controls: OrbitController,
    lights: LightRig,
    background: [u8; 3],
    bindings: MaterialBindings,
    style: HighlightStyle,
    floors: FloorCatalog,
    /// Mesh node -> (floor key, floor group node), rebuilt per attach.
    floor_index: HashMap<NodeId, (String, NodeId)>,
    loader: Box<dyn LoadBackend>,
    ports: ViewerPorts,
    state: ViewerState,
    generation: u64,
    load_started: Option<Instant>,
}

impl Viewer {
    pub fn new(parts: ViewerParts) -> Result<Self, ViewerError> {
        let ViewerParts {
            surface,
            loader,
            ports,
            config,
            floors,
        } = parts;
        let surface = surface.ok_or(ViewerError::MissingHostSurface)?;

        let mut camera = PerspectiveCamera::new(
            config.fov_deg,
            surface.aspect(),
            config.initial_near,
            config.initial_far,
        );
        camera.position = Vec3::from(config.initial_camera);
        camera.look_at = Vec3::ZERO;

        let mut controls = OrbitController::new(&camera);
        controls.enable_damping = true;
        controls.damping_factor = config.damping_factor;
        controls.screen_space_panning = config.screen_space_panning;
        controls.set_distance_limits(camera.near, camera.far);
        controls.update(&mut camera);
        controls.save_state(&camera);

        let missing = ports.missing();
        if !missing.is_empty() {
            log::debug!("UI ports not provided (features disabled): {}", missing.join(", "));
        }

        let mut viewer = Self {
            background: config.background_rgb(),
            style: config.highlight_style(),
            config,
            graph: SceneGraph::new(),
            resources: ResourceRegistry::new(),
            surface,
            camera,
            controls,
            lights: LightRig::default(),
            bindings: MaterialBindings::new(),
            floors,
            floor_index: HashMap::new(),
            loader,
            ports,
            state: ViewerState::default(),
            generation: 0,
            load_started: None,
        };
        viewer.set_mode(InteractionMode::Orbit);
        viewer.hide_loader();
        viewer.refresh_status_table();
        Ok(viewer)
    }

    // ====================================================================
    // Camera
    // ====================================================================

    /// Frame `node` with `margin` and move the key light along. `None` if the
    /// node does not exist.
    pub fn fit(&mut self, node: NodeId, margin: f32) -> Option<CameraPose> {
        if !self.graph.contains(node) {
            return None;
        }
        let pose = camera::fit(
            &self.graph,
            node,
            &self.resources,
            &mut self.camera,
            &mut self.controls,
            margin,
        );
        self.lights.follow_fit(pose.target, pose.distance);
        Some(pose)
    }

    /// Browser row focus: frame a node of the current model.
    pub fn focus_node(&mut self, node: NodeId) -> Option<CameraPose> {
        if !self.is_model_node(node) {
            return None;
        }
        self.fit(node, self.config.focus_margin)
    }

    pub fn set_mode(&mut self, mode: InteractionMode) {
        mode.apply(&mut self.controls);
        self.state.mode = mode;
        if let Some(selector) = self.ports.mode_selector.as_mut() {
            selector.select(mode);
        }
        log::debug!("Interaction mode: {}", mode.label());
    }

    /// Pointer drag on the surface with `button` held, in logical pixels.
    pub fn pointer_drag(&mut self, button: PointerButton, delta: Vec2) -> bool {
        let height = self.surface.rect().height;
        self.controls.drag(button, delta, &self.camera, height)
    }

    pub fn wheel(&mut self, delta_y: f32) -> bool {
        self.controls.wheel(delta_y)
    }

    // ====================================================================
    // Frame loop
    // ====================================================================

    /// One display frame: apply finished decodes, advance damping, redraw.
    pub fn tick(&mut self) -> Vec<LoadOutcome> {
        let outcomes = self.poll_loads();
        self.controls.update(&mut self.camera);
        self.render();
        outcomes
    }

    pub fn render(&mut self) {
        let frame = Frame {
            graph: &self.graph,
            resources: &self.resources,
            camera: &self.camera,
            lights: &self.lights,
            background: self.background,
        };
        self.surface.draw(&frame);
        self.resources.mark_uploaded();
    }

    /// Redraw and encode the surface as PNG.
    pub fn capture_screenshot(&mut self) -> Result<Vec<u8>, ViewerError> {
        self.render();
        let png = encode_png(self.surface.pixels())?;
        log::info!("Captured screenshot ({} bytes)", png.len());
        Ok(png)
    }

    /// Follow a container resize.
    pub fn on_resize(&mut self, rect: SurfaceRect, pixel_ratio: f32) -> bool {
        let changed = self.surface.resize(rect, pixel_ratio);
        self.camera.aspect = self.surface.aspect();
        changed
    }

    // ====================================================================
    // Browser panel
    // ====================================================================

    /// Flip a model node's visibility. Returns the new state.
    pub fn toggle_visibility(&mut self, node: NodeId) -> Option<bool> {
        if !self.is_model_node(node) {
            return None;
        }
        let entry = self.graph.get_mut(node)?;
        entry.visible = !entry.visible;
        let visible = entry.visible;
        self.refresh_browser();
        Some(visible)
    }

    pub fn toggle_browser_panel(&mut self) -> bool {
        match self.ports.panel_toggle.as_mut() {
            Some(toggle) => toggle.toggle(),
            None => false,
        }
    }

    pub fn browser_list(&self) -> Option<BrowserList> {
        let root = self.state.root?;
        Some(BrowserList::build(&self.graph, root, self.config.browser_max_items))
    }

    fn refresh_browser(&mut self) {
        let list = self.browser_list();
        if let Some(browser) = self.ports.browser.as_mut() {
            match &list {
                Some(list) => browser.render(list),
                None => browser.clear(),
            }
        }
    }

    // ====================================================================
    // Accessors
    // ====================================================================

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn root(&self) -> Option<NodeId> {
        self.state.root
    }

    pub fn mode(&self) -> InteractionMode {
        self.state.mode
    }

    pub fn hovered_key(&self) -> Option<&str> {
        self.state.hovered_key.as_deref()
    }

    pub fn load_state(&self) -> LoadState {
        self.state.load
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitController {
        &self.controls
    }

    pub fn lights(&self) -> &LightRig {
        &self.lights
    }

    pub fn bindings(&self) -> &MaterialBindings {
        &self.bindings
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn floors(&self) -> &FloorCatalog {
        &self.floors
    }

    fn is_model_node(&self, node: NodeId) -> bool {
        match self.state.root {
            Some(root) => node == root || self.graph.is_ancestor(root, node),
            None => false,
        }
    }

    fn show_loader(&mut self, text: &str) {
        if let Some(loader) = self.ports.loader.as_mut() {
            loader.show(text);
        }
    }

    fn hide_loader(&mut self) {
        if let Some(loader) = self.ports.loader.as_mut() {
            loader.hide();
        }
    }

    fn refresh_status_table(&mut self) {
        if let Some(table) = self.ports.status_table.as_mut() {
            table.render(self.floors.records(), self.state.hovered_key.as_deref());
        }
    }
}
