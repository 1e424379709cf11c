//! Model load / replace lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! load_model ──> dispose_root ──> generation += 1 ──> LoadBackend::dispatch
//!                                                          │
//! tick / poll_loads <── LoadEvent { generation, .. } <─────┘
//!      │
//!      ├─ generation != latest ──> Stale (dropped)
//!      ├─ Progress              ──> loader text
//!      ├─ Finished(Ok(scene))   ──> attach ──> fit
//!      └─ Finished(empty / Err) ──> LoadFailed
//! ```
//!
//! The old root is gone before the new request goes out, so two roots can
//! never be attached at once.

use super::{LoadState, Viewer, ViewerError};
use crate::assets::{
    DecodedMaterial, DecodedNode, DecodedScene, DecodedTexture, LoadEvent, LoadEventKind,
    LoadRequest, ModelSource,
};
use crate::render::resources::{
    self, Geometry, Material, MaterialId, MaterialKind, ResourceRegistry, Texture, TextureId,
};
use crate::scene::{MeshPayload, NodeId, SceneGraph, SceneNode};
use glam::Mat4;
use std::time::Instant;

pub const LOADING_TEXT: &str = "Loading model...";
pub const EMPTY_SCENE_TEXT: &str = "Loaded but no scene found (see log).";
pub const LOAD_ERROR_TEXT: &str = "Error loading model (see log).";

/// What applying one [`LoadEvent`] did.
#[derive(Debug)]
pub enum LoadOutcome {
    Progress { generation: u64, text: String },
    Attached(NodeId),
    Failed(ViewerError),
    /// The event belonged to a superseded request and was dropped.
    Stale { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The attached model was framed again.
    Refit,
    /// No model attached; the last source was requested again.
    Reload { generation: u64 },
    /// Nothing to frame or reload; the controller went back to its saved pose.
    DefaultPose,
}

impl Viewer {
    /// Replace the current model with `source`. Returns the generation of
    /// the new request.
    pub fn load_model(&mut self, source: ModelSource) -> u64 {
        log::info!("Load requested: {} ({})", source, source.kind());
        self.state.last_source = Some(source.clone());
        self.show_loader(LOADING_TEXT);
        self.dispose_root();

        self.generation += 1;
        let generation = self.generation;
        self.state.load = LoadState::Loading { generation };
        self.load_started = Some(Instant::now());
        self.loader.dispatch(LoadRequest { generation, source });
        generation
    }

    /// Detach the current root and release everything it holds. Returns
    /// `false` when no model was attached.
    pub fn dispose_root(&mut self) -> bool {
        if self.state.root.is_none() {
            return false;
        }
        self.set_hover(None);
        self.bindings.clear();
        self.floor_index.clear();

        let Some(root) = self.state.root.take() else {
            return false;
        };
        self.graph.detach(root);
        let stats = resources::dispose(&self.graph, root, &mut self.resources);
        let removed = self.graph.remove_subtree(root);
        log::debug!(
            "Disposed previous model: {} nodes, {} geometries, {} materials, {} textures",
            removed,
            stats.geometries,
            stats.materials,
            stats.textures
        );

        if let Some(browser) = self.ports.browser.as_mut() {
            browser.clear();
        }
        true
    }

    /// Drain the load backend and apply its events in arrival order.
    pub fn poll_loads(&mut self) -> Vec<LoadOutcome> {
        let events = self.loader.poll();
        events
            .into_iter()
            .map(|event| self.handle_load_event(event))
            .collect()
    }

    pub fn handle_load_event(&mut self, event: LoadEvent) -> LoadOutcome {
        let LoadEvent { generation, kind } = event;
        let current = matches!(
            self.state.load,
            LoadState::Loading { generation: pending } if pending == generation
        );
        if !current {
            log::debug!(
                "Dropping stale load event for generation {} (latest is {})",
                generation,
                self.generation
            );
            return LoadOutcome::Stale { generation };
        }

        match kind {
            LoadEventKind::Progress(progress) => {
                let text = progress.status_text();
                self.show_loader(&text);
                LoadOutcome::Progress { generation, text }
            }
            LoadEventKind::Finished(Ok(Some(scene))) if !scene.is_empty() => {
                LoadOutcome::Attached(self.attach(scene))
            }
            LoadEventKind::Finished(Ok(_)) => {
                let model = self
                    .state
                    .last_source
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                log::warn!("Decoded {} but found no scene", model);
                self.fail_load(EMPTY_SCENE_TEXT);
                LoadOutcome::Failed(ViewerError::EmptyScene { model })
            }
            LoadEventKind::Finished(Err(err)) => {
                log::warn!("Failed to load model: {}", err);
                self.fail_load(LOAD_ERROR_TEXT);
                LoadOutcome::Failed(ViewerError::Decode(err))
            }
        }
    }

    fn fail_load(&mut self, text: &str) {
        self.state.load = LoadState::LoadFailed;
        self.load_started = None;
        self.show_loader(text);
    }

    /// Instantiate `scene`, normalize it and put it on stage.
    fn attach(&mut self, scene: DecodedScene) -> NodeId {
        let node_count = scene.node_count();
        let mesh_count = scene.mesh_count();
        let DecodedScene {
            root,
            materials,
            textures,
        } = scene;

        let root = Instantiator::new(&mut self.graph, &mut self.resources, &materials, textures)
            .node(root);

        for mesh_node in self.graph.mesh_nodes(root) {
            let ids = match self.graph.get(mesh_node).and_then(|n| n.mesh.as_ref()) {
                Some(mesh) => mesh.materials.clone(),
                None => continue,
            };
            for id in ids {
                if let Some(material) = self.resources.material_mut(id) {
                    material.double_sided = true;
                    material.needs_update = true;
                }
            }
        }

        // root is still detached, so its world bounds are in its own parent space
        let center = self.graph.world_bounds(root, &self.resources).center();
        if center.is_finite() {
            if let Some(node) = self.graph.get_mut(root) {
                node.transform = Mat4::from_translation(-center) * node.transform;
            }
        }

        let scene_node = self.graph.scene();
        self.graph.add_child(scene_node, root);
        self.state.root = Some(root);
        self.state.load = LoadState::Attached;
        self.rebuild_floor_index();

        self.fit(root, self.config.fit_margin);
        self.hide_loader();
        self.refresh_browser();
        self.refresh_status_table();

        let elapsed = self
            .load_started
            .take()
            .map(|started| started.elapsed().as_secs_f32() * 1000.0)
            .unwrap_or_default();
        log::info!(
            "Model attached: {} nodes, {} meshes, {} floor meshes ({:.1} ms)",
            node_count,
            mesh_count,
            self.floor_index.len(),
            elapsed
        );
        root
    }

    /// Re-frame the current model, reload the last source, or fall back to
    /// the controller's saved pose.
    pub fn reset_view(&mut self) -> ResetOutcome {
        if let Some(root) = self.state.root {
            self.fit(root, self.config.fit_margin);
            return ResetOutcome::Refit;
        }
        if let Some(source) = self.state.last_source.clone() {
            let generation = self.load_model(source);
            return ResetOutcome::Reload { generation };
        }
        self.controls.reset(&mut self.camera);
        self.controls.update(&mut self.camera);
        ResetOutcome::DefaultPose
    }
}

/// Turns a decoded tree into arena nodes and registered resources.
/// Materials and textures are registered on first use, once each.
struct Instantiator<'a> {
    graph: &'a mut SceneGraph,
    resources: &'a mut ResourceRegistry,
    materials: &'a [DecodedMaterial],
    textures: Vec<Option<DecodedTexture>>,
    material_ids: Vec<Option<MaterialId>>,
    texture_ids: Vec<Option<TextureId>>,
    default_material: Option<MaterialId>,
}

impl<'a> Instantiator<'a> {
    fn new(
        graph: &'a mut SceneGraph,
        resources: &'a mut ResourceRegistry,
        materials: &'a [DecodedMaterial],
        textures: Vec<DecodedTexture>,
    ) -> Self {
        Self {
            graph,
            resources,
            materials,
            texture_ids: vec![None; textures.len()],
            textures: textures.into_iter().map(Some).collect(),
            material_ids: vec![None; materials.len()],
            default_material: None,
        }
    }

    fn node(&mut self, decoded: DecodedNode) -> NodeId {
        let DecodedNode {
            name,
            transform,
            mesh,
            children,
        } = decoded;

        let mut node = SceneNode::new(name).with_transform(transform);
        if let Some(mesh) = mesh {
            let material = match mesh.material {
                Some(index) if index < self.materials.len() => self.material(index),
                _ => self.default_material(),
            };
            let geometry = self
                .resources
                .add_geometry(Geometry::new(mesh.positions, mesh.indices));
            node = node.with_mesh(MeshPayload {
                geometry,
                materials: vec![material],
            });
        }

        let id = self.graph.insert(node);
        for child in children {
            let child = self.node(child);
            self.graph.add_child(id, child);
        }
        id
    }

    fn material(&mut self, index: usize) -> MaterialId {
        if let Some(id) = self.material_ids[index] {
            return id;
        }
        let materials = self.materials;
        let decoded = &materials[index];
        let mut material = Material::new(decoded.name.clone(), decoded.kind);
        material.base_color = decoded.base_color;
        material.emissive = decoded.emissive;
        material.double_sided = decoded.double_sided;
        material.textures = decoded
            .textures
            .iter()
            .copied()
            .filter_map(|(slot, texture)| self.texture(texture).map(|id| (slot, id)))
            .collect();

        let id = self.resources.add_material(material);
        self.material_ids[index] = Some(id);
        id
    }

    fn texture(&mut self, index: usize) -> Option<TextureId> {
        if let Some(id) = self.texture_ids.get(index).copied().flatten() {
            return Some(id);
        }
        let decoded = self.textures.get_mut(index)?.take()?;
        let id = self.resources.add_texture(Texture {
            width: decoded.width,
            height: decoded.height,
            pixels: decoded.pixels,
        });
        self.texture_ids[index] = Some(id);
        Some(id)
    }

    fn default_material(&mut self) -> MaterialId {
        if let Some(id) = self.default_material {
            return id;
        }
        let id = self
            .resources
            .add_material(Material::new("default", MaterialKind::Standard));
        self.default_material = Some(id);
        id
    }
}
