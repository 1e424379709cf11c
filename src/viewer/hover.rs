//! Hover picking and floor highlighting.
//!
//! Each mesh of the attached model is mapped once per attach to the nearest
//! enclosing node (itself included, the model root excluded) whose name is a
//! floor key. A pointer move picks the nearest visible mesh and looks it up
//! there; no per-event tree walks.

use super::Viewer;
use crate::render::pick;
use crate::scene::floors::FloorCatalog;
use crate::scene::NodeId;

impl Viewer {
    /// Pointer moved to host coordinates `(x, y)`. Returns the hovered floor
    /// key afterwards.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<&str> {
        let Some(root) = self.state.root else {
            return None;
        };
        if !self.surface.contains(x, y) {
            self.set_hover(None);
            return self.hovered_key();
        }

        let ray = self.camera.ray_through(self.surface.to_ndc(x, y));
        let target = pick::pick_nearest(&self.graph, &self.resources, root, &ray)
            .and_then(|hit| self.floor_index.get(&hit.node).cloned());
        self.set_hover(target);
        self.hovered_key()
    }

    /// Pointer left the surface.
    pub fn pointer_leave(&mut self) {
        self.set_hover(None);
    }

    /// Swap in another floor catalog and re-index the attached model.
    pub fn set_floor_catalog(&mut self, floors: FloorCatalog) {
        self.set_hover(None);
        self.floors = floors;
        self.rebuild_floor_index();
        self.refresh_status_table();
    }

    /// Move the highlight to `target` (a floor key and its group node), or
    /// clear it. Same key as the current one is a no-op.
    pub(super) fn set_hover(&mut self, target: Option<(String, NodeId)>) {
        let next_key = target.as_ref().map(|(key, _)| key.as_str());
        if next_key == self.state.hovered_key.as_deref() {
            return;
        }

        self.bindings.revert(&mut self.graph, &mut self.resources);
        self.state.hovered_key = None;

        if let Some((key, group)) = target {
            if let Some(record) = self.floors.get(&key) {
                let tint = self.style.tint(record.status);
                self.bindings.apply(
                    &mut self.graph,
                    &mut self.resources,
                    group,
                    &key,
                    tint,
                    self.style.intensity,
                );
                log::debug!("Hovering floor '{}' ({})", key, record.status.label());
                self.state.hovered_key = Some(key);
            }
        }

        let record = self
            .state
            .hovered_key
            .as_deref()
            .and_then(|key| self.floors.get(key));
        if let Some(panel) = self.ports.metadata.as_mut() {
            panel.show_record(record);
        }
        self.refresh_status_table();
    }

    pub(super) fn rebuild_floor_index(&mut self) {
        self.floor_index.clear();
        let Some(root) = self.state.root else {
            return;
        };
        for mesh in self.graph.mesh_nodes(root) {
            let mut cursor = Some(mesh);
            while let Some(id) = cursor {
                if id == root {
                    break;
                }
                let Some(node) = self.graph.get(id) else {
                    break;
                };
                if self.floors.contains(&node.name) {
                    self.floor_index.insert(mesh, (node.name.clone(), id));
                    break;
                }
                cursor = node.parent();
            }
        }
    }
}
