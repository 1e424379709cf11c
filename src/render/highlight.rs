//! Non-destructive hover highlight.
//!
//! Highlighting swaps every mesh under a group onto tinted clones of its
//! materials. The original material ids are recorded the first time a mesh
//! is touched and stay recorded until the model is disposed, so reverting
//! always restores the exact instances the mesh had before.

use crate::render::resources::{MaterialId, MaterialKind, ResourceRegistry};
use crate::scene::floors::FloorStatus;
use crate::scene::{NodeId, SceneGraph};
use std::collections::HashMap;

/// Tint colors per floor status plus the strength they are applied with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightStyle {
    pub free: [f32; 3],
    pub reserved: [f32; 3],
    pub sold: [f32; 3],
    pub intensity: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self {
            free: [0x2e as f32 / 255.0, 0xcc as f32 / 255.0, 0x71 as f32 / 255.0],
            reserved: [0xf1 as f32 / 255.0, 0xc4 as f32 / 255.0, 0x0f as f32 / 255.0],
            sold: [0xe7 as f32 / 255.0, 0x4c as f32 / 255.0, 0x3c as f32 / 255.0],
            intensity: 0.6,
        }
    }
}

impl HighlightStyle {
    pub fn tint(&self, status: FloorStatus) -> [f32; 3] {
        match status {
            FloorStatus::Free => self.free,
            FloorStatus::Reserved => self.reserved,
            FloorStatus::Sold => self.sold,
        }
    }
}

struct ActiveHighlight {
    key: String,
    group: NodeId,
    /// Mesh node and the clone ids currently bound to it.
    clones: Vec<(NodeId, Vec<MaterialId>)>,
}

#[derive(Default)]
pub struct MaterialBindings {
    originals: HashMap<NodeId, Vec<MaterialId>>,
    active: Option<ActiveHighlight>,
}

impl MaterialBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.key.as_str())
    }

    pub fn active_group(&self) -> Option<NodeId> {
        self.active.as_ref().map(|a| a.group)
    }

    /// Recorded original materials of `node`, if it was ever highlighted.
    pub fn original(&self, node: NodeId) -> Option<&[MaterialId]> {
        self.originals.get(&node).map(Vec::as_slice)
    }

    pub fn recorded(&self) -> usize {
        self.originals.len()
    }

    /// Highlight every mesh under `group`. Any other active highlight is
    /// reverted first; re-applying the active key is a no-op.
    ///
    /// Returns the number of meshes that received tinted clones.
    pub fn apply(
        &mut self,
        graph: &mut SceneGraph,
        resources: &mut ResourceRegistry,
        group: NodeId,
        key: &str,
        tint: [f32; 3],
        intensity: f32,
    ) -> usize {
        if self.active_key() == Some(key) {
            return 0;
        }
        self.revert(graph, resources);

        let mut clones = Vec::new();
        for mesh_node in graph.mesh_nodes(group) {
            let Some(node) = graph.get_mut(mesh_node) else {
                continue;
            };
            let Some(payload) = node.mesh.as_mut() else {
                continue;
            };
            let originals = self
                .originals
                .entry(mesh_node)
                .or_insert_with(|| payload.materials.clone());

            let mut tinted = Vec::with_capacity(originals.len());
            for original in originals.iter() {
                let Some(copy) = resources.clone_material(*original) else {
                    continue;
                };
                if let Some(material) = resources.material_mut(copy) {
                    match material.kind {
                        MaterialKind::Standard => {
                            material.emissive = tint;
                            material.emissive_intensity = intensity;
                        }
                        MaterialKind::Unlit => {
                            for (channel, target) in material.base_color.iter_mut().zip(tint) {
                                *channel += (target - *channel) * intensity;
                            }
                        }
                    }
                    material.needs_update = true;
                }
                tinted.push(copy);
            }
            payload.materials = tinted.clone();
            clones.push((mesh_node, tinted));
        }

        let count = clones.len();
        log::debug!("Highlight '{}' applied to {} meshes", key, count);
        self.active = Some(ActiveHighlight {
            key: key.to_string(),
            group,
            clones,
        });
        count
    }

    /// Restore the recorded originals of the active group and release the
    /// clones. Returns `false` when nothing was highlighted.
    pub fn revert(&mut self, graph: &mut SceneGraph, resources: &mut ResourceRegistry) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        for (mesh_node, clones) in active.clones {
            if let (Some(original), Some(payload)) = (
                self.originals.get(&mesh_node),
                graph.get_mut(mesh_node).and_then(|n| n.mesh.as_mut()),
            ) {
                payload.materials = original.clone();
            }
            for clone in clones {
                resources.release_material(clone);
            }
        }
        log::debug!("Highlight '{}' reverted", active.key);
        true
    }

    /// Drop every recorded binding. Call after reverting, when the model the
    /// bindings belong to is disposed.
    pub fn clear(&mut self) {
        self.active = None;
        self.originals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::resources::{Geometry, Material, Texture, TextureSlot};
    use crate::scene::{MeshPayload, SceneNode};
    use glam::Vec3;

    struct Fixture {
        graph: SceneGraph,
        resources: ResourceRegistry,
        eg: NodeId,
        og: NodeId,
        eg_meshes: Vec<NodeId>,
        og_mesh: NodeId,
    }

    fn mesh(resources: &mut ResourceRegistry, kind: MaterialKind) -> SceneNode {
        let geometry = resources.add_geometry(Geometry::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
        ));
        let texture = resources.add_texture(Texture {
            width: 1,
            height: 1,
            pixels: vec![200; 4],
        });
        let mut material = Material::new("wall", kind);
        material.base_color = [0.5, 0.5, 0.5, 1.0];
        material.textures.push((TextureSlot::BaseColor, texture));
        let material = resources.add_material(material);
        SceneNode::new("").with_mesh(MeshPayload {
            geometry,
            materials: vec![material],
        })
    }

    fn fixture() -> Fixture {
        let mut graph = SceneGraph::new();
        let mut resources = ResourceRegistry::new();
        let root = graph.insert(SceneNode::new("root"));
        let eg = graph.insert(SceneNode::new("EG"));
        let og = graph.insert(SceneNode::new("1.OG"));
        graph.add_child(root, eg);
        graph.add_child(root, og);
        let mut eg_meshes = Vec::new();
        for kind in [MaterialKind::Standard, MaterialKind::Unlit] {
            let node = mesh(&mut resources, kind);
            let id = graph.insert(node);
            graph.add_child(eg, id);
            eg_meshes.push(id);
        }
        let node = mesh(&mut resources, MaterialKind::Standard);
        let og_mesh = graph.insert(node);
        graph.add_child(og, og_mesh);
        Fixture {
            graph,
            resources,
            eg,
            og,
            eg_meshes,
            og_mesh,
        }
    }

    fn materials(graph: &SceneGraph, node: NodeId) -> Vec<MaterialId> {
        graph.get(node).unwrap().mesh.as_ref().unwrap().materials.clone()
    }

    #[test]
    fn apply_tints_only_the_group_and_revert_restores_instances() {
        let mut f = fixture();
        let style = HighlightStyle::default();
        let before: Vec<_> = f.eg_meshes.iter().map(|m| materials(&f.graph, *m)).collect();
        let og_before = materials(&f.graph, f.og_mesh);
        let live_before = f.resources.live();

        let mut bindings = MaterialBindings::new();
        let tint = style.tint(FloorStatus::Free);
        let count = bindings.apply(&mut f.graph, &mut f.resources, f.eg, "EG", tint, style.intensity);
        assert_eq!(count, 2);
        assert_eq!(bindings.active_key(), Some("EG"));
        assert_eq!(materials(&f.graph, f.og_mesh), og_before);

        let standard = materials(&f.graph, f.eg_meshes[0])[0];
        assert_ne!(standard, before[0][0]);
        let standard = f.resources.material(standard).unwrap();
        assert_eq!(standard.emissive, tint);
        assert_eq!(standard.emissive_intensity, 0.6);
        assert!(standard.needs_update);

        let unlit = f.resources.material(materials(&f.graph, f.eg_meshes[1])[0]).unwrap();
        let expected_r = 0.5 + (tint[0] - 0.5) * 0.6;
        assert!((unlit.base_color[0] - expected_r).abs() < 1e-6);
        assert_eq!(unlit.emissive, [0.0, 0.0, 0.0]);

        // originals untouched
        assert_eq!(f.resources.material(before[0][0]).unwrap().emissive, [0.0, 0.0, 0.0]);

        assert!(bindings.revert(&mut f.graph, &mut f.resources));
        let after: Vec<_> = f.eg_meshes.iter().map(|m| materials(&f.graph, *m)).collect();
        assert_eq!(after, before);
        assert_eq!(f.resources.live(), live_before);
        assert_eq!(bindings.active_key(), None);
        assert_eq!(bindings.recorded(), 2);
    }

    #[test]
    fn switching_groups_never_leaves_two_highlights() {
        let mut f = fixture();
        let mut bindings = MaterialBindings::new();
        let eg_before = materials(&f.graph, f.eg_meshes[0]);

        bindings.apply(&mut f.graph, &mut f.resources, f.eg, "EG", [0.0, 1.0, 0.0], 0.6);
        bindings.apply(&mut f.graph, &mut f.resources, f.og, "1.OG", [1.0, 1.0, 0.0], 0.6);

        assert_eq!(bindings.active_key(), Some("1.OG"));
        assert_eq!(bindings.active_group(), Some(f.og));
        assert_eq!(materials(&f.graph, f.eg_meshes[0]), eg_before);
        assert_ne!(Some(materials(&f.graph, f.og_mesh).as_slice()), bindings.original(f.og_mesh));
    }

    #[test]
    fn reapplying_the_same_key_is_a_noop() {
        let mut f = fixture();
        let mut bindings = MaterialBindings::new();
        bindings.apply(&mut f.graph, &mut f.resources, f.eg, "EG", [0.0, 1.0, 0.0], 0.6);
        let bound = materials(&f.graph, f.eg_meshes[0]);
        let live = f.resources.live();
        assert_eq!(
            bindings.apply(&mut f.graph, &mut f.resources, f.eg, "EG", [0.0, 1.0, 0.0], 0.6),
            0
        );
        assert_eq!(materials(&f.graph, f.eg_meshes[0]), bound);
        assert_eq!(f.resources.live(), live);
    }

    #[test]
    fn originals_are_recorded_once() {
        let mut f = fixture();
        let mut bindings = MaterialBindings::new();
        let original = materials(&f.graph, f.eg_meshes[0]);
        for _ in 0..3 {
            bindings.apply(&mut f.graph, &mut f.resources, f.eg, "EG", [0.0, 1.0, 0.0], 0.6);
            assert_eq!(bindings.original(f.eg_meshes[0]), Some(original.as_slice()));
            bindings.revert(&mut f.graph, &mut f.resources);
        }
        assert!(!bindings.revert(&mut f.graph, &mut f.resources));
    }
}
