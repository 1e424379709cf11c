//! GPU-backed resources (geometry buffers, materials, textures) and their
//! release.
//!
//! Every resource lives in a slot map; releasing removes the slot, so a
//! second release of the same handle is a harmless no-op. The registry also
//! counts releases, which lets tests assert that a teardown left nothing
//! behind.

use crate::scene::{Aabb, NodeId, SceneGraph};
use glam::Vec3;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    pub struct GeometryId;
    pub struct MaterialId;
    pub struct TextureId;
}

/// Indexed triangle list in the owning node's local space.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl Geometry {
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(positions.iter().copied());
        Self {
            positions,
            indices,
            bounds,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex positions of triangle `index`, or `None` if an index is out of range.
    pub fn triangle(&self, index: usize) -> Option<[Vec3; 3]> {
        let base = index * 3;
        let i0 = *self.indices.get(base)? as usize;
        let i1 = *self.indices.get(base + 1)? as usize;
        let i2 = *self.indices.get(base + 2)? as usize;
        Some([
            *self.positions.get(i0)?,
            *self.positions.get(i1)?,
            *self.positions.get(i2)?,
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// Lit PBR material with an emissive channel.
    Standard,
    /// Unlit material; no emissive channel.
    Unlit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    /// Linear RGBA.
    pub base_color: [f32; 4],
    /// Linear RGB.
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub double_sided: bool,
    /// Set when the backend has to re-upload this material.
    pub needs_update: bool,
    pub textures: Vec<(TextureSlot, TextureId)>,
}

impl Material {
    pub fn new(name: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base_color: [1.0, 1.0, 1.0, 1.0],
            emissive: [0.0, 0.0, 0.0],
            emissive_intensity: 1.0,
            double_sided: false,
            needs_update: true,
            textures: Vec::new(),
        }
    }

    pub fn has_emissive(&self) -> bool {
        self.kind == MaterialKind::Standard
    }
}

/// RGBA8 image.
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Number of live resources of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

impl ResourceCounts {
    pub fn total(&self) -> usize {
        self.geometries + self.materials + self.textures
    }
}

#[derive(Default)]
pub struct ResourceRegistry {
    geometries: SlotMap<GeometryId, Geometry>,
    materials: SlotMap<MaterialId, Material>,
    textures: SlotMap<TextureId, Texture>,
    released: ResourceCounts,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        self.geometries.insert(geometry)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.insert(material)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.insert(texture)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id)
    }

    /// Register a copy of `id`. Texture handles are shared with the source.
    pub fn clone_material(&mut self, id: MaterialId) -> Option<MaterialId> {
        let copy = self.materials.get(id)?.clone();
        Some(self.materials.insert(copy))
    }

    pub fn release_geometry(&mut self, id: GeometryId) -> bool {
        let released = self.geometries.remove(id).is_some();
        if released {
            self.released.geometries += 1;
        }
        released
    }

    /// Release the material slot only; its textures are left alone.
    pub fn release_material(&mut self, id: MaterialId) -> bool {
        let released = self.materials.remove(id).is_some();
        if released {
            self.released.materials += 1;
        }
        released
    }

    pub fn release_texture(&mut self, id: TextureId) -> bool {
        let released = self.textures.remove(id).is_some();
        if released {
            self.released.textures += 1;
        }
        released
    }

    pub fn live(&self) -> ResourceCounts {
        ResourceCounts {
            geometries: self.geometries.len(),
            materials: self.materials.len(),
            textures: self.textures.len(),
        }
    }

    /// Total releases performed over the registry's lifetime.
    pub fn released(&self) -> ResourceCounts {
        self.released
    }

    /// Clear `needs_update` on every material once the backend has drawn it.
    pub fn mark_uploaded(&mut self) {
        for (_, material) in self.materials.iter_mut() {
            material.needs_update = false;
        }
    }
}

/// What a single [`dispose`] call actually released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeStats {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

/// Release the geometry, materials and material textures of every mesh
/// under `node`. The graph topology is left untouched; detaching is the
/// caller's job.
pub fn dispose(graph: &SceneGraph, node: NodeId, resources: &mut ResourceRegistry) -> DisposeStats {
    let mut stats = DisposeStats::default();
    for id in graph.descendants(node) {
        let Some(mesh) = graph.get(id).and_then(|n| n.mesh.as_ref()) else {
            continue;
        };
        if resources.release_geometry(mesh.geometry) {
            stats.geometries += 1;
        }
        for material_id in &mesh.materials {
            let textures: Vec<TextureId> = resources
                .material(*material_id)
                .map(|m| m.textures.iter().map(|(_, t)| *t).collect())
                .unwrap_or_default();
            for texture in textures {
                if resources.release_texture(texture) {
                    stats.textures += 1;
                }
            }
            if resources.release_material(*material_id) {
                stats.materials += 1;
            }
        }
    }
    log::debug!(
        "Disposed {} geometries, {} materials, {} textures",
        stats.geometries,
        stats.materials,
        stats.textures
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshPayload, SceneNode};

    fn textured_material(resources: &mut ResourceRegistry) -> MaterialId {
        let texture = resources.add_texture(Texture {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        });
        let normal = resources.add_texture(Texture {
            width: 1,
            height: 1,
            pixels: vec![128; 4],
        });
        let mut material = Material::new("textured", MaterialKind::Standard);
        material.textures = vec![(TextureSlot::BaseColor, texture), (TextureSlot::Normal, normal)];
        resources.add_material(material)
    }

    fn mesh_node(resources: &mut ResourceRegistry, materials: Vec<MaterialId>) -> SceneNode {
        let geometry = resources.add_geometry(Geometry::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![0, 1, 2],
        ));
        SceneNode::new("mesh").with_mesh(MeshPayload {
            geometry,
            materials,
        })
    }

    #[test]
    fn dispose_releases_everything_in_a_nested_tree() {
        let mut resources = ResourceRegistry::new();
        let mut graph = SceneGraph::new();
        let root = graph.insert(SceneNode::new("root"));
        let mut parent = root;
        for depth in 0..16 {
            let material = textured_material(&mut resources);
            let plain = resources.add_material(Material::new("plain", MaterialKind::Unlit));
            let node = graph.insert(mesh_node(&mut resources, vec![material, plain]));
            graph.add_child(parent, node);
            if depth % 3 == 0 {
                let group = graph.insert(SceneNode::new("group"));
                graph.add_child(node, group);
                parent = group;
            } else {
                parent = node;
            }
        }
        assert_eq!(resources.live().geometries, 16);

        let stats = dispose(&graph, root, &mut resources);
        assert_eq!(resources.live().total(), 0);
        assert_eq!(
            stats,
            DisposeStats {
                geometries: 16,
                materials: 32,
                textures: 32,
            }
        );
        // topology untouched
        assert_eq!(graph.descendants(root).len(), 1 + 16 + 6);
    }

    #[test]
    fn dispose_is_safe_without_payloads_and_when_repeated() {
        let mut resources = ResourceRegistry::new();
        let mut graph = SceneGraph::new();
        let root = graph.insert(SceneNode::new("root"));
        let empty = graph.insert(SceneNode::new("empty"));
        graph.add_child(root, empty);
        assert_eq!(dispose(&graph, root, &mut resources), DisposeStats::default());

        let material = textured_material(&mut resources);
        let mesh = graph.insert(mesh_node(&mut resources, vec![material]));
        graph.add_child(root, mesh);
        dispose(&graph, root, &mut resources);
        assert_eq!(dispose(&graph, root, &mut resources), DisposeStats::default());
        assert_eq!(resources.live().total(), 0);
    }

    #[test]
    fn shared_materials_are_released_once() {
        let mut resources = ResourceRegistry::new();
        let mut graph = SceneGraph::new();
        let root = graph.insert(SceneNode::new("root"));
        let shared = textured_material(&mut resources);
        for _ in 0..3 {
            let node = graph.insert(mesh_node(&mut resources, vec![shared]));
            graph.add_child(root, node);
        }
        let stats = dispose(&graph, root, &mut resources);
        assert_eq!(stats.materials, 1);
        assert_eq!(stats.textures, 2);
        assert_eq!(resources.released().materials, 1);
        assert_eq!(resources.live().total(), 0);
    }

    #[test]
    fn clone_material_shares_textures() {
        let mut resources = ResourceRegistry::new();
        let original = textured_material(&mut resources);
        let copy = resources.clone_material(original).unwrap();
        assert_ne!(original, copy);
        assert_eq!(
            resources.material(original).unwrap().textures,
            resources.material(copy).unwrap().textures
        );
        assert!(resources.release_material(copy));
        assert_eq!(resources.live().textures, 2);
    }
}
