//! Retained scene graph.
//!
//! Nodes live in a slot-map arena keyed by [`NodeId`]. A parent owns its
//! children through its `children` list; the `parent` link is only an id, so
//! removing a subtree never leaves a strong edge pointing upwards.

pub mod floors;

use crate::render::resources::{GeometryId, MaterialId, ResourceRegistry};
use glam::{Mat4, Vec3};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable identity of a node inside a [`SceneGraph`].
    pub struct NodeId;
}

/// Geometry + material payload carried by leaf mesh nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshPayload {
    pub geometry: GeometryId,
    pub materials: Vec<MaterialId>,
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    /// Local transform relative to the parent.
    pub transform: Mat4,
    pub mesh: Option<MeshPayload>,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            mesh: None,
            visible: true,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_mesh(mut self, mesh: MeshPayload) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_mesh(&self) -> bool {
        self.mesh.is_some()
    }
}

/// Axis-aligned bounding box. An inverted box (`min > max`) is empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for point in points {
            aabb.expand(point);
        }
        aabb
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.expand(other.min);
        self.expand(other.max);
    }

    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            return Vec3::ZERO;
        }
        self.max - self.min
    }

    /// Box enclosing the eight transformed corners.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return Self::EMPTY;
        }
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ];
        Self::from_points(corners.into_iter().map(|c| matrix.transform_point3(c)))
    }
}

/// Arena scene graph with a single container node at the top.
///
/// Only nodes reachable from [`SceneGraph::scene`] are "in the scene"; a
/// model subtree can exist detached while it is being built or torn down.
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    scene: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let scene = nodes.insert(SceneNode::new("Scene"));
        Self { nodes, scene }
    }

    /// The scene container every displayed node hangs from.
    pub fn scene(&self) -> NodeId {
        self.scene
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Insert a detached node. Any links carried by `node` are dropped.
    pub fn insert(&mut self, mut node: SceneNode) -> NodeId {
        node.parent = None;
        node.children.clear();
        self.nodes.insert(node)
    }

    /// Re-parent `child` under `parent`. Refuses cycles and unknown ids.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child
            || !self.contains(parent)
            || !self.contains(child)
            || self.is_ancestor(child, parent)
        {
            return false;
        }
        self.detach(child);
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
        true
    }

    /// Unlink a node from its parent. Returns `false` if it had none.
    pub fn detach(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes.get(id).and_then(|node| node.parent) else {
            return false;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.retain(|c| *c != id);
        }
        self.nodes[id].parent = None;
        true
    }

    /// Detach and drop `id` with all of its descendants from the arena.
    pub fn remove_subtree(&mut self, id: NodeId) -> usize {
        if id == self.scene || !self.contains(id) {
            return 0;
        }
        self.detach(id);
        let doomed = self.descendants(id);
        for node in &doomed {
            self.nodes.remove(*node);
        }
        doomed.len()
    }

    /// `id` and every node below it, depth-first pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Mesh nodes in the subtree rooted at `id` (including `id`).
    pub fn mesh_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.nodes[*n].is_mesh())
            .collect()
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(current).and_then(|n| n.parent);
        }
        false
    }

    /// Whether `id` hangs (transitively) from the scene container.
    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.scene || self.is_ancestor(self.scene, id)
    }

    /// A node is effectively visible when it and all its ancestors are.
    pub fn is_visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.nodes.get(current) {
                Some(node) if node.visible => cursor = node.parent,
                _ => return false,
            }
        }
        true
    }

    pub fn world_transform(&self, id: NodeId) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(current) else {
                break;
            };
            matrix = node.transform * matrix;
            cursor = node.parent;
        }
        matrix
    }

    /// Visit the subtree under `id` with each node's world transform.
    pub fn traverse_world(&self, id: NodeId, mut visit: impl FnMut(NodeId, &SceneNode, &Mat4)) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let parent_world = node
            .parent
            .map(|p| self.world_transform(p))
            .unwrap_or(Mat4::IDENTITY);
        let mut stack = vec![(id, parent_world)];
        while let Some((current, parent_world)) = stack.pop() {
            let node = &self.nodes[current];
            let world = parent_world * node.transform;
            visit(current, node, &world);
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
    }

    /// World-space bounds of every mesh under `id`, hidden ones included.
    pub fn world_bounds(&self, id: NodeId, resources: &ResourceRegistry) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        self.traverse_world(id, |_, node, world| {
            let Some(mesh) = &node.mesh else {
                return;
            };
            if let Some(geometry) = resources.geometry(mesh.geometry) {
                bounds.union(&geometry.bounds.transformed(world));
            }
        });
        bounds
    }
}
