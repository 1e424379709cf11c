//! CPU ray picking
//!
//! Converts a pointer position into a world-space ray and intersects it
//! with the triangles of every visible mesh under a subtree. The subtree is
//! walked on every pick, so freshly attached content is always hit-tested
//! without any cache to invalidate.
//!
//! ## Architecture
//!
//! Each mesh is tested in its own local space: the ray is carried through
//! the inverse world transform, rejected early against the geometry's local
//! bounds, then run through Möller-Trumbore per triangle. Hit distances are
//! measured back in world space so meshes with different scales compare
//! correctly.

use crate::render::resources::ResourceRegistry;
use crate::scene::{Aabb, NodeId, SceneGraph};
use glam::{Vec2, Vec3};

// ========================================================================
// Ray
// ========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length unless constructed from a zero vector.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Screen rectangle of the render surface in host (logical pixel) space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && y >= self.top && x <= self.left + self.width && y <= self.top + self.height
    }
}

/// Pointer position to normalized device coordinates (y up).
pub fn pointer_to_ndc(x: f32, y: f32, rect: &SurfaceRect) -> Vec2 {
    let width = rect.width.max(1.0);
    let height = rect.height.max(1.0);
    Vec2::new(
        (x - rect.left) / width * 2.0 - 1.0,
        -((y - rect.top) / height) * 2.0 + 1.0,
    )
}

// ========================================================================
// Intersection primitives
// ========================================================================

/// Slab test. Returns the entry distance (or exit distance if the origin is
/// inside the box).
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f32> {
    if aabb.is_empty() {
        return None;
    }
    let inv_dir = ray.direction.recip();
    let t1 = (aabb.min - ray.origin) * inv_dir;
    let t2 = (aabb.max - ray.origin) * inv_dir;

    let tmin = t1.min(t2).max_element();
    let tmax = t1.max(t2).min_element();

    if tmax < 0.0 || tmin > tmax || tmin.is_nan() || tmax.is_nan() {
        return None;
    }
    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Möller-Trumbore. With `double_sided == false` back faces are skipped.
pub fn ray_triangle_intersect(
    ray: &Ray,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
    double_sided: bool,
) -> Option<f32> {
    const EPSILON: f32 = 1e-7;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    if a.abs() < EPSILON || (!double_sided && a < 0.0) {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t > EPSILON).then_some(t)
}

// ========================================================================
// PickHit: nearest intersection under a subtree
// ========================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub node: NodeId,
    /// World-space distance from the ray origin.
    pub distance: f32,
    pub point: Vec3,
}

/// Nearest visible mesh under `root` hit by `ray`.
pub fn pick_nearest(
    graph: &SceneGraph,
    resources: &ResourceRegistry,
    root: NodeId,
    ray: &Ray,
) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;

    graph.traverse_world(root, |id, node, world| {
        let Some(mesh) = &node.mesh else {
            return;
        };
        if !graph.is_visible(id) {
            return;
        }
        let Some(geometry) = resources.geometry(mesh.geometry) else {
            return;
        };
        let double_sided = mesh
            .materials
            .iter()
            .filter_map(|m| resources.material(*m))
            .any(|m| m.double_sided);

        let inverse = world.inverse();
        if !inverse.is_finite() {
            return;
        }
        let local_ray = Ray::new(
            inverse.transform_point3(ray.origin),
            inverse.transform_vector3(ray.direction),
        );
        if ray_aabb(&local_ray, &geometry.bounds).is_none() {
            return;
        }

        let mut nearest_local: Option<f32> = None;
        for index in 0..geometry.triangle_count() {
            let Some([v0, v1, v2]) = geometry.triangle(index) else {
                continue;
            };
            if let Some(t) = ray_triangle_intersect(&local_ray, v0, v1, v2, double_sided) {
                if nearest_local.map_or(true, |best_t| t < best_t) {
                    nearest_local = Some(t);
                }
            }
        }

        if let Some(t) = nearest_local {
            let point = world.transform_point3(local_ray.at(t));
            let distance = point.distance(ray.origin);
            if best.as_ref().map_or(true, |b| distance < b.distance) {
                best = Some(PickHit {
                    node: id,
                    distance,
                    point,
                });
            }
        }
    });

    best
}

// ========================================================================
// Tests
// ========================================================================
