//! Software triangle rasterizer.
//!
//! Draws every visible mesh under the scene container into an RGBA8
//! framebuffer with a depth test. Triangles are clipped against the near
//! plane in clip space, flat shaded per face with the light rig, and filled
//! with incremental edge functions.

use super::resources::{Material, MaterialKind};
use super::{Frame, FramePixels, Rasterizer};
use glam::{Mat4, Vec3, Vec4};

const FALLBACK_COLOR: Vec3 = Vec3::splat(0.8);

/// Color + depth target.
pub struct Framebuffer {
    pub pixels: Vec<u8>, // RGBA, 4 bytes per pixel
    pub zbuffer: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height * 4],
            zbuffer: vec![f32::MAX; width * height],
            width,
            height,
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            self.width = width;
            self.height = height;
            self.pixels = vec![0; width * height * 4];
            self.zbuffer = vec![f32::MAX; width * height];
        }
    }

    pub fn clear(&mut self, color: [u8; 3]) {
        for pixel in self.pixels.chunks_exact_mut(4) {
            pixel.copy_from_slice(&[color[0], color[1], color[2], 255]);
        }
        self.zbuffer.fill(f32::MAX);
    }

    pub fn set_pixel_with_depth(&mut self, x: usize, y: usize, z: f32, color: [u8; 4]) -> bool {
        if x < self.width && y < self.height {
            let idx = y * self.width + x;
            if z < self.zbuffer[idx] {
                self.zbuffer[idx] = z;
                let pixel_idx = idx * 4;
                self.pixels[pixel_idx..pixel_idx + 4].copy_from_slice(&color);
                return true;
            }
        }
        false
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y * self.width + x) * 4;
        let mut out = [0; 4];
        out.copy_from_slice(&self.pixels[idx..idx + 4]);
        Some(out)
    }
}

pub struct SoftwareRasterizer {
    framebuffer: Framebuffer,
    triangles_drawn: usize,
}

impl SoftwareRasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            framebuffer: Framebuffer::new(width.max(1) as usize, height.max(1) as usize),
            triangles_drawn: 0,
        }
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Triangles that survived culling and clipping in the last frame.
    pub fn triangles_drawn(&self) -> usize {
        self.triangles_drawn
    }
}

impl Rasterizer for SoftwareRasterizer {
    fn resize(&mut self, width: u32, height: u32) {
        self.framebuffer
            .resize(width.max(1) as usize, height.max(1) as usize);
    }

    fn render(&mut self, frame: &Frame<'_>) {
        self.framebuffer.clear(frame.background);
        self.triangles_drawn = 0;

        let view_proj = frame.camera.view_projection();
        let eye = frame.camera.position;
        let graph = frame.graph;

        graph.traverse_world(graph.scene(), |id, node, world| {
            let Some(mesh) = &node.mesh else {
                return;
            };
            if !graph.is_visible(id) {
                return;
            }
            let Some(geometry) = frame.resources.geometry(mesh.geometry) else {
                return;
            };
            let material = mesh
                .materials
                .first()
                .and_then(|m| frame.resources.material(*m));
            let double_sided = material.map(|m| m.double_sided).unwrap_or(false);

            for index in 0..geometry.triangle_count() {
                let Some(local) = geometry.triangle(index) else {
                    continue;
                };
                let w = local.map(|v| world.transform_point3(v));
                let Some(mut normal) = (w[1] - w[0]).cross(w[2] - w[0]).try_normalize() else {
                    continue;
                };
                if normal.dot(eye - w[0]) < 0.0 {
                    if !double_sided {
                        continue;
                    }
                    normal = -normal;
                }
                let color = to_rgba8(shade(material, normal, frame));
                if draw_triangle(&mut self.framebuffer, &view_proj, w, color) {
                    self.triangles_drawn += 1;
                }
            }
        });
    }

    fn frame_pixels(&self) -> FramePixels<'_> {
        FramePixels {
            width: self.framebuffer.width as u32,
            height: self.framebuffer.height as u32,
            rgba: &self.framebuffer.pixels,
        }
    }
}

fn shade(material: Option<&Material>, normal: Vec3, frame: &Frame<'_>) -> Vec3 {
    let Some(material) = material else {
        return FALLBACK_COLOR * frame.lights.irradiance(normal);
    };
    let [r, g, b, _] = material.base_color;
    let base = Vec3::new(r, g, b);
    match material.kind {
        MaterialKind::Unlit => base,
        MaterialKind::Standard => {
            base * frame.lights.irradiance(normal)
                + Vec3::from(material.emissive) * material.emissive_intensity
        }
    }
}

fn to_rgba8(color: Vec3) -> [u8; 4] {
    let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8, 255]
}

/// Clip against the near plane, project and fill. Returns whether any part
/// of the triangle reached the viewport.
fn draw_triangle(fb: &mut Framebuffer, view_proj: &Mat4, world: [Vec3; 3], color: [u8; 4]) -> bool {
    let clip = world.map(|p| *view_proj * p.extend(1.0));
    let polygon = clip_near(&clip);
    if polygon.len() < 3 {
        return false;
    }

    let screen: Vec<Vec3> = polygon
        .iter()
        .map(|c| {
            let ndc = c.truncate() / c.w;
            Vec3::new(
                (ndc.x * 0.5 + 0.5) * fb.width as f32,
                (1.0 - (ndc.y * 0.5 + 0.5)) * fb.height as f32,
                ndc.z,
            )
        })
        .collect();

    let mut drawn = false;
    for i in 1..screen.len() - 1 {
        drawn |= fill_triangle(fb, screen[0], screen[i], screen[i + 1], color);
    }
    drawn
}

/// Sutherland-Hodgman against `z >= -w` (OpenGL clip space).
fn clip_near(triangle: &[Vec4; 3]) -> Vec<Vec4> {
    let distance = |v: &Vec4| v.z + v.w;
    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let current = triangle[i];
        let next = triangle[(i + 1) % 3];
        let (dc, dn) = (distance(&current), distance(&next));
        if dc >= 0.0 {
            out.push(current);
        }
        if (dc >= 0.0) != (dn >= 0.0) {
            let t = dc / (dc - dn);
            out.push(current.lerp(next, t));
        }
    }
    out
}

fn fill_triangle(fb: &mut Framebuffer, v1: Vec3, v2: Vec3, v3: Vec3, color: [u8; 4]) -> bool {
    let min_x = v1.x.min(v2.x).min(v3.x).max(0.0) as usize;
    let max_x = (v1.x.max(v2.x).max(v3.x) + 1.0).min(fb.width as f32) as usize;
    let min_y = v1.y.min(v2.y).min(v3.y).max(0.0) as usize;
    let max_y = (v1.y.max(v2.y).max(v3.y) + 1.0).min(fb.height as f32) as usize;
    if min_x >= max_x || min_y >= max_y {
        return false;
    }

    let area = (v2.y - v3.y) * (v1.x - v3.x) + (v3.x - v2.x) * (v1.y - v3.y);
    if area.abs() < 0.00001 {
        return false;
    }
    let inv_area = 1.0 / area;

    // bc.x = E23 / area, bc.y = E31 / area
    let a0 = v2.y - v3.y;
    let b0 = v3.x - v2.x;
    let a1 = v3.y - v1.y;
    let b1 = v1.x - v3.x;

    let start_x = min_x as f32 + 0.5;
    let start_y = min_y as f32 + 0.5;
    let mut w0_row = a0 * (start_x - v3.x) + b0 * (start_y - v3.y);
    let mut w1_row = a1 * (start_x - v3.x) + b1 * (start_y - v3.y);

    let mut any = false;
    for y in min_y..max_y {
        let mut w0 = w0_row;
        let mut w1 = w1_row;
        for x in min_x..max_x {
            let bc_x = w0 * inv_area;
            let bc_y = w1 * inv_area;
            let bc_z = 1.0 - bc_x - bc_y;
            const ERR: f32 = -0.0001;
            if bc_x >= ERR && bc_y >= ERR && bc_z >= ERR {
                // NDC depth is affine in screen space
                let z = bc_x * v1.z + bc_y * v2.z + bc_z * v3.z;
                if z <= 1.0 {
                    fb.set_pixel_with_depth(x, y, z, color);
                    any = true;
                }
            }
            w0 += a0;
            w1 += a1;
        }
        w0_row += b0;
        w1_row += b1;
    }
    any
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::camera::PerspectiveCamera;
    use crate::render::lights::LightRig;
    use crate::render::resources::{Geometry, ResourceRegistry};
    use crate::scene::{MeshPayload, NodeId, SceneGraph, SceneNode};

    const BACKGROUND: [u8; 3] = [0xee, 0xee, 0xee];

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(60.0, 1.0, 0.1, 100.0);
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.look_at = Vec3::ZERO;
        camera
    }

    fn add_quad(
        graph: &mut SceneGraph,
        resources: &mut ResourceRegistry,
        z: f32,
        rgb: [f32; 3],
        double_sided: bool,
    ) -> NodeId {
        let geometry = resources.add_geometry(Geometry::new(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            vec![0, 1, 2, 0, 2, 3],
        ));
        let mut material = Material::new("flat", MaterialKind::Unlit);
        material.base_color = [rgb[0], rgb[1], rgb[2], 1.0];
        material.double_sided = double_sided;
        let material = resources.add_material(material);
        let node = graph.insert(
            SceneNode::new("quad")
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, z)))
                .with_mesh(MeshPayload {
                    geometry,
                    materials: vec![material],
                }),
        );
        graph.add_child(graph.scene(), node);
        node
    }

    fn render(graph: &SceneGraph, resources: &ResourceRegistry, camera: &PerspectiveCamera) -> SoftwareRasterizer {
        let mut raster = SoftwareRasterizer::new(64, 64);
        let lights = LightRig::default();
        raster.render(&Frame {
            graph,
            resources,
            camera,
            lights: &lights,
            background: BACKGROUND,
        });
        raster
    }

    #[test]
    fn empty_scene_is_background() {
        let graph = SceneGraph::new();
        let resources = ResourceRegistry::new();
        let raster = render(&graph, &resources, &camera());
        assert_eq!(raster.framebuffer().pixel(0, 0), Some([0xee, 0xee, 0xee, 255]));
        assert_eq!(raster.framebuffer().pixel(32, 32), Some([0xee, 0xee, 0xee, 255]));
        assert_eq!(raster.triangles_drawn(), 0);
    }

    #[test]
    fn nearer_surface_wins_depth_test() {
        let mut graph = SceneGraph::new();
        let mut resources = ResourceRegistry::new();
        add_quad(&mut graph, &mut resources, 1.0, [1.0, 0.0, 0.0], false);
        add_quad(&mut graph, &mut resources, -1.0, [0.0, 0.0, 1.0], false);
        let raster = render(&graph, &resources, &camera());
        assert_eq!(raster.framebuffer().pixel(32, 32), Some([255, 0, 0, 255]));
        assert_eq!(raster.framebuffer().pixel(0, 0), Some([0xee, 0xee, 0xee, 255]));
    }

    #[test]
    fn hidden_meshes_are_skipped() {
        let mut graph = SceneGraph::new();
        let mut resources = ResourceRegistry::new();
        let node = add_quad(&mut graph, &mut resources, 0.0, [1.0, 0.0, 0.0], false);
        graph.get_mut(node).unwrap().visible = false;
        let raster = render(&graph, &resources, &camera());
        assert_eq!(raster.framebuffer().pixel(32, 32), Some([0xee, 0xee, 0xee, 255]));
    }

    #[test]
    fn back_faces_need_double_sided_materials() {
        let mut graph = SceneGraph::new();
        let mut resources = ResourceRegistry::new();
        add_quad(&mut graph, &mut resources, 0.0, [0.0, 1.0, 0.0], false);
        let mut behind = camera();
        behind.position = Vec3::new(0.0, 0.0, -5.0);
        let raster = render(&graph, &resources, &behind);
        assert_eq!(raster.triangles_drawn(), 0);

        let mut graph = SceneGraph::new();
        let mut resources = ResourceRegistry::new();
        add_quad(&mut graph, &mut resources, 0.0, [0.0, 1.0, 0.0], true);
        let raster = render(&graph, &resources, &behind);
        assert_eq!(raster.framebuffer().pixel(32, 32), Some([0, 255, 0, 255]));
    }

    #[test]
    fn geometry_crossing_the_near_plane_is_clipped() {
        let mut graph = SceneGraph::new();
        let mut resources = ResourceRegistry::new();
        // floor quad running from in front of the camera to behind it
        let node = add_quad(&mut graph, &mut resources, 0.0, [1.0, 1.0, 1.0], true);
        graph.get_mut(node).unwrap().transform = Mat4::from_translation(Vec3::new(0.0, -0.5, 5.0))
            * Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2)
            * Mat4::from_scale(Vec3::splat(10.0));
        let raster = render(&graph, &resources, &camera());
        assert!(raster.triangles_drawn() > 0);
        // lower half shows the floor, upper half the background
        assert_eq!(raster.framebuffer().pixel(32, 60), Some([255, 255, 255, 255]));
        assert_eq!(raster.framebuffer().pixel(32, 4), Some([0xee, 0xee, 0xee, 255]));
    }
}
