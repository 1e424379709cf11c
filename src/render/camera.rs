use super::pick::Ray;
use crate::scene::{Aabb, NodeId, SceneGraph};
use crate::render::resources::ResourceRegistry;
use glam::{Mat4, Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Fixed diagonal-elevated vantage used when framing an object.
pub const FRAMING_DIRECTION: Vec3 = Vec3::new(1.0, 0.35, 1.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub look_at: Vec3,
}

impl PerspectiveCamera {
    pub fn new(fov_y_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y_deg,
            aspect,
            near,
            far,
            position: Vec3::new(0.0, 0.0, 1.0),
            look_at: Vec3::ZERO,
        }
    }

    pub fn fov_y(&self) -> f32 {
        self.fov_y_deg.to_radians()
    }

    pub fn forward(&self) -> Vec3 {
        let forward = (self.look_at - self.position).normalize_or_zero();
        if forward == Vec3::ZERO {
            Vec3::NEG_Z
        } else {
            forward
        }
    }

    pub fn right(&self) -> Vec3 {
        let right = self.forward().cross(Vec3::Y).normalize_or_zero();
        if right == Vec3::ZERO {
            Vec3::X
        } else {
            right
        }
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalize_or_zero()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y(), self.aspect.max(1e-6), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space ray from the eye through a point in normalized device
    /// coordinates (`x`, `y` in `[-1, 1]`, `y` up).
    ///
    /// Built from the camera basis; inverting the projection loses the
    /// direction in f32 once `far / near` gets large.
    pub fn ray_through(&self, ndc: Vec2) -> Ray {
        let half_height = (self.fov_y() / 2.0).tan();
        let half_width = half_height * self.aspect.max(1e-6);
        let direction = self.forward()
            + self.right() * (ndc.x * half_width)
            + self.up() * (ndc.y * half_height);
        Ray::new(self.position, direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Rotate,
    Dolly,
    Pan,
}

/// Pointer button to controller action mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonMap {
    pub left: MouseAction,
    pub middle: MouseAction,
    pub right: MouseAction,
}

impl ButtonMap {
    pub const fn uniform(action: MouseAction) -> Self {
        Self {
            left: action,
            middle: action,
            right: action,
        }
    }

    pub fn action(&self, button: PointerButton) -> MouseAction {
        match button {
            PointerButton::Left => self.left,
            PointerButton::Middle => self.middle,
            PointerButton::Right => self.right,
        }
    }
}

impl Default for ButtonMap {
    fn default() -> Self {
        Self {
            left: MouseAction::Rotate,
            middle: MouseAction::Dolly,
            right: MouseAction::Pan,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SavedPose {
    position: Vec3,
    target: Vec3,
}

/// Orbit-style controller: rotates, pans and dollies a camera around a target,
/// optionally with inertial damping.
///
/// Input only accumulates deltas; nothing moves until [`OrbitController::update`].
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub screen_space_panning: bool,
    pub enable_rotate: bool,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub buttons: ButtonMap,
    pub rotate_speed: f32,
    pub pan_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    theta_delta: f32,
    phi_delta: f32,
    pan_offset: Vec3,
    scale: f32,
    saved: SavedPose,
}

impl OrbitController {
    const EPS: f32 = 1e-6;
    /// Wheel steps equivalent to a dolly drag over the full surface height.
    const DRAG_DOLLY_STEPS: f32 = 20.0;

    pub fn new(camera: &PerspectiveCamera) -> Self {
        Self {
            target: camera.look_at,
            enable_damping: false,
            damping_factor: 0.05,
            screen_space_panning: true,
            enable_rotate: true,
            enable_pan: true,
            enable_zoom: true,
            buttons: ButtonMap::default(),
            rotate_speed: 1.0,
            pan_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            theta_delta: 0.0,
            phi_delta: 0.0,
            pan_offset: Vec3::ZERO,
            scale: 1.0,
            saved: SavedPose {
                position: camera.position,
                target: camera.look_at,
            },
        }
    }

    /// Action bound to `button`, if that action is currently enabled.
    pub fn action_for(&self, button: PointerButton) -> Option<MouseAction> {
        let action = self.buttons.action(button);
        let enabled = match action {
            MouseAction::Rotate => self.enable_rotate,
            MouseAction::Pan => self.enable_pan,
            MouseAction::Dolly => self.enable_zoom,
        };
        enabled.then_some(action)
    }

    /// Feed a pointer drag of `delta` surface pixels with `button` held.
    pub fn drag(
        &mut self,
        button: PointerButton,
        delta: Vec2,
        camera: &PerspectiveCamera,
        surface_height: f32,
    ) -> bool {
        let Some(action) = self.action_for(button) else {
            return false;
        };
        let height = surface_height.max(1.0);
        match action {
            MouseAction::Rotate => {
                self.theta_delta -= TAU * delta.x / height * self.rotate_speed;
                self.phi_delta -= TAU * delta.y / height * self.rotate_speed;
            }
            MouseAction::Pan => self.pan(delta * self.pan_speed, camera, height),
            MouseAction::Dolly => {
                // dragging down moves away from the target
                let steps = delta.y / height * Self::DRAG_DOLLY_STEPS;
                self.scale /= self.zoom_scale().powf(steps);
            }
        }
        true
    }

    /// Wheel input; negative `delta_y` moves towards the target.
    pub fn wheel(&mut self, delta_y: f32) -> bool {
        if !self.enable_zoom {
            return false;
        }
        if delta_y < 0.0 {
            self.scale *= self.zoom_scale();
        } else if delta_y > 0.0 {
            self.scale /= self.zoom_scale();
        }
        true
    }

    fn zoom_scale(&self) -> f32 {
        0.95f32.powf(self.zoom_speed)
    }

    fn pan(&mut self, delta: Vec2, camera: &PerspectiveCamera, height: f32) {
        let target_distance =
            (camera.position - self.target).length() * (camera.fov_y() / 2.0).tan();
        let left = 2.0 * delta.x * target_distance / height;
        let up = 2.0 * delta.y * target_distance / height;
        let up_axis = if self.screen_space_panning {
            camera.up()
        } else {
            Vec3::Y.cross(camera.right())
        };
        self.pan_offset += -camera.right() * left + up_axis * up;
    }

    /// Integrate pending motion into `camera`. Returns whether it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.length();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };

        let factor = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        theta += self.theta_delta * factor;
        phi += self.phi_delta * factor;
        phi = phi.clamp(Self::EPS, PI - Self::EPS);

        let radius = (radius * self.scale)
            .max(self.min_distance)
            .min(self.max_distance)
            .max(Self::EPS);
        self.target += self.pan_offset * factor;

        let offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        let position = self.target + offset;
        let changed = position.distance_squared(camera.position) > Self::EPS
            || self.target.distance_squared(camera.look_at) > Self::EPS;
        camera.position = position;
        camera.look_at = self.target;

        if self.enable_damping {
            let decay = 1.0 - self.damping_factor;
            self.theta_delta *= decay;
            self.phi_delta *= decay;
            self.pan_offset *= decay;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;
        changed
    }

    /// Keep the orbit distance within `[min, max]`, usually the clip range.
    pub fn set_distance_limits(&mut self, min: f32, max: f32) {
        self.min_distance = min.max(0.0);
        self.max_distance = max.max(self.min_distance);
    }

    /// Drop any accumulated motion.
    pub fn stop(&mut self) {
        self.theta_delta = 0.0;
        self.phi_delta = 0.0;
        self.pan_offset = Vec3::ZERO;
        self.scale = 1.0;
    }

    pub fn is_moving(&self) -> bool {
        self.theta_delta.abs() > Self::EPS
            || self.phi_delta.abs() > Self::EPS
            || self.pan_offset.length_squared() > Self::EPS * Self::EPS
            || (self.scale - 1.0).abs() > Self::EPS
    }

    pub fn set_pose(&mut self, camera: &mut PerspectiveCamera, position: Vec3, target: Vec3) {
        self.stop();
        camera.position = position;
        camera.look_at = target;
        self.target = target;
    }

    /// Remember the current pose as the one [`OrbitController::reset`] returns to.
    pub fn save_state(&mut self, camera: &PerspectiveCamera) {
        self.saved = SavedPose {
            position: camera.position,
            target: self.target,
        };
    }

    pub fn reset(&mut self, camera: &mut PerspectiveCamera) {
        let saved = self.saved;
        self.set_pose(camera, saved.position, saved.target);
    }
}

/// Camera placement that frames a bounding volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub target: Vec3,
    pub near: f32,
    pub far: f32,
    /// Distance from target along [`FRAMING_DIRECTION`] (unnormalized).
    pub distance: f32,
}

/// Pure framing computation for `bounds` seen through a vertical FOV of
/// `fov_y_deg`, padded by `margin`.
pub fn fit_pose(bounds: &Aabb, fov_y_deg: f32, margin: f32) -> CameraPose {
    let center = bounds.center();
    let center = if center.is_finite() { center } else { Vec3::ZERO };
    let mut extent = bounds.size().max_element();
    if !extent.is_finite() || extent <= 0.0 {
        extent = 1.0;
    }

    let near = (extent / 1000.0).max(0.01);
    let mut far = extent * 1000.0;
    if far <= near {
        far = near * 1000.0;
    }

    let half_fov = fov_y_deg.to_radians() / 2.0;
    let distance = (extent / 2.0) / half_fov.tan() * margin;

    CameraPose {
        position: center + FRAMING_DIRECTION * distance,
        target: center,
        near,
        far,
        distance,
    }
}

/// Move `camera` and `controls` to `pose` and make it the controller's
/// reset pose.
pub fn apply_pose(pose: &CameraPose, camera: &mut PerspectiveCamera, controls: &mut OrbitController) {
    camera.near = pose.near;
    camera.far = pose.far;
    let radius = pose.position.distance(pose.target);
    controls.set_distance_limits(pose.near.min(radius), pose.far.max(radius));
    controls.set_pose(camera, pose.position, pose.target);
    controls.update(camera);
    controls.save_state(camera);
}

/// Frame `node`'s world-space bounds with the current camera FOV.
pub fn fit(
    graph: &SceneGraph,
    node: NodeId,
    resources: &ResourceRegistry,
    camera: &mut PerspectiveCamera,
    controls: &mut OrbitController,
    margin: f32,
) -> CameraPose {
    let bounds = graph.world_bounds(node, resources);
    let pose = fit_pose(&bounds, camera.fov_y_deg, margin);
    apply_pose(&pose, camera, controls);
    log::debug!(
        "Framed node: center={:?} near={} far={} distance={}",
        pose.target,
        pose.near,
        pose.far,
        pose.distance
    );
    pose
}
