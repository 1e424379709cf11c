//! Fixed lighting rig: one hemisphere light plus a key and a fill
//! directional light. Directional lights shine from their position towards
//! the world origin, where loaded models are centered.

use glam::Vec3;
use std::f32::consts::FRAC_1_PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLight {
    pub sky: Vec3,
    pub ground: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl DirectionalLight {
    /// Unit vector from the lit surface towards the light.
    pub fn to_light(&self) -> Vec3 {
        self.position.normalize_or(Vec3::Y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightRig {
    pub hemisphere: HemisphereLight,
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            hemisphere: HemisphereLight {
                sky: Vec3::ONE,
                ground: Vec3::splat(0x77 as f32 / 255.0),
                intensity: 1.15,
            },
            key: DirectionalLight {
                position: Vec3::new(10.0, 20.0, 10.0),
                color: Vec3::ONE,
                intensity: 1.0,
            },
            fill: DirectionalLight {
                position: Vec3::new(-10.0, 10.0, -10.0),
                color: Vec3::ONE,
                intensity: 0.6,
            },
        }
    }
}

impl LightRig {
    /// Move the key light so it keeps the same angle on a model of any size.
    pub fn follow_fit(&mut self, center: Vec3, distance: f32) {
        self.key.position = center + Vec3::new(distance, 2.0 * distance, distance);
    }

    /// Diffuse irradiance arriving at a surface with world normal `normal`,
    /// already scaled by the Lambert 1/pi term.
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        let hemi = &self.hemisphere;
        let up = normal.y * 0.5 + 0.5;
        let mut total = hemi.ground.lerp(hemi.sky, up) * hemi.intensity;
        for light in [&self.key, &self.fill] {
            let n_dot_l = normal.dot(light.to_light()).max(0.0);
            total += light.color * light.intensity * n_dot_l;
        }
        total * FRAC_1_PI
    }
}
