//! Perspective camera for the hero viewer

use glam::{Mat4, Vec3};
use serde::Deserialize;

/// Camera parameters as they appear in the dashboard configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: [5.0, 1.0, 4.0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl PerspectiveCamera {
    /// Camera whose frustum matches a surface of `width` x `height` CSS pixels.
    pub fn for_surface(settings: &CameraSettings, width: f64, height: f64) -> Self {
        Self {
            fov_y: settings.fov_degrees.to_radians(),
            aspect: aspect_ratio(width, height),
            near: settings.near,
            far: settings.far,
            position: Vec3::from(settings.position),
            target: Vec3::ZERO,
        }
    }

    pub fn set_aspect(&mut self, width: f64, height: f64) {
        self.aspect = aspect_ratio(width, height);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Projection with a 0..1 depth range (WebGPU / wgpu convention).
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Width over height. A collapsed surface (zero or negative extent) is
/// treated as one pixel so the projection never divides by zero.
fn aspect_ratio(width: f64, height: f64) -> f32 {
    (width.max(1.0) / height.max(1.0)) as f32
}
