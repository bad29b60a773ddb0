//! Orbit-style camera controls
//!
//! The camera circles a fixed target on a sphere. Pointer drags and wheel
//! steps accumulate into pending deltas which `update` applies once per
//! frame; with damping on, only a fraction of the pending delta is applied
//! each frame so motion eases out.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use serde::Deserialize;

use crate::camera::PerspectiveCamera;

const POLAR_EPSILON: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    /// 1.0 = one revolution per minute
    pub auto_rotate_speed: f32,
    pub enable_zoom: bool,
    pub zoom_speed: f32,
    pub rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            auto_rotate: true,
            auto_rotate_speed: 1.0,
            enable_zoom: true,
            zoom_speed: 1.0,
            rotate_speed: 1.0,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
        }
    }
}

impl ControlSettings {
    /// Replace values the controls cannot work with by their defaults.
    ///
    /// Settings come from page config, so a bad distance range or damping
    /// factor is logged rather than trusted.
    #[must_use]
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if !(self.damping_factor > 0.0 && self.damping_factor <= 1.0) {
            log::warn!(
                "damping_factor {} outside (0, 1], using {}",
                self.damping_factor,
                defaults.damping_factor
            );
            self.damping_factor = defaults.damping_factor;
        }
        if self.min_distance.is_nan()
            || self.max_distance.is_nan()
            || self.min_distance < 0.0
            || self.min_distance > self.max_distance
        {
            log::warn!(
                "distance range {}..{} is invalid, using {}..{}",
                self.min_distance,
                self.max_distance,
                defaults.min_distance,
                defaults.max_distance
            );
            self.min_distance = defaults.min_distance;
            self.max_distance = defaults.max_distance;
        }
        self
    }
}

/// Spherical coordinates around the orbit target (y up).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    /// Polar angle from +Y
    pub phi: f32,
    /// Azimuth around +Y, measured from +Z
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragState {
    Idle,
    Rotating { x: i32, y: i32 },
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub settings: ControlSettings,
    pub target: Vec3,
    pending: Spherical,
    scale: f32,
    drag: DragState,
}

impl OrbitControls {
    pub fn new(settings: ControlSettings) -> Self {
        Self {
            settings: settings.validated(),
            target: Vec3::ZERO,
            pending: Spherical::default(),
            scale: 1.0,
            drag: DragState::Idle,
        }
    }

    pub const fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Rotating { .. })
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.pending.theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.pending.phi -= angle;
    }

    /// Angle auto-rotation covers in `dt` seconds.
    pub fn auto_rotate_angle(&self, dt: f32) -> f32 {
        TAU / 60.0 * self.settings.auto_rotate_speed * dt
    }

    pub fn begin_rotate(&mut self, x: i32, y: i32) {
        self.drag = DragState::Rotating { x, y };
    }

    /// Pointer moved to (`x`, `y`) on an element `element_height` pixels tall.
    pub fn drag_to(&mut self, x: i32, y: i32, element_height: f64) {
        let DragState::Rotating { x: last_x, y: last_y } = self.drag else {
            return;
        };
        let height = element_height.max(1.0) as f32;
        let speed = self.settings.rotate_speed;
        self.rotate_left(TAU * (x - last_x) as f32 / height * speed);
        self.rotate_up(TAU * (y - last_y) as f32 / height * speed);
        self.drag = DragState::Rotating { x, y };
    }

    pub fn end_rotate(&mut self) {
        self.drag = DragState::Idle;
    }

    fn zoom_scale(&self) -> f32 {
        0.95_f32.powf(self.settings.zoom_speed)
    }

    /// Apply one wheel step. Negative `delta_y` (scroll up) moves closer.
    pub fn wheel(&mut self, delta_y: f64) {
        if !self.settings.enable_zoom || delta_y == 0.0 {
            return;
        }
        if delta_y < 0.0 {
            self.scale *= self.zoom_scale();
        } else {
            self.scale /= self.zoom_scale();
        }
    }

    /// Advance damping and auto-rotation by `dt` seconds and move the camera.
    ///
    /// Returns `true` when the camera position changed.
    pub fn update(&mut self, camera: &mut PerspectiveCamera, dt: f32) -> bool {
        let mut spherical = Spherical::from_offset(camera.position - self.target);

        if self.settings.auto_rotate && !self.is_dragging() {
            self.rotate_left(self.auto_rotate_angle(dt));
        }

        if self.settings.enable_damping {
            spherical.theta += self.pending.theta * self.settings.damping_factor;
            spherical.phi += self.pending.phi * self.settings.damping_factor;
        } else {
            spherical.theta += self.pending.theta;
            spherical.phi += self.pending.phi;
        }

        spherical.phi = spherical.phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
        // `settings` is public and may hold min > max, where clamp() panics
        spherical.radius = (spherical.radius * self.scale)
            .max(self.settings.min_distance)
            .min(self.settings.max_distance);

        let previous = camera.position;
        camera.position = self.target + spherical.to_offset();
        camera.target = self.target;

        if self.settings.enable_damping {
            let keep = 1.0 - self.settings.damping_factor;
            self.pending.theta *= keep;
            self.pending.phi *= keep;
        } else {
            self.pending = Spherical::default();
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > f32::EPSILON
    }
}
