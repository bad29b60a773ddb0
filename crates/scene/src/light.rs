use glam::Vec3;
use serde::Deserialize;

/// Convert 0xRRGGBB into linear-ish RGB in 0..1.
pub fn rgb_from_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AmbientLight {
    pub color: u32,
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: 0xff_ffff,
            intensity: 2.0,
        }
    }
}

impl AmbientLight {
    pub fn radiance(&self) -> Vec3 {
        rgb_from_hex(self.color) * self.intensity
    }
}

/// Light arriving from `position` towards the origin.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DirectionalLight {
    pub color: u32,
    pub intensity: f32,
    pub position: [f32; 3],
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: 0xff_ffff,
            intensity: 3.0,
            position: [5.0, 10.0, 7.5],
        }
    }
}

impl DirectionalLight {
    pub fn radiance(&self) -> Vec3 {
        rgb_from_hex(self.color) * self.intensity
    }

    /// Unit vector pointing from the scene towards the light.
    pub fn direction_to_light(&self) -> Vec3 {
        Vec3::from(self.position).normalize_or(Vec3::Y)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub ambient: AmbientLight,
    pub directional: DirectionalLight,
}
