//! Scene graph owned by the hero viewer: camera, lights and an optional model

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3, Vec4};

use crate::camera::PerspectiveCamera;
use crate::light::LightSettings;
use crate::model::{AlphaMode, Mesh, Model};

const ALPHA_OPAQUE: f32 = 0.0;
const ALPHA_MASK: f32 = 1.0;
const ALPHA_BLEND: f32 = 2.0;

/// Per-frame uniform block, laid out for a WGSL `uniform` binding.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    /// rgb = ambient radiance
    pub ambient: [f32; 4],
    /// xyz = unit direction towards the light
    pub light_dir: [f32; 4],
    /// rgb = directional radiance
    pub light_color: [f32; 4],
}

/// Per-mesh uniform block.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MaterialUniforms {
    pub base_color: [f32; 4],
    /// x = alpha mode (0 opaque, 1 mask, 2 blend), y = mask cutoff
    pub alpha: [f32; 4],
}

pub struct Scene {
    pub camera: PerspectiveCamera,
    pub lights: LightSettings,
    model: Option<Model>,
}

impl Scene {
    pub const fn new(camera: PerspectiveCamera, lights: LightSettings) -> Self {
        Self {
            camera,
            lights,
            model: None,
        }
    }

    pub fn set_model(&mut self, model: Model) {
        self.model = Some(model);
    }

    pub const fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn frame_uniforms(&self) -> FrameUniforms {
        let model = self.model.as_ref().map_or(Mat4::IDENTITY, Model::transform);
        let normal = Mat4::from_mat3(Mat3::from_mat4(model).inverse().transpose());

        FrameUniforms {
            view_proj: self.camera.view_projection().to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            normal_matrix: normal.to_cols_array_2d(),
            ambient: self.lights.ambient.radiance().extend(1.0).to_array(),
            light_dir: self
                .lights
                .directional
                .direction_to_light()
                .extend(0.0)
                .to_array(),
            light_color: self.lights.directional.radiance().extend(1.0).to_array(),
        }
    }
}

impl MaterialUniforms {
    pub const fn new(base_color: [f32; 4], alpha_mode: AlphaMode) -> Self {
        let alpha = match alpha_mode {
            AlphaMode::Opaque => [ALPHA_OPAQUE, 0.0, 0.0, 0.0],
            AlphaMode::Mask(cutoff) => [ALPHA_MASK, cutoff, 0.0, 0.0],
            AlphaMode::Blend => [ALPHA_BLEND, 0.0, 0.0, 0.0],
        };
        Self { base_color, alpha }
    }

    pub const fn for_mesh(mesh: &Mesh) -> Self {
        Self::new(mesh.base_color, mesh.alpha_mode)
    }
}

/// Surface colour as the fragment shader builds it: factor x texel x
/// vertex colour, then the material's alpha mode. `None` means discarded.
pub fn surface_color(uniforms: &MaterialUniforms, texel: Vec4, vertex_color: Vec4) -> Option<Vec4> {
    let color = Vec4::from(uniforms.base_color) * texel * vertex_color;
    let [mode, cutoff, ..] = uniforms.alpha;
    if mode == ALPHA_MASK {
        (color.w >= cutoff).then(|| color.truncate().extend(1.0))
    } else if mode == ALPHA_BLEND {
        Some(color)
    } else {
        Some(color.truncate().extend(1.0))
    }
}

/// Lambert shading as the fragment shader evaluates it for a front face.
pub fn shade_lambert(albedo: Vec3, normal: Vec3, uniforms: &FrameUniforms) -> Vec3 {
    let ambient = Vec3::from_slice(&uniforms.ambient[..3]);
    let light_dir = Vec3::from_slice(&uniforms.light_dir[..3]);
    let light_color = Vec3::from_slice(&uniforms.light_color[..3]);
    let n_dot_l = normal.normalize_or_zero().dot(light_dir).max(0.0);
    albedo * std::f32::consts::FRAC_1_PI * (ambient + light_color * n_dot_l)
}
