//! glTF model loading and placement
//!
//! Node hierarchies are flattened at load time: every primitive's vertices
//! are baked into the space of the glTF scene root, so the only transform
//! left on a [`Model`] is the root placement (uniform scale + position)
//! that the viewer adjusts.

use std::borrow::Cow;
use std::sync::Arc;

use base64::Engine as _;
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Quat, Vec3};
use gltf::mesh::Mode;
use thiserror::Error;

use crate::bounds::Aabb;
use crate::texture::{BaseColorTexture, TextureImage};

const DEFAULT_BASE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const DEFAULT_ALPHA_CUTOFF: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid glTF: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("glTF document has no scene")]
    NoScene,
    #[error("buffer {0} expects a binary chunk but the file has none")]
    MissingBinaryChunk(usize),
    #[error("buffer {index} references external file '{uri}', only embedded buffers are supported")]
    ExternalBuffer { index: usize, uri: String },
    #[error("buffer {index} has a malformed data uri")]
    MalformedDataUri {
        index: usize,
        #[source]
        source: Option<base64::DecodeError>,
    },
    #[error("mesh '{mesh}' primitive {primitive} has no POSITION attribute")]
    MissingPositions { mesh: String, primitive: usize },
}

/// Why an embedded image could not be used. Not fatal: the mesh falls
/// back to its base colour factor.
#[derive(Debug, Error)]
enum ImageError {
    #[error("external image '{0}' is not embedded")]
    External(String),
    #[error("malformed data uri")]
    MalformedDataUri,
    #[error("buffer view lies outside its buffer")]
    OutOfRange,
    #[error(transparent)]
    Decode(#[from] image::ImageError),
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    /// Linear RGBA, white unless the primitive has `COLOR_0`
    pub color: [f32; 4],
}

impl Vertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self {
            position,
            normal,
            uv: [0.0; 2],
            color: [1.0; 4],
        }
    }
}

/// glTF material alpha handling.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum AlphaMode {
    /// Alpha is ignored
    #[default]
    Opaque,
    /// Fragments below the cutoff are discarded, the rest are opaque
    Mask(f32),
    Blend,
}

impl AlphaMode {
    fn from_material(material: &gltf::Material<'_>) -> Self {
        match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => Self::Opaque,
            gltf::material::AlphaMode::Mask => {
                Self::Mask(material.alpha_cutoff().unwrap_or(DEFAULT_ALPHA_CUTOFF))
            }
            gltf::material::AlphaMode::Blend => Self::Blend,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub base_color: [f32; 4],
    pub base_color_texture: Option<BaseColorTexture>,
    pub alpha_mode: AlphaMode,
}

impl Mesh {
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices.iter().map(|v| Vec3::from(v.position))
    }
}

/// A loaded scene asset plus its root placement.
#[derive(Debug, Clone)]
pub struct Model {
    pub meshes: Vec<Mesh>,
    pub position: Vec3,
    pub scale: Vec3,
    local_bounds: Option<Aabb>,
}

impl Model {
    pub fn new(meshes: Vec<Mesh>) -> Self {
        let local_bounds = Aabb::from_points(meshes.iter().flat_map(Mesh::positions));
        Self {
            meshes,
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            local_bounds,
        }
    }

    /// Parse a `.glb` container or a `.gltf` JSON document with embedded buffers.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
        let buffers = load_buffers(&document, blob)?;
        let resources = Resources {
            images: load_images(&document, &buffers),
            buffers,
        };

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or(ModelError::NoScene)?;

        let mut meshes = Vec::new();
        for node in scene.nodes() {
            collect_node(&node, Mat4::IDENTITY, &resources, &mut meshes)?;
        }

        let model = Self::new(meshes);
        log::debug!(
            "Parsed glTF: {} meshes, {} triangles",
            model.meshes.len(),
            model.triangle_count()
        );
        Ok(model)
    }

    pub fn is_empty(&self) -> bool {
        self.local_bounds.is_none()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len() / 3).sum()
    }

    pub fn set_uniform_scale(&mut self, factor: f32) {
        self.scale = Vec3::splat(factor);
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, Quat::IDENTITY, self.position)
    }

    /// Bounds of the geometry before the root placement is applied.
    pub const fn local_bounds(&self) -> Option<Aabb> {
        self.local_bounds
    }

    /// Bounds of the geometry as placed in the world.
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.local_bounds.map(|b| b.transformed(&self.transform()))
    }

    /// Shift the model so the midpoint of its world bounds sits at the origin.
    ///
    /// Returns the center that was subtracted; an empty model is left as is.
    pub fn center_at_origin(&mut self) -> Vec3 {
        let Some(bounds) = self.world_bounds() else {
            return Vec3::ZERO;
        };
        let center = bounds.center();
        self.position -= center;
        center
    }
}

fn load_buffers(
    document: &gltf::Document,
    blob: Option<Vec<u8>>,
) -> Result<Vec<Vec<u8>>, ModelError> {
    let mut blob = blob;
    let mut buffers = Vec::new();
    for buffer in document.buffers() {
        let index = buffer.index();
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => blob
                .take()
                .ok_or(ModelError::MissingBinaryChunk(index))?,
            gltf::buffer::Source::Uri(uri) => decode_data_uri(index, uri)?,
        };
        buffers.push(data);
    }
    Ok(buffers)
}

enum DataUriError {
    NotDataUri,
    Malformed(Option<base64::DecodeError>),
}

/// Payload of a base64 `data:` uri.
fn data_uri_payload(uri: &str) -> Result<Vec<u8>, DataUriError> {
    let rest = uri.strip_prefix("data:").ok_or(DataUriError::NotDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::Malformed(None))?;
    if !header.ends_with(";base64") {
        return Err(DataUriError::Malformed(None));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| DataUriError::Malformed(Some(e)))
}

fn decode_data_uri(index: usize, uri: &str) -> Result<Vec<u8>, ModelError> {
    data_uri_payload(uri).map_err(|e| match e {
        DataUriError::NotDataUri => ModelError::ExternalBuffer {
            index,
            uri: uri.to_string(),
        },
        DataUriError::Malformed(source) => ModelError::MalformedDataUri { index, source },
    })
}

/// Decoded images, indexed like `document.images()`; `None` where an image
/// could not be used.
fn load_images(document: &gltf::Document, buffers: &[Vec<u8>]) -> Vec<Option<Arc<TextureImage>>> {
    document
        .images()
        .map(|image| match decode_image(&image, buffers) {
            Ok(decoded) => Some(Arc::new(decoded)),
            Err(e) => {
                log::warn!("Image {} left out: {e}", image.index());
                None
            }
        })
        .collect()
}

fn decode_image(image: &gltf::Image<'_>, buffers: &[Vec<u8>]) -> Result<TextureImage, ImageError> {
    let bytes: Cow<'_, [u8]> = match image.source() {
        gltf::image::Source::View { view, .. } => {
            let start = view.offset();
            let end = start + view.length();
            let slice = buffers
                .get(view.buffer().index())
                .and_then(|buffer| buffer.get(start..end))
                .ok_or(ImageError::OutOfRange)?;
            Cow::Borrowed(slice)
        }
        gltf::image::Source::Uri { uri, .. } => match data_uri_payload(uri) {
            Ok(bytes) => Cow::Owned(bytes),
            Err(DataUriError::NotDataUri) => return Err(ImageError::External(uri.to_string())),
            Err(DataUriError::Malformed(_)) => return Err(ImageError::MalformedDataUri),
        },
    };
    Ok(TextureImage::decode(&bytes)?)
}

struct Resources {
    buffers: Vec<Vec<u8>>,
    images: Vec<Option<Arc<TextureImage>>>,
}

impl Resources {
    /// The material's base colour texture and the texcoord set it samples.
    fn base_color_texture(&self, material: &gltf::Material<'_>) -> Option<(u32, BaseColorTexture)> {
        let info = material.pbr_metallic_roughness().base_color_texture()?;
        let texture = info.texture();
        let image = self.images.get(texture.source().index()).cloned().flatten()?;
        let sampler = texture.sampler();
        Some((
            info.tex_coord(),
            BaseColorTexture {
                image,
                wrap_s: sampler.wrap_s().into(),
                wrap_t: sampler.wrap_t().into(),
            },
        ))
    }
}

fn collect_node(
    node: &gltf::Node<'_>,
    parent: Mat4,
    resources: &Resources,
    out: &mut Vec<Mesh>,
) -> Result<(), ModelError> {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        let mesh_name = mesh
            .name()
            .map_or_else(|| format!("mesh{}", mesh.index()), str::to_string);

        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                log::warn!(
                    "Skipping {mesh_name} primitive {}: unsupported mode {:?}",
                    primitive.index(),
                    primitive.mode()
                );
                continue;
            }

            let reader = primitive.reader(|buffer| {
                resources.buffers.get(buffer.index()).map(Vec::as_slice)
            });

            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or_else(|| ModelError::MissingPositions {
                    mesh: mesh_name.clone(),
                    primitive: primitive.index(),
                })?
                .map(|p| world.transform_point3(Vec3::from(p)))
                .collect();

            let indices: Vec<u32> = reader.read_indices().map_or_else(
                || (0..positions.len() as u32).collect(),
                |indices| indices.into_u32().collect(),
            );

            let normals: Vec<Vec3> = match reader.read_normals() {
                Some(normals) => {
                    let normal_matrix = Mat3::from_mat4(world).inverse().transpose();
                    normals
                        .map(|n| (normal_matrix * Vec3::from(n)).normalize_or_zero())
                        .collect()
                }
                None => flat_normals(&positions, &indices),
            };

            let material = primitive.material();
            let texture = resources.base_color_texture(&material);
            let tex_coord_set = texture.as_ref().map_or(0, |(set, _)| *set);

            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(tex_coord_set)
                .map(|uvs| uvs.into_f32().collect())
                .unwrap_or_default();
            let colors: Vec<[f32; 4]> = reader
                .read_colors(0)
                .map(|colors| colors.into_rgba_f32().collect())
                .unwrap_or_default();

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, p)| Vertex {
                    position: p.to_array(),
                    normal: normals.get(i).copied().unwrap_or(Vec3::Y).to_array(),
                    uv: uvs.get(i).copied().unwrap_or([0.0; 2]),
                    color: colors.get(i).copied().unwrap_or([1.0; 4]),
                })
                .collect();

            out.push(Mesh {
                name: mesh_name.clone(),
                vertices,
                indices,
                base_color: material.pbr_metallic_roughness().base_color_factor(),
                base_color_texture: texture.map(|(_, texture)| texture),
                alpha_mode: AlphaMode::from_material(&material),
            });
        }
    }

    for child in node.children() {
        collect_node(&child, world, resources, out)?;
    }
    Ok(())
}

/// Area-weighted vertex normals for primitives that ship without them.
fn flat_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        if a >= positions.len() || b >= positions.len() || c >= positions.len() {
            continue;
        }
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.normalize_or(Vec3::Y))
        .collect()
}

impl Default for Mesh {
    fn default() -> Self {
        Self {
            name: String::new(),
            vertices: Vec::new(),
            indices: Vec::new(),
            base_color: DEFAULT_BASE_COLOR,
            base_color_texture: None,
            alpha_mode: AlphaMode::Opaque,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::WrapMode;

    fn cube_mesh(min: Vec3, max: Vec3) -> Mesh {
        let vertices = Aabb::new(min, max)
            .corners()
            .iter()
            .map(|c| Vertex::new(c.to_array(), [0.0, 1.0, 0.0]))
            .collect();
        Mesh {
            vertices,
            indices: vec![0, 1, 2, 1, 3, 2],
            ..Mesh::default()
        }
    }

    /// Triangle as a `.gltf` JSON document with a base64 data uri buffer.
    fn triangle_gltf(points: [[f32; 3]; 3], translation: [f32; 3]) -> Vec<u8> {
        let bytes: Vec<u8> = points
            .iter()
            .flatten()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        let min = Aabb::from_points(points.map(Vec3::from)).unwrap().min;
        let max = Aabb::from_points(points.map(Vec3::from)).unwrap().max;
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );
        serde_json::json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "mesh": 0, "translation": translation }],
            "meshes": [{ "name": "leaf", "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "buffers": [{ "byteLength": bytes.len(), "uri": uri }],
            "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": bytes.len() }],
            "accessors": [{
                "bufferView": 0,
                "componentType": 5126,
                "count": 3,
                "type": "VEC3",
                "min": min.to_array(),
                "max": max.to_array()
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_center_at_origin_after_scale() {
        let mut model = Model::new(vec![cube_mesh(Vec3::new(1.0, 2.0, 3.0), Vec3::new(3.0, 6.0, 5.0))]);
        model.set_uniform_scale(30.0);
        let center = model.center_at_origin();
        assert!(center.abs_diff_eq(Vec3::new(60.0, 120.0, 120.0), 1e-3));
        let bounds = model.world_bounds().unwrap();
        assert!(bounds.center().abs_diff_eq(Vec3::ZERO, 1e-3));
        assert!(bounds.size().abs_diff_eq(Vec3::new(60.0, 120.0, 60.0), 1e-3));
    }

    #[test]
    fn test_center_ignores_prior_position() {
        let mut model = Model::new(vec![cube_mesh(Vec3::splat(-1.0), Vec3::splat(4.0))]);
        model.position = Vec3::new(-50.0, 7.0, 1000.0);
        model.center_at_origin();
        assert!(model.world_bounds().unwrap().center().abs_diff_eq(Vec3::ZERO, 1e-3));
    }

    #[test]
    fn test_empty_model_is_left_alone() {
        let mut model = Model::new(Vec::new());
        assert!(model.is_empty());
        assert_eq!(model.center_at_origin(), Vec3::ZERO);
        assert_eq!(model.position, Vec3::ZERO);
    }

    #[test]
    fn test_from_gltf_json_applies_node_transform() {
        let doc = triangle_gltf(
            [[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]],
            [10.0, 0.0, 0.0],
        );
        let model = Model::from_slice(&doc).unwrap();
        assert_eq!(model.meshes.len(), 1);
        assert_eq!(model.meshes[0].name, "leaf");
        assert_eq!(model.meshes[0].indices, vec![0, 1, 2]);
        assert_eq!(model.triangle_count(), 1);

        let bounds = model.local_bounds().unwrap();
        assert!(bounds.min.abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-6));
        assert!(bounds.max.abs_diff_eq(Vec3::new(12.0, 2.0, 0.0), 1e-6));
    }

    #[test]
    fn test_missing_normals_are_generated() {
        let doc = triangle_gltf(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            [0.0, 0.0, 0.0],
        );
        let model = Model::from_slice(&doc).unwrap();
        for v in &model.meshes[0].vertices {
            assert!(Vec3::from(v.normal).abs_diff_eq(Vec3::Z, 1e-6));
        }
        assert_eq!(model.meshes[0].base_color, DEFAULT_BASE_COLOR);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            Model::from_slice(b"definitely not a model"),
            Err(ModelError::Gltf(_))
        ));
    }

    #[test]
    fn test_external_buffer_rejected() {
        assert!(matches!(
            decode_data_uri(0, "mini.bin"),
            Err(ModelError::ExternalBuffer { .. })
        ));
        assert!(matches!(
            decode_data_uri(1, "data:application/octet-stream,plain"),
            Err(ModelError::MalformedDataUri { index: 1, .. })
        ));
        assert_eq!(decode_data_uri(0, "data:;base64,AQID").unwrap(), vec![1, 2, 3]);
    }

    /// Triangle with TEXCOORD_0, COLOR_0 and a base colour texture whose
    /// image is given by `image_uri`.
    fn textured_triangle_gltf(image_uri: &str) -> Vec<u8> {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let uvs: [[f32; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let colors: [[f32; 4]; 3] = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0], [0.0, 0.0, 1.0, 1.0]];
        let mut bytes: Vec<u8> = positions.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
        bytes.extend(uvs.iter().flatten().flat_map(|f| f.to_le_bytes()));
        bytes.extend(colors.iter().flatten().flat_map(|f| f.to_le_bytes()));
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );
        serde_json::json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "mesh": 0 }],
            "meshes": [{ "primitives": [{
                "attributes": { "POSITION": 0, "TEXCOORD_0": 1, "COLOR_0": 2 },
                "material": 0
            }] }],
            "materials": [{
                "alphaMode": "MASK",
                "alphaCutoff": 0.25,
                "pbrMetallicRoughness": {
                    "baseColorFactor": [1.0, 0.5, 0.5, 1.0],
                    "baseColorTexture": { "index": 0 }
                }
            }],
            "textures": [{ "source": 0, "sampler": 0 }],
            "samplers": [{ "wrapS": 33071, "wrapT": 33648 }],
            "images": [{ "uri": image_uri }],
            "buffers": [{ "byteLength": bytes.len(), "uri": uri }],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
                { "buffer": 0, "byteOffset": 36, "byteLength": 24 },
                { "buffer": 0, "byteOffset": 60, "byteLength": 48 }
            ],
            "accessors": [
                {
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
                },
                { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" },
                { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" }
            ]
        })
        .to_string()
        .into_bytes()
    }

    fn png_data_uri() -> String {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(2, 2, image::Rgba([40, 120, 200, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&png)
        )
    }

    #[test]
    fn test_texture_uvs_and_colors_are_loaded() {
        let model = Model::from_slice(&textured_triangle_gltf(&png_data_uri())).unwrap();
        let mesh = &model.meshes[0];

        assert_eq!(mesh.base_color, [1.0, 0.5, 0.5, 1.0]);
        assert_eq!(mesh.alpha_mode, AlphaMode::Mask(0.25));
        let uvs: Vec<[f32; 2]> = mesh.vertices.iter().map(|v| v.uv).collect();
        assert_eq!(uvs, vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(mesh.vertices[1].color, [0.0, 1.0, 0.0, 1.0]);

        let texture = mesh.base_color_texture.as_ref().unwrap();
        assert_eq!(texture.wrap_s, WrapMode::ClampToEdge);
        assert_eq!(texture.wrap_t, WrapMode::MirroredRepeat);
        assert_eq!((texture.image.width, texture.image.height), (2, 2));
        assert_eq!(&texture.image.rgba[..4], &[40, 120, 200, 255]);
    }

    #[test]
    fn test_unusable_image_keeps_base_color() {
        for uri in ["textures/leaf.png", "data:image/png;base64,bm90IGEgcG5n"] {
            let model = Model::from_slice(&textured_triangle_gltf(uri)).unwrap();
            let mesh = &model.meshes[0];
            assert!(mesh.base_color_texture.is_none(), "{uri}");
            assert_eq!(mesh.base_color, [1.0, 0.5, 0.5, 1.0]);
            assert_eq!(mesh.vertices[2].uv, [0.0, 1.0]);
        }
    }

    #[test]
    fn test_untextured_vertices_are_white() {
        let doc = triangle_gltf(
            [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            [0.0, 0.0, 0.0],
        );
        let model = Model::from_slice(&doc).unwrap();
        let mesh = &model.meshes[0];
        assert!(mesh.base_color_texture.is_none());
        assert_eq!(mesh.alpha_mode, AlphaMode::Opaque);
        assert!(mesh.vertices.iter().all(|v| v.color == [1.0; 4] && v.uv == [0.0; 2]));
    }
}
