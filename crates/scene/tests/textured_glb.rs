use std::io::Cursor;

use anyhow::Result;
use krishi_scene::{surface_color, AlphaMode, MaterialUniforms, Model, WrapMode};

fn png(pixel: [u8; 4]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    image::RgbaImage::from_pixel(4, 4, image::Rgba(pixel))
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
    Ok(out)
}

fn pad(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

/// A quad whose texture is stored in the BIN chunk, as exporters write `.glb`.
fn textured_quad_glb(image: &[u8]) -> Vec<u8> {
    let positions: [[f32; 3]; 4] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
    let uvs: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];
    let indices: [u16; 6] = [0, 1, 2, 0, 2, 3];

    let mut bin: Vec<u8> = positions.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
    let uv_offset = bin.len();
    bin.extend(uvs.iter().flatten().flat_map(|f| f.to_le_bytes()));
    let index_offset = bin.len();
    bin.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
    pad(&mut bin, 0);
    let image_offset = bin.len();
    bin.extend_from_slice(image);
    pad(&mut bin, 0);

    let json = serde_json::json!({
        "asset": { "version": "2.0", "generator": "krishi-web tests" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "name": "sign", "mesh": 0 }],
        "meshes": [{
            "name": "sign",
            "primitives": [{
                "attributes": { "POSITION": 0, "TEXCOORD_0": 1 },
                "indices": 2,
                "material": 0
            }]
        }],
        "materials": [{
            "pbrMetallicRoughness": {
                "baseColorFactor": [1.0, 1.0, 1.0, 1.0],
                "baseColorTexture": { "index": 0 }
            }
        }],
        "textures": [{ "source": 0 }],
        "images": [{ "bufferView": 3, "mimeType": "image/png" }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": uv_offset },
            { "buffer": 0, "byteOffset": uv_offset, "byteLength": index_offset - uv_offset },
            { "buffer": 0, "byteOffset": index_offset, "byteLength": 12 },
            { "buffer": 0, "byteOffset": image_offset, "byteLength": image.len() }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 4, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5126, "count": 4, "type": "VEC2" },
            { "bufferView": 2, "componentType": 5123, "count": 6, "type": "SCALAR" }
        ]
    });

    let mut json = json.to_string().into_bytes();
    pad(&mut json, b' ');

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(b"glTF");
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(json.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&json);
    glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"BIN\0");
    glb.extend_from_slice(&bin);
    glb
}

#[test]
fn test_glb_embedded_texture_is_decoded() -> Result<()> {
    let model = Model::from_slice(&textured_quad_glb(&png([30, 160, 60, 255])?))?;
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.triangle_count(), 2);

    let mesh = &model.meshes[0];
    assert_eq!(mesh.vertices[0].uv, [0.0, 1.0]);
    assert_eq!(mesh.vertices[2].uv, [1.0, 0.0]);

    let texture = mesh.base_color_texture.as_ref().expect("texture resolved");
    assert_eq!((texture.image.width, texture.image.height), (4, 4));
    assert_eq!(&texture.image.rgba[..4], &[30, 160, 60, 255]);
    // no sampler in the file: glTF default is repeat
    assert_eq!(texture.wrap_s, WrapMode::Repeat);
    assert_eq!(texture.wrap_t, WrapMode::Repeat);
    Ok(())
}

#[test]
fn test_opaque_material_ignores_texture_alpha() -> Result<()> {
    let model = Model::from_slice(&textured_quad_glb(&png([255, 255, 255, 64])?))?;
    let mesh = &model.meshes[0];
    assert_eq!(mesh.alpha_mode, AlphaMode::Opaque);

    let texel = glam::Vec4::new(1.0, 1.0, 1.0, 64.0 / 255.0);
    let color = surface_color(&MaterialUniforms::for_mesh(mesh), texel, glam::Vec4::ONE)
        .expect("opaque surfaces are never discarded");
    assert!((color.w - 1.0).abs() < f32::EPSILON);
    Ok(())
}
