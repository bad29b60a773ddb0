use anyhow::Result;
use glam::Vec3;
use krishi_scene::{CameraSettings, LightSettings, Model, PerspectiveCamera, Scene};

/// Unit cube corners followed by 12 triangles (u16 indices).
fn cube_bin() -> (Vec<u8>, usize, usize) {
    let corners: [[f32; 3]; 8] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [0.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
    ];
    let indices: [u16; 36] = [
        0, 2, 1, 1, 2, 3, // -z
        4, 5, 6, 5, 7, 6, // +z
        0, 1, 4, 1, 5, 4, // -y
        2, 6, 3, 3, 6, 7, // +y
        0, 4, 2, 2, 4, 6, // -x
        1, 3, 5, 3, 7, 5, // +x
    ];
    let mut bin: Vec<u8> = corners.iter().flatten().flat_map(|f| f.to_le_bytes()).collect();
    let positions_len = bin.len();
    bin.extend(indices.iter().flat_map(|i| i.to_le_bytes()));
    let indices_len = bin.len() - positions_len;
    (bin, positions_len, indices_len)
}

/// Build a binary glTF with the cube nested under two transformed nodes.
fn cube_glb(translation: [f32; 3], child_scale: f32) -> Vec<u8> {
    let (mut bin, positions_len, indices_len) = cube_bin();
    let json = serde_json::json!({
        "asset": { "version": "2.0", "generator": "krishi-web tests" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [
            { "name": "root", "translation": translation, "children": [1] },
            { "name": "body", "mesh": 0, "scale": [child_scale, child_scale, child_scale] }
        ],
        "materials": [{
            "pbrMetallicRoughness": { "baseColorFactor": [0.2, 0.6, 0.1, 1.0] }
        }],
        "meshes": [{
            "name": "cube",
            "primitives": [{ "attributes": { "POSITION": 0 }, "indices": 1, "material": 0 }]
        }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": positions_len },
            { "buffer": 0, "byteOffset": positions_len, "byteLength": indices_len }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 8, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 1.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": 36, "type": "SCALAR" }
        ]
    });

    let mut json = json.to_string().into_bytes();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

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
fn test_glb_cube_is_parsed() -> Result<()> {
    let model = Model::from_slice(&cube_glb([0.0, 0.0, 0.0], 1.0))?;
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.triangle_count(), 12);
    assert_eq!(model.meshes[0].base_color, [0.2, 0.6, 0.1, 1.0]);

    let bounds = model.local_bounds().expect("cube has geometry");
    assert!(bounds.min.abs_diff_eq(Vec3::ZERO, 1e-6));
    assert!(bounds.max.abs_diff_eq(Vec3::ONE, 1e-6));
    Ok(())
}

#[test]
fn test_centering_is_independent_of_authoring_offset() -> Result<()> {
    for (translation, child_scale) in [
        ([0.0, 0.0, 0.0], 1.0),
        ([12.5, -3.0, 40.0], 1.0),
        ([-100.0, 250.0, 0.25], 0.01),
        ([3.0, 3.0, 3.0], 7.0),
    ] {
        let mut model = Model::from_slice(&cube_glb(translation, child_scale))?;
        model.set_uniform_scale(30.0);
        model.center_at_origin();

        let bounds = model.world_bounds().expect("cube has geometry");
        assert!(
            bounds.center().abs_diff_eq(Vec3::ZERO, 1e-3),
            "offset {translation:?} scale {child_scale}: center {:?}",
            bounds.center()
        );
        let expected = Vec3::splat(30.0 * child_scale);
        assert!(bounds.size().abs_diff_eq(expected, 1e-2));
    }
    Ok(())
}

#[test]
fn test_centered_model_is_in_front_of_default_camera() -> Result<()> {
    let mut model = Model::from_slice(&cube_glb([40.0, 40.0, 40.0], 0.05))?;
    model.set_uniform_scale(30.0);
    model.center_at_origin();

    let mut scene = Scene::new(
        PerspectiveCamera::for_surface(&CameraSettings::default(), 1280.0, 720.0),
        LightSettings::default(),
    );
    scene.set_model(model);

    let uniforms = scene.frame_uniforms();
    let clip = glam::Mat4::from_cols_array_2d(&uniforms.view_proj)
        * glam::Mat4::from_cols_array_2d(&uniforms.model);
    // cube midpoint as baked into the flattened vertices
    let ndc = clip.project_point3(Vec3::splat(40.0 + 0.05 * 0.5));
    assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3, "{ndc:?}");
    assert!((0.0..=1.0).contains(&ndc.z));
    Ok(())
}

#[test]
fn test_truncated_glb_is_an_error() {
    let glb = cube_glb([0.0, 0.0, 0.0], 1.0);
    assert!(Model::from_slice(&glb[..glb.len() / 2]).is_err());
}
