use std::fs;
use std::path::PathBuf;

use wgpu_bloom::asset::import::{DefaultImporter, ImportError, PostProcessSteps, SceneImporter};
use wgpu_bloom::asset::model::flatten_scene;
use wgpu_bloom::renderer::TextureKind;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wgpu-bloom-{}-{}", name, std::process::id()));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// One triangle: positions, uvs and u16 indices packed into a single buffer.
fn triangle_buffer() -> Vec<u8> {
    let mut bytes = Vec::new();
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for value in [0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0] {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    for index in [0u16, 1, 2, 0] {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    bytes
}

/// `parent(tri_a) -> [child_a(tri_b), child_b(tri_a)]`, both materials sharing one
/// diffuse image; the second also carries a normal map.
fn write_scene(dir: &std::path::Path) -> PathBuf {
    let buffer = triangle_buffer();
    let json = format!(
        r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [
    {{ "name": "parent", "mesh": 0, "children": [1, 2] }},
    {{ "name": "child_a", "mesh": 1 }},
    {{ "name": "child_b", "mesh": 0 }}
  ],
  "meshes": [
    {{ "name": "tri_a", "primitives": [{{ "attributes": {{ "POSITION": 0, "TEXCOORD_0": 1 }}, "indices": 2, "material": 0 }}] }},
    {{ "name": "tri_b", "primitives": [{{ "attributes": {{ "POSITION": 0, "TEXCOORD_0": 1 }}, "indices": 2, "material": 1 }}] }}
  ],
  "materials": [
    {{ "name": "plain", "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }} }},
    {{ "name": "bumpy", "pbrMetallicRoughness": {{ "baseColorTexture": {{ "index": 0 }} }}, "normalTexture": {{ "index": 1 }} }}
  ],
  "textures": [{{ "source": 0 }}, {{ "source": 1 }}],
  "images": [{{ "uri": "checker.png" }}, {{ "uri": "normal%20map.png" }}],
  "buffers": [{{ "byteLength": {len}, "uri": "data:application/octet-stream;base64,{data}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 24 }},
    {{ "buffer": 0, "byteOffset": 60, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0] }},
    {{ "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" }},
    {{ "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
        len = buffer.len(),
        data = base64::encode(&buffer),
    );
    let path = dir.join("scene.gltf");
    fs::write(&path, json).expect("write gltf");
    path
}

fn steps() -> PostProcessSteps {
    PostProcessSteps::TRIANGULATE
        | PostProcessSteps::GEN_SMOOTH_NORMALS
        | PostProcessSteps::FLIP_UVS
        | PostProcessSteps::CALC_TANGENT_SPACE
}

#[test]
fn units_follow_depth_first_node_order() {
    let dir = scratch_dir("gltf-order");
    let scene = DefaultImporter
        .import(&write_scene(&dir), steps())
        .expect("import");
    assert!(!scene.incomplete);

    let flat = flatten_scene(&scene);
    let names: Vec<_> = flat.units.iter().map(|unit| unit.name.as_str()).collect();
    assert_eq!(names, ["tri_a#0", "tri_b#0", "tri_a#0"]);
    for unit in &flat.units {
        assert_eq!(unit.indices, [0, 1, 2]);
        assert_eq!(unit.vertices.len(), 3);
    }
    fs::remove_dir_all(dir).ok();
}

#[test]
fn shared_images_are_requested_once() {
    let dir = scratch_dir("gltf-dedup");
    let scene = DefaultImporter
        .import(&write_scene(&dir), steps())
        .expect("import");
    let flat = flatten_scene(&scene);

    let paths: Vec<_> = flat.textures.iter().map(|t| t.path.as_str()).collect();
    assert_eq!(paths, ["checker.png", "normal map.png"]);
    assert_eq!(flat.textures[1].kind, TextureKind::Normal);

    assert_eq!(flat.units[0].textures, [(TextureKind::Diffuse, 0)]);
    assert_eq!(
        flat.units[1].textures,
        [(TextureKind::Diffuse, 0), (TextureKind::Normal, 1)]
    );
    fs::remove_dir_all(dir).ok();
}

#[test]
fn uvs_arrive_with_a_top_left_origin() {
    let dir = scratch_dir("gltf-uv");
    let scene = DefaultImporter
        .import(&write_scene(&dir), steps())
        .expect("import");
    let flat = flatten_scene(&scene);

    let uvs: Vec<_> = flat.units[0].vertices.iter().map(|v| v.tex_coords).collect();
    assert_eq!(uvs, [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
    for vertex in &flat.units[0].vertices {
        assert!((vertex.normal[2].abs() - 1.0).abs() < 1e-5);
    }
    fs::remove_dir_all(dir).ok();
}

#[test]
fn missing_and_unknown_files_are_errors() {
    let dir = scratch_dir("gltf-missing");
    let missing = DefaultImporter.import(&dir.join("nope.gltf"), steps());
    assert!(matches!(missing, Err(ImportError::Io { .. })));

    let unknown = DefaultImporter.import(&dir.join("scene.fbx"), steps());
    assert!(matches!(unknown, Err(ImportError::Unsupported { .. })));
    fs::remove_dir_all(dir).ok();
}
