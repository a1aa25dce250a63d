#![allow(dead_code)]

use std::fs;
use std::path::Path;

use serde_json::json;

pub const PORTAL_NODES: &[&str] = &["baked", "portalLight", "poleLightA", "poleLightB"];

/// GLB whose named root nodes all share one textured triangle.
pub fn portal_glb(names: &[&str]) -> Vec<u8> {
    let mut bin = Vec::new();
    for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    for value in [0.0f32, 0.0, 1.0, 0.0, 0.0, 1.0] {
        bin.extend_from_slice(&value.to_le_bytes());
    }
    let nodes: Vec<_> = names
        .iter()
        .map(|name| json!({ "name": name, "mesh": 0 }))
        .collect();
    let roots: Vec<usize> = (0..names.len()).collect();
    let document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": roots }],
        "nodes": nodes,
        "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0, "TEXCOORD_0": 1 } }] }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 24 }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC2" }
        ]
    });
    let mut json = serde_json::to_vec(&document).expect("serialize glTF json");
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let total = 12 + 8 + json.len() + 8 + bin.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(b"BIN\0");
    out.extend_from_slice(&bin);
    out
}

/// Writes `portal.glb` and `baked.jpg` into `dir`.
pub fn write_assets(dir: &Path, names: &[&str]) {
    fs::write(dir.join("portal.glb"), portal_glb(names)).expect("write model");
    image::RgbImage::from_pixel(4, 4, image::Rgb([200, 120, 80]))
        .save(dir.join("baked.jpg"))
        .expect("write texture");
}
