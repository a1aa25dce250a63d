//! glTF / GLB decoding into a [`SceneNode`] tree.

use glam::Mat4;
use log::{debug, warn};

use crate::assets::LoadError;
use crate::scene::{MeshPrimitive, SceneNode};

const DRACO_EXTENSION: &str = "KHR_draco_mesh_compression";

/// Name given to the synthetic root that holds the default scene's nodes.
pub const ROOT_NAME: &str = "Scene";

/// Decodes a self-contained glTF asset (GLB, or JSON with embedded buffers
/// in a GLB container) into a node tree.
///
/// Geometry is read from the binary chunk only; assets that reference
/// external buffer files or use Draco mesh compression are rejected.
pub fn load_gltf(bytes: &[u8]) -> Result<SceneNode, LoadError> {
    reject_draco(bytes)?;
    let gltf = gltf::Gltf::from_slice(bytes)?;

    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or(LoadError::MissingBuffer(buffer.index()))?;
                buffers.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                return Err(LoadError::ExternalBuffer(uri.to_string()));
            }
        }
    }

    let mut next_id = 0;
    let mut root = SceneNode::new(next_id, ROOT_NAME);
    next_id += 1;
    let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
    if let Some(scene) = scene {
        for node in scene.nodes() {
            root.children.push(convert_node(&node, &buffers, &mut next_id)?);
        }
    }
    debug!("decoded glTF with {} nodes", root.node_count());
    Ok(root)
}

fn reject_draco(bytes: &[u8]) -> Result<(), LoadError> {
    let glb = gltf::Glb::from_slice(bytes);
    let json: &[u8] = match &glb {
        Ok(glb) => &*glb.json,
        Err(_) => bytes,
    };
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(json) else {
        // Let the glTF parser report malformed documents.
        return Ok(());
    };
    let mentions_draco = ["extensionsUsed", "extensionsRequired"].iter().any(|key| {
        value
            .get(key)
            .and_then(serde_json::Value::as_array)
            .is_some_and(|names| names.iter().any(|name| name == DRACO_EXTENSION))
    });
    if mentions_draco {
        return Err(LoadError::Unsupported(format!(
            "{DRACO_EXTENSION} compressed meshes"
        )));
    }
    Ok(())
}

fn convert_node(
    node: &gltf::Node<'_>,
    buffers: &[Vec<u8>],
    next_id: &mut usize,
) -> Result<SceneNode, LoadError> {
    let mut converted = SceneNode::new(*next_id, node.name().unwrap_or_default());
    *next_id += 1;
    converted.transform = Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                warn!(
                    "skipping {:?} primitive on node {}",
                    primitive.mode(),
                    converted.name
                );
                continue;
            }
            if let Some(primitive) = read_primitive(&primitive, buffers) {
                converted.primitives.push(primitive);
            }
        }
    }

    for child in node.children() {
        converted
            .children
            .push(convert_node(&child, buffers, next_id)?);
    }
    Ok(converted)
}

fn read_primitive(primitive: &gltf::Primitive<'_>, buffers: &[Vec<u8>]) -> Option<MeshPrimitive> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    let count = positions.len();
    let normals = reader
        .read_normals()
        .map(|normals| normals.collect())
        .unwrap_or_else(|| vec![[0.0, 0.0, 1.0]; count]);
    let uvs = reader
        .read_tex_coords(0)
        .map(|uvs| uvs.into_f32().collect())
        .unwrap_or_else(|| vec![[0.0, 0.0]; count]);
    let indices = reader
        .read_indices()
        .map(|indices| indices.into_u32().collect())
        .unwrap_or_else(|| (0..count as u32).collect());
    Some(MeshPrimitive {
        positions,
        normals,
        uvs,
        indices,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Builds a GLB with one triangle mesh shared by every named node.
    pub(crate) fn glb_with_nodes(names: &[&str], extensions_used: &[&str]) -> Vec<u8> {
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
        let scene_nodes: Vec<usize> = (0..names.len()).collect();
        let mut document = json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": scene_nodes }],
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
        if !extensions_used.is_empty() {
            document["extensionsUsed"] = json!(extensions_used);
        }
        pack_glb(&serde_json::to_vec(&document).unwrap(), &bin)
    }

    pub(crate) fn pack_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
        let mut json = json.to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
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

    #[test]
    fn loads_named_nodes_under_a_scene_root() {
        let bytes = glb_with_nodes(&["baked", "portalLight"], &[]);
        let root = load_gltf(&bytes).unwrap();
        assert_eq!(root.name, ROOT_NAME);
        assert_eq!(root.node_count(), 3);
        let portal = root.get_object_by_name("portalLight").unwrap();
        assert!(portal.has_geometry());
        let primitive = &portal.primitives[0];
        assert_eq!(primitive.vertex_count(), 3);
        assert_eq!(primitive.indices, vec![0, 1, 2]);
        assert_eq!(primitive.uvs[2], [0.0, 1.0]);
        assert_eq!(primitive.normals[0], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn node_ids_are_unique() {
        let root = load_gltf(&glb_with_nodes(&["a", "b", "c"], &[])).unwrap();
        let mut ids = Vec::new();
        root.visit(Mat4::IDENTITY, &mut |node, _| ids.push(node.id));
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn draco_assets_are_unsupported() {
        let bytes = glb_with_nodes(&["baked"], &[DRACO_EXTENSION]);
        assert!(matches!(load_gltf(&bytes), Err(LoadError::Unsupported(_))));
    }

    #[test]
    fn garbage_is_a_gltf_error() {
        assert!(matches!(load_gltf(b"nope"), Err(LoadError::Gltf(_))));
    }
}
