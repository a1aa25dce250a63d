use std::sync::Arc;

use glam::Mat4;

use crate::fireflies::Fireflies;
use crate::material::Material;

/// Triangle geometry owned by a scene node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPrimitive {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl MeshPrimitive {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Node of the loaded model graph.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    /// Unique within one loaded model; used by renderers as a cache key.
    pub id: usize,
    pub name: String,
    pub transform: Mat4,
    pub primitives: Vec<MeshPrimitive>,
    pub material: Option<Arc<Material>>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            transform: Mat4::IDENTITY,
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_primitive(mut self, primitive: MeshPrimitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    pub fn has_geometry(&self) -> bool {
        !self.primitives.is_empty()
    }

    /// Depth-first search starting at this node; the first match wins.
    pub fn get_object_by_name(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.get_object_by_name(name))
    }

    /// Child-index path to the first node named `name`, empty for `self`.
    pub fn find_path(&self, name: &str) -> Option<Vec<usize>> {
        if self.name == name {
            return Some(Vec::new());
        }
        self.children.iter().enumerate().find_map(|(index, child)| {
            child.find_path(name).map(|mut path| {
                path.insert(0, index);
                path
            })
        })
    }

    pub fn node_at_path_mut(&mut self, path: &[usize]) -> Option<&mut SceneNode> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.children.get_mut(*first)?.node_at_path_mut(rest),
        }
    }

    /// Visits every node with its world transform, parents before children.
    pub fn visit<'a>(&'a self, parent: Mat4, visitor: &mut impl FnMut(&'a SceneNode, Mat4)) {
        let world = parent * self.transform;
        visitor(self, world);
        for child in &self.children {
            child.visit(world, visitor);
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }
}

/// Everything the renderer draws.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub model: Option<SceneNode>,
    pub fireflies: Option<Fireflies>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes that carry a material, in traversal order.
    pub fn material_assignments(&self) -> Vec<(String, Arc<Material>)> {
        let mut out = Vec::new();
        if let Some(model) = &self.model {
            model.visit(Mat4::IDENTITY, &mut |node, _| {
                if let Some(material) = &node.material {
                    out.push((node.name.clone(), Arc::clone(material)));
                }
            });
        }
        out
    }
}
