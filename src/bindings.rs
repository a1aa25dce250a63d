use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::material::Material;
use crate::scene::SceneNode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("model is missing required node(s): {}", .0.join(", "))]
    MissingNodes(Vec<String>),
}

/// Table of `node name -> material` applied to a freshly loaded model.
#[derive(Debug, Clone, Default)]
pub struct MaterialBindings {
    entries: Vec<(String, Arc<Material>)>,
}

impl MaterialBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the material bound to `node`.
    pub fn bind(mut self, node: impl Into<String>, material: Arc<Material>) -> Self {
        self.insert(node, material);
        self
    }

    pub fn insert(&mut self, node: impl Into<String>, material: Arc<Material>) {
        let node = node.into();
        match self.entries.iter_mut().find(|(name, _)| *name == node) {
            Some(entry) => entry.1 = material,
            None => self.entries.push((node, material)),
        }
    }

    pub fn get(&self, node: &str) -> Option<&Arc<Material>> {
        self.entries
            .iter()
            .find(|(name, _)| name == node)
            .map(|(_, material)| material)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Assigns every material to its node under `root`.
    ///
    /// Every name is resolved before any slot is written, so a missing node
    /// leaves the tree untouched. Applying the same table twice produces the
    /// same assignments. Returns the number of slots written.
    pub fn apply(&self, root: &mut SceneNode) -> Result<usize, BindError> {
        let mut resolved = Vec::with_capacity(self.entries.len());
        let mut missing = Vec::new();
        for (name, material) in &self.entries {
            match root.find_path(name) {
                Some(path) => resolved.push((name, path, material)),
                None => missing.push(name.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(BindError::MissingNodes(missing));
        }

        for (name, path, material) in &resolved {
            let Some(node) = root.node_at_path_mut(path) else {
                continue;
            };
            if !node.has_geometry() {
                warn!("binding material to node {name} which has no geometry");
            }
            debug!("{name} -> {}", material.describe());
            node.material = Some(Arc::clone(material));
        }
        Ok(resolved.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::material::Side;
    use crate::scene::MeshPrimitive;

    fn mesh(id: usize, name: &str) -> SceneNode {
        SceneNode::new(id, name).with_primitive(MeshPrimitive::default())
    }

    fn model() -> SceneNode {
        SceneNode::new(0, "Scene")
            .with_child(mesh(1, "baked"))
            .with_child(mesh(2, "poleLightA"))
            .with_child(SceneNode::new(3, "group").with_child(mesh(4, "poleLightB")))
    }

    #[test]
    fn shared_material_lands_on_every_listed_node() {
        let pole = Material::flat(Color::from_hex(0xfaeb64), Side::Front);
        let bindings = MaterialBindings::new()
            .bind("poleLightA", Arc::clone(&pole))
            .bind("poleLightB", Arc::clone(&pole));
        let mut root = model();
        assert_eq!(bindings.apply(&mut root).unwrap(), 2);
        let a = root.get_object_by_name("poleLightA").unwrap();
        let b = root.get_object_by_name("poleLightB").unwrap();
        assert!(Arc::ptr_eq(a.material.as_ref().unwrap(), &pole));
        assert!(Arc::ptr_eq(b.material.as_ref().unwrap(), &pole));
        assert!(root.get_object_by_name("baked").unwrap().material.is_none());
    }

    #[test]
    fn missing_nodes_are_all_reported_and_nothing_changes() {
        let bindings = MaterialBindings::new()
            .bind("baked", Material::flat(Color::WHITE, Side::Front))
            .bind("portalLight", Material::flat(Color::WHITE, Side::Double))
            .bind("ghost", Material::flat(Color::BLACK, Side::Front));
        let mut root = model();
        let err = bindings.apply(&mut root).unwrap_err();
        assert_eq!(
            err,
            BindError::MissingNodes(vec!["portalLight".into(), "ghost".into()])
        );
        assert!(root.get_object_by_name("baked").unwrap().material.is_none());
    }

    #[test]
    fn insert_replaces_existing_entries() {
        let mut bindings = MaterialBindings::new();
        bindings.insert("baked", Material::flat(Color::BLACK, Side::Front));
        bindings.insert("baked", Material::flat(Color::WHITE, Side::Front));
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get("baked").unwrap().describe(), "flat(#ffffff)");
    }

    #[test]
    fn binding_a_node_without_geometry_is_allowed() {
        let bindings =
            MaterialBindings::new().bind("group", Material::flat(Color::WHITE, Side::Front));
        let mut root = model();
        assert_eq!(bindings.apply(&mut root).unwrap(), 1);
    }
}
