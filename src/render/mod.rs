use std::sync::Arc;

use glam::Mat4;

use crate::material::Material;
use crate::scene::{Scene, SceneNode};

mod gpu;
mod headless;

pub use gpu::GpuRenderer;
pub use headless::{DrawCall, HeadlessRenderer};

/// A mesh node ready to be drawn.
#[derive(Debug, Clone)]
pub struct DrawItem<'a> {
    pub node: &'a SceneNode,
    pub world: Mat4,
    pub material: &'a Arc<Material>,
}

/// Nodes with both geometry and a material, in traversal order.
///
/// Baked meshes are held back until their texture has arrived.
pub fn collect_draws(scene: &Scene) -> Vec<DrawItem<'_>> {
    let mut draws = Vec::new();
    let Some(model) = &scene.model else {
        return draws;
    };
    model.visit(Mat4::IDENTITY, &mut |node, world| {
        let Some(material) = &node.material else {
            return;
        };
        if !node.has_geometry() {
            return;
        }
        if let Material::Baked(baked) = material.as_ref() {
            if !baked.texture.is_ready() {
                return;
            }
        }
        draws.push(DrawItem {
            node,
            world,
            material,
        });
    });
    draws
}
