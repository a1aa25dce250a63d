use glam::Mat4;

use crate::camera::PerspectiveCamera;
use crate::color::Color;
use crate::frame::{RenderError, SceneRenderer};
use crate::scene::Scene;
use crate::viewport::RenderSurface;

use super::collect_draws;

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub node: String,
    pub material: String,
    pub triangles: usize,
}

/// Renderer without a GPU: records what a frame would draw.
///
/// Backs the `--summary-only` mode and lets the scene protocol run in tests.
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    size: (u32, u32),
    pixel_ratio: f32,
    clear_color: Color,
    frames: u64,
    last_frame: Vec<DrawCall>,
    firefly_instances: usize,
    view_proj: Mat4,
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self {
            size: (1, 1),
            pixel_ratio: 1.0,
            clear_color: Color::BLACK,
            frames: 0,
            last_frame: Vec::new(),
            firefly_instances: 0,
            view_proj: Mat4::IDENTITY,
        }
    }
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_frame(&self) -> &[DrawCall] {
        &self.last_frame
    }

    pub fn firefly_instances(&self) -> usize {
        self.firefly_instances
    }

    pub fn view_proj(&self) -> Mat4 {
        self.view_proj
    }
}

impl RenderSurface for HeadlessRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = pixel_ratio;
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }
}

impl SceneRenderer for HeadlessRenderer {
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError> {
        self.last_frame = collect_draws(scene)
            .into_iter()
            .map(|draw| DrawCall {
                node: draw.node.name.clone(),
                material: draw.material.describe(),
                triangles: draw
                    .node
                    .primitives
                    .iter()
                    .map(|primitive| primitive.indices.len() / 3)
                    .sum(),
            })
            .collect();
        self.firefly_instances = scene
            .fireflies
            .as_ref()
            .map(|fireflies| fireflies.field.len())
            .unwrap_or(0);
        self.view_proj = camera.view_proj();
        self.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{Material, Side};
    use crate::scene::{MeshPrimitive, SceneNode};
    use crate::texture::{ColorSpace, TextureHandle, TextureImage};

    fn triangle() -> MeshPrimitive {
        MeshPrimitive {
            positions: vec![[0.0; 3]; 3],
            normals: vec![[0.0, 0.0, 1.0]; 3],
            uvs: vec![[0.0; 2]; 3],
            indices: vec![0, 1, 2],
        }
    }

    #[test]
    fn baked_meshes_wait_for_their_texture() {
        let texture = TextureHandle::new("baked.jpg", false, ColorSpace::Srgb);
        let mut baked = SceneNode::new(1, "baked").with_primitive(triangle());
        baked.material = Some(Material::baked(texture.clone()));
        let mut pole = SceneNode::new(2, "poleLightA").with_primitive(triangle());
        pole.material = Some(Material::flat(Color::from_hex(0xfaeb64), Side::Front));
        let mut bare = SceneNode::new(3, "empty");
        bare.material = Some(Material::flat(Color::WHITE, Side::Front));
        let scene = Scene {
            model: Some(
                SceneNode::new(0, "Scene")
                    .with_child(baked)
                    .with_child(pole)
                    .with_child(bare),
            ),
            fireflies: None,
        };
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
        let mut renderer = HeadlessRenderer::new();

        renderer.render(&scene, &camera).unwrap();
        assert_eq!(renderer.last_frame().len(), 1);
        assert_eq!(renderer.last_frame()[0].node, "poleLightA");

        texture.set_image(TextureImage {
            width: 1,
            height: 1,
            pixels: vec![0; 4],
        });
        renderer.render(&scene, &camera).unwrap();
        assert_eq!(renderer.last_frame().len(), 2);
        assert_eq!(renderer.last_frame()[0].triangles, 1);
        assert_eq!(renderer.frames(), 2);
    }
}
