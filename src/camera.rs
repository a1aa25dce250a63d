use glam::{Mat4, Vec3};

/// Right-handed perspective camera, three.js conventions (`-Z` forward).
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    projection: Mat4,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            fov,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
            up: Vec3::Y,
            projection: Mat4::IDENTITY,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Stores the new aspect ratio and recomputes the projection.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.update_projection_matrix();
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(
            self.fov.to_radians(),
            self.aspect.max(f32::EPSILON),
            self.near,
            self.far,
        );
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view()
    }
}
