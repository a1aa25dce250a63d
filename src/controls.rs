use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::PerspectiveCamera;

const EPS: f32 = 1e-6;

/// Pointer button that started a drag (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PointerButton(u8);

impl PointerButton {
    pub const PRIMARY: Self = Self(0);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitSettings {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    /// How far the camera may dolly in relative to its starting distance.
    /// three.js ignores `maxZoom` for perspective cameras; here it bounds the
    /// dolly on purpose, with minimum distance = initial distance / `max_zoom`.
    pub max_zoom: f32,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            max_zoom: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Spherical {
    radius: f32,
    phi: f32,
    theta: f32,
}

impl Spherical {
    fn from_offset(offset: Vec3) -> Self {
        let radius = offset.length();
        if radius <= EPS {
            return Self {
                radius,
                phi: 0.0,
                theta: 0.0,
            };
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    fn to_offset(self) -> Vec3 {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vec3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }
}

/// Orbits the camera around a target: drag rotates, wheel dollies.
///
/// Input methods only accumulate deltas; nothing moves until [`update`]
/// runs, once per frame.
///
/// [`update`]: OrbitControls::update
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    settings: OrbitSettings,
    min_distance: f32,
    max_distance: f32,
    element_height: f32,
    delta: Spherical,
    scale: f32,
    drag: Option<(PointerButton, Vec2)>,
}

impl OrbitControls {
    pub fn new(camera: &PerspectiveCamera, settings: OrbitSettings) -> Self {
        let distance = camera.position.distance(camera.target);
        Self {
            target: camera.target,
            min_distance: distance / settings.max_zoom.max(1.0),
            max_distance: f32::INFINITY,
            settings,
            element_height: 1.0,
            delta: Spherical {
                radius: 0.0,
                phi: 0.0,
                theta: 0.0,
            },
            scale: 1.0,
            drag: None,
        }
    }

    pub fn settings(&self) -> &OrbitSettings {
        &self.settings
    }

    pub fn min_distance(&self) -> f32 {
        self.min_distance
    }

    /// Height of the element receiving pointer input, in the same units as
    /// pointer positions.
    pub fn set_element_height(&mut self, height: f32) {
        self.element_height = height.max(1.0);
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn pointer_down(&mut self, button: PointerButton, position: Vec2) {
        if button == PointerButton::PRIMARY {
            self.drag = Some((button, position));
        }
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        let Some((button, start)) = self.drag else {
            return;
        };
        let delta = (position - start) * self.settings.rotate_speed;
        self.delta.theta -= 2.0 * PI * delta.x / self.element_height;
        self.delta.phi -= 2.0 * PI * delta.y / self.element_height;
        self.drag = Some((button, position));
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Negative `delta_y` (scrolling up) moves the camera closer.
    pub fn wheel(&mut self, delta_y: f32) {
        let zoom_scale = 0.95f32.powf(self.settings.zoom_speed);
        if delta_y < 0.0 {
            self.scale *= zoom_scale;
        } else if delta_y > 0.0 {
            self.scale /= zoom_scale;
        }
    }

    /// Applies accumulated input to the camera. Returns whether it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let mut spherical = Spherical::from_offset(offset);

        let factor = if self.settings.enable_damping {
            self.settings.damping_factor
        } else {
            1.0
        };
        spherical.theta += self.delta.theta * factor;
        spherical.phi += self.delta.phi * factor;
        spherical.phi = spherical.phi.clamp(EPS, PI - EPS);
        spherical.radius = (spherical.radius * self.scale).clamp(self.min_distance, self.max_distance);

        let position = self.target + spherical.to_offset();
        let moved = position.distance_squared(camera.position) > EPS * EPS;
        camera.position = position;
        camera.look_at(self.target);

        if self.settings.enable_damping {
            self.delta.theta *= 1.0 - self.settings.damping_factor;
            self.delta.phi *= 1.0 - self.settings.damping_factor;
        } else {
            self.delta.theta = 0.0;
            self.delta.phi = 0.0;
        }
        self.scale = 1.0;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        let mut camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0);
        camera.position = Vec3::new(0.0, 0.0, 3.0);
        camera.look_at(Vec3::ZERO);
        camera
    }

    #[test]
    fn idle_update_keeps_camera_still() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        assert!(!controls.update(&mut camera));
        assert!((camera.position - Vec3::new(0.0, 0.0, 3.0)).length() < 1e-4);
    }

    #[test]
    fn drag_rotates_with_damping() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        controls.set_element_height(600.0);
        controls.pointer_down(PointerButton::PRIMARY, Vec2::new(100.0, 100.0));
        controls.pointer_move(Vec2::new(250.0, 100.0));
        controls.pointer_up();

        assert!(controls.update(&mut camera));
        let first = camera.position;
        assert!((first.length() - 3.0).abs() < 1e-4);
        assert!(first.x < 0.0);

        // Damping keeps the camera drifting after the pointer is released.
        assert!(controls.update(&mut camera));
        assert!(camera.position.x < first.x);
    }

    #[test]
    fn zoom_is_limited_by_max_zoom() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        for _ in 0..200 {
            controls.wheel(-100.0);
            controls.update(&mut camera);
        }
        assert!((camera.position.length() - 1.5).abs() < 1e-4);
        controls.wheel(100.0);
        controls.update(&mut camera);
        assert!(camera.position.length() > 1.5);
    }

    #[test]
    fn secondary_button_does_not_rotate() {
        let mut camera = camera();
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        controls.pointer_down(PointerButton::new(2), Vec2::ZERO);
        controls.pointer_move(Vec2::new(50.0, 0.0));
        assert!(!controls.is_dragging());
        assert!(!controls.update(&mut camera));
    }
}
