use log::debug;
use serde::{Deserialize, Serialize};

use crate::camera::PerspectiveCamera;
use crate::color::Color;
use crate::uniforms::{UniformBus, UniformError, PIXEL_RATIO_UNIFORMS};

/// Window size in logical pixels plus the clamped device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl ViewportState {
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Drawing-buffer size in physical pixels.
    pub fn physical_size(&self) -> (u32, u32) {
        (
            ((self.width as f32 * self.pixel_ratio).round() as u32).max(1),
            ((self.height as f32 * self.pixel_ratio).round() as u32).max(1),
        )
    }
}

/// Raw resize signal as reported by the window system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeEvent {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f64,
}

impl ResizeEvent {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }
}

/// `min(raw, max)`, falling back to `1.0` for ratios a window system should
/// never report.
pub fn clamp_pixel_ratio(raw: f64, max: f32) -> f32 {
    if !raw.is_finite() || raw <= 0.0 {
        return 1.0;
    }
    (raw as f32).min(max)
}

/// The drawing surface a renderer exposes to the resize protocol.
pub trait RenderSurface {
    /// Logical size; the drawing buffer is this times the pixel ratio.
    fn set_size(&mut self, width: u32, height: u32);
    fn set_pixel_ratio(&mut self, pixel_ratio: f32);
    fn set_clear_color(&mut self, color: Color);
}

#[derive(Debug, Clone)]
pub struct Viewport {
    state: ViewportState,
    max_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(event: ResizeEvent, max_pixel_ratio: f32) -> Self {
        Self {
            state: ViewportState {
                width: event.width.max(1),
                height: event.height.max(1),
                pixel_ratio: clamp_pixel_ratio(event.device_pixel_ratio, max_pixel_ratio),
            },
            max_pixel_ratio,
        }
    }

    pub fn state(&self) -> ViewportState {
        self.state
    }

    pub fn max_pixel_ratio(&self) -> f32 {
        self.max_pixel_ratio
    }

    /// Pushes the current state into every dependent: camera, surface, then
    /// pixel-ratio uniforms.
    pub fn apply(
        &self,
        camera: &mut PerspectiveCamera,
        surface: &mut impl RenderSurface,
        bus: &UniformBus,
    ) -> Result<(), UniformError> {
        let state = self.state;
        camera.set_aspect(state.aspect());
        surface.set_size(state.width, state.height);
        surface.set_pixel_ratio(state.pixel_ratio);
        for name in PIXEL_RATIO_UNIFORMS {
            if bus.contains(name) {
                bus.set(name, state.pixel_ratio)?;
            }
        }
        Ok(())
    }

    /// Handles one resize signal. Zero-area sizes (minimised windows) are
    /// ignored and leave every dependent untouched. Returns whether the
    /// state changed hands to the dependents.
    pub fn resize(
        &mut self,
        event: ResizeEvent,
        camera: &mut PerspectiveCamera,
        surface: &mut impl RenderSurface,
        bus: &UniformBus,
    ) -> Result<bool, UniformError> {
        if event.width == 0 || event.height == 0 {
            debug!("ignoring zero-area resize {}x{}", event.width, event.height);
            return Ok(false);
        }
        self.state = ViewportState {
            width: event.width,
            height: event.height,
            pixel_ratio: clamp_pixel_ratio(event.device_pixel_ratio, self.max_pixel_ratio),
        };
        self.apply(camera, surface, bus)?;
        Ok(true)
    }
}
