use log::trace;
use thiserror::Error;

use crate::camera::PerspectiveCamera;
use crate::clock::Clock;
use crate::scene::Scene;
use crate::uniforms::{UniformBus, UniformError, U_TIME};

#[derive(Debug, Error)]
pub enum RenderError {
    /// The surface needs reconfiguring; the frame can be retried next tick.
    #[error("surface lost or outdated")]
    SurfaceLost,
    #[error("out of GPU memory")]
    OutOfMemory,
    #[error("render failed: {0}")]
    Backend(String),
}

impl RenderError {
    /// Whether the frame loop should stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory)
    }
}

/// Draws a scene from a camera's point of view.
pub trait SceneRenderer {
    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> Result<(), RenderError>;
}

/// Drives the time uniform from a clock, once per tick.
pub struct FrameLoop {
    clock: Box<dyn Clock>,
    frames: u64,
}

impl FrameLoop {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self { clock, frames: 0 }
    }

    /// Reads the clock once and writes the reading into `uTime`.
    ///
    /// The value is the absolute elapsed time, so skipped or late ticks never
    /// accumulate drift.
    pub fn advance(&mut self, bus: &UniformBus) -> Result<f32, UniformError> {
        let elapsed = self.clock.elapsed_seconds();
        bus.set(U_TIME, elapsed)?;
        self.frames += 1;
        trace!("frame {} at {elapsed:.3}s", self.frames);
        Ok(elapsed)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn time_uniform_tracks_the_latest_reading() {
        let bus = UniformBus::new();
        bus.declare(U_TIME, 0.0);
        let clock = ManualClock::new();
        let mut frame_loop = FrameLoop::new(Box::new(clock.clone()));
        for t in [0.0, 0.5, 1.2] {
            clock.set(t);
            assert_eq!(frame_loop.advance(&bus).unwrap(), t);
        }
        assert_eq!(bus.float(U_TIME).unwrap(), 1.2);
        assert_eq!(frame_loop.frames(), 3);
    }

    #[test]
    fn missing_time_uniform_is_reported() {
        let mut frame_loop = FrameLoop::new(Box::new(ManualClock::new()));
        assert!(frame_loop.advance(&UniformBus::new()).is_err());
    }
}
