use std::cell::Cell;
use std::rc::Rc;

use instant::Instant;

/// Monotonic source of elapsed seconds since the scene started.
pub trait Clock {
    fn elapsed_seconds(&self) -> f32;
}

/// Wall clock that also works in the browser.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed_seconds(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

/// Clock driven by hand; clones share the same reading.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f32>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f32) {
        self.now.set(seconds);
    }
}

impl Clock for ManualClock {
    fn elapsed_seconds(&self) -> f32 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.set(1.5);
        assert_eq!(clock.elapsed_seconds(), 1.5);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.elapsed_seconds();
        let b = clock.elapsed_seconds();
        assert!(b >= a);
    }
}
