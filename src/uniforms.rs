use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec2;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;

pub const U_TIME: &str = "uTime";
pub const U_COLOR_START: &str = "uColorStart";
pub const U_COLOR_END: &str = "uColorEnd";
pub const U_PIXEL_RATIO: &str = "uPixelRatio";
pub const U_SIZE: &str = "uSize";

/// Entries that mirror the viewport's clamped pixel ratio.
pub const PIXEL_RATIO_UNIFORMS: &[&str] = &[U_PIXEL_RATIO];

/// Typed value stored under a uniform name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum UniformValue {
    Float(f32),
    Color(Color),
    Vec2(Vec2),
}

impl UniformValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Float(_) => "float",
            Self::Color(_) => "color",
            Self::Vec2(_) => "vec2",
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Self::Color(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

/// Unsuffixed float literals default to `f64`.
impl From<f64> for UniformValue {
    fn from(value: f64) -> Self {
        Self::Float(value as f32)
    }
}

impl From<Color> for UniformValue {
    fn from(value: Color) -> Self {
        Self::Color(value)
    }
}

impl From<&Color> for UniformValue {
    fn from(value: &Color) -> Self {
        Self::Color(*value)
    }
}

impl From<Vec2> for UniformValue {
    fn from(value: Vec2) -> Self {
        Self::Vec2(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UniformError {
    #[error("unknown uniform `{0}`")]
    Unknown(String),
    #[error("uniform `{name}` holds a {expected} value, got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Shared table of named uniform values.
///
/// Cloning a bus clones the handle, not the values: every material holding a
/// clone reads the same entries. The set of names is fixed once the scene has
/// been assembled; `set` only ever overwrites an existing entry with a value of
/// the same type.
#[derive(Debug, Default)]
pub struct UniformBus {
    entries: Arc<RwLock<BTreeMap<String, UniformValue>>>,
}

impl Clone for UniformBus {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl UniformBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the five portal scene entries.
    pub fn portal(color_start: Color, color_end: Color, pixel_ratio: f32, size: f32) -> Self {
        let bus = Self::new();
        bus.declare(U_TIME, 0.0);
        bus.declare(U_COLOR_START, color_start);
        bus.declare(U_COLOR_END, color_end);
        bus.declare(U_PIXEL_RATIO, pixel_ratio);
        bus.declare(U_SIZE, size);
        bus
    }

    /// Adds (or redefines) an entry. Intended for startup only.
    pub fn declare(&self, name: &str, value: impl Into<UniformValue>) {
        self.entries.write().insert(name.to_string(), value.into());
    }

    /// Overwrites an existing entry with a copy of `value`.
    pub fn set(&self, name: &str, value: impl Into<UniformValue>) -> Result<(), UniformError> {
        let value = value.into();
        let mut entries = self.entries.write();
        let slot = entries
            .get_mut(name)
            .ok_or_else(|| UniformError::Unknown(name.to_string()))?;
        if std::mem::discriminant(slot) != std::mem::discriminant(&value) {
            return Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected: slot.kind(),
                actual: value.kind(),
            });
        }
        *slot = value;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<UniformValue, UniformError> {
        self.entries
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| UniformError::Unknown(name.to_string()))
    }

    pub fn float(&self, name: &str) -> Result<f32, UniformError> {
        let value = self.get(name)?;
        value.as_float().ok_or(UniformError::TypeMismatch {
            name: name.to_string(),
            expected: "float",
            actual: value.kind(),
        })
    }

    pub fn color(&self, name: &str) -> Result<Color, UniformError> {
        let value = self.get(name)?;
        value.as_color().ok_or(UniformError::TypeMismatch {
            name: name.to_string(),
            expected: "color",
            actual: value.kind(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns true when both handles point at the same entries.
    pub fn shares_entries_with(&self, other: &UniformBus) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> UniformBus {
        UniformBus::portal(Color::BLACK, Color::WHITE, 1.0, 100.0)
    }

    #[test]
    fn clones_share_entries() {
        let bus = bus();
        let other = bus.clone();
        bus.set(U_SIZE, 250.0).unwrap();
        assert_eq!(other.float(U_SIZE).unwrap(), 250.0);
        assert!(bus.shares_entries_with(&other));
        assert!(!bus.shares_entries_with(&UniformBus::new()));
    }

    #[test]
    fn set_rejects_unknown_names() {
        let err = bus().set("uMissing", 1.0).unwrap_err();
        assert_eq!(err, UniformError::Unknown("uMissing".into()));
    }

    #[test]
    fn set_rejects_type_changes() {
        let bus = bus();
        let err = bus.set(U_COLOR_START, 0.5).unwrap_err();
        assert!(matches!(
            err,
            UniformError::TypeMismatch {
                expected: "color",
                actual: "float",
                ..
            }
        ));
        assert_eq!(bus.color(U_COLOR_START).unwrap(), Color::BLACK);
    }

    #[test]
    fn color_set_stores_a_copy() {
        let bus = bus();
        let mut scratch = Color::from_hex(0x1a1a1a);
        bus.set(U_COLOR_START, &scratch).unwrap();
        scratch.set_hex(0xffffff);
        assert_eq!(bus.color(U_COLOR_START).unwrap().to_hex(), 0x1a1a1a);
    }

    #[test]
    fn names_are_sorted() {
        assert_eq!(
            bus().names(),
            vec![U_COLOR_END, U_COLOR_START, U_PIXEL_RATIO, U_SIZE, U_TIME]
        );
    }
}
