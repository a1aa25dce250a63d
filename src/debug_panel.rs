use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;
use crate::uniforms::{UniformBus, UniformError, UniformValue, U_COLOR_END, U_COLOR_START, U_SIZE};

/// Panel entry that edits the renderer's clear color rather than a uniform.
pub const CLEAR_COLOR: &str = "clearColor";

/// Uniforms the panel is allowed to edit.
pub const PANEL_UNIFORMS: &[&str] = &[U_SIZE, U_COLOR_START, U_COLOR_END];

/// Slider bounds for `uSize`.
pub const SIZE_RANGE: PanelRange = PanelRange {
    min: 0.0,
    max: 500.0,
    step: 1.0,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PanelError {
    #[error("debug panel is disabled")]
    Disabled,
    #[error(transparent)]
    Uniform(#[from] UniformError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl PanelRange {
    /// Snaps to the nearest step and clamps into `[min, max]`. NaN maps to `min`.
    pub fn constrain(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.min;
        }
        let snapped = self.min + ((value - self.min) / self.step).round() * self.step;
        snapped.clamp(self.min, self.max)
    }
}

/// Applies the registered slider range to an edit aimed at `name`.
pub fn constrain_edit(name: &str, edit: PanelEdit) -> PanelEdit {
    match edit {
        PanelEdit::Float(value) if name == U_SIZE => PanelEdit::Float(SIZE_RANGE.constrain(value)),
        other => other,
    }
}

/// Widget description handed to whatever GUI renders the panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PanelEntry {
    Range {
        name: String,
        value: f32,
        min: f32,
        max: f32,
        step: f32,
    },
    Color {
        name: String,
        /// `#rrggbb`
        value: String,
    },
}

impl PanelEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Range { name, .. } | Self::Color { name, .. } => name,
        }
    }
}

/// GUI toolkit seam.
pub trait DebugPanel {
    fn add_range(&mut self, name: &str, value: f32, min: f32, max: f32, step: f32);
    fn add_color(&mut self, name: &str, value: Color);
}

/// Panel that only records its entries, for export as JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelRegistry {
    entries: Vec<PanelEntry>,
}

impl PanelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[PanelEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(PanelEntry::name).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.entries)
    }
}

impl DebugPanel for PanelRegistry {
    fn add_range(&mut self, name: &str, value: f32, min: f32, max: f32, step: f32) {
        self.entries.push(PanelEntry::Range {
            name: name.to_string(),
            value,
            min,
            max,
            step,
        });
    }

    fn add_color(&mut self, name: &str, value: Color) {
        self.entries.push(PanelEntry::Color {
            name: name.to_string(),
            value: value.to_string(),
        });
    }
}

/// A value coming back from the GUI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelEdit {
    Float(f32),
    Color(Color),
}

impl PanelEdit {
    /// Reads a slider value or a `#rrggbb` / `0xrrggbb` color.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.starts_with('#') || trimmed.starts_with("0x") {
            return Color::parse(trimmed).ok().map(Self::Color);
        }
        trimmed.parse::<f32>().ok().map(Self::Float)
    }
}

impl From<PanelEdit> for UniformValue {
    fn from(edit: PanelEdit) -> Self {
        match edit {
            PanelEdit::Float(value) => UniformValue::Float(value),
            PanelEdit::Color(value) => UniformValue::Color(value),
        }
    }
}

/// Adds the particle size, both portal colors and the clear color, seeded
/// with their current values.
pub fn register_panel(
    panel: &mut impl DebugPanel,
    bus: &UniformBus,
    clear_color: Color,
) -> Result<(), UniformError> {
    panel.add_range(
        U_SIZE,
        bus.float(U_SIZE)?,
        SIZE_RANGE.min,
        SIZE_RANGE.max,
        SIZE_RANGE.step,
    );
    panel.add_color(U_COLOR_START, bus.color(U_COLOR_START)?);
    panel.add_color(U_COLOR_END, bus.color(U_COLOR_END)?);
    panel.add_color(CLEAR_COLOR, clear_color);
    Ok(())
}
