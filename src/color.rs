use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Straight RGB color with components in `[0, 1]`, stored in sRGB space.
///
/// `Color` is `Copy`: every assignment hands out an independent value, so a
/// color stored somewhere can never be changed through the variable it was
/// copied from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color `{input}`: expected #rgb, #rrggbb or 0xrrggbb")]
pub struct ColorParseError {
    pub input: String,
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Builds a color from a packed `0xrrggbb` value.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    /// Overwrites this color in place with a packed `0xrrggbb` value.
    pub fn set_hex(&mut self, hex: u32) {
        *self = Self::from_hex(hex);
    }

    pub fn to_hex(self) -> u32 {
        let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Parses `#rgb`, `#rrggbb`, `0xrrggbb` or bare `rrggbb`.
    pub fn parse(input: &str) -> Result<Self, ColorParseError> {
        let error = || ColorParseError {
            input: input.to_string(),
        };
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(error());
        }
        let expanded = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => digits.to_string(),
            _ => return Err(error()),
        };
        u32::from_str_radix(&expanded, 16)
            .map(Self::from_hex)
            .map_err(|_| error())
    }

    /// Converts to linear RGB for shading on an sRGB surface.
    pub fn to_linear(self) -> [f32; 3] {
        [
            srgb_to_linear(self.r),
            srgb_to_linear(self.g),
            srgb_to_linear(self.b),
        ]
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.to_hex())
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_notations() {
        assert_eq!(Color::parse("#faeb64").unwrap().to_hex(), 0xfaeb64);
        assert_eq!(Color::parse("0x201919").unwrap().to_hex(), 0x201919);
        assert_eq!(Color::parse("fff").unwrap(), Color::WHITE);
        assert_eq!(Color::parse(" #000 ").unwrap(), Color::BLACK);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Color::parse("#12345").is_err());
        assert!(Color::parse("#gggggg").is_err());
        assert!(Color::parse("").is_err());
    }

    #[test]
    fn display_round_trips_through_hex() {
        let color = Color::from_hex(0xb91fac);
        assert_eq!(color.to_string(), "#b91fac");
        assert_eq!(color.to_string().parse::<Color>().unwrap(), color);
    }

    #[test]
    fn linear_conversion_keeps_extremes() {
        assert_eq!(Color::BLACK.to_linear(), [0.0, 0.0, 0.0]);
        let white = Color::WHITE.to_linear();
        assert!(white.iter().all(|c| (c - 1.0).abs() < 1e-6));
        let mid = Color::new(0.5, 0.5, 0.5).to_linear()[0];
        assert!(mid > 0.2 && mid < 0.25);
    }
}
