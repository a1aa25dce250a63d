use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::color::Color;
use crate::shaders;
use crate::texture::TextureHandle;
use crate::uniforms::{UniformBus, UniformError, UniformValue};
use crate::uniforms::{U_COLOR_END, U_COLOR_START, U_PIXEL_RATIO, U_SIZE, U_TIME};

/// Faces rasterized for a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Front,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blending {
    #[default]
    Normal,
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    Portal,
    Fireflies,
}

/// A compiled-in WGSL program together with the uniform names it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgram {
    pub kind: ShaderKind,
    pub label: &'static str,
    pub source: &'static str,
    pub uniforms: &'static [&'static str],
}

impl ShaderProgram {
    pub const PORTAL: Self = Self {
        kind: ShaderKind::Portal,
        label: "portal",
        source: shaders::PORTAL,
        uniforms: &[U_TIME, U_COLOR_START, U_COLOR_END],
    };

    pub const FIREFLIES: Self = Self {
        kind: ShaderKind::Fireflies,
        label: "fireflies",
        source: shaders::FIREFLIES,
        uniforms: &[U_TIME, U_PIXEL_RATIO, U_SIZE],
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaterialError {
    #[error("{program} expects uniforms {expected:?} but {declared:?} were declared")]
    UniformSetMismatch {
        program: &'static str,
        expected: Vec<String>,
        declared: Vec<String>,
    },
    #[error(transparent)]
    Uniform(#[from] UniformError),
}

/// Material driven by a WGSL program whose uniforms live on a [`UniformBus`].
///
/// The material keeps a handle to the bus rather than a copy of the values,
/// so writes made through any clone of the bus are picked up on the next draw.
#[derive(Debug, Clone)]
pub struct ShaderMaterial {
    program: ShaderProgram,
    bus: UniformBus,
    uniforms: Vec<&'static str>,
    pub side: Side,
    pub blending: Blending,
    pub depth_write: bool,
    pub transparent: bool,
}

impl ShaderMaterial {
    /// Builds a material that declares `uniforms`.
    ///
    /// The declared set must equal the set the program reads, and every name
    /// must already exist on the bus.
    pub fn new(
        program: ShaderProgram,
        bus: &UniformBus,
        uniforms: &[&'static str],
    ) -> Result<Self, MaterialError> {
        let expected: BTreeSet<&str> = program.uniforms.iter().copied().collect();
        let declared: BTreeSet<&str> = uniforms.iter().copied().collect();
        if expected != declared || declared.len() != uniforms.len() {
            return Err(MaterialError::UniformSetMismatch {
                program: program.label,
                expected: expected.iter().map(|name| name.to_string()).collect(),
                declared: uniforms.iter().map(|name| name.to_string()).collect(),
            });
        }
        for name in uniforms {
            if !bus.contains(name) {
                return Err(UniformError::Unknown(name.to_string()).into());
            }
        }
        Ok(Self {
            program,
            bus: bus.clone(),
            uniforms: uniforms.to_vec(),
            side: Side::Front,
            blending: Blending::Normal,
            depth_write: true,
            transparent: false,
        })
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    pub fn with_blending(mut self, blending: Blending) -> Self {
        self.blending = blending;
        self
    }

    pub fn with_depth_write(mut self, depth_write: bool) -> Self {
        self.depth_write = depth_write;
        self
    }

    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }

    pub fn kind(&self) -> ShaderKind {
        self.program.kind
    }

    pub fn uniform_names(&self) -> &[&'static str] {
        &self.uniforms
    }

    /// Reads the current value of a declared uniform from the bus.
    pub fn uniform(&self, name: &str) -> Result<UniformValue, UniformError> {
        if !self.uniforms.iter().any(|declared| *declared == name) {
            return Err(UniformError::Unknown(name.to_string()));
        }
        self.bus.get(name)
    }

    pub fn bus(&self) -> &UniformBus {
        &self.bus
    }
}

#[derive(Debug, Clone)]
pub struct BakedMaterial {
    pub texture: TextureHandle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatMaterial {
    pub color: Color,
    pub side: Side,
}

/// Shading behaviour attached to a scene node.
#[derive(Debug, Clone)]
pub enum Material {
    Baked(BakedMaterial),
    Flat(FlatMaterial),
    Shader(ShaderMaterial),
}

impl Material {
    pub fn baked(texture: TextureHandle) -> Arc<Self> {
        Arc::new(Self::Baked(BakedMaterial { texture }))
    }

    pub fn flat(color: Color, side: Side) -> Arc<Self> {
        Arc::new(Self::Flat(FlatMaterial { color, side }))
    }

    pub fn shader(material: ShaderMaterial) -> Arc<Self> {
        Arc::new(Self::Shader(material))
    }

    /// Short description used in logs and the CLI summary.
    pub fn describe(&self) -> String {
        match self {
            Self::Baked(baked) => format!("baked({})", baked.texture.path()),
            Self::Flat(flat) => match flat.side {
                Side::Front => format!("flat({})", flat.color),
                Side::Double => format!("flat({}, double-sided)", flat.color),
            },
            Self::Shader(shader) => format!("shader({})", shader.program().label),
        }
    }

    pub fn side(&self) -> Side {
        match self {
            Self::Baked(_) => Side::Front,
            Self::Flat(flat) => flat.side,
            Self::Shader(shader) => shader.side,
        }
    }
}

/// Portal surface material: double-sided, reads time and both gradient colors.
pub fn portal_material(bus: &UniformBus) -> Result<ShaderMaterial, MaterialError> {
    Ok(
        ShaderMaterial::new(ShaderProgram::PORTAL, bus, &[U_TIME, U_COLOR_START, U_COLOR_END])?
            .with_side(Side::Double),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> UniformBus {
        UniformBus::portal(Color::from_hex(0xb91fac), Color::from_hex(0xffebf3), 1.0, 100.0)
    }

    #[test]
    fn declared_set_must_match_program() {
        let err = ShaderMaterial::new(ShaderProgram::PORTAL, &bus(), &[U_TIME, U_COLOR_START])
            .unwrap_err();
        assert!(matches!(err, MaterialError::UniformSetMismatch { program: "portal", .. }));

        let err = ShaderMaterial::new(
            ShaderProgram::PORTAL,
            &bus(),
            &[U_TIME, U_COLOR_START, U_COLOR_END, U_SIZE],
        )
        .unwrap_err();
        assert!(matches!(err, MaterialError::UniformSetMismatch { .. }));
    }

    #[test]
    fn declared_uniforms_must_exist_on_the_bus() {
        let bus = UniformBus::new();
        bus.declare(U_TIME, 0.0);
        let err = ShaderMaterial::new(
            ShaderProgram::PORTAL,
            &bus,
            &[U_TIME, U_COLOR_START, U_COLOR_END],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MaterialError::Uniform(UniformError::Unknown(U_COLOR_START.into()))
        );
    }

    #[test]
    fn materials_observe_bus_writes() {
        let bus = bus();
        let portal = portal_material(&bus).unwrap();
        bus.set(U_TIME, 4.5).unwrap();
        assert_eq!(portal.uniform(U_TIME).unwrap(), UniformValue::Float(4.5));
        assert!(portal.uniform(U_SIZE).is_err());
        assert_eq!(portal.side, Side::Double);
    }

    #[test]
    fn describe_names_the_shading() {
        let flat = Material::flat(Color::from_hex(0xfaeb64), Side::Front);
        assert_eq!(flat.describe(), "flat(#faeb64)");
        let portal = Material::shader(portal_material(&bus()).unwrap());
        assert_eq!(portal.describe(), "shader(portal)");
    }
}
