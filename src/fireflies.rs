use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::material::{Blending, MaterialError, ShaderMaterial, ShaderProgram};
use crate::uniforms::{UniformBus, U_PIXEL_RATIO, U_SIZE, U_TIME};

pub const DEFAULT_COUNT: usize = 30;

/// Particle positions and per-particle scales.
#[derive(Debug, Clone, PartialEq)]
pub struct FireflyField {
    pub positions: Vec<[f32; 3]>,
    pub scales: Vec<f32>,
}

impl FireflyField {
    /// Scatters `count` particles over the lawn in front of the portal:
    /// `x, z` in `[-2, 2)`, `y` in `[0, 1.5)`, scale in `[0, 1)`.
    pub fn generate<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let mut positions = Vec::with_capacity(count);
        let mut scales = Vec::with_capacity(count);
        for _ in 0..count {
            positions.push([
                (rng.gen::<f32>() - 0.5) * 4.0,
                rng.gen::<f32>() * 1.5,
                (rng.gen::<f32>() - 0.5) * 4.0,
            ]);
            scales.push(rng.gen::<f32>());
        }
        Self { positions, scales }
    }

    pub fn random(count: usize) -> Self {
        Self::generate(count, &mut rand::thread_rng())
    }

    pub fn seeded(count: usize, seed: u64) -> Self {
        Self::generate(count, &mut StdRng::seed_from_u64(seed))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Point material for the fireflies: additive and never writes depth.
pub fn firefly_material(bus: &UniformBus) -> Result<ShaderMaterial, MaterialError> {
    Ok(
        ShaderMaterial::new(ShaderProgram::FIREFLIES, bus, &[U_TIME, U_PIXEL_RATIO, U_SIZE])?
            .with_blending(Blending::Additive)
            .with_depth_write(false)
            .transparent(true),
    )
}

#[derive(Debug, Clone)]
pub struct Fireflies {
    pub field: FireflyField,
    pub material: ShaderMaterial,
}

impl Fireflies {
    pub fn new(field: FireflyField, bus: &UniformBus) -> Result<Self, MaterialError> {
        Ok(Self {
            field,
            material: firefly_material(bus)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;

    #[test]
    fn particles_stay_in_range() {
        let field = FireflyField::seeded(DEFAULT_COUNT, 7);
        assert_eq!(field.len(), DEFAULT_COUNT);
        assert_eq!(field.scales.len(), DEFAULT_COUNT);
        for [x, y, z] in &field.positions {
            assert!((-2.0..2.0).contains(x));
            assert!((0.0..1.5).contains(y));
            assert!((-2.0..2.0).contains(z));
        }
        assert!(field.scales.iter().all(|s| (0.0..1.0).contains(s)));
    }

    #[test]
    fn seeding_is_deterministic() {
        assert_eq!(FireflyField::seeded(5, 42), FireflyField::seeded(5, 42));
        assert_ne!(FireflyField::seeded(5, 42), FireflyField::seeded(5, 43));
    }

    #[test]
    fn material_is_additive_without_depth_write() {
        let bus = UniformBus::portal(Color::BLACK, Color::WHITE, 2.0, 100.0);
        let fireflies = Fireflies::new(FireflyField::seeded(3, 1), &bus).unwrap();
        assert_eq!(fireflies.material.blending, Blending::Additive);
        assert!(!fireflies.material.depth_write);
        assert!(fireflies.material.transparent);
    }
}
