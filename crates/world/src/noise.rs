//! Noise sampling for terrain and structure generation.
//!
//! Every generator owns its own [`NoiseSampler`]; there is no process-wide seed.

use std::fmt;

use ::noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::error::{require_finite, require_positive};
use crate::WorldError;

/// Configuration for multi-octave noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Base frequency applied to input coordinates.
    pub scale: f64,
    /// Number of octaves (layers of detail).
    pub octaves: u32,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Multiplier applied to the normalized sum.
    pub amplifier: f64,
    /// Constant added after amplification.
    pub height_offset: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            scale: 0.02,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            amplifier: 1.0,
            height_offset: 0.0,
        }
    }
}

impl NoiseConfig {
    /// Reject parameters that would make sampling degenerate.
    pub fn validate(&self) -> Result<(), WorldError> {
        require_positive("scale", self.scale)?;
        require_positive("persistence", self.persistence)?;
        require_positive("lacunarity", self.lacunarity)?;
        require_finite("amplifier", self.amplifier)?;
        require_finite("height_offset", self.height_offset)?;
        if self.octaves == 0 {
            return Err(WorldError::InvalidParameter {
                name: "octaves",
                value: 0.0,
            });
        }
        Ok(())
    }
}

/// Seeded Perlin source shared by a single generator.
#[derive(Clone)]
pub struct NoiseSampler {
    seed: u32,
    perlin: Perlin,
}

impl NoiseSampler {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            perlin: Perlin::new(seed),
        }
    }

    /// 2-D Perlin at `(x * scale, z * scale)`, in `[-1, 1]`.
    pub fn perlin2(&self, x: f64, z: f64, scale: f64) -> f64 {
        self.perlin.get([x * scale, z * scale]).clamp(-1.0, 1.0)
    }

    /// 3-D Perlin at `(x, y, z) * scale`, in `[-1, 1]`.
    pub fn perlin3(&self, x: f64, y: f64, z: f64, scale: f64) -> f64 {
        self.perlin
            .get([x * scale, y * scale, z * scale])
            .clamp(-1.0, 1.0)
    }

    /// Octave sum of [`perlin3`](Self::perlin3), normalized by the amplitude sum,
    /// then amplified and offset.
    pub fn fractal_octave_perlin3(&self, x: f64, y: f64, z: f64, config: &NoiseConfig) -> f64 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_value = 0.0;

        for _ in 0..config.octaves {
            value += self.perlin3(x * frequency, y * frequency, z * frequency, config.scale)
                * amplitude;
            max_value += amplitude;

            amplitude *= config.persistence;
            frequency *= config.lacunarity;
        }

        if max_value > 0.0 {
            value /= max_value;
        }
        value * config.amplifier + config.height_offset
    }
}

impl fmt::Debug for NoiseSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseSampler")
            .field("seed", &self.seed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_determinism() {
        let a = NoiseSampler::new(12345);
        let b = NoiseSampler::new(12345);
        let config = NoiseConfig::default();

        for x in 0..10 {
            for z in 0..10 {
                let (xf, zf) = (x as f64, z as f64);
                assert_eq!(a.perlin2(xf, zf, 0.37), b.perlin2(xf, zf, 0.37));
                assert_eq!(
                    a.fractal_octave_perlin3(xf, 3.0, zf, &config),
                    b.fractal_octave_perlin3(xf, 3.0, zf, &config),
                    "fractal noise not deterministic at ({}, {})",
                    x,
                    z
                );
            }
        }
    }

    #[test]
    fn test_noise_range() {
        let sampler = NoiseSampler::new(7);
        let config = NoiseConfig::default();
        for x in -50..50 {
            for z in -50..50 {
                let (xf, zf) = (x as f64, z as f64);
                let flat = sampler.perlin2(xf, zf, 0.13);
                let solid = sampler.perlin3(xf, 5.0, zf, 0.13);
                let fractal = sampler.fractal_octave_perlin3(xf, 5.0, zf, &config);
                for value in [flat, solid, fractal] {
                    assert!(
                        (-1.0..=1.0).contains(&value),
                        "noise value {} out of range at ({}, {})",
                        value,
                        x,
                        z
                    );
                }
            }
        }
    }

    #[test]
    fn test_different_seeds_produce_different_noise() {
        let a = NoiseSampler::new(1);
        let b = NoiseSampler::new(2);
        let any_different = (0..20)
            .flat_map(|x| (0..20).map(move |z| (x as f64 * 0.5, z as f64 * 0.5)))
            .any(|(x, z)| (a.perlin2(x, z, 0.3) - b.perlin2(x, z, 0.3)).abs() > 0.001);
        assert!(any_different, "different seeds should produce different noise");
    }

    #[test]
    fn amplifier_and_offset_are_applied_after_normalization() {
        let sampler = NoiseSampler::new(99);
        let base = NoiseConfig::default();
        let shifted = NoiseConfig {
            amplifier: 3.0,
            height_offset: 10.0,
            ..base
        };
        let raw = sampler.fractal_octave_perlin3(4.5, 1.5, -2.5, &base);
        let scaled = sampler.fractal_octave_perlin3(4.5, 1.5, -2.5, &shifted);
        assert!((scaled - (raw * 3.0 + 10.0)).abs() < 1e-12);
    }

    #[test]
    fn config_validation_names_the_bad_field() {
        assert!(NoiseConfig::default().validate().is_ok());

        let zero_scale = NoiseConfig {
            scale: 0.0,
            ..NoiseConfig::default()
        };
        assert_eq!(
            zero_scale.validate(),
            Err(WorldError::InvalidParameter {
                name: "scale",
                value: 0.0
            })
        );

        let no_octaves = NoiseConfig {
            octaves: 0,
            ..NoiseConfig::default()
        };
        assert!(matches!(
            no_octaves.validate(),
            Err(WorldError::InvalidParameter { name: "octaves", .. })
        ));

        let nan_lacunarity = NoiseConfig {
            lacunarity: f64::NAN,
            ..NoiseConfig::default()
        };
        assert!(nan_lacunarity.validate().is_err());
    }
}
