//! Terrain generation: maps world voxel coordinates to a base voxel type.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::chunk::{Chunk, VoxelId, VOXEL_AIR};
use crate::error::{require_finite, require_positive};
use crate::noise::{NoiseConfig, NoiseSampler};
use crate::WorldError;

/// Fills chunks with base terrain.
///
/// `voxel_at` must be a pure function of its coordinates so chunks can be
/// generated on any thread in any order.
pub trait TerrainGenerator: Send + Sync {
    /// Base voxel type at a world voxel coordinate.
    fn voxel_at(&self, vx: i32, vy: i32, vz: i32) -> VoxelId;

    /// Fill every voxel inside the chunk bounds.
    #[instrument(skip_all, fields(min = ?chunk.min(), max = ?chunk.max()))]
    fn generate(&self, chunk: &mut Chunk) {
        let [min_x, min_y, min_z] = chunk.min();
        let [max_x, max_y, max_z] = chunk.max();
        let mut solid = 0usize;

        for vy in min_y..max_y {
            for vz in min_z..max_z {
                for vx in min_x..max_x {
                    let id = self.voxel_at(vx, vy, vz);
                    chunk.set_voxel_id([vx, vy, vz], id);
                    if id != VOXEL_AIR {
                        solid += 1;
                    }
                }
            }
        }

        debug!(solid, "terrain generated");
    }
}

/// Parameters for [`DensityTerrain`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub noise: NoiseConfig,
    /// Density removed per unit of height.
    pub height_bias: f64,
    /// Voxels with density above this are solid.
    pub threshold: f64,
    /// Voxel type written for solid cells.
    pub solid_voxel: VoxelId,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            noise: NoiseConfig::default(),
            height_bias: 0.02,
            threshold: -0.2,
            solid_voxel: 2,
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<(), WorldError> {
        self.noise.validate()?;
        require_positive("height_bias", self.height_bias)?;
        require_finite("threshold", self.threshold)
    }
}

/// 3-D density terrain: fractal noise minus a height bias, thresholded.
#[derive(Debug, Clone)]
pub struct DensityTerrain {
    sampler: NoiseSampler,
    config: TerrainConfig,
}

impl DensityTerrain {
    /// Build a generator, validating its configuration first.
    pub fn new(seed: u32, config: TerrainConfig) -> Result<Self, WorldError> {
        config.validate()?;
        Ok(Self {
            sampler: NoiseSampler::new(seed),
            config,
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Raw density before thresholding.
    pub fn density(&self, vx: i32, vy: i32, vz: i32) -> f64 {
        let noise = self.sampler.fractal_octave_perlin3(
            f64::from(vx),
            f64::from(vy),
            f64::from(vz),
            &self.config.noise,
        );
        noise - f64::from(vy) * self.config.height_bias
    }
}

impl TerrainGenerator for DensityTerrain {
    fn voxel_at(&self, vx: i32, vy: i32, vz: i32) -> VoxelId {
        if self.density(vx, vy, vz) > self.config.threshold {
            self.config.solid_voxel
        } else {
            VOXEL_AIR
        }
    }
}

/// Flat world: one voxel type up to a fixed height, air above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatTerrain {
    /// Highest solid Y (inclusive).
    pub height: i32,
    pub voxel: VoxelId,
}

impl FlatTerrain {
    pub const fn new(height: i32, voxel: VoxelId) -> Self {
        Self { height, voxel }
    }
}

impl TerrainGenerator for FlatTerrain {
    fn voxel_at(&self, _vx: i32, vy: i32, _vz: i32) -> VoxelId {
        if vy <= self.height {
            self.voxel
        } else {
            VOXEL_AIR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkBounds;

    #[test]
    fn test_terrain_generation_deterministic() {
        let a = DensityTerrain::new(12345, TerrainConfig::default()).unwrap();
        let b = DensityTerrain::new(12345, TerrainConfig::default()).unwrap();

        for vx in -8..8 {
            for vy in 0..32 {
                assert_eq!(a.voxel_at(vx, vy, 3), b.voxel_at(vx, vy, 3));
            }
        }
    }

    #[test]
    fn density_threshold_decides_solidity() {
        let terrain = DensityTerrain::new(5, TerrainConfig::default()).unwrap();
        for vx in 0..16 {
            for vy in 0..64 {
                let expected = if terrain.density(vx, vy, -4) > -0.2 {
                    2
                } else {
                    VOXEL_AIR
                };
                assert_eq!(terrain.voxel_at(vx, vy, -4), expected);
            }
        }
    }

    #[test]
    fn high_altitude_is_air_and_deep_ground_is_solid() {
        // Noise is bounded by 1, so the height bias dominates far from zero.
        let terrain = DensityTerrain::new(77, TerrainConfig::default()).unwrap();
        assert_eq!(terrain.voxel_at(3, 200, 9), VOXEL_AIR);
        assert_eq!(terrain.voxel_at(3, -200, 9), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TerrainConfig {
            noise: NoiseConfig {
                scale: -1.0,
                ..NoiseConfig::default()
            },
            ..TerrainConfig::default()
        };
        assert!(matches!(
            DensityTerrain::new(1, config),
            Err(WorldError::InvalidParameter { name: "scale", .. })
        ));
    }

    #[test]
    fn generate_fills_whole_chunk() {
        let terrain = FlatTerrain::new(3, 7);
        let mut chunk = Chunk::new(ChunkBounds::new([-2, 0, -2], [2, 8, 2], 1.0)).unwrap();
        terrain.generate(&mut chunk);

        for x in -2..2 {
            for z in -2..2 {
                assert_eq!(chunk.max_height(x, z), Some(3));
                for y in 0..8 {
                    let expected = if y <= 3 { 7 } else { VOXEL_AIR };
                    assert_eq!(chunk.voxel_id([x, y, z]), expected);
                }
            }
        }
    }
}
