//! Tree placement and shape emission.
//!
//! Sites are picked where the placement noise peaks within its 3x3
//! neighborhood; shapes are derived purely from the site's column so the same
//! tree is produced no matter which chunk asks for it.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::chunk::{Chunk, VoxelId, VoxelUpdate};
use crate::error::{require_finite, require_positive};
use crate::noise::{NoiseConfig, NoiseSampler};
use crate::view::VoxelPropertyProvider;
use crate::WorldError;

/// Places structures on top of generated terrain.
pub trait StructureGenerator: Send + Sync {
    /// Horizontal extent (x, z) one structure may cover.
    fn footprint(&self) -> [i32; 2];

    /// Candidate sites `(x, surface_y, z)` inside the chunk's horizontal extent.
    fn sample_sites(
        &self,
        chunk: &Chunk,
        props: &dyn VoxelPropertyProvider,
    ) -> Result<Vec<[i32; 3]>, WorldError>;

    /// Voxel writes for one site. May reach outside the originating chunk.
    fn emit(&self, site: [i32; 3]) -> Vec<VoxelUpdate>;

    /// Sample sites, then emit every structure in column order.
    #[instrument(skip_all, fields(min = ?chunk.min(), max = ?chunk.max()))]
    fn generate(
        &self,
        chunk: &Chunk,
        props: &dyn VoxelPropertyProvider,
    ) -> Result<Vec<VoxelUpdate>, WorldError> {
        let sites = self.sample_sites(chunk, props)?;
        let updates: Vec<VoxelUpdate> = sites.iter().flat_map(|&site| self.emit(site)).collect();
        debug!(sites = sites.len(), updates = updates.len(), "structures emitted");
        Ok(updates)
    }
}

/// Noise scales and thresholds for tree placement and shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Scale of the 3x3 placement comparison.
    pub placement_scale: f64,
    pub trunk_scale: f64,
    pub canopy_scale: f64,
    pub canopy_small_scale: f64,
    /// Scale of the leaf color variant selection.
    pub variant_scale: f64,
    /// Fractal noise that thins out the canopy edge.
    pub silhouette: NoiseConfig,
    /// Non-centre canopy voxels are dropped above this value.
    pub silhouette_threshold: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            placement_scale: 0.37,
            trunk_scale: 0.53425,
            canopy_scale: 0.4124,
            canopy_small_scale: 0.1424,
            variant_scale: 0.005,
            silhouette: NoiseConfig {
                scale: 0.241,
                ..NoiseConfig::default()
            },
            silhouette_threshold: 0.4,
        }
    }
}

impl TreeConfig {
    pub fn validate(&self) -> Result<(), WorldError> {
        require_positive("placement_scale", self.placement_scale)?;
        require_positive("trunk_scale", self.trunk_scale)?;
        require_positive("canopy_scale", self.canopy_scale)?;
        require_positive("canopy_small_scale", self.canopy_small_scale)?;
        require_positive("variant_scale", self.variant_scale)?;
        require_finite("silhouette_threshold", self.silhouette_threshold)?;
        self.silhouette.validate()
    }
}

/// Voxel types a tree is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeVoxels {
    pub trunk: VoxelId,
    pub leaves: VoxelId,
    /// Alternate leaf color.
    pub leaves_alt: VoxelId,
}

/// Per-site shape parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeShape {
    /// 2 or 3.
    pub trunk_height: i32,
    /// 2, 3, 5 or 8.
    pub canopy_height: i32,
    pub leaves: VoxelId,
}

/// Half-width of canopy layer `layer`.
///
/// Wide layers alternate on a period of three, phase-shifted by trunk height,
/// and the final layer is always narrow.
pub fn layer_half_width(layer: i32, trunk_height: i32, canopy_height: i32) -> i32 {
    let phase = if trunk_height == 2 { 0 } else { 2 };
    if (layer % 3 == 1 || layer % 3 == phase) && layer != canopy_height {
        2
    } else {
        1
    }
}

/// Tree generator with its own noise source.
#[derive(Debug, Clone)]
pub struct Trees {
    sampler: NoiseSampler,
    config: TreeConfig,
    voxels: TreeVoxels,
}

impl Trees {
    pub fn new(seed: u32, config: TreeConfig, voxels: TreeVoxels) -> Result<Self, WorldError> {
        config.validate()?;
        Ok(Self {
            sampler: NoiseSampler::new(seed),
            config,
            voxels,
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// True when the placement noise at `(vx, vz)` is the strict maximum of its
    /// 3x3 neighborhood. Ties go to the first sample in row-major order.
    pub fn is_tree_location(&self, vx: i32, vz: i32) -> bool {
        let mut best = f64::NEG_INFINITY;
        let mut best_index = 0;
        let mut index = 0;
        for i in -1..=1 {
            for j in -1..=1 {
                let value = self.sampler.perlin2(
                    f64::from(vx + i),
                    f64::from(vz + j),
                    self.config.placement_scale,
                );
                if value > best {
                    best = value;
                    best_index = index;
                }
                index += 1;
            }
        }
        best_index == 4
    }

    /// Trunk height, canopy height and leaf type for the tree rooted at `(vx, vz)`.
    pub fn shape_at(&self, vx: i32, vz: i32) -> TreeShape {
        let (x, z) = (f64::from(vx), f64::from(vz));
        let noise = |scale| self.sampler.perlin2(x, z, scale);

        let trunk_height = if noise(self.config.trunk_scale) > 0.06 {
            3
        } else {
            2
        };
        let canopy_height = if noise(self.config.canopy_scale) > 0.2 {
            8
        } else if noise(self.config.canopy_small_scale) > 0.1 {
            5
        } else if trunk_height == 3 {
            3
        } else {
            2
        };
        let leaves = if noise(self.config.variant_scale) > 0.1 {
            self.voxels.leaves_alt
        } else {
            self.voxels.leaves
        };

        TreeShape {
            trunk_height,
            canopy_height,
            leaves,
        }
    }

    /// Silhouette test at the absolute voxel being written, trunk height
    /// included. Sampling at site height plus layer index instead would shift
    /// every canopy by the trunk height and change trees for a given seed.
    fn keeps_canopy_voxel(&self, pos: [i32; 3]) -> bool {
        let [x, y, z] = pos.map(f64::from);
        self.sampler
            .fractal_octave_perlin3(x, y, z, &self.config.silhouette)
            <= self.config.silhouette_threshold
    }
}

impl StructureGenerator for Trees {
    fn footprint(&self) -> [i32; 2] {
        [5, 5]
    }

    fn sample_sites(
        &self,
        chunk: &Chunk,
        props: &dyn VoxelPropertyProvider,
    ) -> Result<Vec<[i32; 3]>, WorldError> {
        let [min_x, _, min_z] = chunk.min();
        let [max_x, _, max_z] = chunk.max();
        let mut sites = Vec::new();

        for vx in min_x..max_x {
            for vz in min_z..max_z {
                let Some(vy) = chunk.max_height(vx, vz) else {
                    continue;
                };
                let pos = [vx, vy, vz];
                let surface = props.require(chunk.voxel_id(pos), pos)?;
                if surface.plantable && self.is_tree_location(vx, vz) {
                    sites.push(pos);
                }
            }
        }

        Ok(sites)
    }

    fn emit(&self, site: [i32; 3]) -> Vec<VoxelUpdate> {
        let [vx, vy, vz] = site;
        let shape = self.shape_at(vx, vz);
        let mut updates = Vec::new();

        for i in 0..shape.trunk_height {
            updates.push(VoxelUpdate::new([vx, vy + i, vz], self.voxels.trunk));
        }

        let base_y = vy + shape.trunk_height;
        for j in 0..=shape.canopy_height {
            let limit = layer_half_width(j, shape.trunk_height, shape.canopy_height);
            let final_layer = j == shape.canopy_height;
            for i in -limit..=limit {
                for k in -limit..=limit {
                    if i.abs() == limit && k.abs() == limit {
                        continue;
                    }
                    let pos = [vx + i, base_y + j, vz + k];
                    let center = i == 0 && k == 0;
                    if !center && !self.keeps_canopy_voxel(pos) {
                        continue;
                    }
                    let voxel = if center && !final_layer {
                        self.voxels.trunk
                    } else {
                        shape.leaves
                    };
                    updates.push(VoxelUpdate::new(pos, voxel));
                }
            }
        }

        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOXELS: TreeVoxels = TreeVoxels {
        trunk: 4,
        leaves: 5,
        leaves_alt: 6,
    };

    fn trees(seed: u32) -> Trees {
        Trees::new(seed, TreeConfig::default(), VOXELS).unwrap()
    }

    #[test]
    fn wide_layers_follow_trunk_phase() {
        let widths: Vec<i32> = (0..=5).map(|j| layer_half_width(j, 2, 5)).collect();
        assert_eq!(widths, vec![2, 2, 1, 2, 2, 1]);

        let widths: Vec<i32> = (0..=3).map(|j| layer_half_width(j, 3, 3)).collect();
        assert_eq!(widths, vec![1, 2, 2, 1]);

        let widths: Vec<i32> = (0..=8).map(|j| layer_half_width(j, 3, 8)).collect();
        assert_eq!(widths, vec![1, 2, 2, 1, 2, 2, 1, 2, 1]);
    }

    #[test]
    fn shape_values_stay_in_range() {
        let trees = trees(31);
        for vx in -20..20 {
            for vz in -20..20 {
                let shape = trees.shape_at(vx, vz);
                assert!(matches!(shape.trunk_height, 2 | 3));
                assert!(matches!(shape.canopy_height, 2 | 3 | 5 | 8));
                if shape.canopy_height < 5 {
                    assert_eq!(shape.canopy_height, shape.trunk_height);
                }
                assert!(shape.leaves == VOXELS.leaves || shape.leaves == VOXELS.leaves_alt);
            }
        }
    }

    #[test]
    fn silhouette_is_sampled_at_the_written_voxel() {
        let trees = trees(9);
        let site = [10, 20, -7];
        let shape = trees.shape_at(10, -7);
        let base_y = 20 + shape.trunk_height;
        let updates = trees.emit(site);
        let written: std::collections::HashSet<[i32; 3]> =
            updates.iter().map(|u| u.position).collect();

        for j in 0..=shape.canopy_height {
            let limit = layer_half_width(j, shape.trunk_height, shape.canopy_height);
            for i in -limit..=limit {
                for k in -limit..=limit {
                    if (i.abs() == limit && k.abs() == limit) || (i == 0 && k == 0) {
                        continue;
                    }
                    let pos = [10 + i, base_y + j, -7 + k];
                    assert_eq!(written.contains(&pos), trees.keeps_canopy_voxel(pos), "{pos:?}");
                }
            }
        }
    }

    #[test]
    fn emitted_tree_has_trunk_column_and_clipped_corners() {
        let trees = trees(9);
        let site = [10, 20, -7];
        let shape = trees.shape_at(10, -7);
        let updates = trees.emit(site);

        for i in 0..shape.trunk_height {
            assert_eq!(updates[i as usize], VoxelUpdate::new([10, 20 + i, -7], VOXELS.trunk));
        }

        let base_y = 20 + shape.trunk_height;
        for j in 0..=shape.canopy_height {
            let center = updates
                .iter()
                .find(|u| u.position == [10, base_y + j, -7])
                .expect("canopy centre is always emitted");
            let expected = if j == shape.canopy_height {
                shape.leaves
            } else {
                VOXELS.trunk
            };
            assert_eq!(center.voxel, expected);
        }

        for update in &updates[shape.trunk_height as usize..] {
            let [x, y, z] = update.position;
            let j = y - base_y;
            let limit = layer_half_width(j, shape.trunk_height, shape.canopy_height);
            let (i, k) = (x - 10, z + 7);
            assert!(i.abs() <= limit && k.abs() <= limit);
            assert!(!(i.abs() == limit && k.abs() == limit), "corner emitted at {:?}", update);
        }
    }

    #[test]
    fn emit_is_deterministic() {
        assert_eq!(trees(3).emit([4, 30, 4]), trees(3).emit([4, 30, 4]));
    }

    #[test]
    fn invalid_scale_is_rejected() {
        let config = TreeConfig {
            trunk_scale: 0.0,
            ..TreeConfig::default()
        };
        assert_eq!(
            Trees::new(1, config, VOXELS).unwrap_err(),
            WorldError::InvalidParameter {
                name: "trunk_scale",
                value: 0.0
            }
        );
    }

    #[test]
    fn neighboring_columns_never_both_win() {
        let trees = trees(2024);
        for vx in -30..30 {
            for vz in -30..30 {
                if !trees.is_tree_location(vx, vz) {
                    continue;
                }
                for dx in -1..=1 {
                    for dz in -1..=1 {
                        if (dx, dz) != (0, 0) {
                            assert!(!trees.is_tree_location(vx + dx, vz + dz));
                        }
                    }
                }
            }
        }
    }
}
