use anyhow::Result;
use rayon::prelude::*;
use tracing::{debug, info, instrument};
use voxgen_assets::VoxelRegistry;
use voxgen_world::{
    Chunk, ChunkPos, ChunkStorage, DensityTerrain, StructureGenerator, TerrainGenerator, Trees,
    UpdateReport, VoxelPropertyProvider, WorldError, MAX_LIGHT_LEVEL,
};

use crate::config::WorldConfig;

/// Summary of one world build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub chunks: usize,
    /// Tree writes routed through storage.
    pub updates: UpdateReport,
}

/// Chunk positions in a square of `radius` around the origin, rows of increasing z.
pub fn chunk_positions(radius: i32) -> Vec<ChunkPos> {
    let radius = radius.max(0);
    (-radius..=radius)
        .flat_map(|z| (-radius..=radius).map(move |x| ChunkPos::new(x, z)))
        .collect()
}

/// Generate terrain for every chunk in parallel, then plant trees in chunk order.
///
/// Tree sites are sampled from terrain alone, so the result does not depend on
/// how the parallel pass is scheduled.
#[instrument(skip(config, registry), fields(radius = config.radius))]
pub fn build_world(
    config: &WorldConfig,
    seed: u32,
    registry: &VoxelRegistry,
) -> Result<(ChunkStorage, GenerationReport)> {
    let layout = config.layout();
    layout.validate()?;
    let terrain = DensityTerrain::new(seed, config.terrain_config(registry)?)?;
    let trees = Trees::new(seed, config.trees, config.tree_voxels.resolve(registry)?)?;

    let positions = chunk_positions(config.radius);
    let chunks = positions
        .par_iter()
        .map(|&pos| -> Result<(ChunkPos, Chunk), WorldError> {
            let mut chunk = Chunk::new(layout.bounds(pos))?;
            terrain.generate(&mut chunk);
            Ok((pos, chunk))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut storage = ChunkStorage::new(layout, positions.len())?;
    let mut report = GenerationReport {
        chunks: chunks.len(),
        ..GenerationReport::default()
    };
    for (pos, chunk) in chunks {
        let updates = trees.generate(&chunk, registry)?;
        storage.insert(pos, chunk);
        let routed = storage.apply_updates(updates);
        report.updates.applied += routed.applied;
        report.updates.buffered += routed.buffered;
        report.updates.dropped += routed.dropped;
    }

    seed_sunlight(&mut storage, registry)?;
    info!(
        chunks = report.chunks,
        applied = report.updates.applied,
        buffered = report.updates.buffered,
        dropped = report.updates.dropped,
        "world generated"
    );
    Ok((storage, report))
}

/// Minimal open-sky light: every transparent voxel above a column's first
/// opaque voxel gets full sunlight. Torchlight stays zero.
pub fn seed_sunlight(
    storage: &mut ChunkStorage,
    props: &dyn VoxelPropertyProvider,
) -> Result<(), WorldError> {
    let positions: Vec<ChunkPos> = storage.iter_positions().collect();
    let mut lit = 0usize;
    for pos in positions {
        let Some(chunk) = storage.get_mut(pos) else {
            continue;
        };
        let [min_x, min_y, min_z] = chunk.min();
        let [max_x, max_y, max_z] = chunk.max();
        for x in min_x..max_x {
            for z in min_z..max_z {
                for y in (min_y..max_y).rev() {
                    let voxel = [x, y, z];
                    if !props.require(chunk.voxel_id(voxel), voxel)?.transparent {
                        break;
                    }
                    chunk.set_light(voxel, MAX_LIGHT_LEVEL, 0);
                    lit += 1;
                }
            }
        }
    }
    debug!(lit, "sunlight seeded");
    Ok(())
}
