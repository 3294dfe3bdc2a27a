use std::path::Path;

use anyhow::Result;
use tracing::{debug, instrument, warn};
use voxgen_assets::VoxelRegistry;
use voxgen_testkit::{ChunkMeshMetric, MeshMetricSink};
use voxgen_world::{ChunkPos, ChunkStorage, DirtyFlags};

use crate::{ChunkMeshCache, MeshError, MeshHash, MeshOptions};

/// Mesh stats for a chunk update pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMeshStat {
    /// Chunk position this mesh belongs to.
    pub position: ChunkPos,
    /// Number of triangles generated for the chunk.
    pub triangles: usize,
    /// Mesh hash for determinism comparisons.
    pub hash: MeshHash,
}

/// Outcome of one [`ChunkMeshDriver::process`] pass.
#[derive(Debug, Default)]
pub struct MeshPass {
    /// Chunks re-meshed this pass, in chunk order.
    pub stats: Vec<ChunkMeshStat>,
    /// Chunks that failed to mesh and stay dirty.
    pub failures: Vec<(ChunkPos, MeshError)>,
}

impl MeshPass {
    /// True when every dirty chunk meshed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Processes dirty chunks and refreshes mesh cache entries.
///
/// Chunks are meshed against the whole storage, so faces on chunk borders are
/// culled and occluded by resident neighbors.
pub struct ChunkMeshDriver<'a> {
    storage: &'a mut ChunkStorage,
    cache: &'a mut ChunkMeshCache,
    registry: &'a VoxelRegistry,
    options: MeshOptions,
}

impl<'a> ChunkMeshDriver<'a> {
    /// Create a new driver spanning storage/cache/registry.
    pub fn new(
        storage: &'a mut ChunkStorage,
        cache: &'a mut ChunkMeshCache,
        registry: &'a VoxelRegistry,
        options: MeshOptions,
    ) -> Self {
        Self {
            storage,
            cache,
            registry,
            options,
        }
    }

    /// Mesh all dirty chunks in chunk order.
    ///
    /// A chunk that fails to mesh keeps its dirty flags and previous cache entry
    /// and is reported in [`MeshPass::failures`]; the rest of the pass still runs.
    #[instrument(skip_all)]
    pub fn process(&mut self) -> MeshPass {
        self.cache
            .retain(|pos| self.storage.get(pos).is_some());

        let dirty: Vec<_> = self
            .storage
            .iter_positions()
            .filter_map(|pos| {
                let flags = self.storage.get(pos)?.dirty_flags();
                flags.contains(DirtyFlags::MESH).then_some((pos, flags))
            })
            .collect();

        let mut pass = MeshPass {
            stats: Vec::with_capacity(dirty.len()),
            failures: Vec::new(),
        };
        for (pos, flags) in dirty {
            let storage = &*self.storage;
            let Some(chunk) = storage.get(pos) else {
                continue;
            };
            match self
                .cache
                .update_chunk(pos, chunk, flags, self.registry, &self.options, storage)
            {
                Ok(mesh) => pass.stats.push(ChunkMeshStat {
                    position: pos,
                    triangles: mesh.triangle_count(),
                    hash: mesh.hash,
                }),
                Err(err) => {
                    warn!(?pos, %err, "chunk mesh failed");
                    pass.failures.push((pos, err));
                    continue;
                }
            }
            if let Some(chunk) = self.storage.get_mut(pos) {
                chunk.take_dirty_flags();
            }
        }
        debug!(
            meshed = pass.stats.len(),
            failed = pass.failures.len(),
            "mesh pass complete"
        );
        pass
    }

    /// Convert stats into serializable metrics for CI artifacts.
    pub fn stats_to_metrics(stats: &[ChunkMeshStat]) -> Vec<ChunkMeshMetric> {
        stats
            .iter()
            .map(|stat| ChunkMeshMetric {
                chunk: [stat.position.x, stat.position.z],
                triangles: stat.triangles,
                hash: stat.hash.to_string(),
            })
            .collect()
    }

    /// Write metrics to disk using the testkit sink.
    pub fn write_metrics_to_file<P: AsRef<Path>>(stats: &[ChunkMeshStat], path: P) -> Result<()> {
        let metrics = Self::stats_to_metrics(stats);
        let mut sink = MeshMetricSink::create(path)?;
        sink.write(&metrics)?;
        Ok(())
    }
}
