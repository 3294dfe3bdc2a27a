use std::collections::HashMap;

use voxgen_assets::VoxelRegistry;
use voxgen_world::{Chunk, ChunkPos, DirtyFlags, VoxelView};

use crate::{mesh_chunk_with_world, MeshBuffers, MeshError, MeshOptions};

/// Mesh cache keyed by chunk position.
#[derive(Default)]
pub struct ChunkMeshCache {
    entries: HashMap<ChunkPos, MeshBuffers>,
}

impl ChunkMeshCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Ensure the chunk at `pos` has an up-to-date mesh.
    ///
    /// The mesh is rebuilt only when `dirty` carries [`DirtyFlags::MESH`]; a
    /// failed rebuild leaves the previous entry untouched.
    pub fn update_chunk<W: VoxelView + ?Sized>(
        &mut self,
        pos: ChunkPos,
        chunk: &Chunk,
        dirty: DirtyFlags,
        registry: &VoxelRegistry,
        options: &MeshOptions,
        world: &W,
    ) -> Result<&MeshBuffers, MeshError> {
        let rebuilt = if dirty.contains(DirtyFlags::MESH) {
            Some(mesh_chunk_with_world(chunk, registry, options, world)?)
        } else {
            None
        };
        let entry = self.entries.entry(pos).or_insert_with(MeshBuffers::empty);
        if let Some(mesh) = rebuilt {
            *entry = mesh;
        }
        Ok(entry)
    }

    /// Retrieve the mesh if it's cached.
    pub fn get(&self, pos: ChunkPos) -> Option<&MeshBuffers> {
        self.entries.get(&pos)
    }

    /// Drop the cached mesh for a chunk that left storage.
    pub fn remove(&mut self, pos: ChunkPos) -> Option<MeshBuffers> {
        self.entries.remove(&pos)
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(ChunkPos) -> bool) {
        self.entries.retain(|pos, _| keep(*pos));
    }

    /// Number of cached meshes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
