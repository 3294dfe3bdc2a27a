use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::chunk::{Chunk, ChunkBounds, ChunkPos, DirtyFlags, VoxelId, VoxelUpdate, VOXEL_AIR};
use crate::error::require_positive;
use crate::view::VoxelView;
use crate::WorldError;

/// Shape of the column chunks a [`ChunkStorage`] manages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkLayout {
    /// Horizontal edge length in voxels.
    pub size: i32,
    /// Chunks span `0..max_height` vertically.
    pub max_height: i32,
    /// World-unit edge length of one voxel.
    pub dimension: f32,
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self {
            size: 16,
            max_height: 64,
            dimension: 1.0,
        }
    }
}

impl ChunkLayout {
    pub fn validate(&self) -> Result<(), WorldError> {
        require_positive("chunk_size", f64::from(self.size))?;
        require_positive("max_height", f64::from(self.max_height))?;
        require_positive("dimension", f64::from(self.dimension))
    }

    /// Chunk containing a world voxel coordinate.
    pub fn chunk_of(&self, pos: [i32; 3]) -> ChunkPos {
        ChunkPos::new(pos[0].div_euclid(self.size), pos[2].div_euclid(self.size))
    }

    /// World bounds of the chunk at `pos`.
    pub fn bounds(&self, pos: ChunkPos) -> ChunkBounds {
        let min = [pos.x * self.size, 0, pos.z * self.size];
        let max = [min[0] + self.size, self.max_height, min[2] + self.size];
        ChunkBounds::new(min, max, self.dimension)
    }
}

/// Outcome of routing a batch of updates through [`ChunkStorage::apply_updates`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Written into resident chunks.
    pub applied: usize,
    /// Held until their chunk is inserted.
    pub buffered: usize,
    /// Outside the layout's vertical range.
    pub dropped: usize,
}

/// In-memory chunk arena with an LRU eviction policy.
/// Uses BTreeMap for deterministic iteration order.
///
/// Updates aimed at chunks that are not resident yet are buffered per chunk
/// and written when that chunk is inserted.
pub struct ChunkStorage {
    layout: ChunkLayout,
    chunks: BTreeMap<ChunkPos, Chunk>,
    lru: LruCache<ChunkPos, ()>,
    capacity: usize,
    pending: BTreeMap<ChunkPos, Vec<VoxelUpdate>>,
}

impl ChunkStorage {
    /// Create a storage with the desired maximum chunk count.
    pub fn new(layout: ChunkLayout, capacity: usize) -> Result<Self, WorldError> {
        layout.validate()?;
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            layout,
            chunks: BTreeMap::new(),
            lru: LruCache::new(cap),
            capacity: cap.get(),
            pending: BTreeMap::new(),
        })
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true when no chunks are currently stored.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Updates waiting for the chunk at `pos`.
    pub fn pending_updates(&self, pos: ChunkPos) -> &[VoxelUpdate] {
        self.pending.get(&pos).map(Vec::as_slice).unwrap_or_default()
    }

    /// Obtain mutable access to a chunk, creating an empty one if necessary.
    pub fn ensure_chunk(&mut self, pos: ChunkPos) -> Result<&mut Chunk, WorldError> {
        if !self.chunks.contains_key(&pos) {
            self.evict_if_needed();
        }
        self.touch(pos);
        match self.chunks.entry(pos) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut chunk = Chunk::new(self.layout.bounds(pos))?;
                if let Some(updates) = self.pending.remove(&pos) {
                    chunk.apply_updates(updates);
                }
                Ok(entry.insert(chunk))
            }
        }
    }

    /// Store a generated chunk, replacing any previous one at `pos`.
    ///
    /// Buffered updates for `pos` are written into it and resident neighbors
    /// are flagged for re-meshing since their border view changed.
    pub fn insert(&mut self, pos: ChunkPos, mut chunk: Chunk) -> Option<Chunk> {
        if let Some(updates) = self.pending.remove(&pos) {
            trace!(%pos, count = updates.len(), "flushing buffered updates");
            chunk.apply_updates(updates);
        }
        if !self.chunks.contains_key(&pos) {
            self.evict_if_needed();
        }
        self.touch(pos);
        let previous = self.chunks.insert(pos, chunk);
        for dx in -1..=1 {
            for dz in -1..=1 {
                if (dx, dz) != (0, 0) {
                    self.mark_mesh_dirty(ChunkPos::new(pos.x + dx, pos.z + dz));
                }
            }
        }
        previous
    }

    /// Attempt to fetch a chunk immutably.
    pub fn get(&self, pos: ChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// Fetch a chunk mutably (without creating it).
    pub fn get_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        if self.chunks.contains_key(&pos) {
            self.touch(pos);
        }
        self.chunks.get_mut(&pos)
    }

    /// Iterate over currently resident chunk positions.
    pub fn iter_positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().copied()
    }

    /// Route updates to the chunks that own them.
    ///
    /// Writes into resident chunks happen immediately, in order. A write on a
    /// chunk's horizontal border also flags the neighbors sharing that border.
    pub fn apply_updates<I>(&mut self, updates: I) -> UpdateReport
    where
        I: IntoIterator<Item = VoxelUpdate>,
    {
        let mut report = UpdateReport::default();
        for update in updates {
            let y = update.position[1];
            if y < 0 || y >= self.layout.max_height {
                report.dropped += 1;
                continue;
            }
            let pos = self.layout.chunk_of(update.position);
            match self.chunks.get_mut(&pos) {
                Some(chunk) => {
                    chunk.apply_updates([update]);
                    report.applied += 1;
                    self.mark_border_neighbors(pos, update.position);
                }
                None => {
                    self.pending.entry(pos).or_default().push(update);
                    report.buffered += 1;
                }
            }
        }
        report
    }

    fn mark_border_neighbors(&mut self, pos: ChunkPos, voxel: [i32; 3]) {
        let local_x = voxel[0].rem_euclid(self.layout.size);
        let local_z = voxel[2].rem_euclid(self.layout.size);
        let edge = |local: i32| -> i32 {
            if local == 0 {
                -1
            } else if local == self.layout.size - 1 {
                1
            } else {
                0
            }
        };
        let (dx, dz) = (edge(local_x), edge(local_z));
        if dx != 0 {
            self.mark_mesh_dirty(ChunkPos::new(pos.x + dx, pos.z));
        }
        if dz != 0 {
            self.mark_mesh_dirty(ChunkPos::new(pos.x, pos.z + dz));
        }
        if dx != 0 && dz != 0 {
            self.mark_mesh_dirty(ChunkPos::new(pos.x + dx, pos.z + dz));
        }
    }

    fn mark_mesh_dirty(&mut self, pos: ChunkPos) {
        if let Some(chunk) = self.chunks.get_mut(&pos) {
            chunk.mark_dirty(DirtyFlags::MESH);
        }
    }

    fn touch(&mut self, pos: ChunkPos) {
        self.lru.put(pos, ());
    }

    fn evict_if_needed(&mut self) {
        while self.chunks.len() >= self.capacity {
            if let Some((oldest, _)) = self.lru.pop_lru() {
                self.chunks.remove(&oldest);
            } else {
                break;
            }
        }
    }
}

impl VoxelView for ChunkStorage {
    fn voxel(&self, pos: [i32; 3]) -> VoxelId {
        self.get(self.layout.chunk_of(pos))
            .map_or(VOXEL_AIR, |chunk| chunk.voxel_id(pos))
    }

    fn sunlight(&self, pos: [i32; 3]) -> u8 {
        self.get(self.layout.chunk_of(pos))
            .map_or(0, |chunk| chunk.voxel(pos).sunlight)
    }

    fn torchlight(&self, pos: [i32; 3]) -> u8 {
        self.get(self.layout.chunk_of(pos))
            .map_or(0, |chunk| chunk.voxel(pos).torchlight)
    }
}
