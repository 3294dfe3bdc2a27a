use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::require_positive;
use crate::view::VoxelView;
use crate::WorldError;

/// Voxel type identifier referencing the registry.
pub type VoxelId = u16;

/// Reserved ID for air.
pub const VOXEL_AIR: VoxelId = 0;

/// Maximum light level for either light channel.
pub const MAX_LIGHT_LEVEL: u8 = 15;

/// Chunk coordinate (X,Z) in chunk space.
/// Implements Ord for deterministic iteration in BTreeMap/BTreeSet (sorts by x, then z).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Per-voxel data: type plus the two light channels written by the lighting pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voxel {
    pub id: VoxelId,
    pub sunlight: u8,
    pub torchlight: u8,
}

impl Voxel {
    /// Unlit voxel of the given type.
    pub const fn new(id: VoxelId) -> Self {
        Self {
            id,
            sunlight: 0,
            torchlight: 0,
        }
    }

    #[inline]
    pub fn is_air(&self) -> bool {
        self.id == VOXEL_AIR
    }
}

/// Intent to set a single voxel, produced by structure generators.
///
/// Updates are plain data so callers can apply, reject or batch them across
/// chunk boundaries before committing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelUpdate {
    /// World voxel coordinate.
    pub position: [i32; 3],
    /// Type to write.
    pub voxel: VoxelId,
}

impl VoxelUpdate {
    pub const fn new(position: [i32; 3], voxel: VoxelId) -> Self {
        Self { position, voxel }
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Dirty flags set whenever chunk data changes.
    pub struct DirtyFlags: u8 {
        const MESH = 0b0000_0001;
        const LIGHT = 0b0000_0010;
    }
}

impl Default for DirtyFlags {
    fn default() -> Self {
        DirtyFlags::empty()
    }
}

/// Region covered by a chunk, in world voxel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkBounds {
    /// Inclusive lower corner.
    pub min: [i32; 3],
    /// Exclusive upper corner.
    pub max: [i32; 3],
    /// Highest Y the mesher scans (inclusive).
    pub top_y: i32,
    /// World-unit edge length of one voxel.
    pub dimension: f32,
}

impl ChunkBounds {
    /// Bounds whose scan ceiling is the top voxel row of the region.
    pub fn new(min: [i32; 3], max: [i32; 3], dimension: f32) -> Self {
        Self {
            min,
            max,
            top_y: max[1] - 1,
            dimension,
        }
    }

    /// Check the bounds describe a non-empty region with a usable scan ceiling.
    pub fn validate(&self) -> Result<(), WorldError> {
        if (0..3).any(|axis| self.min[axis] >= self.max[axis]) {
            return Err(WorldError::InvalidBounds {
                min: self.min,
                max: self.max,
            });
        }
        if self.top_y < self.min[1] {
            return Err(WorldError::TopBelowMin {
                top_y: self.top_y,
                min_y: self.min[1],
            });
        }
        require_positive("dimension", f64::from(self.dimension))
    }

    /// Extent along each axis. Assumes validated bounds.
    pub fn size(&self) -> [usize; 3] {
        [0, 1, 2].map(|axis| (self.max[axis] - self.min[axis]) as usize)
    }

    #[inline]
    pub fn contains(&self, pos: [i32; 3]) -> bool {
        (0..3).all(|axis| pos[axis] >= self.min[axis] && pos[axis] < self.max[axis])
    }
}

/// Dense voxel buffer for one bounded region plus dirty flags.
#[derive(Debug, Clone)]
pub struct Chunk {
    bounds: ChunkBounds,
    size: [usize; 3],
    voxels: Vec<Voxel>,
    dirty: DirtyFlags,
}

impl Chunk {
    /// Allocate a chunk filled with air. Bounds are validated before allocating.
    pub fn new(bounds: ChunkBounds) -> Result<Self, WorldError> {
        bounds.validate()?;
        let size = bounds.size();
        Ok(Self {
            bounds,
            size,
            voxels: vec![Voxel::default(); size[0] * size[1] * size[2]],
            dirty: DirtyFlags::all(),
        })
    }

    #[inline]
    pub fn bounds(&self) -> &ChunkBounds {
        &self.bounds
    }

    #[inline]
    pub fn min(&self) -> [i32; 3] {
        self.bounds.min
    }

    #[inline]
    pub fn max(&self) -> [i32; 3] {
        self.bounds.max
    }

    #[inline]
    pub fn top_y(&self) -> i32 {
        self.bounds.top_y
    }

    #[inline]
    pub fn dimension(&self) -> f32 {
        self.bounds.dimension
    }

    /// Move the mesher's scan ceiling.
    pub fn set_top_y(&mut self, top_y: i32) -> Result<(), WorldError> {
        if top_y < self.bounds.min[1] {
            return Err(WorldError::TopBelowMin {
                top_y,
                min_y: self.bounds.min[1],
            });
        }
        if top_y != self.bounds.top_y {
            self.bounds.top_y = top_y;
            self.dirty.insert(DirtyFlags::MESH);
        }
        Ok(())
    }

    #[inline]
    pub fn contains(&self, pos: [i32; 3]) -> bool {
        self.bounds.contains(pos)
    }

    fn index(&self, pos: [i32; 3]) -> Option<usize> {
        if !self.contains(pos) {
            return None;
        }
        let [x, y, z] = [0, 1, 2].map(|axis| (pos[axis] - self.bounds.min[axis]) as usize);
        Some((y * self.size[2] + z) * self.size[0] + x)
    }

    /// Fetch a voxel copy; positions outside the chunk read as unlit air.
    pub fn voxel(&self, pos: [i32; 3]) -> Voxel {
        self.index(pos)
            .map(|idx| self.voxels[idx])
            .unwrap_or_default()
    }

    #[inline]
    pub fn voxel_id(&self, pos: [i32; 3]) -> VoxelId {
        self.voxel(pos).id
    }

    /// Set a voxel and mark the relevant dirty flags.
    ///
    /// Returns `false` when `pos` lies outside the chunk.
    pub fn set_voxel(&mut self, pos: [i32; 3], voxel: Voxel) -> bool {
        let Some(idx) = self.index(pos) else {
            return false;
        };
        if self.voxels[idx] != voxel {
            self.voxels[idx] = voxel;
            self.dirty.insert(DirtyFlags::MESH | DirtyFlags::LIGHT);
        }
        true
    }

    /// Change the voxel type at `pos`, keeping its stored light.
    pub fn set_voxel_id(&mut self, pos: [i32; 3], id: VoxelId) -> bool {
        let Some(idx) = self.index(pos) else {
            return false;
        };
        if self.voxels[idx].id != id {
            self.voxels[idx].id = id;
            self.dirty.insert(DirtyFlags::MESH | DirtyFlags::LIGHT);
        }
        true
    }

    /// Store light computed by the external lighting pass.
    pub fn set_light(&mut self, pos: [i32; 3], sunlight: u8, torchlight: u8) -> bool {
        let Some(idx) = self.index(pos) else {
            return false;
        };
        let voxel = &mut self.voxels[idx];
        if voxel.sunlight != sunlight || voxel.torchlight != torchlight {
            voxel.sunlight = sunlight;
            voxel.torchlight = torchlight;
            self.dirty.insert(DirtyFlags::MESH);
        }
        true
    }

    /// Topmost non-air Y in column `(x, z)`, or `None` for empty or foreign columns.
    pub fn max_height(&self, x: i32, z: i32) -> Option<i32> {
        let [min_x, min_y, min_z] = self.bounds.min;
        let [max_x, max_y, max_z] = self.bounds.max;
        if !(min_x..max_x).contains(&x) || !(min_z..max_z).contains(&z) {
            return None;
        }
        (min_y..max_y)
            .rev()
            .find(|&y| !self.voxel([x, y, z]).is_air())
    }

    /// Write updates in order (last write wins) and hand back the ones outside this chunk.
    ///
    /// Non-air writes above the current scan ceiling raise `top_y` so they get meshed.
    pub fn apply_updates<I>(&mut self, updates: I) -> Vec<VoxelUpdate>
    where
        I: IntoIterator<Item = VoxelUpdate>,
    {
        let mut rejected = Vec::new();
        for update in updates {
            if !self.set_voxel_id(update.position, update.voxel) {
                rejected.push(update);
                continue;
            }
            let y = update.position[1];
            if update.voxel != VOXEL_AIR && y > self.bounds.top_y {
                self.bounds.top_y = y;
                self.dirty.insert(DirtyFlags::MESH);
            }
        }
        rejected
    }

    /// Flag the chunk for reprocessing, e.g. after a neighbor's border changed.
    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty.insert(flags);
    }

    #[inline]
    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty
    }

    /// Consume and return the current dirty flags.
    pub fn take_dirty_flags(&mut self) -> DirtyFlags {
        let flags = self.dirty;
        self.dirty = DirtyFlags::empty();
        flags
    }

    /// Borrow raw voxel storage (Y-major, then Z, then X).
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }
}

impl VoxelView for Chunk {
    fn voxel(&self, pos: [i32; 3]) -> VoxelId {
        self.voxel_id(pos)
    }

    fn sunlight(&self, pos: [i32; 3]) -> u8 {
        Chunk::voxel(self, pos).sunlight
    }

    fn torchlight(&self, pos: [i32; 3]) -> u8 {
        Chunk::voxel(self, pos).torchlight
    }
}
