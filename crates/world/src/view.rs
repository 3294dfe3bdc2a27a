//! Read-only accessors the mesher and structure generators work through.

use crate::chunk::VoxelId;
use crate::WorldError;

/// World-coordinate access to voxel content and the light fields stored next to it.
///
/// Light values are produced by an external lighting pass; implementors only
/// report what is stored.
pub trait VoxelView {
    /// Voxel type at `pos`. Unloaded or out-of-range positions read as air.
    fn voxel(&self, pos: [i32; 3]) -> VoxelId;
    /// Sunlight level at `pos`.
    fn sunlight(&self, pos: [i32; 3]) -> u8;
    /// Torchlight level at `pos`.
    fn torchlight(&self, pos: [i32; 3]) -> u8;
}

/// Static flags describing how a voxel type behaves during generation and meshing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoxelProperties {
    /// Occupies its cell for face culling and ambient occlusion.
    pub solid: bool,
    /// Lets light through; used for smooth-light pooling.
    pub transparent: bool,
    /// Structures such as trees may be planted on top of it.
    pub plantable: bool,
}

/// Lookup of per-type voxel properties, implemented by the voxel registry.
pub trait VoxelPropertyProvider {
    /// Properties for `id`, or `None` if the type is not registered.
    fn properties(&self, id: VoxelId) -> Option<VoxelProperties>;

    /// Properties for `id`, reporting unregistered types as an error at `pos`.
    fn require(&self, id: VoxelId, pos: [i32; 3]) -> Result<VoxelProperties, WorldError> {
        self.properties(id)
            .ok_or(WorldError::UnknownVoxel { id, pos })
    }
}
