use thiserror::Error;

use crate::chunk::VoxelId;

/// Errors raised while constructing chunks and generators or while sampling chunk content.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorldError {
    /// At least one axis has `min >= max`.
    #[error("chunk bounds are inverted or empty (min {min:?}, max {max:?})")]
    InvalidBounds {
        /// Requested lower corner.
        min: [i32; 3],
        /// Requested upper corner (exclusive).
        max: [i32; 3],
    },
    /// `top_y` lies below the chunk floor.
    #[error("top_y {top_y} lies below the chunk floor {min_y}")]
    TopBelowMin {
        /// Requested scan ceiling.
        top_y: i32,
        /// Chunk `min.y`.
        min_y: i32,
    },
    /// A generator or chunk parameter is zero, negative or not finite.
    #[error("parameter `{name}` must be positive and finite (got {value})")]
    InvalidParameter {
        /// Parameter name as it appears in configuration.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A voxel type referenced by chunk content has no registry entry.
    #[error("voxel type {id} at {pos:?} has no registry entry")]
    UnknownVoxel {
        /// The unregistered voxel type.
        id: VoxelId,
        /// World position where it was read.
        pos: [i32; 3],
    },
}

/// Reject values that are not strictly positive and finite.
pub(crate) fn require_positive(name: &'static str, value: f64) -> Result<(), WorldError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(WorldError::InvalidParameter { name, value })
    }
}

/// Reject values that are not finite.
pub(crate) fn require_finite(name: &'static str, value: f64) -> Result<(), WorldError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(WorldError::InvalidParameter { name, value })
    }
}
