//! Voxel chunk data, noise, terrain and structure generation.

mod chunk;
mod error;
mod noise;
mod storage;
mod terrain;
mod trees;
mod view;

pub use chunk::*;
pub use error::WorldError;
pub use noise::*;
pub use storage::*;
pub use terrain::*;
pub use trees::*;
pub use view::*;
