#![warn(missing_docs)]
//! Chunk meshing: boundary faces with ambient occlusion and smooth lighting.

mod cache;
mod driver;
mod mesh;

pub use cache::ChunkMeshCache;
pub use driver::{ChunkMeshDriver, ChunkMeshStat, MeshPass};
pub use mesh::{
    mesh_chunk, mesh_chunk_with_world, vertex_ao, MeshBuffers, MeshError, MeshHash, MeshOptions,
    AO_TABLE,
};
