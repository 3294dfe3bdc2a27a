use std::collections::HashMap;
use std::fmt;

use blake3::Hasher;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use voxgen_assets::{BlockFace, VoxelRegistry};
use voxgen_world::{Chunk, VoxelId, VoxelProperties, VoxelPropertyProvider, VoxelView};

/// Brightness per AO level, darkest first.
pub const AO_TABLE: [u8; 4] = [100, 180, 210, 255];

/// Errors that abort meshing a chunk.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    /// A voxel in the chunk or its neighborhood has no registry entry.
    #[error("voxel type {id} at {pos:?} has no registry entry")]
    UnknownVoxel {
        /// The unregistered voxel type.
        id: VoxelId,
        /// World position where it was read.
        pos: [i32; 3],
    },
    /// A solid voxel needs a face texture but its type has no layout.
    #[error("solid voxel type {id} at {pos:?} has no texture for its {face:?} face")]
    MissingTexture {
        /// Voxel type.
        id: VoxelId,
        /// World position.
        pos: [i32; 3],
        /// Face being emitted.
        face: BlockFace,
    },
}

/// Hash of the combined vertex/index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeshHash(pub [u8; 32]);

impl fmt::Display for MeshHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Meshing switches exposed through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOptions {
    /// Average light over every face sharing a vertex instead of lighting faces flat.
    pub smooth_lighting: bool,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            smooth_lighting: true,
        }
    }
}

/// Output mesh buffers per chunk.
///
/// Four vertices and six indices per emitted quad.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshBuffers {
    /// Vertex positions in world units, three floats per vertex.
    pub positions: Vec<f32>,
    /// Face normals, three floats per vertex.
    pub normals: Vec<f32>,
    /// Atlas coordinates, two floats per vertex.
    pub uvs: Vec<f32>,
    /// Ambient occlusion factor in `[0, 1]` per vertex.
    pub aos: Vec<f32>,
    /// Sunlight level per vertex.
    pub sunlights: Vec<f32>,
    /// Torchlight level per vertex.
    pub torchlights: Vec<f32>,
    /// Triangle list.
    pub indices: Vec<u32>,
    /// Stable hash of all buffers for cache comparisons.
    pub hash: MeshHash,
}

impl MeshBuffers {
    /// Construct an empty mesh (useful for initialization).
    pub fn empty() -> Self {
        MeshBuilder::new(false).finish()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.aos.len()
    }

    /// Number of emitted quads.
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }

    /// Number of triangles in the index buffer.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns true when no faces were emitted.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

struct FaceCorner {
    /// Corner offset from the voxel's min corner.
    pos: [i32; 3],
    /// Unit texture coordinate.
    uv: [f32; 2],
    /// Side, side and diagonal occluders, relative to the voxel.
    occluders: [[i32; 3]; 3],
}

struct Face {
    face: BlockFace,
    corners: [FaceCorner; 4],
}

const fn corner(pos: [i32; 3], uv: [f32; 2], occluders: [[i32; 3]; 3]) -> FaceCorner {
    FaceCorner { pos, uv, occluders }
}

const FACES: [Face; 6] = [
    Face {
        face: BlockFace::West,
        corners: [
            corner([0, 1, 0], [0.0, 1.0], [[-1, 1, 0], [-1, 0, -1], [-1, 1, -1]]),
            corner([0, 0, 0], [0.0, 0.0], [[-1, -1, 0], [-1, 0, -1], [-1, -1, -1]]),
            corner([0, 1, 1], [1.0, 1.0], [[-1, 1, 0], [-1, 0, 1], [-1, 1, 1]]),
            corner([0, 0, 1], [1.0, 0.0], [[-1, -1, 0], [-1, 0, 1], [-1, -1, 1]]),
        ],
    },
    Face {
        face: BlockFace::East,
        corners: [
            corner([1, 1, 1], [0.0, 1.0], [[1, 1, 0], [1, 0, 1], [1, 1, 1]]),
            corner([1, 0, 1], [0.0, 0.0], [[1, -1, 0], [1, 0, 1], [1, -1, 1]]),
            corner([1, 1, 0], [1.0, 1.0], [[1, 1, 0], [1, 0, -1], [1, 1, -1]]),
            corner([1, 0, 0], [1.0, 0.0], [[1, -1, 0], [1, 0, -1], [1, -1, -1]]),
        ],
    },
    Face {
        face: BlockFace::Down,
        corners: [
            corner([1, 0, 1], [1.0, 0.0], [[1, -1, 0], [0, -1, 1], [1, -1, 1]]),
            corner([0, 0, 1], [0.0, 0.0], [[-1, -1, 0], [0, -1, 1], [-1, -1, 1]]),
            corner([1, 0, 0], [1.0, 1.0], [[1, -1, 0], [0, -1, -1], [1, -1, -1]]),
            corner([0, 0, 0], [0.0, 1.0], [[-1, -1, 0], [0, -1, -1], [-1, -1, -1]]),
        ],
    },
    Face {
        face: BlockFace::Up,
        corners: [
            corner([0, 1, 1], [1.0, 1.0], [[-1, 1, 0], [0, 1, 1], [-1, 1, 1]]),
            corner([1, 1, 1], [0.0, 1.0], [[1, 1, 0], [0, 1, 1], [1, 1, 1]]),
            corner([0, 1, 0], [1.0, 0.0], [[-1, 1, 0], [0, 1, -1], [-1, 1, -1]]),
            corner([1, 1, 0], [0.0, 0.0], [[1, 1, 0], [0, 1, -1], [1, 1, -1]]),
        ],
    },
    Face {
        face: BlockFace::North,
        corners: [
            corner([1, 0, 0], [0.0, 0.0], [[1, 0, -1], [0, -1, -1], [1, -1, -1]]),
            corner([0, 0, 0], [1.0, 0.0], [[-1, 0, -1], [0, -1, -1], [-1, -1, -1]]),
            corner([1, 1, 0], [0.0, 1.0], [[1, 0, -1], [0, 1, -1], [1, 1, -1]]),
            corner([0, 1, 0], [1.0, 1.0], [[-1, 0, -1], [0, 1, -1], [-1, 1, -1]]),
        ],
    },
    Face {
        face: BlockFace::South,
        corners: [
            corner([0, 0, 1], [0.0, 0.0], [[-1, 0, 1], [0, -1, 1], [-1, -1, 1]]),
            corner([1, 0, 1], [1.0, 0.0], [[1, 0, 1], [0, -1, 1], [1, -1, 1]]),
            corner([0, 1, 1], [0.0, 1.0], [[-1, 0, 1], [0, 1, 1], [-1, 1, 1]]),
            corner([1, 1, 1], [1.0, 1.0], [[1, 0, 1], [0, 1, 1], [1, 1, 1]]),
        ],
    },
];

/// All 26 neighbor offsets, faces then edges then corners.
const POOL_OFFSETS: [[i32; 3]; 26] = [
    [-1, 0, 0],
    [0, -1, 0],
    [0, 0, -1],
    [1, 0, 0],
    [0, 1, 0],
    [0, 0, 1],
    [-1, -1, 0],
    [-1, 0, -1],
    [-1, 1, 0],
    [-1, 0, 1],
    [1, -1, 0],
    [1, 0, -1],
    [1, 1, 0],
    [1, 0, 1],
    [0, -1, -1],
    [0, 1, -1],
    [0, -1, 1],
    [0, 1, 1],
    [-1, -1, -1],
    [-1, -1, 1],
    [-1, 1, -1],
    [-1, 1, 1],
    [1, -1, -1],
    [1, -1, 1],
    [1, 1, -1],
    [1, 1, 1],
];

/// An offset pools when every non-zero component points out through a chunk
/// boundary the corner lies on.
fn pool_applies(offset: [i32; 3], corner: [i32; 3], min: [i32; 3], max: [i32; 3]) -> bool {
    (0..3).all(|axis| match offset[axis] {
        -1 => corner[axis] == min[axis],
        1 => corner[axis] == max[axis],
        _ => true,
    })
}

/// Occlusion level for one corner: 0 when both sides are solid, else 3 minus the occluder count.
pub fn vertex_ao(side1: bool, side2: bool, diagonal: bool) -> usize {
    if side1 && side2 {
        return 0;
    }
    3 - (usize::from(side1) + usize::from(side2) + usize::from(diagonal))
}

/// Shared-vertex light sums.
#[derive(Debug, Clone, Copy, Default)]
struct LightAccumulator {
    count: u32,
    sunlight_sum: u32,
    torchlight_sum: u32,
}

impl LightAccumulator {
    fn add(&mut self, sunlight: u8, torchlight: u8) {
        self.count += 1;
        self.sunlight_sum += u32::from(sunlight);
        self.torchlight_sum += u32::from(torchlight);
    }
}

/// Internal helper for building mesh data.
struct MeshBuilder {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    aos: Vec<f32>,
    sunlights: Vec<f32>,
    torchlights: Vec<f32>,
    indices: Vec<u32>,
    smooth: bool,
    accumulators: HashMap<[i32; 3], LightAccumulator>,
    vertex_keys: Vec<[i32; 3]>,
}

impl MeshBuilder {
    fn new(smooth: bool) -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            aos: Vec::new(),
            sunlights: Vec::new(),
            torchlights: Vec::new(),
            indices: Vec::new(),
            smooth,
            accumulators: HashMap::new(),
            vertex_keys: Vec::new(),
        }
    }

    fn push_vertex(&mut self, pos: [i32; 3], dimension: f32, normal: [i32; 3], uv: [f32; 2], ao: u8) {
        self.positions.extend(pos.map(|c| c as f32 * dimension));
        self.normals.extend(normal.map(|c| c as f32));
        self.uvs.extend(uv);
        self.aos.push(f32::from(ao) / 255.0);
    }

    fn push_indices(&mut self, base: u32, ao: [u8; 4]) {
        let [a0, a1, a2, a3] = ao.map(u16::from);
        let pattern = if a0 + a3 > a1 + a2 {
            [0, 1, 3, 3, 2, 0]
        } else {
            [0, 1, 2, 2, 1, 3]
        };
        self.indices.extend(pattern.map(|i| base + i));
    }

    fn finish(self) -> MeshBuffers {
        let MeshBuilder {
            positions,
            normals,
            uvs,
            aos,
            mut sunlights,
            mut torchlights,
            indices,
            smooth,
            accumulators,
            vertex_keys,
        } = self;

        if smooth {
            for key in &vertex_keys {
                let acc = accumulators.get(key).copied().unwrap_or_default();
                let count = acc.count.max(1) as f32;
                sunlights.push(acc.sunlight_sum as f32 / count);
                torchlights.push(acc.torchlight_sum as f32 / count);
            }
        }

        let mut hasher = Hasher::new();
        for buffer in [&positions, &normals, &uvs, &aos, &sunlights, &torchlights] {
            hasher.update(bytemuck::cast_slice(buffer.as_slice()));
        }
        hasher.update(bytemuck::cast_slice(indices.as_slice()));

        MeshBuffers {
            positions,
            normals,
            uvs,
            aos,
            sunlights,
            torchlights,
            indices,
            hash: MeshHash(*hasher.finalize().as_bytes()),
        }
    }
}

fn properties_at<W: VoxelView + ?Sized>(
    world: &W,
    registry: &VoxelRegistry,
    pos: [i32; 3],
) -> Result<VoxelProperties, MeshError> {
    let id = world.voxel(pos);
    registry
        .properties(id)
        .ok_or(MeshError::UnknownVoxel { id, pos })
}

fn offset(pos: [i32; 3], delta: [i32; 3]) -> [i32; 3] {
    [pos[0] + delta[0], pos[1] + delta[1], pos[2] + delta[2]]
}

/// Mesh a chunk, reading neighbors from the chunk itself (outside reads as air).
pub fn mesh_chunk(
    chunk: &Chunk,
    registry: &VoxelRegistry,
    options: &MeshOptions,
) -> Result<MeshBuffers, MeshError> {
    mesh_chunk_with_world(chunk, registry, options, chunk)
}

/// Mesh the boundary faces of a chunk, reading voxels and light through `world`.
///
/// Scans `x` and `z` across the chunk and `y` from `min.y` to `top_y`
/// inclusive. A face is emitted for each solid voxel side whose neighbor is
/// not solid.
#[instrument(skip_all, fields(min = ?chunk.min(), max = ?chunk.max(), top_y = chunk.top_y()))]
pub fn mesh_chunk_with_world<W: VoxelView + ?Sized>(
    chunk: &Chunk,
    registry: &VoxelRegistry,
    options: &MeshOptions,
    world: &W,
) -> Result<MeshBuffers, MeshError> {
    let min = chunk.min();
    let max = chunk.max();
    let dimension = chunk.dimension();
    let mut builder = MeshBuilder::new(options.smooth_lighting);

    for vx in min[0]..max[0] {
        for vy in min[1]..chunk.top_y() + 1 {
            for vz in min[2]..max[2] {
                let voxel_pos = [vx, vy, vz];
                if !properties_at(world, registry, voxel_pos)?.solid {
                    continue;
                }
                let id = world.voxel(voxel_pos);

                for face in &FACES {
                    let normal = face.face.normal();
                    let neighbor = offset(voxel_pos, normal);
                    if properties_at(world, registry, neighbor)?.solid {
                        continue;
                    }

                    let rect = registry
                        .textures(id)
                        .map(|layout| layout.resolve_uv(face.face))
                        .ok_or(MeshError::MissingTexture {
                            id,
                            pos: voxel_pos,
                            face: face.face,
                        })?;
                    let sunlight = world.sunlight(neighbor);
                    let torchlight = world.torchlight(neighbor);
                    let base = builder.aos.len() as u32;
                    let mut face_ao = [0u8; 4];

                    for (slot, corner) in face.corners.iter().enumerate() {
                        let corner_pos = offset(voxel_pos, corner.pos);
                        let [side1, side2, diagonal] = corner
                            .occluders
                            .map(|delta| offset(voxel_pos, delta));
                        let level = vertex_ao(
                            properties_at(world, registry, side1)?.solid,
                            properties_at(world, registry, side2)?.solid,
                            properties_at(world, registry, diagonal)?.solid,
                        );
                        face_ao[slot] = AO_TABLE[level];

                        if builder.smooth {
                            let mut acc = builder
                                .accumulators
                                .get(&corner_pos)
                                .copied()
                                .unwrap_or_default();
                            acc.add(sunlight, torchlight);
                            for delta in POOL_OFFSETS {
                                if !pool_applies(delta, corner_pos, min, max) {
                                    continue;
                                }
                                let pooled = offset(neighbor, delta);
                                if properties_at(world, registry, pooled)?.transparent {
                                    acc.add(world.sunlight(pooled), world.torchlight(pooled));
                                }
                            }
                            builder.accumulators.insert(corner_pos, acc);
                            builder.vertex_keys.push(corner_pos);
                        } else {
                            builder.sunlights.push(f32::from(sunlight));
                            builder.torchlights.push(f32::from(torchlight));
                        }

                        builder.push_vertex(
                            corner_pos,
                            dimension,
                            normal,
                            rect.lerp(corner.uv[0], corner.uv[1]),
                            face_ao[slot],
                        );
                    }

                    builder.push_indices(base, face_ao);
                }
            }
        }
    }

    let mesh = builder.finish();
    debug!(quads = mesh.quad_count(), "chunk meshed");
    Ok(mesh)
}
