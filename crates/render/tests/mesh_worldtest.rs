//! Mesher behavior against hand-built voxel neighborhoods.
//!
//! Covers face culling through a world view, ambient occlusion levels and the
//! quad split they select, shared-vertex light averaging, and chunk seams.

use voxgen_assets::{TextureLayout, UvRect, VoxelDescriptor, VoxelRegistry};
use voxgen_render::{
    mesh_chunk, mesh_chunk_with_world, ChunkMeshCache, ChunkMeshDriver, MeshBuffers, MeshError,
    MeshOptions,
};
use voxgen_world::{
    Chunk, ChunkBounds, ChunkLayout, ChunkPos, ChunkStorage, VoxelId, VoxelView, VOXEL_AIR,
};

const STONE: VoxelId = 1;
const MYSTERY: VoxelId = 2;

fn registry() -> VoxelRegistry {
    let rect = UvRect {
        start_u: 0.0,
        end_u: 0.5,
        start_v: 1.0,
        end_v: 0.5,
    };
    VoxelRegistry::new(vec![
        VoxelDescriptor::air(),
        VoxelDescriptor::simple("stone", true, Some(TextureLayout::Uniform(rect))),
        VoxelDescriptor::simple("mystery", true, None),
    ])
    .unwrap()
}

fn chunk(size: i32) -> Chunk {
    Chunk::new(ChunkBounds::new([0, 0, 0], [size, size, size], 1.0)).unwrap()
}

/// A chunk embedded in a world filled with `fill`, except for one open cell.
struct Surrounded<'a> {
    chunk: &'a Chunk,
    fill: VoxelId,
    open: Option<[i32; 3]>,
}

impl VoxelView for Surrounded<'_> {
    fn voxel(&self, pos: [i32; 3]) -> VoxelId {
        if self.chunk.contains(pos) {
            self.chunk.voxel_id(pos)
        } else if self.open == Some(pos) {
            VOXEL_AIR
        } else {
            self.fill
        }
    }

    fn sunlight(&self, _pos: [i32; 3]) -> u8 {
        0
    }

    fn torchlight(&self, _pos: [i32; 3]) -> u8 {
        0
    }
}

fn vertex_position(mesh: &MeshBuffers, vertex: usize) -> [f32; 3] {
    [
        mesh.positions[3 * vertex],
        mesh.positions[3 * vertex + 1],
        mesh.positions[3 * vertex + 2],
    ]
}

fn vertex_normal(mesh: &MeshBuffers, vertex: usize) -> [f32; 3] {
    [
        mesh.normals[3 * vertex],
        mesh.normals[3 * vertex + 1],
        mesh.normals[3 * vertex + 2],
    ]
}

/// Quads facing +Y whose vertices lie on the plane `y`.
fn up_quads_at(mesh: &MeshBuffers, y: f32) -> Vec<usize> {
    (0..mesh.quad_count())
        .filter(|&quad| {
            vertex_normal(mesh, 4 * quad) == [0.0, 1.0, 0.0]
                && vertex_position(mesh, 4 * quad)[1] == y
        })
        .collect()
}

#[test]
fn enclosed_solid_chunk_emits_nothing() {
    let mut chunk = chunk(4);
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                chunk.set_voxel_id([x, y, z], STONE);
            }
        }
    }
    let registry = registry();
    let options = MeshOptions::default();

    let sealed = Surrounded {
        chunk: &chunk,
        fill: STONE,
        open: None,
    };
    let mesh = mesh_chunk_with_world(&chunk, &registry, &options, &sealed).unwrap();
    assert!(mesh.is_empty());
    assert_eq!(mesh.hash, MeshBuffers::empty().hash);

    let opened = Surrounded {
        chunk: &chunk,
        fill: STONE,
        open: Some([4, 1, 1]),
    };
    let mesh = mesh_chunk_with_world(&chunk, &registry, &options, &opened).unwrap();
    assert_eq!(mesh.quad_count(), 1);
    for vertex in 0..4 {
        assert_eq!(vertex_normal(&mesh, vertex), [1.0, 0.0, 0.0]);
        assert_eq!(vertex_position(&mesh, vertex)[0], 4.0);
    }
}

#[test]
fn corner_between_two_solid_edges_is_darkest() {
    let registry = registry();
    for with_diagonal in [false, true] {
        let mut chunk = chunk(8);
        chunk.set_voxel_id([2, 2, 2], STONE);
        chunk.set_voxel_id([1, 3, 2], STONE);
        chunk.set_voxel_id([2, 3, 1], STONE);
        if with_diagonal {
            chunk.set_voxel_id([1, 3, 1], STONE);
        }
        let mesh = mesh_chunk(&chunk, &registry, &MeshOptions::default()).unwrap();
        let quads = up_quads_at(&mesh, 3.0);
        assert_eq!(quads.len(), 1);

        let base = 4 * quads[0];
        let corner = (base..base + 4)
            .find(|&v| vertex_position(&mesh, v) == [2.0, 3.0, 2.0])
            .unwrap();
        assert!((mesh.aos[corner] - 100.0 / 255.0).abs() < 1e-6);
        let far = (base..base + 4)
            .find(|&v| vertex_position(&mesh, v) == [3.0, 3.0, 3.0])
            .unwrap();
        assert!((mesh.aos[far] - 1.0).abs() < 1e-6);
    }
}

#[test]
fn quad_split_follows_occlusion() {
    let registry = registry();

    // Diagonal occluder darkens slot 2, so the split runs along slots 1 and 2.
    let mut chunk = chunk(8);
    chunk.set_voxel_id([2, 2, 2], STONE);
    chunk.set_voxel_id([1, 3, 1], STONE);
    let mesh = mesh_chunk(&chunk, &registry, &MeshOptions::default()).unwrap();
    let quad = up_quads_at(&mesh, 3.0)[0];
    let base = (4 * quad) as u32;
    assert_eq!(vertex_position(&mesh, 4 * quad), [2.0, 3.0, 3.0]);
    assert!((mesh.aos[4 * quad + 2] - 210.0 / 255.0).abs() < 1e-6);
    assert_eq!(
        mesh.indices[6 * quad..6 * quad + 6],
        [0, 1, 3, 3, 2, 0].map(|i| base + i)
    );

    // Darkening slot 0 instead keeps the default split.
    let mut chunk = self::chunk(8);
    chunk.set_voxel_id([2, 2, 2], STONE);
    chunk.set_voxel_id([1, 3, 3], STONE);
    let mesh = mesh_chunk(&chunk, &registry, &MeshOptions::default()).unwrap();
    let quad = up_quads_at(&mesh, 3.0)[0];
    let base = (4 * quad) as u32;
    assert!((mesh.aos[4 * quad] - 210.0 / 255.0).abs() < 1e-6);
    assert_eq!(
        mesh.indices[6 * quad..6 * quad + 6],
        [0, 1, 2, 2, 1, 3].map(|i| base + i)
    );
}

fn lit_slab() -> Chunk {
    let mut chunk = chunk(8);
    for x in 1..=6 {
        for z in 1..=6 {
            for y in 1..=3 {
                chunk.set_voxel_id([x, y, z], STONE);
            }
            let torch = if x <= 3 { 3 } else { 5 };
            chunk.set_light([x, 4, z], 0, torch);
        }
    }
    chunk
}

#[test]
fn smooth_lighting_averages_shared_vertices() {
    let chunk = lit_slab();
    let mesh = mesh_chunk(&chunk, &registry(), &MeshOptions::default()).unwrap();

    let shared: Vec<usize> = (0..mesh.vertex_count())
        .filter(|&v| vertex_position(&mesh, v) == [4.0, 4.0, 4.0])
        .collect();
    assert_eq!(shared.len(), 4);
    for vertex in shared {
        assert!((mesh.torchlights[vertex] - 4.0).abs() < 1e-6);
        assert_eq!(mesh.sunlights[vertex], 0.0);
    }
}

/// Dark chunk inside a torch-lit world, with optional solid voxels outside it.
struct LitOutside<'a> {
    chunk: &'a Chunk,
    torchlight: u8,
    solid: &'a [[i32; 3]],
}

impl VoxelView for LitOutside<'_> {
    fn voxel(&self, pos: [i32; 3]) -> VoxelId {
        if self.chunk.contains(pos) {
            self.chunk.voxel_id(pos)
        } else if self.solid.contains(&pos) {
            STONE
        } else {
            VOXEL_AIR
        }
    }

    fn sunlight(&self, _pos: [i32; 3]) -> u8 {
        0
    }

    fn torchlight(&self, pos: [i32; 3]) -> u8 {
        if self.chunk.contains(pos) {
            0
        } else {
            self.torchlight
        }
    }
}

fn torchlights_at(mesh: &MeshBuffers, corner: [f32; 3]) -> Vec<f32> {
    (0..mesh.vertex_count())
        .filter(|&v| vertex_position(mesh, v) == corner)
        .map(|v| mesh.torchlights[v])
        .collect()
}

#[test]
fn boundary_corner_pools_light_from_outside_the_chunk() {
    let mut chunk = chunk(4);
    chunk.set_voxel_id([3, 1, 1], STONE);
    let world = LitOutside {
        chunk: &chunk,
        torchlight: 8,
        solid: &[],
    };
    let mesh = mesh_chunk_with_world(&chunk, &registry(), &MeshOptions::default(), &world).unwrap();

    // +X, +Y and +Z faces meet at (4, 2, 2). Each adds its neighbor and the
    // cell one step further along +X: 8 + 8, 0 + 8 and 0 + 8 over six samples.
    let lights = torchlights_at(&mesh, [4.0, 2.0, 2.0]);
    assert_eq!(lights.len(), 3);
    for light in lights {
        assert!((light - 32.0 / 6.0).abs() < 1e-5, "got {light}");
    }
}

#[test]
fn opaque_cells_are_not_pooled() {
    let mut chunk = chunk(4);
    chunk.set_voxel_id([3, 1, 1], STONE);
    let world = LitOutside {
        chunk: &chunk,
        torchlight: 8,
        solid: &[[5, 1, 1]],
    };
    let mesh = mesh_chunk_with_world(&chunk, &registry(), &MeshOptions::default(), &world).unwrap();

    let lights = torchlights_at(&mesh, [4.0, 2.0, 2.0]);
    assert_eq!(lights.len(), 3);
    for light in lights {
        assert!((light - 24.0 / 5.0).abs() < 1e-5, "got {light}");
    }
}

#[test]
fn interior_corner_skips_pooling() {
    let mut chunk = chunk(4);
    chunk.set_voxel_id([1, 1, 1], STONE);
    let world = LitOutside {
        chunk: &chunk,
        torchlight: 8,
        solid: &[],
    };
    let mesh = mesh_chunk_with_world(&chunk, &registry(), &MeshOptions::default(), &world).unwrap();

    let lights = torchlights_at(&mesh, [2.0, 2.0, 2.0]);
    assert_eq!(lights, vec![0.0; 3]);
}

#[test]
fn flat_lighting_copies_face_neighbor() {
    let chunk = lit_slab();
    let options = MeshOptions {
        smooth_lighting: false,
    };
    let mesh = mesh_chunk(&chunk, &registry(), &options).unwrap();

    let quads = up_quads_at(&mesh, 4.0);
    assert_eq!(quads.len(), 36);
    for quad in quads {
        let base = 4 * quad;
        let x = vertex_position(&mesh, base)[0].min(vertex_position(&mesh, base + 3)[0]);
        let expected = if x < 4.0 { 3.0 } else { 5.0 };
        for vertex in base..base + 4 {
            assert_eq!(mesh.torchlights[vertex], expected);
        }
    }
}

#[test]
fn meshing_errors_name_the_voxel() {
    let registry = registry();

    let mut chunk = chunk(4);
    chunk.set_voxel_id([1, 2, 3], 40);
    let err = mesh_chunk(&chunk, &registry, &MeshOptions::default()).unwrap_err();
    assert_eq!(
        err,
        MeshError::UnknownVoxel {
            id: 40,
            pos: [1, 2, 3]
        }
    );

    let mut chunk = self::chunk(4);
    chunk.set_voxel_id([0, 0, 0], MYSTERY);
    let err = mesh_chunk(&chunk, &registry, &MeshOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        MeshError::MissingTexture {
            id: MYSTERY,
            pos: [0, 0, 0],
            ..
        }
    ));
}

#[test]
fn mesh_hash_is_deterministic() {
    let registry = registry();
    let chunk = lit_slab();
    let a = mesh_chunk(&chunk, &registry, &MeshOptions::default()).unwrap();
    let b = mesh_chunk(&chunk, &registry, &MeshOptions::default()).unwrap();
    assert_eq!(a, b);

    let mut changed = chunk.clone();
    changed.set_voxel_id([6, 3, 6], VOXEL_AIR);
    let c = mesh_chunk(&changed, &registry, &MeshOptions::default()).unwrap();
    assert_ne!(a.hash, c.hash);
}

#[test]
fn resident_neighbor_culls_seam_faces() {
    let layout = ChunkLayout {
        size: 4,
        max_height: 4,
        dimension: 1.0,
    };
    let registry = registry();
    let mut storage = ChunkStorage::new(layout, 4).unwrap();
    for pos in [ChunkPos::new(0, 0), ChunkPos::new(1, 0)] {
        let chunk = storage.ensure_chunk(pos).unwrap();
        let [min_x, _, min_z] = chunk.min();
        for x in min_x..min_x + 4 {
            for z in min_z..min_z + 4 {
                chunk.set_voxel_id([x, 0, z], STONE);
            }
        }
    }

    let mut cache = ChunkMeshCache::new();
    let stats = ChunkMeshDriver::new(&mut storage, &mut cache, &registry, MeshOptions::default())
        .process()
        .stats;
    assert_eq!(stats.len(), 2);
    // 16 top, 16 bottom and 12 of 16 sides; the shared seam is hidden.
    assert!(stats.iter().all(|stat| stat.triangles == 2 * 44));

    let alone = mesh_chunk(
        storage.get(ChunkPos::new(0, 0)).unwrap(),
        &registry,
        &MeshOptions::default(),
    )
    .unwrap();
    assert_eq!(alone.quad_count(), 48);
}
