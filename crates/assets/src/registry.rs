use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use voxgen_world::{VoxelId, VoxelProperties, VoxelPropertyProvider};

use crate::{AssetError, TextureAtlas, UvRect};

/// Faces corresponding to the voxel's six sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockFace {
    /// Positive Y / top face.
    Up,
    /// Negative Y / bottom face.
    Down,
    /// Negative Z face.
    North,
    /// Positive Z face.
    South,
    /// Positive X face.
    East,
    /// Negative X face.
    West,
}

impl BlockFace {
    /// Unit normal pointing out of the face.
    pub const fn normal(self) -> [i32; 3] {
        match self {
            BlockFace::Up => [0, 1, 0],
            BlockFace::Down => [0, -1, 0],
            BlockFace::North => [0, 0, -1],
            BlockFace::South => [0, 0, 1],
            BlockFace::East => [1, 0, 0],
            BlockFace::West => [-1, 0, 0],
        }
    }
}

/// How a voxel type maps atlas rectangles onto its faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TextureLayout {
    /// Same texture on every face.
    Uniform(UvRect),
    /// Distinct top and bottom, one texture for the four sides.
    ThreeAxis {
        /// +Y face.
        top: UvRect,
        /// Four horizontal faces.
        side: UvRect,
        /// -Y face.
        bottom: UvRect,
    },
    /// One texture per face.
    SixAxis {
        /// +Y face.
        up: UvRect,
        /// -Y face.
        down: UvRect,
        /// -Z face.
        north: UvRect,
        /// +Z face.
        south: UvRect,
        /// +X face.
        east: UvRect,
        /// -X face.
        west: UvRect,
    },
}

impl TextureLayout {
    /// Rectangle used for `face`.
    pub fn resolve_uv(&self, face: BlockFace) -> UvRect {
        match *self {
            TextureLayout::Uniform(rect) => rect,
            TextureLayout::ThreeAxis { top, side, bottom } => match face {
                BlockFace::Up => top,
                BlockFace::Down => bottom,
                BlockFace::North | BlockFace::South | BlockFace::East | BlockFace::West => side,
            },
            TextureLayout::SixAxis {
                up,
                down,
                north,
                south,
                east,
                west,
            } => match face {
                BlockFace::Up => up,
                BlockFace::Down => down,
                BlockFace::North => north,
                BlockFace::South => south,
                BlockFace::East => east,
                BlockFace::West => west,
            },
        }
    }
}

/// Voxel metadata loaded from definitions.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelDescriptor {
    /// Human-readable identifier (e.g., "stone").
    pub name: String,
    /// Occupies its cell for culling and ambient occlusion.
    pub solid: bool,
    /// Lets light through.
    pub transparent: bool,
    /// Trees may grow on it.
    pub plantable: bool,
    /// Face textures; `None` for types that are never rendered.
    pub textures: Option<TextureLayout>,
}

impl VoxelDescriptor {
    /// Non-solid, transparent, untextured descriptor for id 0.
    pub fn air() -> Self {
        Self {
            name: "air".to_string(),
            solid: false,
            transparent: true,
            plantable: false,
            textures: None,
        }
    }

    /// Helper for tests that need a simple descriptor. Solid types are opaque.
    pub fn simple(name: &str, solid: bool, textures: Option<TextureLayout>) -> Self {
        Self {
            name: name.to_string(),
            solid,
            transparent: !solid,
            plantable: false,
            textures,
        }
    }

    /// Flags consumed by generation and meshing.
    pub fn properties(&self) -> VoxelProperties {
        VoxelProperties {
            solid: self.solid,
            transparent: self.transparent,
            plantable: self.plantable,
        }
    }
}

/// Registry storing voxel descriptors keyed by id.
#[derive(Debug, Clone)]
pub struct VoxelRegistry {
    descriptors: Vec<VoxelDescriptor>,
    name_to_id: HashMap<String, VoxelId>,
    atlas: Option<TextureAtlas>,
}

impl VoxelRegistry {
    /// Construct a registry from descriptors; the index of each descriptor is its id.
    pub fn new(descriptors: Vec<VoxelDescriptor>) -> Result<Self, AssetError> {
        if descriptors.len() > usize::from(VoxelId::MAX) + 1 {
            return Err(AssetError::TooManyVoxels(descriptors.len()));
        }
        if let Some(first) = descriptors.first() {
            if first.solid {
                return Err(AssetError::SolidAir(first.name.clone()));
            }
        }
        let mut name_to_id = HashMap::new();
        for (id, desc) in descriptors.iter().enumerate() {
            if name_to_id.insert(desc.name.clone(), id as VoxelId).is_some() {
                return Err(AssetError::DuplicateVoxel(desc.name.clone()));
            }
        }
        Ok(Self {
            descriptors,
            name_to_id,
            atlas: None,
        })
    }

    /// Attach the atlas the descriptors' UV rectangles were resolved against.
    pub fn with_atlas(mut self, atlas: TextureAtlas) -> Self {
        self.atlas = Some(atlas);
        self
    }

    /// Atlas layout backing the texture rectangles, when known.
    pub fn atlas(&self) -> Option<&TextureAtlas> {
        self.atlas.as_ref()
    }

    /// Look up a descriptor by numeric id.
    pub fn descriptor(&self, id: VoxelId) -> Option<&VoxelDescriptor> {
        self.descriptors.get(usize::from(id))
    }

    /// Resolve a voxel id by its name.
    pub fn id_by_name(&self, name: &str) -> Option<VoxelId> {
        self.name_to_id.get(name).copied()
    }

    /// Resolve a voxel id by name, failing for unknown names.
    pub fn require_id(&self, name: &str) -> Result<VoxelId, AssetError> {
        self.id_by_name(name)
            .ok_or_else(|| AssetError::UnknownVoxelName(name.to_string()))
    }

    /// Texture layout for `id`, if the type is registered and textured.
    pub fn textures(&self, id: VoxelId) -> Option<&TextureLayout> {
        self.descriptor(id).and_then(|d| d.textures.as_ref())
    }

    /// Number of registered voxel types.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true when no voxel types are registered.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Iterate over `(id, descriptor)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (VoxelId, &VoxelDescriptor)> + '_ {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(id, desc)| (id as VoxelId, desc))
    }

    /// True for registered types that may be planted on.
    pub fn is_plantable(&self, id: VoxelId) -> bool {
        self.descriptor(id).is_some_and(|d| d.plantable)
    }
}

impl VoxelPropertyProvider for VoxelRegistry {
    fn properties(&self, id: VoxelId) -> Option<VoxelProperties> {
        self.descriptor(id).map(VoxelDescriptor::properties)
    }
}
