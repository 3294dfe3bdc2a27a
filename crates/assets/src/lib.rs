#![warn(missing_docs)]
//! Voxel definitions, texture layouts and atlas packing.

mod atlas;
mod loader;
mod registry;

pub use atlas::{AtlasEntry, AtlasError, TextureAtlas, UvRect};
pub use loader::{
    registry_from_definitions, registry_from_file, registry_from_str,
    registry_from_str_with_atlas, DEFAULT_TILE_SIZE,
};
pub use registry::{BlockFace, TextureLayout, VoxelDescriptor, VoxelRegistry};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Voxel definition as written in JSON voxel packs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoxelDefinition {
    /// Human-readable identifier (e.g., "stone").
    pub name: String,
    /// Whether the voxel occupies its cell.
    #[serde(default)]
    pub solid: bool,
    /// Whether light passes through.
    #[serde(default)]
    pub transparent: bool,
    /// Whether trees may be planted on top.
    #[serde(default)]
    pub plantable: bool,
    /// Optional per-face textures.
    #[serde(default)]
    pub textures: Option<BlockTextureConfig>,
}

/// Errors emitted during voxel pack loading.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Wrap IO errors when reading packs.
    #[error("failed to read voxel pack: {0}")]
    Io(#[from] std::io::Error),
    /// Wrap serde parsing issues.
    #[error("failed to parse voxel pack: {0}")]
    Parse(#[from] serde_json::Error),
    /// Atlas packing or validation failed.
    #[error(transparent)]
    Atlas(#[from] AtlasError),
    /// Texture fields do not describe a uniform, three-axis or six-axis layout.
    #[error("voxel `{0}` must set `all`, `top`+`side`+`bottom`, or all six faces")]
    InvalidTextures(String),
    /// A definition references a texture the atlas does not contain.
    #[error("voxel `{voxel}` references texture `{texture}` missing from the atlas")]
    MissingTexture {
        /// Voxel definition name.
        voxel: String,
        /// Texture name.
        texture: String,
    },
    /// Two definitions share a name.
    #[error("duplicate voxel name `{0}`")]
    DuplicateVoxel(String),
    /// Id 0 is reserved for air and must not be solid.
    #[error("voxel id 0 (`{0}`) must not be solid")]
    SolidAir(String),
    /// More definitions than voxel ids.
    #[error("{0} voxel definitions exceed the id range")]
    TooManyVoxels(usize),
    /// A name lookup found no definition.
    #[error("no voxel named `{0}`")]
    UnknownVoxelName(String),
}

/// Parse a JSON string into a list of voxel definitions.
pub fn load_voxels_from_str(input: &str) -> Result<Vec<VoxelDefinition>, AssetError> {
    Ok(serde_json::from_str(input)?)
}

/// Configuration for per-face textures.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct BlockTextureConfig {
    /// Apply to all faces when specified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<String>,
    /// Apply to all side faces when specified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    /// Specific texture for the top face.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    /// Specific texture for the bottom face.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<String>,
    /// Specific texture for the north (-Z) face.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub north: Option<String>,
    /// Specific texture for the south (+Z) face.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub south: Option<String>,
    /// Specific texture for the east (+X) face.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub east: Option<String>,
    /// Specific texture for the west (-X) face.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub west: Option<String>,
}

impl BlockTextureConfig {
    /// Every texture name this configuration references.
    pub fn texture_names(&self) -> impl Iterator<Item = &str> + '_ {
        [
            &self.all,
            &self.side,
            &self.top,
            &self.bottom,
            &self.north,
            &self.south,
            &self.east,
            &self.west,
        ]
        .into_iter()
        .filter_map(|name| name.as_deref())
    }
}
