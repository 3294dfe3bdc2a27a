use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;
use voxgen_assets::{registry_from_str, AssetError, VoxelRegistry};
use voxgen_render::MeshOptions;
use voxgen_world::{ChunkLayout, TerrainConfig, TreeConfig, TreeVoxels};

pub const DEFAULT_WORLD_PATH: &str = "config/world.toml";
pub const DEFAULT_VOXELS_PATH: &str = "config/voxels.json";

/// Built-in voxel table used when no definitions file is available.
const DEFAULT_VOXELS: &str = r#"[
    {"name": "air", "transparent": true},
    {"name": "stone", "solid": true, "textures": {"all": "stone"}},
    {"name": "grass", "solid": true, "plantable": true,
     "textures": {"top": "grass_top", "side": "grass_side", "bottom": "dirt"}},
    {"name": "dirt", "solid": true, "textures": {"all": "dirt"}},
    {"name": "trunk", "solid": true,
     "textures": {"top": "trunk_top", "side": "trunk_side", "bottom": "trunk_top"}},
    {"name": "leaves", "solid": true, "textures": {"all": "leaves"}},
    {"name": "leaves-orange", "solid": true, "textures": {"all": "leaves_orange"}}
]"#;

/// Voxel names trees are built from, resolved against the registry at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TreeVoxelNames {
    pub trunk: String,
    pub leaves: String,
    pub leaves_alt: String,
}

impl Default for TreeVoxelNames {
    fn default() -> Self {
        Self {
            trunk: "trunk".to_string(),
            leaves: "leaves".to_string(),
            leaves_alt: "leaves-orange".to_string(),
        }
    }
}

impl TreeVoxelNames {
    pub fn resolve(&self, registry: &VoxelRegistry) -> Result<TreeVoxels, AssetError> {
        Ok(TreeVoxels {
            trunk: registry.require_id(&self.trunk)?,
            leaves: registry.require_id(&self.leaves)?,
            leaves_alt: registry.require_id(&self.leaves_alt)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World seed; a random one is drawn when absent.
    pub seed: Option<u32>,
    /// Horizontal chunk edge in voxels.
    pub chunk_size: i32,
    pub max_height: i32,
    /// World-unit edge of one voxel.
    pub dimension: f32,
    /// Chunks generated in each direction around the origin.
    pub radius: i32,
    /// Overrides `terrain.solid_voxel` by name.
    pub terrain_voxel: Option<String>,
    pub mesh: MeshOptions,
    pub terrain: TerrainConfig,
    pub trees: TreeConfig,
    pub tree_voxels: TreeVoxelNames,
}

impl Default for WorldConfig {
    fn default() -> Self {
        let layout = ChunkLayout::default();
        Self {
            seed: None,
            chunk_size: layout.size,
            max_height: layout.max_height,
            dimension: layout.dimension,
            radius: 2,
            terrain_voxel: Some("grass".to_string()),
            mesh: MeshOptions::default(),
            terrain: TerrainConfig::default(),
            trees: TreeConfig::default(),
            tree_voxels: TreeVoxelNames::default(),
        }
    }
}

impl WorldConfig {
    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<WorldConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    WorldConfig::default()
                }
            },
            Err(err) => {
                if err.kind() == std::io::ErrorKind::NotFound {
                    warn!("World config not found at {}. Using defaults", path.display());
                } else {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                WorldConfig::default()
            }
        }
    }

    pub fn layout(&self) -> ChunkLayout {
        ChunkLayout {
            size: self.chunk_size,
            max_height: self.max_height,
            dimension: self.dimension,
        }
    }

    /// Terrain settings with the named terrain voxel resolved to its id.
    pub fn terrain_config(&self, registry: &VoxelRegistry) -> Result<TerrainConfig, AssetError> {
        let mut terrain = self.terrain;
        if let Some(name) = &self.terrain_voxel {
            terrain.solid_voxel = registry.require_id(name)?;
        }
        Ok(terrain)
    }
}

pub fn default_voxel_registry() -> Result<VoxelRegistry> {
    registry_from_str(DEFAULT_VOXELS).context("built-in voxel table is invalid")
}

/// Load voxel definitions from JSON. A missing file falls back to the built-in
/// table; a file that exists but does not load is an error.
pub fn load_voxel_registry(path: &Path) -> Result<VoxelRegistry> {
    match fs::read_to_string(path) {
        Ok(data) => registry_from_str(&data)
            .with_context(|| format!("Failed to load voxel definitions {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Voxel definitions not found at {}. Using built-in table",
                path.display()
            );
            default_voxel_registry()
        }
        Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
    }
}
