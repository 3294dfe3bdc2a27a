use std::fs;
use std::path::Path;

use crate::{
    AssetError, BlockTextureConfig, TextureAtlas, TextureLayout, VoxelDefinition, VoxelDescriptor,
    VoxelRegistry,
};

/// Tile edge used when the atlas is packed from the definitions themselves.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// Load a voxel registry from the provided JSON file path.
pub fn registry_from_file(path: &Path) -> Result<VoxelRegistry, AssetError> {
    let data = fs::read_to_string(path)?;
    registry_from_str(&data)
}

/// Load a voxel registry from an in-memory JSON string, packing an atlas for
/// every texture the definitions reference.
pub fn registry_from_str(input: &str) -> Result<VoxelRegistry, AssetError> {
    let defs = crate::load_voxels_from_str(input)?;
    let atlas = TextureAtlas::pack(
        defs.iter()
            .filter_map(|def| def.textures.as_ref())
            .flat_map(BlockTextureConfig::texture_names),
        DEFAULT_TILE_SIZE,
    )?;
    registry_from_definitions(defs, atlas)
}

/// Load a voxel registry whose textures resolve against a prebuilt atlas layout.
pub fn registry_from_str_with_atlas(
    input: &str,
    atlas: TextureAtlas,
) -> Result<VoxelRegistry, AssetError> {
    let defs = crate::load_voxels_from_str(input)?;
    registry_from_definitions(defs, atlas)
}

/// Build a registry from parsed definitions; ids follow definition order.
pub fn registry_from_definitions(
    defs: Vec<VoxelDefinition>,
    atlas: TextureAtlas,
) -> Result<VoxelRegistry, AssetError> {
    let descriptors = defs
        .into_iter()
        .map(|def| {
            let textures = resolve_layout(&def, &atlas)?;
            Ok(VoxelDescriptor {
                name: def.name,
                solid: def.solid,
                transparent: def.transparent,
                plantable: def.plantable,
                textures,
            })
        })
        .collect::<Result<Vec<_>, AssetError>>()?;
    Ok(VoxelRegistry::new(descriptors)?.with_atlas(atlas))
}

fn resolve_layout(
    def: &VoxelDefinition,
    atlas: &TextureAtlas,
) -> Result<Option<TextureLayout>, AssetError> {
    let Some(config) = &def.textures else {
        return Ok(None);
    };
    let rect = |texture: &str| {
        atlas
            .uv_rect(texture)
            .ok_or_else(|| AssetError::MissingTexture {
                voxel: def.name.clone(),
                texture: texture.to_string(),
            })
    };

    let layout = match config {
        BlockTextureConfig {
            all: Some(all),
            side: None,
            top: None,
            bottom: None,
            north: None,
            south: None,
            east: None,
            west: None,
        } => TextureLayout::Uniform(rect(all)?),
        BlockTextureConfig {
            all: None,
            side: Some(side),
            top: Some(top),
            bottom: Some(bottom),
            north: None,
            south: None,
            east: None,
            west: None,
        } => TextureLayout::ThreeAxis {
            top: rect(top)?,
            side: rect(side)?,
            bottom: rect(bottom)?,
        },
        BlockTextureConfig {
            all: None,
            side: None,
            top: Some(top),
            bottom: Some(bottom),
            north: Some(north),
            south: Some(south),
            east: Some(east),
            west: Some(west),
        } => TextureLayout::SixAxis {
            up: rect(top)?,
            down: rect(bottom)?,
            north: rect(north)?,
            south: rect(south)?,
            east: rect(east)?,
            west: rect(west)?,
        },
        _ => return Err(AssetError::InvalidTextures(def.name.clone())),
    };
    Ok(Some(layout))
}
