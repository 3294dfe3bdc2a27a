use std::{
    collections::{BTreeSet, HashSet},
    fs,
    path::Path,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while packing, loading or validating an atlas layout.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// Wrap IO failures when reading layout files.
    #[error("failed to read atlas layout: {0}")]
    Io(#[from] std::io::Error),
    /// Wrap JSON parsing issues.
    #[error("failed to parse atlas layout: {0}")]
    Parse(#[from] serde_json::Error),
    /// Validation errors describing why a layout is inconsistent.
    #[error("invalid atlas layout: {0}")]
    Invalid(String),
}

/// Normalized texture rectangle inside the atlas.
///
/// V is flipped relative to pixel rows, so `start_v` is the top edge and is
/// larger than `end_v`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UvRect {
    /// Left edge.
    pub start_u: f32,
    /// Right edge.
    pub end_u: f32,
    /// Top edge.
    pub start_v: f32,
    /// Bottom edge.
    pub end_v: f32,
}

impl UvRect {
    /// Map a unit corner `(u, v)` of a face into this rectangle.
    pub fn lerp(&self, u: f32, v: f32) -> [f32; 2] {
        [
            u * (self.end_u - self.start_u) + self.start_u,
            v * (self.start_v - self.end_v) + self.end_v,
        ]
    }
}

/// Tile placement for a single texture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtlasEntry {
    /// Logical identifier (e.g., "grass_top").
    pub name: String,
    /// X offset in pixels within the atlas (top-left origin).
    pub x: u32,
    /// Y offset in pixels within the atlas (top-left origin).
    pub y: u32,
}

/// Square grid atlas of equally sized tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureAtlas {
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Tiles per atlas row and column; always a power of two.
    pub count_per_side: u32,
    /// Entries sorted by name.
    pub entries: Vec<AtlasEntry>,
}

impl TextureAtlas {
    /// Lay out the given texture names on the smallest power-of-two grid that fits.
    ///
    /// Names are deduplicated and placed in sorted order, filling rows left to right.
    pub fn pack<I, S>(names: I, tile_size: u32) -> Result<Self, AtlasError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if tile_size == 0 {
            return Err(AtlasError::Invalid("tile_size must be > 0".into()));
        }
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        let count_per_side = grid_side(names.len());
        atlas_extent(tile_size, count_per_side)?;
        let entries = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| {
                let index = index as u32;
                AtlasEntry {
                    name,
                    x: (index % count_per_side) * tile_size,
                    y: (index / count_per_side) * tile_size,
                }
            })
            .collect();
        Ok(Self {
            tile_size,
            count_per_side,
            entries,
        })
    }

    /// Parse a layout from a JSON string and validate contents.
    pub fn parse_str(input: &str) -> Result<Self, AtlasError> {
        let atlas: TextureAtlas = serde_json::from_str(input)?;
        atlas.validate()?;
        Ok(atlas)
    }

    /// Load a layout from a file on disk.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, AtlasError> {
        let data = fs::read_to_string(path)?;
        Self::parse_str(&data)
    }

    /// Edge length of the whole atlas in pixels. Saturates on layouts that
    /// fail [`TextureAtlas::validate`].
    pub fn atlas_size(&self) -> u32 {
        self.tile_size.saturating_mul(self.count_per_side)
    }


    /// Validate the structure of the layout and return `Ok(())` if consistent.
    pub fn validate(&self) -> Result<(), AtlasError> {
        if self.tile_size == 0 {
            return Err(AtlasError::Invalid("tile_size must be > 0".into()));
        }
        if !self.count_per_side.is_power_of_two() {
            return Err(AtlasError::Invalid(format!(
                "count_per_side {} is not a power of two",
                self.count_per_side
            )));
        }
        let size = atlas_extent(self.tile_size, self.count_per_side)?;
        let fits = |offset: u32| offset.checked_add(self.tile_size).is_some_and(|end| end <= size);
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.x % self.tile_size != 0 || entry.y % self.tile_size != 0 {
                return Err(AtlasError::Invalid(format!(
                    "entry {} is not aligned to the tile grid",
                    entry.name
                )));
            }
            if !fits(entry.x) || !fits(entry.y) {
                return Err(AtlasError::Invalid(format!(
                    "entry {} exceeds atlas bounds",
                    entry.name
                )));
            }
            if !seen.insert(&entry.name) {
                return Err(AtlasError::Invalid(format!(
                    "duplicate atlas entry '{}'",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    /// Lookup a texture entry by name.
    pub fn entry(&self, name: &str) -> Option<&AtlasEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// UV rectangle for a texture, inset by a tenth of a texel on every edge to
    /// avoid sampling neighboring tiles.
    pub fn uv_rect(&self, name: &str) -> Option<UvRect> {
        let entry = self.entry(name)?;
        let size = self.atlas_size() as f32;
        let tile = self.tile_size as f32;
        let (x, y) = (entry.x as f32, entry.y as f32);
        let inset = 0.1 / tile;

        Some(UvRect {
            start_u: x / size + inset,
            end_u: (x + tile) / size - inset,
            start_v: 1.0 - y / size - inset,
            end_v: 1.0 - (y + tile) / size + inset,
        })
    }
}

fn atlas_extent(tile_size: u32, count_per_side: u32) -> Result<u32, AtlasError> {
    tile_size.checked_mul(count_per_side).ok_or_else(|| {
        AtlasError::Invalid(format!(
            "{count_per_side} tiles of {tile_size} px overflow the atlas size"
        ))
    })
}

fn grid_side(count: usize) -> u32 {
    let side = (count as f64).sqrt().ceil() as u32;
    side.max(2).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_sorts_and_places_on_power_of_two_grid() {
        let atlas = TextureAtlas::pack(["stone", "dirt", "grass_top", "grass_side", "dirt"], 16)
            .unwrap();
        assert_eq!(atlas.count_per_side, 2);
        assert_eq!(atlas.atlas_size(), 32);
        let names: Vec<&str> = atlas.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dirt", "grass_side", "grass_top", "stone"]);
        assert_eq!(atlas.entry("grass_top").map(|e| (e.x, e.y)), Some((0, 16)));
        assert_eq!(atlas.entry("stone").map(|e| (e.x, e.y)), Some((16, 16)));
    }

    #[test]
    fn grid_grows_to_next_power_of_two() {
        let names: Vec<String> = (0..5).map(|i| format!("t{i}")).collect();
        assert_eq!(TextureAtlas::pack(names, 8).unwrap().count_per_side, 4);
        let names: Vec<String> = (0..17).map(|i| format!("t{i:02}")).collect();
        assert_eq!(TextureAtlas::pack(names, 8).unwrap().count_per_side, 8);
        assert_eq!(grid_side(1), 2);
    }

    #[test]
    fn uv_rect_flips_v_and_insets() {
        let atlas = TextureAtlas::pack(["a", "b", "c"], 10).unwrap();
        // "a" sits in the top-left tile of a 20px atlas.
        let uv = atlas.uv_rect("a").unwrap();
        let inset = 0.01;
        assert!((uv.start_u - inset).abs() < 1e-6);
        assert!((uv.end_u - (0.5 - inset)).abs() < 1e-6);
        assert!((uv.start_v - (1.0 - inset)).abs() < 1e-6);
        assert!((uv.end_v - (0.5 + inset)).abs() < 1e-6);

        // "c" sits in the bottom-left tile.
        let uv = atlas.uv_rect("c").unwrap();
        assert!((uv.start_v - (0.5 - inset)).abs() < 1e-6);
        assert!((uv.end_v - inset).abs() < 1e-6);

        assert!(atlas.uv_rect("missing").is_none());
    }

    #[test]
    fn lerp_maps_unit_corners() {
        let uv = UvRect {
            start_u: 0.25,
            end_u: 0.5,
            start_v: 1.0,
            end_v: 0.75,
        };
        assert_eq!(uv.lerp(0.0, 0.0), [0.25, 0.75]);
        assert_eq!(uv.lerp(1.0, 1.0), [0.5, 1.0]);
    }

    #[test]
    fn oversized_layout_is_invalid_not_a_panic() {
        let json = r#"{"tile_size": 16, "count_per_side": 2147483648, "entries": []}"#;
        assert!(matches!(
            TextureAtlas::parse_str(json),
            Err(AtlasError::Invalid(msg)) if msg.contains("overflow")
        ));

        let json = r#"{"tile_size": 4294967295, "count_per_side": 1,
                       "entries": [{"name": "a", "x": 0, "y": 4294967295}]}"#;
        assert!(matches!(
            TextureAtlas::parse_str(json),
            Err(AtlasError::Invalid(_))
        ));

        assert!(matches!(
            TextureAtlas::pack(["a", "b"], u32::MAX),
            Err(AtlasError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_zero_tile_size() {
        assert!(matches!(
            TextureAtlas::pack(["a"], 0),
            Err(AtlasError::Invalid(_))
        ));
    }

    #[test]
    fn parse_round_trips_and_validates() {
        let atlas = TextureAtlas::pack(["a", "b"], 16).unwrap();
        let json = serde_json::to_string(&atlas).unwrap();
        assert_eq!(TextureAtlas::parse_str(&json).unwrap(), atlas);

        let broken = r#"{"tile_size":16,"count_per_side":2,"entries":[
            {"name":"a","x":0,"y":0},{"name":"a","x":16,"y":0}]}"#;
        assert!(matches!(
            TextureAtlas::parse_str(broken),
            Err(AtlasError::Invalid(_))
        ));

        let outside = r#"{"tile_size":16,"count_per_side":2,"entries":[{"name":"a","x":32,"y":0}]}"#;
        assert!(TextureAtlas::parse_str(outside).is_err());
    }
}
