use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use image::{imageops, imageops::FilterType, ImageReader, RgbaImage};
use voxgen_assets::{load_voxels_from_str, TextureAtlas};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(author, version, about = "Texture atlas packing utility for voxgen", long_about = None)]
struct Args {
    /// Directory containing source textures (PNG/JPEG)
    #[arg(short, long)]
    input: PathBuf,

    /// Output atlas image path (PNG)
    #[arg(long, default_value = "atlas.png")]
    output_image: PathBuf,

    /// Output layout JSON path, readable by `TextureAtlas::load_file`
    #[arg(long, default_value = "atlas.json")]
    output_meta: PathBuf,

    /// Tile edge in pixels; inferred from the first texture if omitted
    #[arg(long)]
    tile_size: Option<u32>,

    /// Maximum atlas edge in pixels
    #[arg(long, default_value_t = 4096)]
    max_atlas_size: u32,

    /// Allow resizing textures that don't match the tile size
    #[arg(long)]
    allow_mixed_sizes: bool,

    /// Voxel definitions whose texture references must all be present
    #[arg(long)]
    voxels: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    if !args.input.is_dir() {
        bail!("Input path {:?} is not a directory", args.input);
    }
    let (textures, tile_size) = load_textures(&args)?;

    if let Some(path) = &args.voxels {
        check_references(path, &textures)?;
    }

    let atlas = TextureAtlas::pack(textures.keys().cloned(), tile_size)?;
    if atlas.atlas_size() > args.max_atlas_size {
        bail!(
            "Atlas size {0}x{0} exceeds max {1}",
            atlas.atlas_size(),
            args.max_atlas_size
        );
    }
    let image = stitch(&atlas, &textures)?;

    create_parent(&args.output_image)?;
    image.save(&args.output_image).with_context(|| {
        format!(
            "Failed to write atlas image to {}",
            args.output_image.display()
        )
    })?;

    create_parent(&args.output_meta)?;
    let json = serde_json::to_string_pretty(&atlas)?;
    fs::write(&args.output_meta, json)
        .with_context(|| format!("Failed to write metadata to {}", args.output_meta.display()))?;

    println!(
        "Packed {} textures into {} ({side}x{side} tiles of {tile}px)",
        textures.len(),
        args.output_image.display(),
        side = atlas.count_per_side,
        tile = atlas.tile_size
    );
    println!("Metadata written to {}", args.output_meta.display());

    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {parent:?}"))?;
        }
    }
    Ok(())
}

/// Copy every texture into the tile the layout assigned it.
fn stitch(atlas: &TextureAtlas, textures: &BTreeMap<String, RgbaImage>) -> Result<RgbaImage> {
    let mut image = RgbaImage::new(atlas.atlas_size(), atlas.atlas_size());
    for entry in &atlas.entries {
        let Some(texture) = textures.get(&entry.name) else {
            bail!("Layout entry {} has no texture", entry.name);
        };
        imageops::replace(&mut image, texture, i64::from(entry.x), i64::from(entry.y));
    }
    Ok(image)
}

fn check_references(path: &Path, textures: &BTreeMap<String, RgbaImage>) -> Result<()> {
    let data =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let defs = load_voxels_from_str(&data)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    for def in &defs {
        let Some(config) = &def.textures else {
            continue;
        };
        for name in config.texture_names() {
            if !textures.contains_key(name) {
                bail!("Voxel {} references missing texture {name}", def.name);
            }
        }
    }
    Ok(())
}

fn load_textures(args: &Args) -> Result<(BTreeMap<String, RgbaImage>, u32)> {
    let mut textures = BTreeMap::new();
    let mut inferred_size = args.tile_size;

    for entry in WalkDir::new(&args.input)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_texture_file(path) {
            continue;
        }

        let image = ImageReader::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .decode()
            .with_context(|| format!("Failed to decode {}", path.display()))?
            .to_rgba8();

        let (w, h) = image.dimensions();
        if w != h {
            bail!("Texture {} is not square ({}x{})", path.display(), w, h);
        }
        let target_size = *inferred_size.get_or_insert(w);

        let image = if w == target_size {
            image
        } else if args.allow_mixed_sizes {
            println!(
                "Resizing {} from {w}x{w} to {target_size}x{target_size}",
                path.display()
            );
            imageops::resize(&image, target_size, target_size, FilterType::Nearest)
        } else {
            bail!(
                "Texture {} has size {} but expected {} (use --allow-mixed-sizes to resize)",
                path.display(),
                w,
                target_size
            );
        };

        let name = texture_name(path, &args.input);
        if textures.insert(name.clone(), image).is_some() {
            bail!("Duplicate texture name detected: {name}");
        }
    }

    match inferred_size {
        Some(tile_size) if !textures.is_empty() => Ok((textures, tile_size)),
        _ => bail!("No texture assets found under {}", args.input.display()),
    }
}

fn is_texture_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase()),
        Some(ext) if matches!(ext.as_str(), "png" | "jpg" | "jpeg")
    )
}

/// Texture name: path relative to the input root, without extension, `/`-separated.
fn texture_name(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let name = rel.with_extension("").to_string_lossy().replace('\\', "/");
    name.trim_start_matches("./").trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(size: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(size, size, Rgba([value, value, value, 255]))
    }

    #[test]
    fn texture_names_are_relative_without_extension() {
        let root = Path::new("assets/textures");
        assert_eq!(
            texture_name(Path::new("assets/textures/blocks/stone.png"), root),
            "blocks/stone"
        );
        assert_eq!(texture_name(Path::new("assets/textures/dirt.JPG"), root), "dirt");
        assert!(is_texture_file(Path::new("a/b.Png")));
        assert!(!is_texture_file(Path::new("a/b.txt")));
    }

    #[test]
    fn stitch_places_tiles_where_layout_says() {
        let textures: BTreeMap<String, RgbaImage> = [("a", 10), ("b", 20), ("c", 30)]
            .into_iter()
            .map(|(name, value)| (name.to_string(), solid(4, value)))
            .collect();
        let atlas = TextureAtlas::pack(textures.keys().cloned(), 4).unwrap();
        let image = stitch(&atlas, &textures).unwrap();

        assert_eq!(image.dimensions(), (8, 8));
        assert_eq!(image.get_pixel(1, 1)[0], 10);
        assert_eq!(image.get_pixel(5, 2)[0], 20);
        assert_eq!(image.get_pixel(3, 7)[0], 30);
        // Unused fourth tile stays transparent.
        assert_eq!(image.get_pixel(6, 6)[3], 0);
    }

    #[test]
    fn stitch_reports_missing_texture() {
        let atlas = TextureAtlas::pack(["ghost"], 4).unwrap();
        assert!(stitch(&atlas, &BTreeMap::new()).is_err());
    }
}
