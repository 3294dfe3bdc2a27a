//! voxgen - headless voxel world generator
//!
//! Generates density terrain and trees around the origin, meshes every chunk
//! and writes per-chunk mesh metrics.

mod config;
mod pipeline;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{load_voxel_registry, WorldConfig, DEFAULT_VOXELS_PATH, DEFAULT_WORLD_PATH};
use std::path::PathBuf;
use tracing::info;
use voxgen_render::{ChunkMeshCache, ChunkMeshDriver};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless voxel terrain and mesh generator", long_about = None)]
struct Args {
    /// World configuration (TOML)
    #[arg(long, default_value = DEFAULT_WORLD_PATH)]
    config: PathBuf,

    /// Voxel definitions (JSON)
    #[arg(long, default_value = DEFAULT_VOXELS_PATH)]
    voxels: PathBuf,

    /// Override the chunk radius from the config
    #[arg(long)]
    radius: Option<i32>,

    /// Override the world seed from the config
    #[arg(long)]
    seed: Option<u32>,

    /// Light each face flat instead of averaging shared vertices
    #[arg(long)]
    flat_lighting: bool,

    /// Where to write per-chunk mesh metrics (JSON)
    #[arg(long, default_value = "target/mesh_metrics.json")]
    mesh_metrics: PathBuf,
}

fn main() -> Result<()> {
    // Initialize tracing with INFO level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting voxgen v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = WorldConfig::load_from_path(&args.config);
    if let Some(radius) = args.radius {
        config.radius = radius.max(0);
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.flat_lighting {
        config.mesh.smooth_lighting = false;
    }

    let registry = load_voxel_registry(&args.voxels)?;
    let seed = config.seed.unwrap_or_else(rand::random);
    info!(seed, radius = config.radius, voxels = registry.len(), "world settings");

    let (mut storage, _report) = pipeline::build_world(&config, seed, &registry)?;

    let mut cache = ChunkMeshCache::new();
    let pass = ChunkMeshDriver::new(&mut storage, &mut cache, &registry, config.mesh).process();
    let stats = pass.stats;
    let triangles: usize = stats.iter().map(|stat| stat.triangles).sum();

    ChunkMeshDriver::write_metrics_to_file(&stats, &args.mesh_metrics).with_context(|| {
        format!(
            "Failed to write mesh metrics to {}",
            args.mesh_metrics.display()
        )
    })?;
    info!(
        chunks = stats.len(),
        triangles,
        path = %args.mesh_metrics.display(),
        "mesh metrics written"
    );

    if let Some((pos, err)) = pass.failures.into_iter().next() {
        bail!("meshing failed for chunk {pos:?}: {err}");
    }
    Ok(())
}
