//! Entry point for shipview.
//! Inspect ship models and batch-validate an asset directory.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use asset::{CompositeModel, Material, TextureData, TextureMap, load_model};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "shipview", version, about = "Ship model viewer tools")]
struct Cli {
    /// Only log errors (parse diagnostics are hidden). RUST_LOG still wins.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print sub-objects, draw calls and bounds of a model.
    Info {
        model: PathBuf,
    },
    /// Load `<dir>/<name>/<name>.obj` for every sub-directory and report failures.
    Validate {
        dir: PathBuf,
    },
    /// Decode every texture referenced by a model.
    Textures {
        model: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.quiet { "error" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Command::Info { model } => info(&model),
        Command::Validate { dir } => validate(&dir),
        Command::Textures { model } => textures(&model),
    }
}

fn load(path: &Path) -> Result<CompositeModel> {
    load_model(path).with_context(|| format!("Failed to load model {}", path.display()))
}

fn info(path: &Path) -> Result<()> {
    let model = load(path)?;

    println!("{}", path.display());
    println!("  bounding radius: {:.4}", model.bounding_radius());
    for (name, geometry) in model.iter() {
        println!(
            "  {name}: {} vertices, {} triangles, {} bytes",
            geometry.vertex_count(),
            geometry.triangle_count(),
            geometry.as_bytes().len()
        );
        for call in renderer::plan_draws(geometry) {
            println!(
                "    {:>8}..{:<8} {}",
                call.vertices.start, call.vertices.end, call.material.name
            );
        }
        let empty = geometry.ranges().iter().filter(|r| r.is_empty()).count();
        if empty > 0 {
            println!("    ({empty} empty material runs skipped)");
        }
    }
    if !model.diagnostics.is_empty() {
        println!("  diagnostics:");
        for d in &model.diagnostics {
            println!("    {d}");
        }
    }
    Ok(())
}

/// Model file expected for a ship directory: `3d/admonisher/admonisher.obj`.
fn model_path(ship_dir: &Path) -> Option<PathBuf> {
    let name = ship_dir.file_name()?.to_str()?;
    Some(ship_dir.join(format!("{name}.obj")))
}

/// Sub-directories of `dir`, sorted. Unreadable entries are logged and skipped.
fn ship_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut ships = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_dir() {
                    ships.push(path);
                }
            }
            Err(err) => log::warn!("Skipping unreadable entry in {}: {err}", dir.display()),
        }
    }
    ships.sort();
    Ok(ships)
}

fn validate(dir: &Path) -> Result<()> {
    let ships = ship_dirs(dir)?;

    let mut failed = 0usize;
    for ship in &ships {
        let Some(path) = model_path(ship) else {
            log::warn!("Skipping non-UTF-8 directory {}", ship.display());
            continue;
        };
        let file = path.file_name().unwrap_or_default().to_string_lossy();
        match load_model(&path) {
            Ok(_) => log::info!("{file}: ok"),
            Err(err) => {
                failed += 1;
                println!("Error parsing '{file}': {:#}", anyhow::Error::from(err));
            }
        }
    }

    println!("{} of {} models loaded", ships.len() - failed, ships.len());
    if failed > 0 {
        bail!("{failed} model(s) failed to load");
    }
    Ok(())
}

fn textures(path: &Path) -> Result<()> {
    let model = load(path)?;

    let mut materials: BTreeMap<&str, &Arc<Material>> = BTreeMap::new();
    for (_, geometry) in model.iter() {
        for range in geometry.ranges() {
            materials.insert(range.material.name.as_str(), &range.material);
        }
    }

    let mut failed = 0usize;
    for (name, material) in materials {
        for (kind, map) in [("diffuse", &material.diffuse_map), ("bump", &material.bump_map)] {
            match check_texture(map) {
                Ok(desc) => println!("{name} {kind}: {desc}"),
                Err(err) => {
                    failed += 1;
                    println!("{name} {kind}: {err:#}");
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} texture(s) could not be decoded");
    }
    Ok(())
}

fn check_texture(map: &TextureMap) -> Result<String> {
    let tex = TextureData::load(&map.source)?;
    let kind = if map.is_fallback() { "fallback" } else { "file" };
    Ok(format!("{kind} {}x{}", tex.width, tex.height))
}
