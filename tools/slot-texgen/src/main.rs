//! slot-texgen - slot machine texture generator
//!
//! Packs reel symbols into an atlas, remaps the reel mesh UVs onto it and
//! draws the prize and bet overlays.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use slot_texgen::config::DEFAULT_MANIFEST;
use slot_texgen::pipeline::{self, BuildOptions};
use slot_texgen::{AtlasLayout, TexgenConfig};

#[derive(Parser)]
#[command(name = "slot-texgen")]
#[command(about = "Slot machine texture generator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every texture and the reel mesh from a manifest
    Build {
        /// Path to texgen.toml manifest
        #[arg(default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,

        /// Output directory (overrides manifest, relative to the working directory)
        #[arg(short, long)]
        dist: Option<PathBuf>,

        /// Skip the prize and bet overlays
        #[arg(long)]
        no_overlays: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate inputs without building
    Check {
        /// Path to texgen.toml manifest
        #[arg(default_value = DEFAULT_MANIFEST)]
        manifest: PathBuf,
    },

    /// Pack a symbol directory into an atlas
    Atlas {
        /// Directory of <index>.<ext> symbol images
        symbols: PathBuf,

        /// Output base path (.bmp and .png are appended)
        #[arg(short, long)]
        output: PathBuf,

        /// Take the atlas layout from this texgen.toml
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Rewrite a reel mesh against the atlas of a symbol directory
    Rewrite {
        /// Input SMD mesh
        input: PathBuf,

        /// Reel pattern JSON
        #[arg(short, long)]
        pattern: PathBuf,

        /// Directory of <index>.<ext> symbol images
        #[arg(short, long)]
        symbols: PathBuf,

        /// Output SMD mesh
        #[arg(short, long)]
        output: PathBuf,

        /// Texture name written at each face group
        #[arg(short, long)]
        texture: Option<String>,

        /// Take the atlas layout from this texgen.toml
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Build { verbose: true, .. });
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    match cli.command {
        Commands::Build {
            manifest,
            dist,
            no_overlays,
            verbose: _,
        } => {
            tracing::info!("Building textures from {:?}", manifest);
            let mut config = TexgenConfig::load(&manifest)?;
            if let Some(dist) = dist {
                let cwd = std::env::current_dir().context("Failed to read working directory")?;
                config = config.with_dist(cwd.join(dist));
            }
            let summary = pipeline::build(
                &config,
                BuildOptions {
                    overlays: !no_overlays,
                },
            )?;
            for output in &summary.outputs {
                tracing::debug!("Wrote {}", output.display());
            }
            tracing::info!(
                "Build complete! {} symbols, {} outputs",
                summary.symbols,
                summary.outputs.len()
            );
        }
        Commands::Check { manifest } => {
            let config = TexgenConfig::load(&manifest)?;
            pipeline::check(&config)?;
        }
        Commands::Atlas {
            symbols,
            output,
            manifest,
        } => {
            let layout = atlas_layout(manifest.as_deref())?;
            let uvs = pipeline::export_atlas(&symbols, &output, &layout)?;
            for (index, uv) in &uvs {
                println!(
                    "{}: {:.6} {:.6} {:.6} {:.6}",
                    index, uv.u_min, uv.v_min, uv.u_max, uv.v_max
                );
            }
        }
        Commands::Rewrite {
            input,
            pattern,
            symbols,
            output,
            texture,
            manifest,
        } => {
            let mut layout = atlas_layout(manifest.as_deref())?;
            if let Some(texture) = texture {
                layout.texture_name = texture;
            }
            pipeline::rewrite_mesh(&input, &pattern, &symbols, &output, &layout)?;
        }
    }

    Ok(())
}

/// Atlas layout from an optional manifest, defaults otherwise
fn atlas_layout(manifest: Option<&Path>) -> Result<AtlasLayout> {
    match manifest {
        Some(path) if !path.is_file() => bail!("Manifest not found: {}", path.display()),
        Some(path) => Ok(TexgenConfig::load(path)?.atlas().clone()),
        None => Ok(AtlasLayout::default()),
    }
}
