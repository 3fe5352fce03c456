//! Full texture build: inputs, validation, then outputs into the dist tree
//!
//! Every output is computed in memory before the dist tree is touched, so a
//! validation or decoding failure never leaves a half-written build.

use anyhow::{bail, Context, Result};
use image::RgbaImage;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::atlas::{self, UvRect};
use crate::config::{AtlasLayout, TexgenConfig};
use crate::formats::save_texture;
use crate::labels::TextData;
use crate::overlay::{self, FontRenderer};
use crate::pattern::{self, Pattern};
use crate::smd;
use crate::symbols::{self, SymbolSet};

/// Build switches not stored in the manifest
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Draw the prize and bet overlays
    pub overlays: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { overlays: true }
    }
}

/// What a build produced
#[derive(Debug, Default)]
pub struct BuildSummary {
    pub symbols: usize,
    pub copied_files: usize,
    pub outputs: Vec<PathBuf>,
}

/// Validated build inputs
#[derive(Debug)]
pub struct Inputs {
    pub pattern: Pattern,
    pub text: TextData,
    pub symbols: SymbolSet,
}

/// Fail on the first missing input path
pub fn check_paths(config: &TexgenConfig, overlays: bool) -> Result<()> {
    let paths = config.paths();

    let dirs = [("src", &paths.src), ("symbols", &paths.symbols)];
    for (name, path) in dirs {
        let resolved = config.resolve(path);
        if !resolved.is_dir() {
            bail!("Missing {} directory: {}", name, resolved.display());
        }
    }

    let mut files = vec![
        ("pattern", &paths.pattern),
        ("text", &paths.text),
        ("reel mesh", &paths.reels_smd),
        ("prizes texture", &paths.prizes_texture),
        ("bet texture", &paths.bet_texture),
    ];
    if overlays {
        files.push(("font", &paths.font));
    }
    for (name, path) in files {
        let resolved = config.resolve(path);
        if !resolved.is_file() {
            bail!("Missing {} file: {}", name, resolved.display());
        }
    }

    Ok(())
}

/// Load pattern, labels and symbols, then validate them together
pub fn load_inputs(config: &TexgenConfig) -> Result<Inputs> {
    let paths = config.paths();
    let pattern = Pattern::load(&config.resolve(&paths.pattern))?;
    let text = TextData::load(&config.resolve(&paths.text))?;
    let symbols = symbols::load_symbols(&config.resolve(&paths.symbols))?;

    let loaded: BTreeSet<u32> = symbols.keys().copied().collect();
    pattern::validate(&pattern, &loaded, text.prizes.len())?;

    Ok(Inputs {
        pattern,
        text,
        symbols,
    })
}

/// Validate a project without writing anything
pub fn check(config: &TexgenConfig) -> Result<Inputs> {
    check_paths(config, false)?;
    let inputs = load_inputs(config)?;
    tracing::info!(
        "Project OK: {} symbols, {} prize labels",
        inputs.symbols.len(),
        inputs.text.prizes.len()
    );
    Ok(inputs)
}

/// Run the whole build
pub fn build(config: &TexgenConfig, options: BuildOptions) -> Result<BuildSummary> {
    check_paths(config, options.overlays)?;
    let paths = config.paths();
    let layout = config.atlas();
    let inputs = load_inputs(config)?;

    let packed = atlas::pack(layout, &inputs.symbols);

    let mesh_in = config.resolve(&paths.reels_smd);
    let mesh_text = std::fs::read_to_string(&mesh_in)
        .with_context(|| format!("Failed to read mesh: {}", mesh_in.display()))?;
    let mesh = smd::rewrite_text(&mesh_text, &inputs.pattern, &packed.uvs, &layout.texture_name)
        .with_context(|| format!("Failed to rewrite mesh: {}", mesh_in.display()))?;

    let overlays = if options.overlays {
        Some(render_overlays(config, &inputs)?)
    } else {
        tracing::info!("Overlays disabled, keeping source prize and bet textures");
        None
    };

    // Nothing below can fail validation, start writing
    let src = config.resolve(&paths.src);
    let dist = config.resolve(&paths.dist);
    let textures_dir = dist.join("textures");
    std::fs::create_dir_all(&textures_dir)
        .with_context(|| format!("Failed to create output dir: {}", textures_dir.display()))?;
    let copied_files = copy_tree(&src, &dist)?;

    let mut outputs = Vec::new();

    let atlas_base = textures_dir.join(file_stem(Path::new(&layout.texture_name))?);
    let (bmp, png) = save_texture(&packed.image, &atlas_base)?;
    outputs.extend([bmp, png]);

    let mesh_out = dist_location(&paths.src, &paths.reels_smd, &dist, "bodies")?;
    if let Some(parent) = mesh_out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output dir: {}", parent.display()))?;
    }
    std::fs::write(&mesh_out, mesh)
        .with_context(|| format!("Failed to write mesh: {}", mesh_out.display()))?;
    tracing::info!("Rewrote mesh {} -> {}", mesh_in.display(), mesh_out.display());
    outputs.push(mesh_out);

    if let Some(overlays) = overlays {
        for (source, img) in [
            (&paths.prizes_texture, &overlays.prizes),
            (&paths.bet_texture, &overlays.bet),
        ] {
            let (bmp, png) = save_texture(img, &textures_dir.join(file_stem(source)?))?;
            outputs.extend([bmp, png]);
        }
    }

    Ok(BuildSummary {
        symbols: inputs.symbols.len(),
        copied_files,
        outputs,
    })
}

struct Overlays {
    prizes: RgbaImage,
    bet: RgbaImage,
}

fn render_overlays(config: &TexgenConfig, inputs: &Inputs) -> Result<Overlays> {
    let paths = config.paths();
    let layout = config.overlay();
    let renderer = FontRenderer::load(&config.resolve(&paths.font))?;

    let mut prizes = open_rgba(&config.resolve(&paths.prizes_texture))?;
    overlay::draw_prizes(
        &mut prizes,
        &inputs.symbols,
        &inputs.text.prizes,
        layout,
        &renderer,
    )?;

    let mut bet = open_rgba(&config.resolve(&paths.bet_texture))?;
    overlay::draw_bet(&mut bet, &inputs.text.bet, layout, &renderer);

    Ok(Overlays { prizes, bet })
}

fn open_rgba(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path)
        .with_context(|| format!("Failed to load texture: {}", path.display()))?;
    Ok(img.to_rgba8())
}

fn file_stem(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_stem()
        .with_context(|| format!("Path has no file name: {}", path.display()))
}

/// Where a file from the source tree lands in dist
///
/// Files under `src` keep their relative location; anything else goes into
/// `dist/<fallback_dir>`.
fn dist_location(src: &Path, file: &Path, dist: &Path, fallback_dir: &str) -> Result<PathBuf> {
    if let Ok(relative) = file.strip_prefix(src) {
        return Ok(dist.join(relative));
    }
    let name = file
        .file_name()
        .with_context(|| format!("Path has no file name: {}", file.display()))?;
    Ok(dist.join(fallback_dir).join(name))
}

/// Copy every file under `src` into `dst`, overwriting existing files
///
/// Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    if dst.starts_with(src) {
        bail!(
            "Output directory {} must not be inside the source tree {}",
            dst.display(),
            src.display()
        );
    }

    let mut copied = 0;
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry =
            entry.with_context(|| format!("Failed to read source tree: {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Unexpected path: {}", entry.path().display()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create dir: {}", target.display()))?;
        } else {
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy {} -> {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            copied += 1;
        }
    }

    tracing::info!("Copied {} files from {} to {}", copied, src.display(), dst.display());
    Ok(copied)
}

/// Pack a symbol directory into `<out_base>.bmp` and `<out_base>.png`
pub fn export_atlas(
    symbols_dir: &Path,
    out_base: &Path,
    layout: &AtlasLayout,
) -> Result<BTreeMap<u32, UvRect>> {
    let symbols = symbols::load_symbols(symbols_dir)?;
    if symbols.is_empty() {
        bail!("No symbol images in {}", symbols_dir.display());
    }
    let packed = atlas::pack(layout, &symbols);
    save_texture(&packed.image, out_base)?;
    Ok(packed.uvs)
}

/// Rewrite one mesh against the atlas a symbol directory would pack into
///
/// Only symbol indices matter for UVs, so images are listed but not decoded.
pub fn rewrite_mesh(
    mesh: &Path,
    pattern_path: &Path,
    symbols_dir: &Path,
    out: &Path,
    layout: &AtlasLayout,
) -> Result<()> {
    let pattern = Pattern::load(pattern_path)?;
    let indices: BTreeSet<u32> = symbols::find_symbols(symbols_dir)?.into_keys().collect();
    pattern::check_symbols(&pattern, &indices)?;

    let uvs = atlas::uv_table(layout, indices);
    smd::rewrite_file(mesh, out, &pattern, &uvs, &layout.texture_name)
}
