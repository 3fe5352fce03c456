//! texgen.toml manifest parsing
//!
//! All layout constants used by the atlas packer, the mesh rewriter and the
//! overlay compositor live here. Every key is optional; defaults reproduce the
//! reference slot machine layout.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default manifest file name
pub const DEFAULT_MANIFEST: &str = "texgen.toml";

/// texgen.toml manifest structure
#[derive(Debug, Default, Deserialize)]
pub struct TexgenManifest {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub atlas: AtlasLayout,
    #[serde(default)]
    pub overlay: OverlayLayout,
}

/// Input and output locations, relative to the manifest directory
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Source tree copied verbatim into `dist` before outputs are written
    pub src: PathBuf,
    /// Directory of `<index>.<ext>` symbol images
    pub symbols: PathBuf,
    /// Reel pattern JSON (3 reels of 8 symbol indices)
    pub pattern: PathBuf,
    /// Bet and prize label JSON
    pub text: PathBuf,
    pub font: PathBuf,
    /// Source reel mesh (SMD text)
    pub reels_smd: PathBuf,
    pub prizes_texture: PathBuf,
    pub bet_texture: PathBuf,
    pub dist: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            src: PathBuf::from("src"),
            symbols: PathBuf::from("symbols"),
            pattern: PathBuf::from("cfg/_pattern.json"),
            text: PathBuf::from("cfg/text.json"),
            font: PathBuf::from("font/Pumpkin/Pumpkin.otf"),
            reels_smd: PathBuf::from("src/bodies/reels.smd"),
            prizes_texture: PathBuf::from("src/textures/mon1.bmp"),
            bet_texture: PathBuf::from("src/textures/mon2.bmp"),
            dist: PathBuf::from("dist"),
        }
    }
}

/// Reel atlas geometry
///
/// Symbols are stacked `size / symbol_size` high inside vertical bands of
/// `band_width` pixels. Only the centre of each band is sampled by the reel
/// mesh, which is why placement is offset by `band_margin`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AtlasLayout {
    /// Atlas side length in pixels (square)
    pub size: u32,
    /// Side length of one symbol cell in pixels
    pub symbol_size: u32,
    pub band_width: u32,
    /// Left margin of a symbol inside its band
    pub band_margin: u32,
    /// Normalized width of the sampled window inside a band
    pub uv_width: f64,
    /// Canvas colour behind the symbols
    pub background: [u8; 3],
    /// Texture name written in place of each reel marker line
    pub texture_name: String,
}

impl Default for AtlasLayout {
    fn default() -> Self {
        Self {
            size: 512,
            symbol_size: 128,
            band_width: 256,
            band_margin: 64,
            uv_width: 0.3965121046966565,
            background: [255, 255, 255],
            texture_name: "reel.bmp".to_string(),
        }
    }
}

impl AtlasLayout {
    /// Number of symbols stacked in one band
    pub fn symbols_per_band(&self) -> u32 {
        self.size / self.symbol_size
    }

    /// Normalized height of one symbol cell
    pub fn uv_height(&self) -> f64 {
        1.0 / self.symbols_per_band() as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol_size == 0 || self.symbol_size > self.size {
            bail!(
                "atlas.symbol_size must be in 1..={} (got {})",
                self.size,
                self.symbol_size
            );
        }
        if self.band_width == 0 {
            bail!("atlas.band_width must be positive");
        }
        if !(0.0..=0.5).contains(&self.uv_width) {
            bail!("atlas.uv_width must be in 0.0..=0.5 (got {})", self.uv_width);
        }
        if self.texture_name.trim().is_empty() {
            bail!("atlas.texture_name must not be empty");
        }
        Ok(())
    }
}

/// Placement of the prize table and bet label on their textures
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayLayout {
    /// Starting font size for the bet label, shrunk until it fits
    pub bet_font_max_size: u32,
    pub bet_max_width: f32,
    /// Baseline centre of the bet label
    pub bet_pos: [i32; 2],
    pub prizes_max_width: u32,
    pub prizes_max_height: u32,
    /// Top-left corner of the first thumbnail
    pub prizes_pos: [i32; 2],
    /// Horizontal centre of the prize labels
    pub prizes_text_pos_x: i32,
    /// Prize font size as a fraction of the thumbnail size
    pub prizes_font_scale: f32,
    pub text_shadow_offset: i32,
    pub thumb_shadow_offset: [i32; 2],
    /// Thumbnail copies drawn per prize row
    pub thumbs_per_row: u32,
}

impl Default for OverlayLayout {
    fn default() -> Self {
        Self {
            bet_font_max_size: 48,
            bet_max_width: 130.0,
            bet_pos: [434, 300],
            prizes_max_width: 170,
            prizes_max_height: 294,
            prizes_pos: [90, 104],
            prizes_text_pos_x: 340,
            prizes_font_scale: 0.65,
            text_shadow_offset: 3,
            thumb_shadow_offset: [-2, 2],
            thumbs_per_row: 3,
        }
    }
}

/// Loaded manifest with its directory, used to resolve relative paths
#[derive(Debug)]
pub struct TexgenConfig {
    pub project_dir: PathBuf,
    pub manifest: TexgenManifest,
}

impl TexgenConfig {
    /// Load config from a manifest file
    ///
    /// A missing manifest yields the default layout rooted at the manifest's
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let project_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if !path.exists() {
            tracing::info!(
                "No manifest at {}, using default layout in {}",
                path.display(),
                project_dir.display()
            );
            return Ok(Self {
                project_dir,
                manifest: TexgenManifest::default(),
            });
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content, project_dir)
    }

    /// Parse config from manifest text
    pub fn parse(content: &str, project_dir: PathBuf) -> Result<Self> {
        let manifest: TexgenManifest =
            toml::from_str(content).context("Failed to parse texgen.toml")?;
        manifest.atlas.validate()?;
        Ok(Self {
            project_dir,
            manifest,
        })
    }

    /// Replace the output directory (CLI override)
    pub fn with_dist(mut self, dist: PathBuf) -> Self {
        self.manifest.paths.dist = dist;
        self
    }

    pub fn atlas(&self) -> &AtlasLayout {
        &self.manifest.atlas
    }

    pub fn overlay(&self) -> &OverlayLayout {
        &self.manifest.overlay
    }

    /// Resolve a manifest path against the project directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.project_dir.join(path)
    }

    pub fn paths(&self) -> &PathsSection {
        &self.manifest.paths
    }
}
