//! Texture output formats
//!
//! Every generated texture is written twice: an 8-bit palettised BMP for the
//! game engine and a true-colour PNG for previews.

use anyhow::{Context, Result};
use color_quant::NeuQuant;
use image::codecs::bmp::BmpEncoder;
use image::{ExtendedColorType, ImageFormat, RgbImage, RgbaImage};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Maximum palette entries in an indexed BMP
pub const PALETTE_SIZE: usize = 256;

/// NeuQuant sampling factor (1 = best quality, 30 = fastest)
const NEUQUANT_SAMPLE_FACTOR: i32 = 10;

/// Palette-indexed image
pub struct IndexedImage {
    pub width: u32,
    pub height: u32,
    /// One palette index per pixel, row-major
    pub indices: Vec<u8>,
    pub palette: Vec<[u8; 3]>,
}

/// Reduce an image to at most 256 colours, ignoring alpha
///
/// Images that already fit use their exact colours (sorted, so output is
/// stable); larger ones go through NeuQuant.
pub fn quantize(img: &RgbaImage) -> IndexedImage {
    let (width, height) = img.dimensions();

    let mut exact: BTreeMap<[u8; 3], u8> = BTreeMap::new();
    for p in img.pixels() {
        exact.insert([p[0], p[1], p[2]], 0);
        if exact.len() > PALETTE_SIZE {
            break;
        }
    }

    if exact.len() <= PALETTE_SIZE {
        for (i, slot) in exact.values_mut().enumerate() {
            *slot = i as u8;
        }
        let indices = img.pixels().map(|p| exact[&[p[0], p[1], p[2]]]).collect();
        let palette = exact.into_keys().collect();
        return IndexedImage {
            width,
            height,
            indices,
            palette,
        };
    }

    let opaque: Vec<u8> = img
        .pixels()
        .flat_map(|p| [p[0], p[1], p[2], 255])
        .collect();
    let quant = NeuQuant::new(NEUQUANT_SAMPLE_FACTOR, PALETTE_SIZE, &opaque);
    let indices = opaque
        .chunks_exact(4)
        .map(|px| quant.index_of(px) as u8)
        .collect();
    let palette = quant
        .color_map_rgb()
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect();

    IndexedImage {
        width,
        height,
        indices,
        palette,
    }
}

/// Write an 8-bit palettised BMP
pub fn write_indexed_bmp<W: Write>(w: &mut W, img: &IndexedImage) -> Result<()> {
    let mut encoder = BmpEncoder::new(w);
    encoder
        .encode_with_palette(
            &img.indices,
            img.width,
            img.height,
            ExtendedColorType::L8,
            Some(img.palette.as_slice()),
        )
        .context("Failed to encode indexed BMP")?;
    Ok(())
}

/// Save `<base>.bmp` (indexed) and `<base>.png` (RGB)
///
/// Returns the two written paths.
pub fn save_texture(img: &RgbaImage, base: &Path) -> Result<(PathBuf, PathBuf)> {
    let bmp_path = with_suffix(base, "bmp");
    let png_path = with_suffix(base, "png");

    let file = File::create(&bmp_path)
        .with_context(|| format!("Failed to create output: {}", bmp_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_indexed_bmp(&mut writer, &quantize(img))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write: {}", bmp_path.display()))?;

    let rgb: RgbImage = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();
    rgb.save_with_format(&png_path, ImageFormat::Png)
        .with_context(|| format!("Failed to write: {}", png_path.display()))?;

    tracing::info!(
        "Saved {}x{} texture: {}, {}",
        img.width(),
        img.height(),
        bmp_path.display(),
        png_path.display()
    );
    Ok((bmp_path, png_path))
}

/// Append an extension without replacing an existing one
fn with_suffix(base: &Path, ext: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
