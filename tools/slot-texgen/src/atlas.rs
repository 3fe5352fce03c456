//! Reel symbol atlas packing
//!
//! Symbols are laid out in vertical bands of `band_width` pixels, each band
//! holding `size / symbol_size` symbols stacked top to bottom. Placement and
//! UV addressing are computed separately: UVs use the mirrored row because
//! the v axis runs bottom-up while image rows run top-down.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::config::AtlasLayout;

/// Normalized texture rectangle of one symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub u_min: f64,
    pub v_min: f64,
    pub u_max: f64,
    pub v_max: f64,
}

impl UvRect {
    pub fn new(u_min: f64, v_min: f64, u_max: f64, v_max: f64) -> Self {
        Self {
            u_min,
            v_min,
            u_max,
            v_max,
        }
    }

    pub fn width(&self) -> f64 {
        self.u_max - self.u_min
    }

    pub fn height(&self) -> f64 {
        self.v_max - self.v_min
    }

    /// Pick the min or max edge on each axis
    pub fn corner(&self, max_u: bool, max_v: bool) -> (f64, f64) {
        (
            if max_u { self.u_max } else { self.u_min },
            if max_v { self.v_max } else { self.v_min },
        )
    }
}

/// Result of atlas packing
pub struct PackedAtlas {
    /// Composited atlas (`size` x `size`)
    pub image: RgbaImage,
    /// UV rectangle per symbol index
    pub uvs: BTreeMap<u32, UvRect>,
}

/// Centre-crop an image to a square of side `min(width, height)`
pub fn crop_square(img: &RgbaImage) -> RgbaImage {
    let (w, h) = img.dimensions();
    let side = w.min(h);
    let (x, y) = ((w - side) / 2, (h - side) / 2);
    imageops::crop_imm(img, x, y, side, side).to_image()
}

/// Square-crop and resample a symbol to `side` x `side`
pub fn symbol_tile(img: &RgbaImage, side: u32) -> RgbaImage {
    imageops::resize(&crop_square(img), side, side, FilterType::Lanczos3)
}

/// Top-left pixel of a symbol's cell in the atlas
pub fn placement(layout: &AtlasLayout, index: u32) -> (i64, i64) {
    let per_band = layout.symbols_per_band() as i64;
    let index = index as i64;
    let x = layout.band_margin as i64 + (index / per_band) * layout.band_width as i64;
    let y = (index % per_band) * layout.symbol_size as i64;
    (x, y)
}

/// UV rectangle sampled for a symbol
pub fn uv_rect(layout: &AtlasLayout, index: u32) -> UvRect {
    let per_band = layout.symbols_per_band() as u64;
    let index = index as u64;
    let size = layout.size as f64;

    let band_x = ((index / per_band) * layout.band_width as u64) as f64;
    let mirrored_row = (per_band - 1) - index % per_band;
    let row_y = (mirrored_row * layout.symbol_size as u64) as f64;

    let u = band_x / size + (0.5 - layout.uv_width) / 2.0;
    let v = row_y / size;
    UvRect::new(u, v, u + layout.uv_width, v + layout.uv_height())
}

/// UV rectangles for a set of symbol indices, without compositing
pub fn uv_table(
    layout: &AtlasLayout,
    indices: impl IntoIterator<Item = u32>,
) -> BTreeMap<u32, UvRect> {
    indices
        .into_iter()
        .map(|index| (index, uv_rect(layout, index)))
        .collect()
}

/// Pack symbols into a fresh atlas and compute their UV rectangles
///
/// Input images are not modified. Cells falling outside the canvas are
/// clipped; range checking of indices is left to pattern validation.
pub fn pack(layout: &AtlasLayout, symbols: &BTreeMap<u32, RgbaImage>) -> PackedAtlas {
    let [r, g, b] = layout.background;
    let mut image = RgbaImage::from_pixel(layout.size, layout.size, Rgba([r, g, b, 255]));

    // Resampling dominates, so tiles are built in parallel and composited in index order
    let tiles: BTreeMap<u32, RgbaImage> = symbols
        .par_iter()
        .map(|(&index, img)| (index, symbol_tile(img, layout.symbol_size)))
        .collect();

    let mut uvs = BTreeMap::new();
    for (&index, tile) in &tiles {
        let (x, y) = placement(layout, index);
        imageops::overlay(&mut image, tile, x, y);

        let uv = uv_rect(layout, index);
        tracing::debug!(
            "Symbol {} at ({}, {}), uv=({:.6}, {:.6})-({:.6}, {:.6})",
            index,
            x,
            y,
            uv.u_min,
            uv.v_min,
            uv.u_max,
            uv.v_max
        );
        uvs.insert(index, uv);
    }

    tracing::info!(
        "Packed {} symbols into {}x{} atlas",
        uvs.len(),
        layout.size,
        layout.size
    );

    PackedAtlas { image, uvs }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    fn symbol_set(count: u32) -> BTreeMap<u32, RgbaImage> {
        (0..count)
            .map(|i| (i, solid(32, 32, [i as u8 * 20, 0, 0, 255])))
            .collect()
    }

    #[test]
    fn test_one_uv_per_symbol_within_unit_square() {
        let layout = AtlasLayout::default();
        let packed = pack(&layout, &symbol_set(8));

        assert_eq!(packed.uvs.len(), 8);
        for uv in packed.uvs.values() {
            for c in [uv.u_min, uv.v_min, uv.u_max, uv.v_max] {
                assert!((0.0..=1.0).contains(&c), "{:?} outside unit square", uv);
            }
            assert!((uv.width() - layout.uv_width).abs() < EPSILON);
            assert!((uv.height() - 0.25).abs() < EPSILON);
        }
    }

    #[test]
    fn test_rows_are_mirrored_within_band() {
        let layout = AtlasLayout::default();
        for band in 0..2 {
            let vs: Vec<f64> = (0..4).map(|row| uv_rect(&layout, band * 4 + row).v_min).collect();
            assert!(vs.windows(2).all(|w| w[0] > w[1]), "band {band}: {vs:?}");
        }
    }

    #[test]
    fn test_reference_uv_values() {
        let layout = AtlasLayout::default();
        let margin = (0.5 - layout.uv_width) / 2.0;

        let uv = uv_rect(&layout, 0);
        assert!((uv.u_min - margin).abs() < EPSILON);
        assert!((uv.v_min - 0.75).abs() < EPSILON);
        assert!((uv.v_max - 1.0).abs() < EPSILON);

        let uv = uv_rect(&layout, 5);
        assert!((uv.u_min - (0.5 + margin)).abs() < EPSILON);
        assert!((uv.v_min - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_placement_offsets() {
        let layout = AtlasLayout::default();
        assert_eq!(placement(&layout, 0), (64, 0));
        assert_eq!(placement(&layout, 3), (64, 384));
        assert_eq!(placement(&layout, 4), (320, 0));
        assert_eq!(placement(&layout, 6), (320, 256));
    }

    #[test]
    fn test_symbols_painted_at_cells() {
        let layout = AtlasLayout::default();
        let mut symbols = BTreeMap::new();
        symbols.insert(1, solid(200, 100, [0, 0, 255, 255]));
        symbols.insert(4, solid(64, 64, [0, 255, 0, 255]));
        let packed = pack(&layout, &symbols);

        assert_eq!(packed.image.dimensions(), (512, 512));
        // Symbol 1: band 0, second cell
        assert_eq!(packed.image.get_pixel(64 + 64, 128 + 64).0, [0, 0, 255, 255]);
        // Symbol 4: band 1, first cell
        assert_eq!(packed.image.get_pixel(320 + 64, 64).0, [0, 255, 0, 255]);
        // Band margin stays background
        assert_eq!(packed.image.get_pixel(10, 10).0, [255, 255, 255, 255]);
        assert_eq!(packed.image.get_pixel(300, 200).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_transparent_symbol_keeps_background() {
        let layout = AtlasLayout {
            background: [255, 0, 255],
            ..AtlasLayout::default()
        };
        let mut symbols = BTreeMap::new();
        symbols.insert(0, solid(16, 16, [255, 0, 0, 0]));
        let packed = pack(&layout, &symbols);
        assert_eq!(packed.image.get_pixel(100, 50).0, [255, 0, 255, 255]);
    }

    #[test]
    fn test_out_of_canvas_index_is_clipped() {
        let layout = AtlasLayout::default();
        let mut symbols = BTreeMap::new();
        symbols.insert(40, solid(16, 16, [0, 0, 0, 255]));
        let packed = pack(&layout, &symbols);
        assert_eq!(packed.uvs.len(), 1);
        assert!(packed.image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_crop_square_takes_centre() {
        let mut img = solid(30, 10, [0, 0, 0, 255]);
        for y in 0..10 {
            for x in 10..20 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let cropped = crop_square(&img);
        assert_eq!(cropped.dimensions(), (10, 10));
        assert!(cropped.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_pack_is_deterministic() {
        let layout = AtlasLayout::default();
        let symbols = symbol_set(6);
        let a = pack(&layout, &symbols);
        let b = pack(&layout, &symbols);
        assert_eq!(a.image.as_raw(), b.image.as_raw());
        assert_eq!(a.uvs, b.uvs);
    }

    #[test]
    fn test_uv_table_matches_pack() {
        let layout = AtlasLayout::default();
        let symbols = symbol_set(5);
        let packed = pack(&layout, &symbols);
        assert_eq!(uv_table(&layout, symbols.keys().copied()), packed.uvs);
    }
}
