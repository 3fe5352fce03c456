//! Prize table and bet label overlays
//!
//! Text goes through [`TextRenderer`] so the layout code does not depend on a
//! particular rasterizer. [`FontRenderer`] is the fontdue-backed implementation
//! used by the build.

use anyhow::{anyhow, bail, Context, Result};
use fontdue::{Font, FontSettings};
use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};
use std::path::Path;

use crate::config::OverlayLayout;
use crate::labels::Label;
use crate::symbols::SymbolSet;

/// Reference point of a text run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Horizontally centred, `y` is the baseline
    MiddleBaseline,
    /// Horizontally centred, `y` is the top of the ascender
    MiddleAscender,
}

/// Text measuring and drawing
pub trait TextRenderer {
    /// Advance width of `text` at `px` pixels
    fn text_width(&self, text: &str, px: f32) -> f32;

    /// Draw `text` onto `img`, blending `color` by glyph coverage
    fn draw_text(
        &self,
        img: &mut RgbaImage,
        pos: (i32, i32),
        anchor: Anchor,
        text: &str,
        px: f32,
        color: Rgba<u8>,
    );
}

/// TrueType/OpenType text renderer
pub struct FontRenderer {
    font: Font,
}

impl FontRenderer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| anyhow!("Failed to parse font: {}", e))?;
        Ok(Self { font })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read font: {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("Invalid font: {}", path.display()))
    }
}

impl TextRenderer for FontRenderer {
    fn text_width(&self, text: &str, px: f32) -> f32 {
        text.chars()
            .map(|c| self.font.metrics(c, px).advance_width)
            .sum()
    }

    fn draw_text(
        &self,
        img: &mut RgbaImage,
        pos: (i32, i32),
        anchor: Anchor,
        text: &str,
        px: f32,
        color: Rgba<u8>,
    ) {
        let ascent = self
            .font
            .horizontal_line_metrics(px)
            .map(|m| m.ascent)
            .unwrap_or(px);
        let baseline = match anchor {
            Anchor::MiddleBaseline => pos.1 as f32,
            Anchor::MiddleAscender => pos.1 as f32 + ascent,
        };

        let mut pen_x = pos.0 as f32 - self.text_width(text, px) / 2.0;
        for c in text.chars() {
            let (metrics, coverage) = self.font.rasterize(c, px);
            // fontdue's ymin is measured upwards from the baseline
            let left = (pen_x + metrics.xmin as f32).round() as i64;
            let top = (baseline - (metrics.ymin + metrics.height as i32) as f32).round() as i64;

            for (i, &cov) in coverage.iter().enumerate() {
                let x = left + (i % metrics.width.max(1)) as i64;
                let y = top + (i / metrics.width.max(1)) as i64;
                blend_pixel(img, x, y, color, cov);
            }
            pen_x += metrics.advance_width;
        }
    }
}

/// Blend `color` into one pixel, scaled by `coverage`; out-of-bounds is a no-op
fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, coverage: u8) {
    if coverage == 0 || x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        return;
    }
    let alpha = (color[3] as u16 * coverage as u16 / 255) as u8;
    let src = Rgba([color[0], color[1], color[2], alpha]);
    img.get_pixel_mut(x as u32, y as u32).blend(&src);
}

/// Paint a solid colour through the alpha channel of `mask`
fn paste_masked(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>, mask: &RgbaImage) {
    for (mx, my, m) in mask.enumerate_pixels() {
        blend_pixel(img, x + mx as i64, y + my as i64, color, m[3]);
    }
}

/// Draw a label with its drop shadow
fn draw_label(
    img: &mut RgbaImage,
    renderer: &dyn TextRenderer,
    pos: (i32, i32),
    anchor: Anchor,
    label: &Label,
    px: f32,
    shadow_offset: i32,
) {
    let shadow_pos = (pos.0 + shadow_offset, pos.1 + shadow_offset);
    renderer.draw_text(img, shadow_pos, anchor, &label.text, px, label.shadow.into());
    renderer.draw_text(img, pos, anchor, &label.text, px, label.color.into());
}

/// Largest font size up to `max_size` at which `text` fits `max_width`
pub fn fit_font_size(
    renderer: &dyn TextRenderer,
    text: &str,
    max_size: u32,
    max_width: f32,
) -> u32 {
    let mut size = max_size.max(1);
    while size > 1 && renderer.text_width(text, size as f32) > max_width {
        size -= 1;
    }
    size
}

/// Draw the bet label, shrinking it to fit
pub fn draw_bet(
    img: &mut RgbaImage,
    label: &Label,
    layout: &OverlayLayout,
    renderer: &dyn TextRenderer,
) {
    let size = fit_font_size(
        renderer,
        &label.text,
        layout.bet_font_max_size,
        layout.bet_max_width,
    );
    tracing::debug!("Bet label {:?} at {}px", label.text, size);

    let pos = (layout.bet_pos[0], layout.bet_pos[1]);
    draw_label(
        img,
        renderer,
        pos,
        Anchor::MiddleBaseline,
        label,
        size as f32,
        layout.text_shadow_offset,
    );
}

/// Side length of one prize thumbnail for `count` symbols
pub fn prize_cell_size(layout: &OverlayLayout, count: usize) -> u32 {
    let rows = u32::try_from(count).unwrap_or(u32::MAX).max(1);
    let per_row = layout.thumbs_per_row.max(1);
    (layout.prizes_max_height / rows).min(layout.prizes_max_width / per_row)
}

/// Draw the prize table: a row of symbol thumbnails and a label per symbol
///
/// Row `i` holds symbol `i`, so sparse indices leave gaps.
pub fn draw_prizes(
    img: &mut RgbaImage,
    symbols: &SymbolSet,
    prizes: &[Label],
    layout: &OverlayLayout,
    renderer: &dyn TextRenderer,
) -> Result<()> {
    if symbols.is_empty() {
        bail!("No symbols to draw in the prize table");
    }

    let s = prize_cell_size(layout, symbols.len());
    if s == 0 {
        bail!(
            "Prize table too small for {} symbols ({}x{} px)",
            symbols.len(),
            layout.prizes_max_width,
            layout.prizes_max_height
        );
    }
    let font_px = (s as f32 * layout.prizes_font_scale).floor();
    let text_offset = (s as f32 * (1.0 - layout.prizes_font_scale)).floor() as i32 / 2;
    let [shadow_dx, shadow_dy] = layout.thumb_shadow_offset;

    for (&index, symbol) in symbols {
        let label = prizes
            .get(index as usize)
            .with_context(|| format!("No prize label for symbol {}", index))?;

        let thumb = imageops::resize(symbol, s, s, FilterType::Lanczos3);
        let y = layout.prizes_pos[1] as i64 + index as i64 * s as i64;

        for col in 0..layout.thumbs_per_row {
            let x = layout.prizes_pos[0] as i64 + col as i64 * s as i64;
            paste_masked(
                img,
                x + shadow_dx as i64,
                y + shadow_dy as i64,
                label.shadow.into(),
                &thumb,
            );
            imageops::overlay(img, &thumb, x, y);
        }

        let text_y = i32::try_from(y).unwrap_or(i32::MAX).saturating_add(text_offset);
        draw_label(
            img,
            renderer,
            (layout.prizes_text_pos_x, text_y),
            Anchor::MiddleAscender,
            label,
            font_px,
            layout.text_shadow_offset,
        );
    }

    tracing::debug!(
        "Prize table: {} symbols, {}px cells, {}px font",
        symbols.len(),
        s,
        font_px
    );
    Ok(())
}
