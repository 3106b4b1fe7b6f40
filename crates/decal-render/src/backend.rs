//! The text rasterization seam.
//!
//! The layout engine needs three things from a font renderer: open a font
//! file at a pixel size, measure a block of text, and draw it with an
//! optional stroke. [`TextBackend`] expresses that contract. Implementors
//! only have to provide [`shape`](TextBackend::shape), which turns text into
//! positioned glyph coverage bitmaps; measuring, drawing and stroking are
//! derived from it here.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::GrayImage;

use crate::font::{FontFace, FontLoadError, SizedFont};
use crate::types::{HorizontalAlign, MAX_OUTLINE_WIDTH};

/// A pixel rectangle; `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TextBounds {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &TextBounds) -> TextBounds {
        TextBounds {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// The rectangle moved by `(dx, dy)`.
    pub fn offset(&self, dx: i32, dy: i32) -> TextBounds {
        TextBounds::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }
}

/// Block-level styling passed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStyle {
    /// Alignment of each line within the widest line.
    pub align: HorizontalAlign,
    /// Extra pixels added to the line pitch; may be negative.
    pub line_spacing: i32,
}

/// An 8-bit coverage bitmap at a position relative to the text origin.
///
/// The text origin is the top-left corner of the first line box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedGlyph {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Row-major, `width * height` bytes.
    pub coverage: Vec<u8>,
}

impl PlacedGlyph {
    pub fn bounds(&self) -> TextBounds {
        TextBounds::new(
            self.x,
            self.y,
            self.x + self.width as i32,
            self.y + self.height as i32,
        )
    }

    /// The glyph cropped to its non-zero coverage, or `None` without ink.
    ///
    /// Rasterizers pad their bitmaps with empty rows and columns; measuring
    /// the padded box would shift anchored text by that padding.
    pub fn trimmed(self) -> Option<PlacedGlyph> {
        let w = self.width as usize;
        if w == 0 {
            return None;
        }
        let rows: Vec<&[u8]> = self.coverage.chunks_exact(w).collect();
        let inked = |row: &&[u8]| row.iter().any(|&c| c != 0);
        let top = rows.iter().position(inked)?;
        let bottom = rows.iter().rposition(inked)? + 1;
        let left = rows[top..bottom]
            .iter()
            .filter_map(|row| row.iter().position(|&c| c != 0))
            .min()?;
        let right = rows[top..bottom]
            .iter()
            .filter_map(|row| row.iter().rposition(|&c| c != 0))
            .max()?
            + 1;

        if (left, top, right, bottom) == (0, 0, w, rows.len()) {
            return Some(self);
        }
        let coverage = rows[top..bottom]
            .iter()
            .flat_map(|row| &row[left..right])
            .copied()
            .collect();
        Some(PlacedGlyph {
            x: self.x + left as i32,
            y: self.y + top as i32,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
            coverage,
        })
    }
}

/// Glyphs of one line, positioned as if the line started at the origin.
#[derive(Debug, Clone, Default)]
pub struct LineRun {
    /// Horizontal advance of the whole line.
    pub advance: i32,
    pub glyphs: Vec<PlacedGlyph>,
}

/// Result of shaping a block of text.
#[derive(Debug, Clone, Default)]
pub struct ShapedText {
    pub glyphs: Vec<PlacedGlyph>,
    /// Advance box of every line, after alignment.
    pub lines: Vec<TextBounds>,
}

impl ShapedText {
    /// Union of the inked glyph boxes.
    ///
    /// Text without ink (such as a lone space) reports its line boxes
    /// instead, so the result is never a degenerate rectangle at the origin
    /// unless there are no lines at all.
    pub fn bounds(&self) -> TextBounds {
        let inked = self
            .glyphs
            .iter()
            .filter(|g| g.coverage.iter().any(|&c| c != 0))
            .map(PlacedGlyph::bounds)
            .reduce(|a, b| a.union(&b));
        inked
            .or_else(|| self.lines.iter().copied().reduce(|a, b| a.union(&b)))
            .unwrap_or_default()
    }
}

/// Stack shaped lines with a fixed pitch and horizontal alignment.
///
/// Line `i` starts at `y = i * (line_height + line_spacing)`. Lines narrower
/// than the widest one are shifted according to `align`.
pub fn stack_lines(
    runs: Vec<LineRun>,
    align: HorizontalAlign,
    line_height: i32,
    line_spacing: i32,
) -> ShapedText {
    let max_advance = runs.iter().map(|run| run.advance).max().unwrap_or(0);
    let pitch = line_height + line_spacing;
    let mut shaped = ShapedText::default();

    for (i, run) in runs.into_iter().enumerate() {
        let dx = match align {
            HorizontalAlign::Left => 0,
            HorizontalAlign::Center => (max_advance - run.advance) / 2,
            HorizontalAlign::Right => max_advance - run.advance,
        };
        let dy = i as i32 * pitch;
        shaped
            .lines
            .push(TextBounds::new(dx, dy, dx + run.advance, dy + line_height));
        shaped.glyphs.extend(run.glyphs.into_iter().map(|mut glyph| {
            glyph.x += dx;
            glyph.y += dy;
            glyph
        }));
    }
    shaped
}

/// Fill and stroke coverage of drawn text, each canvas-sized.
#[derive(Debug, Clone)]
pub struct GlyphCoverage {
    pub fill: GrayImage,
    /// Present when a non-zero stroke width was requested.
    pub stroke: Option<GrayImage>,
}

/// A font renderer the layout engine can drive.
pub trait TextBackend: Send + Sync {
    /// Open the font file at `path` for rendering at `pixel_size`.
    ///
    /// The default implementation reads the file and validates it as an
    /// OpenType face.
    fn open_font(&self, path: &Path, pixel_size: u32) -> Result<FontFace, FontLoadError> {
        if pixel_size == 0 {
            return Err(FontLoadError::InvalidSize(pixel_size));
        }
        let data =
            fs::read(path).map_err(|e| FontLoadError::Io(format!("{}: {e}", path.display())))?;
        ttf_parser::Face::parse(&data, 0)
            .map_err(|e| FontLoadError::InvalidFormat(format!("{}: {e}", path.display())))?;
        Ok(FontFace::File {
            path: path.to_path_buf(),
            data: Arc::new(data),
            index: 0,
        })
    }

    /// Lay out and rasterize `text` (lines separated by `\n`).
    fn shape(&self, font: &SizedFont, text: &str, style: &TextStyle) -> ShapedText;

    /// Tight bounding box of `text` relative to the text origin.
    fn measure(&self, font: &SizedFont, text: &str, style: &TextStyle) -> TextBounds {
        self.shape(font, text, style).bounds()
    }

    /// Draw `text` with its origin at `origin` on a canvas of `size`
    /// (width, height).
    ///
    /// Fill and stroke come from the same shaping pass, so they are always
    /// aligned.
    fn draw(
        &self,
        font: &SizedFont,
        text: &str,
        style: &TextStyle,
        origin: (i32, i32),
        stroke_width: u32,
        size: (u32, u32),
    ) -> GlyphCoverage {
        draw_shaped(&self.shape(font, text, style), origin, stroke_width, size)
    }
}

/// Rasterize shaped glyphs onto a canvas of `size` (width, height).
///
/// The stroke is computed on a canvas enlarged by the stroke width so ink
/// just outside the visible area still contributes its outline. Stroke
/// widths above [`MAX_OUTLINE_WIDTH`] are capped.
pub fn draw_shaped(
    shaped: &ShapedText,
    origin: (i32, i32),
    stroke_width: u32,
    (width, height): (u32, u32),
) -> GlyphCoverage {
    let margin = stroke_width.min(MAX_OUTLINE_WIDTH);
    let mut fill = GrayImage::new(
        width.saturating_add(2 * margin),
        height.saturating_add(2 * margin),
    );
    for glyph in &shaped.glyphs {
        blit_max(
            &mut fill,
            glyph,
            origin.0.saturating_add(glyph.x).saturating_add(margin as i32),
            origin.1.saturating_add(glyph.y).saturating_add(margin as i32),
        );
    }

    if margin == 0 {
        return GlyphCoverage { fill, stroke: None };
    }

    let stroke = dilate(&fill, margin);
    let crop = |img: &GrayImage| image::imageops::crop_imm(img, margin, margin, width, height).to_image();
    GlyphCoverage {
        fill: crop(&fill),
        stroke: Some(crop(&stroke)),
    }
}

/// Copy glyph coverage into `canvas` at `(x, y)`, keeping the larger value
/// where glyphs overlap. Parts outside the canvas are clipped.
pub fn blit_max(canvas: &mut GrayImage, glyph: &PlacedGlyph, x: i32, y: i32) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let (gw, gh) = (glyph.width as i64, glyph.height as i64);
    let (x, y) = (x as i64, y as i64);

    let col_start = (-x).clamp(0, gw);
    let col_end = (cw - x).clamp(0, gw);
    if col_start >= col_end {
        return;
    }
    let row_start = (-y).clamp(0, gh);
    let row_end = (ch - y).clamp(0, gh);

    let dst: &mut [u8] = canvas;
    for row in row_start..row_end {
        let src_off = (row * gw) as usize;
        let dst_off = ((y + row) * cw + x) as usize;
        let src = &glyph.coverage[src_off + col_start as usize..src_off + col_end as usize];
        let out = &mut dst[dst_off + col_start as usize..dst_off + col_end as usize];
        for (o, &s) in out.iter_mut().zip(src) {
            *o = (*o).max(s);
        }
    }
}

/// Bounding box of the non-zero pixels.
fn ink_extent(img: &GrayImage) -> Option<TextBounds> {
    let mut extent: Option<TextBounds> = None;
    for (y, row) in img.rows().enumerate() {
        let mut first = None;
        let mut last = 0;
        for (x, px) in row.enumerate() {
            if px.0[0] != 0 {
                first.get_or_insert(x);
                last = x;
            }
        }
        if let Some(first) = first {
            let line = TextBounds::new(first as i32, y as i32, last as i32 + 1, y as i32 + 1);
            extent = Some(extent.map_or(line, |e| e.union(&line)));
        }
    }
    extent
}

/// Grow coverage by a disc of `radius` pixels (grayscale dilation).
pub fn dilate(src: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return src.clone();
    }
    let (width, height) = src.dimensions();
    let mut out = GrayImage::new(width, height);
    let Some(ink) = ink_extent(src) else {
        return out;
    };

    let (w, h) = (width as usize, height as usize);
    // Any radius past w + h already covers the whole image.
    let r = (radius as usize).min(w + h);
    let x0 = (ink.left as usize).saturating_sub(r);
    let x1 = (ink.right as usize).saturating_add(r).min(w);
    let mut maxes = vec![0u8; x1 - x0];

    let raw = src.as_raw();
    let dst: &mut [u8] = &mut out;
    for sy in ink.top as usize..ink.bottom as usize {
        let row = &raw[sy * w + x0..sy * w + x1];
        if row.iter().all(|&v| v == 0) {
            continue;
        }
        for dy in 0..=r {
            // Horizontal reach of the disc at this vertical distance.
            let reach = ((r * r - dy * dy) as f64).sqrt().floor() as usize;
            let above = sy.checked_sub(dy);
            let below = (dy > 0).then_some(sy + dy).filter(|&ty| ty < h);
            if above.is_none() && below.is_none() {
                continue;
            }
            sliding_max(row, reach, &mut maxes);
            for ty in above.into_iter().chain(below) {
                let out_row = &mut dst[ty * w + x0..ty * w + x1];
                for (o, &m) in out_row.iter_mut().zip(&maxes) {
                    *o = (*o).max(m);
                }
            }
        }
    }
    out
}

/// `dst[i] = max(src[i - hw ..= i + hw])`, clipped to the slice.
fn sliding_max(src: &[u8], hw: usize, dst: &mut [u8]) {
    let n = src.len();
    let mut window: VecDeque<usize> = VecDeque::new();
    let mut next = 0;
    for i in 0..n {
        let hi = (i + hw).min(n - 1);
        while next <= hi {
            while window.back().is_some_and(|&b| src[b] <= src[next]) {
                window.pop_back();
            }
            window.push_back(next);
            next += 1;
        }
        let lo = i.saturating_sub(hw);
        while window.front().is_some_and(|&f| f < lo) {
            window.pop_front();
        }
        dst[i] = window.front().map_or(0, |&f| src[f]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(x: i32, y: i32, w: u32, h: u32) -> PlacedGlyph {
        PlacedGlyph {
            x,
            y,
            width: w,
            height: h,
            coverage: vec![255; (w * h) as usize],
        }
    }

    #[test]
    fn bounds_union_of_ink() {
        let shaped = ShapedText {
            glyphs: vec![block(5, 10, 10, 20), block(30, 12, 10, 20)],
            lines: vec![TextBounds::new(0, 0, 50, 40)],
        };
        assert_eq!(shaped.bounds(), TextBounds::new(5, 10, 40, 32));
    }

    #[test]
    fn bounds_without_ink_use_line_box() {
        let mut blank = block(0, 0, 4, 4);
        blank.coverage.fill(0);
        let shaped = ShapedText {
            glyphs: vec![blank],
            lines: vec![TextBounds::new(0, 0, 12, 30)],
        };
        assert_eq!(shaped.bounds(), TextBounds::new(0, 0, 12, 30));
        assert_eq!(ShapedText::default().bounds(), TextBounds::default());
    }

    #[test]
    fn stacking_aligns_and_spaces_lines() {
        let runs = vec![
            LineRun {
                advance: 100,
                glyphs: vec![block(0, 0, 10, 10)],
            },
            LineRun {
                advance: 40,
                glyphs: vec![block(0, 0, 10, 10)],
            },
        ];
        let centered = stack_lines(runs.clone(), HorizontalAlign::Center, 30, 4);
        assert_eq!(centered.lines[1], TextBounds::new(30, 34, 70, 64));
        assert_eq!((centered.glyphs[1].x, centered.glyphs[1].y), (30, 34));

        let right = stack_lines(runs.clone(), HorizontalAlign::Right, 30, -10);
        assert_eq!(right.lines[1], TextBounds::new(60, 20, 100, 50));

        let left = stack_lines(runs, HorizontalAlign::Left, 30, 0);
        assert_eq!(left.glyphs[1].x, 0);
    }

    #[test]
    fn blit_clips_at_edges() {
        let mut canvas = GrayImage::new(8, 8);
        blit_max(&mut canvas, &block(0, 0, 4, 4), -2, 6);
        let inked: Vec<(u32, u32)> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| p.0[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(inked, vec![(0, 6), (1, 6), (0, 7), (1, 7)]);

        // Fully outside is a no-op.
        blit_max(&mut canvas, &block(0, 0, 4, 4), 100, -100);
    }

    #[test]
    fn dilation_is_a_disc() {
        let mut img = GrayImage::new(21, 21);
        img.put_pixel(10, 10, image::Luma([200]));
        let out = dilate(&img, 3);

        assert_eq!(out.get_pixel(13, 10).0[0], 200);
        assert_eq!(out.get_pixel(10, 7).0[0], 200);
        assert_eq!(out.get_pixel(12, 12).0[0], 200);
        // sqrt(3^2 + 3^2) > 3
        assert_eq!(out.get_pixel(13, 13).0[0], 0);
        assert_eq!(out.get_pixel(14, 10).0[0], 0);
    }

    #[test]
    fn stroke_covers_fill_and_reaches_past_canvas_edge() {
        let shaped = ShapedText {
            glyphs: vec![block(0, 0, 4, 4)],
            lines: vec![],
        };
        // Glyph sits just left of the canvas; only its stroke is visible.
        let cov = draw_shaped(&shaped, (-6, 2), 3, (16, 16));
        assert!(cov.fill.pixels().all(|p| p.0[0] == 0));
        let stroke = cov.stroke.unwrap();
        assert_eq!(stroke.get_pixel(0, 3).0[0], 255);
        assert_eq!(stroke.get_pixel(1, 3).0[0], 0);

        let cov = draw_shaped(&shaped, (5, 5), 2, (16, 16));
        let stroke = cov.stroke.unwrap();
        for (x, y, p) in cov.fill.enumerate_pixels() {
            if p.0[0] > 0 {
                assert_eq!(stroke.get_pixel(x, y).0[0], 255);
            }
        }
        assert_eq!(stroke.get_pixel(3, 6).0[0], 255);
        assert!(draw_shaped(&shaped, (0, 0), 0, (16, 12)).stroke.is_none());
    }

    #[test]
    fn oversized_stroke_is_capped() {
        let shaped = ShapedText {
            glyphs: vec![block(0, 0, 4, 4)],
            lines: vec![],
        };
        let huge = draw_shaped(&shaped, (i32::MAX, 6), u32::MAX, (16, 16));
        assert_eq!(huge.fill.dimensions(), (16, 16));

        let huge = draw_shaped(&shaped, (6, 6), u32::MAX, (16, 16));
        let capped = draw_shaped(&shaped, (6, 6), MAX_OUTLINE_WIDTH, (16, 16));
        assert_eq!(huge.stroke.unwrap().as_raw(), capped.stroke.unwrap().as_raw());
    }

    #[test]
    fn radius_beyond_image_floods_it() {
        let mut img = GrayImage::new(9, 5);
        img.put_pixel(0, 0, image::Luma([90]));
        let out = dilate(&img, u32::MAX);
        assert!(out.pixels().all(|p| p.0[0] == 90));
    }

    #[test]
    fn trimming_drops_empty_border() {
        #[rustfmt::skip]
        let coverage = vec![
            0, 0, 0, 0, 0,
            0, 0, 7, 0, 0,
            0, 9, 0, 0, 0,
            0, 0, 0, 0, 0,
        ];
        let glyph = PlacedGlyph {
            x: 10,
            y: -3,
            width: 5,
            height: 4,
            coverage,
        };
        let trimmed = glyph.trimmed().unwrap();
        assert_eq!(trimmed.bounds(), TextBounds::new(11, -2, 13, 0));
        assert_eq!(trimmed.coverage, [0, 7, 9, 0]);

        let solid = block(3, 4, 2, 2);
        assert_eq!(solid.clone().trimmed(), Some(solid));

        let mut blank = block(0, 0, 3, 3);
        blank.coverage.fill(0);
        assert_eq!(blank.trimmed(), None);
    }
}
