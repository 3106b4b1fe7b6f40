//! Deterministic text backend for tests.
//!
//! [`BlockBackend`] draws every non-whitespace character as a solid
//! rectangle with metrics derived only from the pixel size, so layout
//! results can be checked against exact pixel offsets on any machine.
//!
//! For pixel size `p` every character advances `p / 2`; its ink box spans
//! `x` in `[p/10, p/2 - p/10)` and `y` in `[p/5, p)` of a line box `p` tall.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use image::GrayImage;

use crate::backend::{
    GlyphCoverage, LineRun, PlacedGlyph, ShapedText, TextBackend, TextStyle, draw_shaped,
    stack_lines,
};
use crate::font::{FontFace, FontLoadError, SizedFont};

/// Block-glyph backend with call counters and an optional draw delay.
#[derive(Debug, Default)]
pub struct BlockBackend {
    draws: AtomicUsize,
    delay: Option<Duration>,
}

impl BlockBackend {
    /// File contents that [`open_font`](TextBackend::open_font) rejects.
    pub const CORRUPT: &'static [u8] = b"corrupt";

    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose draws sleep for `delay`, to simulate slow renders.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            draws: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }

    /// Number of completed draw calls.
    pub fn draw_count(&self) -> usize {
        self.draws.load(Ordering::SeqCst)
    }

    /// Per-character advance for a pixel size.
    pub fn advance(pixel_size: u32) -> i32 {
        (pixel_size as i32 / 2).max(1)
    }

    /// Ink box of a single character drawn at the text origin.
    pub fn glyph_box(pixel_size: u32) -> (i32, i32, u32, u32) {
        let p = pixel_size as i32;
        let gap = p / 10;
        let width = (Self::advance(pixel_size) - 2 * gap).max(1);
        let top = p / 5;
        let height = (p - top).max(1);
        (gap, top, width as u32, height as u32)
    }
}

impl TextBackend for BlockBackend {
    fn open_font(&self, path: &Path, pixel_size: u32) -> Result<FontFace, FontLoadError> {
        if pixel_size == 0 {
            return Err(FontLoadError::InvalidSize(pixel_size));
        }
        let data =
            fs::read(path).map_err(|e| FontLoadError::Io(format!("{}: {e}", path.display())))?;
        if data == Self::CORRUPT {
            return Err(FontLoadError::InvalidFormat(path.display().to_string()));
        }
        Ok(FontFace::File {
            path: path.to_path_buf(),
            data: Arc::new(data),
            index: 0,
        })
    }

    fn shape(&self, font: &SizedFont, text: &str, style: &TextStyle) -> ShapedText {
        let px = font.pixel_size();
        let advance = Self::advance(px);
        let (gx, gy, gw, gh) = Self::glyph_box(px);

        let runs = text
            .split('\n')
            .map(|line| {
                let glyphs = line
                    .chars()
                    .enumerate()
                    .filter(|(_, c)| !c.is_whitespace())
                    .map(|(i, _)| PlacedGlyph {
                        x: i as i32 * advance + gx,
                        y: gy,
                        width: gw,
                        height: gh,
                        coverage: vec![255; (gw * gh) as usize],
                    })
                    .collect();
                LineRun {
                    advance: line.chars().count() as i32 * advance,
                    glyphs,
                }
            })
            .collect();

        stack_lines(runs, style.align, px as i32, style.line_spacing)
    }

    fn draw(
        &self,
        font: &SizedFont,
        text: &str,
        style: &TextStyle,
        origin: (i32, i32),
        stroke_width: u32,
        size: (u32, u32),
    ) -> GlyphCoverage {
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let coverage = draw_shaped(&self.shape(font, text, style), origin, stroke_width, size);
        self.draws.fetch_add(1, Ordering::SeqCst);
        coverage
    }
}

/// Count the pixels of `img` with non-zero coverage.
pub fn inked_pixels(img: &GrayImage) -> usize {
    img.pixels().filter(|p| p.0[0] != 0).count()
}
