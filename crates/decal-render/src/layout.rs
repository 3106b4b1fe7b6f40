//! Text placement and rasterization.
//!
//! [`LayoutEngine`] turns a [`RenderRequest`] into a color image and an
//! alpha mask. Placement works on the tight ink box of the text: the box is
//! measured at the origin, then the origin is shifted so the box lands at
//! the requested anchor, `padding` pixels from the anchored edges.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use decal_render::{Anchor, CosmicBackend, LayoutEngine, RenderRequest};
//! use decal_render::font::{FontLibrary, FontLibraryConfig, FontObjectCache};
//!
//! let library = Arc::new(FontLibrary::new(FontLibraryConfig::default()));
//! library.load_or_scan();
//! let fonts = Arc::new(FontObjectCache::new(library, Arc::new(CosmicBackend::new())));
//! let engine = LayoutEngine::new(fonts);
//!
//! let request = RenderRequest::new("EXIT").with_anchor(Anchor::TopLeft);
//! let rendered = engine.render(&request)?;
//! rendered.color.save("exit_color.png").unwrap();
//! # Ok::<(), decal_render::RenderError>(())
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use decal_core::logging::{elapsed_ms, targets};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use parking_lot::Mutex;

use crate::backend::{GlyphCoverage, TextBackend, TextBounds, TextStyle};
use crate::error::{RenderError, RenderResult};
use crate::font::{FontObjectCache, SizedFont};
use crate::types::{Color, HorizontalAlign, MAX_CANVAS_SIZE, RenderRequest, VerticalAlign};

/// Checkerboard base color.
pub const CHECKER_DARK: Color = Color::rgb(0x2b, 0x2b, 0x2b);
/// Checkerboard square color.
pub const CHECKER_LIGHT: Color = Color::rgb(0x38, 0x38, 0x38);
/// Checkerboard square edge length in pixels.
pub const CHECKER_CELL: u32 = 20;

/// Font sample thumbnail dimensions.
pub const SAMPLE_SIZE: (u32, u32) = (300, 40);
/// Pixel size of font sample text.
pub const SAMPLE_PIXEL_SIZE: u32 = 24;
/// Origin of font sample text.
pub const SAMPLE_ORIGIN: (i32, i32) = (5, 5);

/// Where the text origin goes so that `bounds` sits at `anchor`.
///
/// `bounds` is the ink box measured with the origin at `(0, 0)`. Centering
/// rounds toward negative infinity.
pub fn anchor_origin(
    bounds: &TextBounds,
    canvas_size: u32,
    horizontal: HorizontalAlign,
    vertical: VerticalAlign,
    padding: i32,
) -> (i32, i32) {
    let canvas = canvas_size as i32;
    let (w, h) = (bounds.width(), bounds.height());

    let x = match horizontal {
        HorizontalAlign::Left => padding - bounds.left,
        HorizontalAlign::Right => canvas - w - bounds.left - padding,
        HorizontalAlign::Center => (canvas - w).div_euclid(2) - bounds.left,
    };
    let y = match vertical {
        VerticalAlign::Top => padding - bounds.top,
        VerticalAlign::Bottom => canvas - h - bounds.top - padding,
        VerticalAlign::Middle => (canvas - h).div_euclid(2) - bounds.top,
    };
    (x, y)
}

/// Measured ink box and the chosen text origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Ink box relative to the text origin.
    pub bounds: TextBounds,
    /// Text origin on the canvas.
    pub origin: (i32, i32),
}

impl Placement {
    /// Ink box in canvas coordinates.
    pub fn canvas_bounds(&self) -> TextBounds {
        self.bounds.offset(self.origin.0, self.origin.1)
    }
}

/// Both outputs of one draw.
#[derive(Debug, Clone)]
pub struct RenderedText {
    /// RGBA image on a transparent background.
    pub color: RgbaImage,
    /// Glyph and stroke coverage, white on black.
    pub mask: GrayImage,
    pub placement: Placement,
    /// Whether the default face stood in for the requested font.
    pub used_fallback_font: bool,
}

/// Lays out and rasterizes render requests.
///
/// Holds the font cache and a few derived images (preview checkerboards,
/// font picker samples) that are expensive to rebuild.
pub struct LayoutEngine {
    fonts: Arc<FontObjectCache>,
    checkerboards: Mutex<HashMap<u32, RgbaImage>>,
    /// Samples keyed by name, tagged with the catalog generation they were
    /// drawn from.
    samples: Mutex<(u64, HashMap<String, Option<RgbaImage>>)>,
}

impl LayoutEngine {
    pub fn new(fonts: Arc<FontObjectCache>) -> Self {
        Self {
            fonts,
            checkerboards: Mutex::new(HashMap::new()),
            samples: Mutex::new((0, HashMap::new())),
        }
    }

    pub fn fonts(&self) -> &Arc<FontObjectCache> {
        &self.fonts
    }

    pub fn backend(&self) -> &Arc<dyn TextBackend> {
        self.fonts.backend()
    }

    /// The font a request renders with, possibly the default face.
    pub fn resolve_font(&self, request: &RenderRequest) -> SizedFont {
        self.fonts.get(&request.font_name, request.font_size)
    }

    fn style(request: &RenderRequest) -> TextStyle {
        TextStyle {
            align: request.alignment,
            line_spacing: request.line_spacing,
        }
    }

    /// Measure the text and anchor it on the canvas.
    pub fn placement(&self, request: &RenderRequest, font: &SizedFont) -> Placement {
        let bounds =
            self.backend()
                .measure(font, request.effective_text(), &Self::style(request));
        let origin = anchor_origin(
            &bounds,
            request.canvas_size,
            request.anchor.horizontal(),
            request.anchor.vertical(),
            request.padding,
        );
        Placement { bounds, origin }
    }

    fn draw(&self, request: &RenderRequest) -> RenderResult<(GlyphCoverage, Placement, SizedFont)> {
        let size = request.canvas_size;
        if size == 0 || size > MAX_CANVAS_SIZE {
            return Err(RenderError::InvalidDimensions {
                width: size,
                height: size,
            });
        }

        let start = Instant::now();
        let font = self.resolve_font(request);
        let placement = self.placement(request, &font);
        let coverage = self.backend().draw(
            &font,
            request.effective_text(),
            &Self::style(request),
            placement.origin,
            request.stroke_width(),
            (size, size),
        );

        tracing::debug!(
            target: targets::RENDER,
            font = %request.font_name,
            font_size = request.font_size,
            canvas = size,
            x = placement.origin.0,
            y = placement.origin.1,
            elapsed_ms = elapsed_ms(start),
            "text drawn"
        );
        Ok((coverage, placement, font))
    }

    /// Render the color image and mask from a single draw.
    pub fn render(&self, request: &RenderRequest) -> RenderResult<RenderedText> {
        let (coverage, placement, font) = self.draw(request)?;
        Ok(RenderedText {
            color: colorize(&coverage, request.text_color, request.outline_color),
            mask: mask(&coverage),
            placement,
            used_fallback_font: font.is_fallback(),
        })
    }

    /// Render the color pass: stroke in the outline color under fill in the
    /// text color, on a transparent canvas.
    pub fn render_color(&self, request: &RenderRequest) -> RenderResult<RgbaImage> {
        let (coverage, _, _) = self.draw(request)?;
        Ok(colorize(&coverage, request.text_color, request.outline_color))
    }

    /// Render the mask pass: full intensity wherever fill or stroke covers.
    pub fn render_mask(&self, request: &RenderRequest) -> RenderResult<GrayImage> {
        let (coverage, _, _) = self.draw(request)?;
        Ok(mask(&coverage))
    }

    /// Dark checkerboard used behind previews, cached per size.
    pub fn checkerboard(&self, size: u32) -> RgbaImage {
        self.checkerboards
            .lock()
            .entry(size)
            .or_insert_with(|| {
                let (dark, light) = (CHECKER_DARK.to_rgba(), CHECKER_LIGHT.to_rgba());
                RgbaImage::from_fn(size, size, |x, y| {
                    if (x / CHECKER_CELL + y / CHECKER_CELL) % 2 == 0 {
                        light
                    } else {
                        dark
                    }
                })
            })
            .clone()
    }

    /// Thumbnail of a font's name drawn in that font, for font pickers.
    ///
    /// `None` when the font cannot be loaded. Results, including failures,
    /// are cached per name until a new catalog is published.
    pub fn font_sample(&self, name: &str) -> Option<RgbaImage> {
        let generation = self.fonts.library().generation();
        {
            let mut samples = self.samples.lock();
            if samples.0 != generation {
                *samples = (generation, HashMap::new());
            }
            if let Some(sample) = samples.1.get(name) {
                return sample.clone();
            }
        }

        let sample = match self.fonts.try_get(name, SAMPLE_PIXEL_SIZE) {
            Ok(font) => {
                let style = TextStyle {
                    align: HorizontalAlign::Left,
                    line_spacing: 0,
                };
                let coverage = self
                    .backend()
                    .draw(&font, name, &style, SAMPLE_ORIGIN, 0, SAMPLE_SIZE);
                Some(colorize(&coverage, Color::WHITE, Color::TRANSPARENT))
            }
            Err(e) => {
                tracing::debug!(target: targets::FONT, font = name, error = %e, "no sample for font");
                None
            }
        };

        let mut samples = self.samples.lock();
        if samples.0 == generation {
            samples.1.insert(name.to_string(), sample.clone());
        }
        sample
    }
}

impl std::fmt::Debug for LayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEngine")
            .field("fonts", &self.fonts)
            .field("checkerboards", &self.checkerboards.lock().len())
            .field("samples", &self.samples.lock().1.len())
            .finish()
    }
}

/// Source-over blend of `color` at `coverage` onto `dst` (straight alpha).
fn blend_over(dst: &mut Rgba<u8>, color: Color, coverage: u8) {
    let sa = (color.a as f32 / 255.0) * (coverage as f32 / 255.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mix = |s: u8, d: u8| ((s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a).round() as u8;
    *dst = Rgba([
        mix(color.r, dst.0[0]),
        mix(color.g, dst.0[1]),
        mix(color.b, dst.0[2]),
        (out_a * 255.0).round() as u8,
    ]);
}

fn colorize(coverage: &GlyphCoverage, text: Color, outline: Color) -> RgbaImage {
    let (width, height) = coverage.fill.dimensions();
    let mut out = RgbaImage::new(width, height);

    if let Some(stroke) = &coverage.stroke {
        for (px, &s) in out.pixels_mut().zip(stroke.as_raw()) {
            if s > 0 {
                blend_over(px, outline, s);
            }
        }
    }
    for (px, &f) in out.pixels_mut().zip(coverage.fill.as_raw()) {
        if f > 0 {
            blend_over(px, text, f);
        }
    }
    out
}

fn mask(coverage: &GlyphCoverage) -> GrayImage {
    let mut out = coverage.fill.clone();
    if let Some(stroke) = &coverage.stroke {
        for (px, &s) in out.pixels_mut().zip(stroke.as_raw()) {
            *px = Luma([px.0[0].max(s)]);
        }
    }
    out
}
