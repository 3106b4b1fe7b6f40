//! Text layout and rasterization for Decal.
//!
//! This crate turns a [`RenderRequest`] into a square RGBA texture and a
//! matching single-channel mask:
//!
//! - [`font`]: font directory scanning, the persisted name catalog and a
//!   memoizing cache of sized fonts
//! - [`TextBackend`]: the shaping and rasterization seam, implemented by
//!   [`CosmicBackend`] on top of cosmic-text
//! - [`LayoutEngine`]: anchor placement, stroke and fill composition
//!
//! Enable the `testing` feature for [`testing::BlockBackend`], a backend
//! with fixed block glyphs that makes pixel positions predictable.

pub mod backend;
mod cosmic;
mod error;
pub mod font;
mod layout;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod types;

pub use backend::{GlyphCoverage, TextBackend, TextBounds, TextStyle};
pub use cosmic::{CosmicBackend, CosmicBackendConfig};
pub use error::{RenderError, RenderResult};
pub use layout::{
    CHECKER_CELL, CHECKER_DARK, CHECKER_LIGHT, LayoutEngine, Placement, RenderedText,
    SAMPLE_PIXEL_SIZE, SAMPLE_SIZE, anchor_origin,
};
pub use types::{
    Anchor, CANVAS_SIZES, Color, HorizontalAlign, MAX_CANVAS_SIZE, MAX_OUTLINE_WIDTH,
    ParseValueError, RenderRequest, VerticalAlign, is_standard_canvas,
};
