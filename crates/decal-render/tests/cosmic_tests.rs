//! Rendering through cosmic-text with a real font file.
//!
//! `tests/fonts/FiraMono-Medium.ttf` is distributed under the SIL Open Font
//! License; see `tests/fonts/FiraMono-LICENSE`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use decal_render::font::{FontCatalog, FontEntry, FontLibrary, FontObjectCache};
use decal_render::{Anchor, CosmicBackend, LayoutEngine, RenderRequest, TextBounds};
use image::GrayImage;

const FONT: &str = "Fira Mono";

fn font_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fonts/FiraMono-Medium.ttf")
}

fn engine() -> (LayoutEngine, Arc<CosmicBackend>) {
    let library = Arc::new(FontLibrary::from_catalog(FontCatalog::from_entries([
        FontEntry {
            name: FONT.to_string(),
            path: font_path(),
        },
    ])));
    let backend = Arc::new(CosmicBackend::new());
    let fonts = FontObjectCache::new(library, backend.clone());
    (LayoutEngine::new(Arc::new(fonts)), backend)
}

/// Bounding box of the non-zero mask pixels.
fn ink_box(mask: &GrayImage) -> Option<TextBounds> {
    mask.enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] != 0)
        .map(|(x, y, _)| TextBounds::new(x as i32, y as i32, x as i32 + 1, y as i32 + 1))
        .reduce(|a, b| a.union(&b))
}

#[test]
fn catalog_font_is_used() {
    let (engine, backend) = engine();
    let rendered = engine
        .render(&RenderRequest::new("EXIT").with_font(FONT, 64).with_canvas_size(256))
        .unwrap();

    assert!(!rendered.used_fallback_font);
    assert_eq!(backend.registered_faces(), 1);
    assert!(ink_box(&rendered.mask).is_some());
}

#[test]
fn anchored_ink_starts_exactly_at_padding() {
    let (engine, _) = engine();
    let request = RenderRequest::new("EXIT")
        .with_font(FONT, 64)
        .with_canvas_size(256)
        .with_padding(20);

    let top_left = engine.render(&request.clone().with_anchor(Anchor::TopLeft)).unwrap();
    let ink = ink_box(&top_left.mask).unwrap();
    assert_eq!((ink.left, ink.top), (20, 20));
    assert_eq!(top_left.placement.canvas_bounds(), ink);

    let bottom_right = engine.render(&request.with_anchor(Anchor::BottomRight)).unwrap();
    let ink = ink_box(&bottom_right.mask).unwrap();
    assert_eq!((ink.right, ink.bottom), (236, 236));
    assert_eq!(bottom_right.placement.canvas_bounds(), ink);
}

#[test]
fn digits_render_distinct_glyphs() {
    let (engine, _) = engine();
    let masks: Vec<GrayImage> = (0..=9)
        .map(|digit| {
            let request = RenderRequest::new(digit.to_string())
                .with_font(FONT, 100)
                .with_canvas_size(128)
                .with_padding(0);
            engine.render_mask(&request).unwrap()
        })
        .collect();

    for (digit, mask) in masks.iter().enumerate() {
        assert!(ink_box(mask).is_some(), "digit {digit} has no ink");
    }
    for a in 0..masks.len() {
        for b in a + 1..masks.len() {
            assert_ne!(masks[a].as_raw(), masks[b].as_raw(), "digits {a} and {b}");
        }
    }
}

#[test]
fn outlined_stroke_surrounds_fill() {
    let (engine, _) = engine();
    let request = RenderRequest::new("A").with_font(FONT, 80).with_canvas_size(128);
    let plain = engine.render_mask(&request).unwrap();
    let outlined = engine
        .render_mask(&request.with_outline(3, decal_render::Color::BLACK))
        .unwrap();

    let (plain_ink, outlined_ink) = (ink_box(&plain).unwrap(), ink_box(&outlined).unwrap());
    assert_eq!(outlined_ink.left, plain_ink.left - 3);
    assert_eq!(outlined_ink.right, plain_ink.right + 3);
}
