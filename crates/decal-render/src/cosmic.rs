//! [`TextBackend`] implementation on cosmic-text.
//!
//! Catalog fonts are registered with a private font database the first time
//! they are drawn, so nothing is loaded from the system unless the built-in
//! default face is needed. Glyphs are shaped per line with cosmic-text and
//! rasterized with its swash cache, then cropped to their ink.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cosmic_text::{
    Attrs, Buffer, CacheKey, Family, FontSystem, Metrics, Shaping, Stretch, Style, SwashCache,
    SwashContent, Weight,
};
use decal_core::logging::targets;
use parking_lot::Mutex;

use crate::backend::{LineRun, PlacedGlyph, ShapedText, TextBackend, TextStyle, stack_lines};
use crate::font::{FontFace, SizedFont};

/// Line height used when a face reports no usable vertical metrics.
const FALLBACK_LINE_HEIGHT: f32 = 1.2;

/// Configuration for [`CosmicBackend`].
#[derive(Debug, Clone)]
pub struct CosmicBackendConfig {
    /// Locale string for text shaping (e.g., "en-US").
    pub locale: String,
    /// Family used for the built-in default face, instead of the system
    /// sans-serif.
    pub default_family: Option<String>,
}

impl Default for CosmicBackendConfig {
    fn default() -> Self {
        Self {
            locale: sys_locale::get_locale().unwrap_or_else(|| "en-US".to_string()),
            default_family: None,
        }
    }
}

/// Attributes and vertical metrics of a registered face.
#[derive(Debug, Clone)]
struct FaceInfo {
    /// `None` selects the generic sans-serif family.
    family: Option<String>,
    weight: Weight,
    style: Style,
    stretch: Stretch,
    /// Ascent plus descent, as a fraction of the em size.
    line_height: f32,
}

impl FaceInfo {
    fn attrs(&self) -> Attrs<'_> {
        let family = match &self.family {
            Some(name) => Family::Name(name),
            None => Family::SansSerif,
        };
        Attrs::new()
            .family(family)
            .weight(self.weight)
            .style(self.style)
            .stretch(self.stretch)
    }
}

struct CosmicState {
    font_system: FontSystem,
    swash_cache: SwashCache,
    faces: HashMap<(PathBuf, u32), FaceInfo>,
    builtin: Option<FaceInfo>,
}

/// Text backend using cosmic-text for shaping and swash for rasterization.
pub struct CosmicBackend {
    config: CosmicBackendConfig,
    state: Mutex<CosmicState>,
}

impl CosmicBackend {
    pub fn new() -> Self {
        Self::with_config(CosmicBackendConfig::default())
    }

    pub fn with_config(config: CosmicBackendConfig) -> Self {
        let db = fontdb::Database::new();
        let font_system = FontSystem::new_with_locale_and_db(config.locale.clone(), db);
        Self {
            config,
            state: Mutex::new(CosmicState {
                font_system,
                swash_cache: SwashCache::new(),
                faces: HashMap::new(),
                builtin: None,
            }),
        }
    }

    /// Number of catalog faces registered so far.
    pub fn registered_faces(&self) -> usize {
        self.state.lock().faces.len()
    }
}

impl Default for CosmicBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CosmicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmicBackend")
            .field("config", &self.config)
            .field("registered_faces", &self.registered_faces())
            .finish()
    }
}

/// Ascent plus descent over units-per-em.
fn line_height_ratio(data: &[u8], index: u32) -> Option<f32> {
    let face = ttf_parser::Face::parse(data, index).ok()?;
    let upem = face.units_per_em();
    if upem == 0 {
        return None;
    }
    let extent = face.ascender() as f32 - face.descender() as f32;
    (extent > 0.0).then(|| extent / upem as f32)
}

impl CosmicState {
    fn face_info(&mut self, font: &SizedFont, default_family: Option<&str>) -> FaceInfo {
        match font.face() {
            FontFace::File { path, data, index } => {
                let key = (path.clone(), *index);
                if let Some(info) = self.faces.get(&key) {
                    return info.clone();
                }
                let info = self.register(path, data, *index);
                self.faces.insert(key, info.clone());
                info
            }
            FontFace::Builtin => {
                if let Some(info) = &self.builtin {
                    return info.clone();
                }
                let info = self.load_builtin(default_family);
                self.builtin = Some(info.clone());
                info
            }
        }
    }

    fn register(&mut self, path: &Path, data: &Arc<Vec<u8>>, index: u32) -> FaceInfo {
        let source: Arc<dyn AsRef<[u8]> + Send + Sync> = data.clone();
        let ids = self
            .font_system
            .db_mut()
            .load_font_source(fontdb::Source::Binary(source));

        let db = self.font_system.db();
        let face = ids
            .iter()
            .filter_map(|id| db.face(*id))
            .find(|face| face.index == index)
            .or_else(|| ids.first().and_then(|id| db.face(*id)));

        let line_height = line_height_ratio(data, index).unwrap_or(FALLBACK_LINE_HEIGHT);
        match face {
            Some(face) => {
                tracing::debug!(target: targets::RENDER, path = %path.display(), "registered font face");
                FaceInfo {
                    family: face.families.first().map(|(name, _)| name.clone()),
                    weight: face.weight,
                    style: face.style,
                    stretch: face.stretch,
                    line_height,
                }
            }
            None => {
                tracing::warn!(target: targets::RENDER, path = %path.display(), "font data has no usable face");
                FaceInfo {
                    family: None,
                    weight: Weight::NORMAL,
                    style: Style::Normal,
                    stretch: Stretch::Normal,
                    line_height,
                }
            }
        }
    }

    fn load_builtin(&mut self, default_family: Option<&str>) -> FaceInfo {
        let db = self.font_system.db_mut();
        db.load_system_fonts();
        if let Some(family) = default_family {
            db.set_sans_serif_family(family);
        }

        let query = fontdb::Query {
            families: &[fontdb::Family::SansSerif],
            ..fontdb::Query::default()
        };
        let line_height = db
            .query(&query)
            .and_then(|id| db.with_face_data(id, line_height_ratio).flatten())
            .unwrap_or(FALLBACK_LINE_HEIGHT);

        tracing::debug!(target: targets::RENDER, faces = db.len(), "loaded system fonts for default face");
        FaceInfo {
            family: None,
            weight: Weight::NORMAL,
            style: Style::Normal,
            stretch: Stretch::Normal,
            line_height,
        }
    }

    fn shape_line(&mut self, line: &str, face: &FaceInfo, px: f32, line_height: f32) -> LineRun {
        let mut buffer = Buffer::new(&mut self.font_system, Metrics::new(px, line_height));
        buffer.set_size(&mut self.font_system, None, None);
        buffer.set_text(&mut self.font_system, line, face.attrs(), Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let mut run_line = LineRun::default();
        for run in buffer.layout_runs() {
            run_line.advance = run_line.advance.max(run.line_w.ceil() as i32);
            let baseline = run.line_y.round() as i32;

            for glyph in run.glyphs {
                let (cache_key, x_int, y_int) = CacheKey::new(
                    glyph.font_id,
                    glyph.glyph_id,
                    glyph.font_size,
                    (glyph.x + glyph.x_offset, glyph.y + glyph.y_offset),
                    glyph.cache_key_flags,
                );
                let Some(image) = self
                    .swash_cache
                    .get_image_uncached(&mut self.font_system, cache_key)
                else {
                    continue;
                };
                let placement = image.placement;
                if placement.width == 0 || placement.height == 0 {
                    continue;
                }

                let coverage = match image.content {
                    SwashContent::Mask => image.data,
                    // Average the per-channel coverage.
                    SwashContent::SubpixelMask => image
                        .data
                        .chunks_exact(4)
                        .map(|px| ((px[0] as u16 + px[1] as u16 + px[2] as u16) / 3) as u8)
                        .collect(),
                    SwashContent::Color => image.data.chunks_exact(4).map(|px| px[3]).collect(),
                };

                let glyph = PlacedGlyph {
                    x: x_int + placement.left,
                    y: baseline + y_int - placement.top,
                    width: placement.width,
                    height: placement.height,
                    coverage,
                };
                run_line.glyphs.extend(glyph.trimmed());
            }
        }
        run_line
    }
}

impl TextBackend for CosmicBackend {
    fn shape(&self, font: &SizedFont, text: &str, style: &TextStyle) -> ShapedText {
        let mut state = self.state.lock();
        let face = state.face_info(font, self.config.default_family.as_deref());

        let px = font.pixel_size().max(1) as f32;
        let line_height = (face.line_height * px).round().max(1.0);

        let runs = text
            .split('\n')
            .map(|line| state.shape_line(line, &face, px, line_height))
            .collect();

        stack_lines(runs, style.align, line_height as i32, style.line_spacing)
    }
}
