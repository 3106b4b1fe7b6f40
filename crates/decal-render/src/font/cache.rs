//! Memoized sized font handles.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use decal_core::logging::targets;
use parking_lot::{Mutex, MutexGuard};

use super::library::FontLibrary;
use crate::backend::TextBackend;

/// Default bound on memoized fonts before the cache is wiped.
pub const DEFAULT_FONT_CACHE_CAPACITY: usize = 50;

/// Error type for font loading operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FontLoadError {
    /// An I/O error occurred while loading the font.
    #[error("I/O error: {0}")]
    Io(String),
    /// The font file format is invalid or unsupported.
    #[error("Invalid font format: {0}")]
    InvalidFormat(String),
    /// The name is not in the catalog.
    #[error("Unknown font: {0}")]
    UnknownFont(String),
    /// A zero pixel size was requested.
    #[error("Invalid font size: {0}")]
    InvalidSize(u32),
}

/// Font data backing a [`SizedFont`].
#[derive(Clone)]
pub enum FontFace {
    /// A face read from a font file.
    File {
        path: PathBuf,
        data: Arc<Vec<u8>>,
        /// Face index within a collection.
        index: u32,
    },
    /// The backend's generic default face.
    Builtin,
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File { path, data, index } => f
                .debug_struct("File")
                .field("path", path)
                .field("bytes", &data.len())
                .field("index", index)
                .finish(),
            Self::Builtin => f.write_str("Builtin"),
        }
    }
}

/// A font bound to a pixel size.
#[derive(Debug, Clone)]
pub struct SizedFont {
    name: Arc<str>,
    pixel_size: u32,
    face: FontFace,
}

impl SizedFont {
    pub fn new(name: impl Into<Arc<str>>, pixel_size: u32, face: FontFace) -> Self {
        Self {
            name: name.into(),
            pixel_size,
            face,
        }
    }

    /// The default face standing in for `name`.
    pub fn builtin(name: impl Into<Arc<str>>, pixel_size: u32) -> Self {
        Self::new(name, pixel_size, FontFace::Builtin)
    }

    /// The requested catalog name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn pixel_size(&self) -> u32 {
        self.pixel_size
    }

    #[inline]
    pub fn face(&self) -> &FontFace {
        &self.face
    }

    /// Whether this handle is the default face substituted for a font that
    /// could not be loaded.
    pub fn is_fallback(&self) -> bool {
        matches!(self.face, FontFace::Builtin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FontKey {
    name: String,
    pixel_size: u32,
}

/// Fonts opened from one published catalog.
#[derive(Default)]
struct Entries {
    generation: u64,
    fonts: HashMap<FontKey, SizedFont>,
}

/// Memoizes fonts by `(name, pixel size)`.
///
/// Names are resolved through the [`FontLibrary`]'s published catalog and
/// opened by the [`TextBackend`]. Once more than `capacity` fonts are held,
/// the next insertion clears the whole cache first. Publishing a new
/// catalog also empties the cache, since a name may now map to another file.
pub struct FontObjectCache {
    library: Arc<FontLibrary>,
    backend: Arc<dyn TextBackend>,
    entries: Mutex<Entries>,
    capacity: usize,
}

impl FontObjectCache {
    pub fn new(library: Arc<FontLibrary>, backend: Arc<dyn TextBackend>) -> Self {
        Self::with_capacity(library, backend, DEFAULT_FONT_CACHE_CAPACITY)
    }

    pub fn with_capacity(
        library: Arc<FontLibrary>,
        backend: Arc<dyn TextBackend>,
        capacity: usize,
    ) -> Self {
        Self {
            library,
            backend,
            entries: Mutex::new(Entries::default()),
            capacity,
        }
    }

    pub fn library(&self) -> &Arc<FontLibrary> {
        &self.library
    }

    pub fn backend(&self) -> &Arc<dyn TextBackend> {
        &self.backend
    }

    /// Entries for the currently published catalog.
    fn entries(&self) -> MutexGuard<'_, Entries> {
        let generation = self.library.generation();
        let mut entries = self.entries.lock();
        if entries.generation != generation {
            if !entries.fonts.is_empty() {
                tracing::debug!(
                    target: targets::FONT,
                    evicted = entries.fonts.len(),
                    "font catalog changed, font cache cleared"
                );
            }
            entries.fonts.clear();
            entries.generation = generation;
        }
        entries
    }

    /// The font for `(name, pixel_size)`, or the default face if it cannot
    /// be loaded. Fallbacks are not memoized.
    pub fn get(&self, name: &str, pixel_size: u32) -> SizedFont {
        match self.try_get(name, pixel_size) {
            Ok(font) => font,
            Err(e) => {
                tracing::warn!(
                    target: targets::FONT,
                    font = name,
                    size = pixel_size,
                    error = %e,
                    "using default font"
                );
                SizedFont::builtin(name, pixel_size)
            }
        }
    }

    /// The font for `(name, pixel_size)`, loading and memoizing it on a miss.
    pub fn try_get(&self, name: &str, pixel_size: u32) -> Result<SizedFont, FontLoadError> {
        let key = FontKey {
            name: name.to_string(),
            pixel_size,
        };
        let generation = {
            let entries = self.entries();
            if let Some(font) = entries.fonts.get(&key) {
                return Ok(font.clone());
            }
            entries.generation
        };

        let path = self
            .library
            .lookup(name)
            .ok_or_else(|| FontLoadError::UnknownFont(name.to_string()))?;
        let face = self.backend.open_font(&path, pixel_size)?;
        let font = SizedFont::new(name, pixel_size, face);

        let mut entries = self.entries();
        // Opened from a catalog that has since been replaced.
        if entries.generation != generation {
            return Ok(font);
        }
        if entries.fonts.len() > self.capacity {
            tracing::debug!(
                target: targets::FONT,
                evicted = entries.fonts.len(),
                "font cache cleared"
            );
            entries.fonts.clear();
        }
        entries.fonts.insert(key, font.clone());
        Ok(font)
    }

    pub fn contains(&self, name: &str, pixel_size: u32) -> bool {
        self.entries().fonts.contains_key(&FontKey {
            name: name.to_string(),
            pixel_size,
        })
    }

    pub fn len(&self) -> usize {
        self.entries().fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().fonts.is_empty()
    }

    pub fn clear(&self) {
        self.entries().fonts.clear();
    }
}

impl std::fmt::Debug for FontObjectCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontObjectCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FontCatalog, FontEntry};
    use crate::testing::BlockBackend;
    use std::fs;
    use tempfile::TempDir;

    fn cache_with_fonts(dir: &TempDir, names: &[&str]) -> FontObjectCache {
        let entries = names.iter().map(|name| {
            let path = dir.path().join(format!("{name}.ttf"));
            fs::write(&path, b"block font").unwrap();
            FontEntry {
                name: name.to_string(),
                path,
            }
        });
        let library = Arc::new(FontLibrary::from_catalog(FontCatalog::from_entries(entries)));
        FontObjectCache::new(library, Arc::new(BlockBackend::new()))
    }

    #[test]
    fn memoizes_by_name_and_size() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_fonts(&dir, &["Arial"]);

        let a = cache.get("Arial", 20);
        assert!(!a.is_fallback());
        assert_eq!(a.pixel_size(), 20);
        assert_eq!(cache.len(), 1);

        cache.get("Arial", 20);
        assert_eq!(cache.len(), 1);

        // Different size is a separate entry.
        cache.get("Arial", 21);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("Arial", 21));
    }

    #[test]
    fn unknown_or_broken_fonts_fall_back_uncached() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_fonts(&dir, &["Broken"]);
        fs::write(dir.path().join("Broken.ttf"), BlockBackend::CORRUPT).unwrap();

        let missing = cache.get("Nope", 12);
        assert!(missing.is_fallback());
        assert_eq!(missing.name(), "Nope");

        assert!(matches!(
            cache.try_get("Broken", 12),
            Err(FontLoadError::InvalidFormat(_))
        ));
        assert!(cache.get("Broken", 12).is_fallback());
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_fonts(&dir, &["Gone"]);
        fs::remove_file(dir.path().join("Gone.ttf")).unwrap();

        assert!(matches!(cache.try_get("Gone", 10), Err(FontLoadError::Io(_))));
        assert!(cache.get("Gone", 10).is_fallback());
    }

    #[test]
    fn clears_everything_when_over_capacity() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_fonts(&dir, &["Arial"]);

        for size in 1..=51 {
            cache.get("Arial", size);
        }
        // 51 entries: the insert that found 50 did not clear.
        assert_eq!(cache.len(), 51);

        cache.get("Arial", 52);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("Arial", 52));
        assert!(!cache.contains("Arial", 1));
    }

    fn face_path(font: &SizedFont) -> Option<&std::path::Path> {
        match font.face() {
            FontFace::File { path, .. } => Some(path),
            FontFace::Builtin => None,
        }
    }

    #[test]
    fn new_catalog_reopens_renamed_fonts() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_fonts(&dir, &["Arial"]);
        let old = cache.get("Arial", 20);
        assert_eq!(face_path(&old), Some(dir.path().join("Arial.ttf").as_path()));

        let replacement = dir.path().join("Arial-2.ttf");
        fs::write(&replacement, b"block font").unwrap();
        cache.library().publish(FontCatalog::from_entries([FontEntry {
            name: "Arial".to_string(),
            path: replacement.clone(),
        }]));

        assert!(!cache.contains("Arial", 20));
        let reopened = cache.get("Arial", 20);
        assert_eq!(face_path(&reopened), Some(replacement.as_path()));
        assert_eq!(cache.len(), 1);
    }
}
