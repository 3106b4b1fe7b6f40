//! Font name catalog: filesystem scan and JSON cache persistence.
//!
//! The catalog maps a *cleaned* font name (the file stem with one trailing
//! style suffix removed) to the first font file that produced it. It is
//! built by [`FontCatalog::scan`], persisted with [`FontCatalog::save`] and
//! restored with [`FontCatalog::load`]. A catalog is immutable once built;
//! rescans produce a new one.
//!
//! The cache file is a JSON object with two sibling members:
//!
//! ```json
//! { "names": ["Arial", "Calibri"], "paths": { "Arial": "/fonts/Arial.ttf", "Calibri": "/fonts/calibri.ttf" } }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use decal_core::logging::{elapsed_ms, targets};
use serde::{Deserialize, Serialize};

use super::walk::FontFileWalker;
use crate::error::{RenderError, RenderResult};

/// Style suffixes removed from file stems, tried in this order. At most one
/// is stripped.
pub const STYLE_SUFFIXES: [&str; 6] = ["-Regular", "-Bold", "Regular", "Bold", "Italic", "-Italic"];

/// Derive the catalog name for a font file stem.
///
/// The first suffix of [`STYLE_SUFFIXES`] that the stem ends with is removed
/// once; matching is case-sensitive.
///
/// ```
/// use decal_render::font::clean_font_name;
///
/// assert_eq!(clean_font_name("Roboto-Regular"), "Roboto");
/// assert_eq!(clean_font_name("arialbd"), "arialbd");
/// assert_eq!(clean_font_name("Inter-BoldItalic"), "Inter-Bold");
/// ```
pub fn clean_font_name(stem: &str) -> &str {
    STYLE_SUFFIXES
        .iter()
        .find_map(|suffix| stem.strip_suffix(suffix))
        .unwrap_or(stem)
}

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Serialized form of the catalog.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    names: Vec<String>,
    paths: BTreeMap<String, PathBuf>,
}

/// Name-sorted mapping from cleaned font name to font file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontCatalog {
    names: Vec<String>,
    paths: HashMap<String, PathBuf>,
}

impl FontCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from entries in discovery order.
    ///
    /// The first entry for a name wins; later duplicates are dropped.
    pub fn from_entries(entries: impl IntoIterator<Item = FontEntry>) -> Self {
        let mut paths = HashMap::new();
        for entry in entries {
            paths.entry(entry.name).or_insert(entry.path);
        }
        let mut names: Vec<String> = paths.keys().cloned().collect();
        names.sort();
        Self { names, paths }
    }

    /// Scan `dirs` recursively, in the order given.
    ///
    /// Missing directories are skipped. Files whose cleaned name is empty are
    /// ignored.
    pub fn scan<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let start = Instant::now();
        let mut claimed = HashSet::new();
        let mut entries = Vec::new();

        for dir in dirs {
            for path in FontFileWalker::new(dir) {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let name = clean_font_name(stem);
                if name.is_empty() || claimed.contains(name) {
                    continue;
                }
                claimed.insert(name.to_string());
                entries.push(FontEntry {
                    name: name.to_string(),
                    path,
                });
            }
        }

        let catalog = Self::from_entries(entries);
        tracing::info!(
            target: targets::FONT,
            count = catalog.len(),
            dirs = dirs.len(),
            elapsed_ms = elapsed_ms(start),
            "scanned font directories"
        );
        catalog
    }

    /// Read a cache file.
    ///
    /// Returns `None` when the file is absent or does not have the expected
    /// shape; the caller rescans in either case.
    pub fn load(cache_path: &Path) -> Option<Self> {
        let contents = match fs::read_to_string(cache_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(target: targets::FONT, path = %cache_path.display(), error = %e, "could not read font cache");
                return None;
            }
        };

        let file: CacheFile = match serde_json::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(target: targets::FONT, path = %cache_path.display(), error = %e, "font cache is corrupt");
                return None;
            }
        };

        let mut entries = Vec::with_capacity(file.names.len());
        for name in file.names {
            let Some(path) = file.paths.get(&name) else {
                tracing::warn!(target: targets::FONT, path = %cache_path.display(), font = %name, "font cache entry has no path");
                return None;
            };
            entries.push(FontEntry {
                path: path.clone(),
                name,
            });
        }
        Some(Self::from_entries(entries))
    }

    /// Write the catalog to `cache_path`, replacing any previous file.
    ///
    /// The data goes to a temporary file in the same directory which is
    /// then renamed over the target, so readers never see a partial cache.
    pub fn save(&self, cache_path: &Path) -> RenderResult<()> {
        let file = CacheFile {
            names: self.names.clone(),
            paths: self
                .paths
                .iter()
                .map(|(name, path)| (name.clone(), path.clone()))
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&file)?;

        let dir = match cache_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| RenderError::io(dir, e))?;
        tmp.write_all(&json)
            .map_err(|e| RenderError::io(tmp.path(), e))?;
        tmp.persist(cache_path)
            .map_err(|e| RenderError::io(cache_path, e.error))?;
        Ok(())
    }

    /// Delete the cache file if present. Returns whether a file was removed.
    pub fn invalidate(cache_path: &Path) -> bool {
        match fs::remove_file(cache_path) {
            Ok(()) => {
                tracing::info!(target: targets::FONT, path = %cache_path.display(), "font cache invalidated");
                true
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(target: targets::FONT, path = %cache_path.display(), error = %e, "could not delete font cache");
                }
                false
            }
        }
    }

    /// Font names in sorted order.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The file registered for `name`.
    pub fn lookup(&self, name: &str) -> Option<&Path> {
        self.paths.get(name).map(PathBuf::as_path)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.paths.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = FontEntry> + '_ {
        self.names.iter().map(|name| FontEntry {
            name: name.clone(),
            path: self.paths[name].clone(),
        })
    }

    /// Names containing `query`, ignoring case, in sorted order.
    ///
    /// An empty query matches everything.
    pub fn search(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.names
            .iter()
            .filter(|name| name.to_lowercase().contains(&query))
            .map(String::as_str)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(name: &str, path: &str) -> FontEntry {
        FontEntry {
            name: name.to_string(),
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn cleaning_strips_one_suffix_in_priority_order() {
        assert_eq!(clean_font_name("Arial"), "Arial");
        assert_eq!(clean_font_name("Roboto-Regular"), "Roboto");
        assert_eq!(clean_font_name("Roboto-Bold"), "Roboto");
        assert_eq!(clean_font_name("RobotoRegular"), "Roboto");
        assert_eq!(clean_font_name("Georgia Bold"), "Georgia ");
        // "Italic" precedes "-Italic" in the candidate list.
        assert_eq!(clean_font_name("Foo-Italic"), "Foo-");
        assert_eq!(clean_font_name("Foo-BoldItalic"), "Foo-Bold");
        // Case-sensitive.
        assert_eq!(clean_font_name("foo-regular"), "foo-regular");
        assert_eq!(clean_font_name("Regular"), "");
    }

    #[test]
    fn cleaning_is_stable_for_unsuffixed_names() {
        for stem in ["Arial", "calibri", "Noto Sans", "Courier_New"] {
            assert_eq!(clean_font_name(stem), stem);
            assert_eq!(clean_font_name(clean_font_name(stem)), stem);
        }
    }

    #[test]
    fn first_entry_wins_and_names_are_sorted() {
        let catalog = FontCatalog::from_entries([
            entry("Zed", "/a/Zed.ttf"),
            entry("Arial", "/a/Arial.ttf"),
            entry("Arial", "/b/Arial-Bold.ttf"),
        ]);
        assert_eq!(catalog.names(), ["Arial", "Zed"]);
        assert_eq!(catalog.lookup("Arial"), Some(Path::new("/a/Arial.ttf")));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.lookup("Missing").is_none());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let catalog = FontCatalog::from_entries([
            entry("Arial", "/a.ttf"),
            entry("Calibri", "/c.ttf"),
            entry("Carlito", "/d.ttf"),
        ]);
        assert_eq!(catalog.search("CA"), ["Calibri", "Carlito"]);
        assert_eq!(catalog.search("ial"), ["Arial"]);
        assert_eq!(catalog.search("").len(), 3);
        assert!(catalog.search("xyz").is_empty());
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(FontCatalog::load(&dir.path().join("font_cache.json")).is_none());
    }

    #[test]
    fn load_rejects_bad_shapes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("font_cache.json");

        for contents in [
            "not json",
            "[1, 2, 3]",
            r#"{"names": "Arial", "paths": {}}"#,
            r#"{"names": ["Arial"]}"#,
            r#"{"names": ["Arial"], "paths": {}}"#,
        ] {
            fs::write(&path, contents).unwrap();
            assert!(FontCatalog::load(&path).is_none(), "accepted {contents}");
        }
    }

    #[test]
    fn save_then_load_preserves_mapping() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("font_cache.json");
        let catalog = FontCatalog::from_entries([
            entry("Arial", "/fonts/Arial.ttf"),
            entry("Calibri", "/fonts/calibri.ttf"),
        ]);

        catalog.save(&path).unwrap();
        let loaded = FontCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["names"][0], "Arial");
        assert_eq!(raw["paths"]["Calibri"], "/fonts/calibri.ttf");
    }

    #[test]
    fn invalidate_removes_file_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("font_cache.json");
        FontCatalog::new().save(&path).unwrap();

        assert!(FontCatalog::invalidate(&path));
        assert!(!path.exists());
        assert!(!FontCatalog::invalidate(&path));
    }
}
