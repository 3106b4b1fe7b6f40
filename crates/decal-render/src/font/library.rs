//! Process-wide owner of the published font catalog.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use decal_core::logging::{elapsed_ms, targets};
use parking_lot::RwLock;

use super::catalog::FontCatalog;
use super::dirs;

/// Where a [`FontLibrary`] looks for fonts and keeps its cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontLibraryConfig {
    /// Cache file; `None` disables persistence.
    pub cache_path: Option<PathBuf>,
    /// Directories scanned, in order.
    pub font_dirs: Vec<PathBuf>,
}

impl Default for FontLibraryConfig {
    fn default() -> Self {
        Self {
            cache_path: Some(dirs::default_cache_path()),
            font_dirs: dirs::system_font_dirs(),
        }
    }
}

impl FontLibraryConfig {
    /// Config without a cache file that scans only `font_dirs`.
    pub fn uncached(font_dirs: Vec<PathBuf>) -> Self {
        Self {
            cache_path: None,
            font_dirs,
        }
    }

    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Append directories scanned after the configured ones.
    #[must_use]
    pub fn with_extra_dirs(mut self, dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        self.font_dirs.extend(dirs);
        self
    }
}

/// Holds the current [`FontCatalog`] and rebuilds it on demand.
///
/// Readers get an `Arc` snapshot. A rebuild happens entirely off to the side
/// and is published with a single pointer swap, so a snapshot is always
/// either the old catalog or the new one.
///
/// ```no_run
/// use std::sync::Arc;
/// use decal_render::font::{FontLibrary, FontLibraryConfig};
///
/// let library = Arc::new(FontLibrary::new(FontLibraryConfig::default()));
/// let scan = library.spawn_scan().expect("spawn font scan");
/// // ... the UI shows a "scanning" state while `library.is_scanning()` ...
/// scan.join().unwrap();
/// println!("{} fonts", library.catalog().len());
/// ```
pub struct FontLibrary {
    config: FontLibraryConfig,
    catalog: RwLock<Arc<FontCatalog>>,
    generation: AtomicU64,
    scanning: AtomicBool,
}

impl FontLibrary {
    /// Create a library with an empty catalog. Call [`load_or_scan`] or
    /// [`spawn_scan`] to populate it.
    ///
    /// [`load_or_scan`]: Self::load_or_scan
    /// [`spawn_scan`]: Self::spawn_scan
    pub fn new(config: FontLibraryConfig) -> Self {
        Self {
            config,
            catalog: RwLock::new(Arc::new(FontCatalog::new())),
            generation: AtomicU64::new(0),
            scanning: AtomicBool::new(false),
        }
    }

    /// A library serving a fixed catalog, with no cache and no directories.
    pub fn from_catalog(catalog: FontCatalog) -> Self {
        let library = Self::new(FontLibraryConfig::uncached(Vec::new()));
        library.publish(catalog);
        library
    }

    pub fn config(&self) -> &FontLibraryConfig {
        &self.config
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.config.cache_path.as_deref()
    }

    /// Snapshot of the published catalog.
    pub fn catalog(&self) -> Arc<FontCatalog> {
        self.catalog.read().clone()
    }

    /// Resolve a font name against the published catalog.
    pub fn lookup(&self, name: &str) -> Option<PathBuf> {
        self.catalog.read().lookup(name).map(Path::to_path_buf)
    }

    /// Sorted names containing `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<String> {
        self.catalog()
            .search(query)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Whether a load or scan is in progress.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Number of catalogs published so far. Anything memoized from a
    /// catalog is stale once this moves on.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace the published catalog.
    pub fn publish(&self, catalog: FontCatalog) -> Arc<FontCatalog> {
        let catalog = Arc::new(catalog);
        let mut slot = self.catalog.write();
        *slot = Arc::clone(&catalog);
        self.generation.fetch_add(1, Ordering::AcqRel);
        drop(slot);
        catalog
    }

    /// Populate the catalog from the cache file, or scan and save when the
    /// cache is missing or unusable.
    pub fn load_or_scan(&self) -> Arc<FontCatalog> {
        self.scanning.store(true, Ordering::Release);
        let start = Instant::now();

        if let Some(cache_path) = self.cache_path()
            && let Some(catalog) = FontCatalog::load(cache_path)
        {
            tracing::info!(
                target: targets::FONT,
                count = catalog.len(),
                path = %cache_path.display(),
                elapsed_ms = elapsed_ms(start),
                "loaded fonts from cache"
            );
            let published = self.publish(catalog);
            self.scanning.store(false, Ordering::Release);
            return published;
        }

        let catalog = FontCatalog::scan(&self.config.font_dirs);
        if let Some(cache_path) = self.cache_path() {
            match catalog.save(cache_path) {
                Ok(()) => tracing::info!(
                    target: targets::FONT,
                    count = catalog.len(),
                    path = %cache_path.display(),
                    "saved font cache"
                ),
                Err(e) => tracing::error!(
                    target: targets::FONT,
                    path = %cache_path.display(),
                    error = %e,
                    "failed to save font cache"
                ),
            }
        }

        let published = self.publish(catalog);
        self.scanning.store(false, Ordering::Release);
        published
    }

    /// Run [`load_or_scan`](Self::load_or_scan) on a dedicated thread.
    pub fn spawn_scan(self: &Arc<Self>) -> io::Result<JoinHandle<()>> {
        self.spawn_with(|library| {
            thread::Builder::new()
                .name("decal-font-scan".to_string())
                .spawn(move || {
                    library.load_or_scan();
                })
        })
    }

    /// Marks the library as scanning for the lifetime of the thread started
    /// by `spawn`, and clears the mark again if no thread was started.
    fn spawn_with<F>(self: &Arc<Self>, spawn: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce(Arc<Self>) -> io::Result<JoinHandle<()>>,
    {
        self.scanning.store(true, Ordering::Release);
        spawn(Arc::clone(self)).inspect_err(|e| {
            self.scanning.store(false, Ordering::Release);
            tracing::error!(target: targets::FONT, error = %e, "failed to start font scan");
        })
    }

    /// Discard the cache file and scan again.
    ///
    /// The previous catalog stays published until the new one replaces it.
    pub fn rescan(&self) -> Arc<FontCatalog> {
        if let Some(cache_path) = self.cache_path() {
            FontCatalog::invalidate(cache_path);
        }
        self.load_or_scan()
    }
}

impl std::fmt::Debug for FontLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontLibrary")
            .field("config", &self.config)
            .field("fonts", &self.catalog.read().len())
            .field("scanning", &self.is_scanning())
            .finish()
    }
}
