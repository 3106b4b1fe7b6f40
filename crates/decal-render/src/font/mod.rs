//! Font discovery, cataloguing and loading.
//!
//! - [`FontCatalog`]: immutable name to file mapping, scanned from disk and
//!   persisted as JSON
//! - [`FontLibrary`]: owns the published catalog and rebuilds it, possibly
//!   on a background thread
//! - [`FontObjectCache`]: memoized [`SizedFont`] handles keyed by name and
//!   pixel size, with default-face fallback

mod cache;
mod catalog;
pub mod dirs;
mod library;
mod walk;

pub use cache::{DEFAULT_FONT_CACHE_CAPACITY, FontFace, FontLoadError, FontObjectCache, SizedFont};
pub use catalog::{FontCatalog, FontEntry, STYLE_SUFFIXES, clean_font_name};
pub use library::{FontLibrary, FontLibraryConfig};
pub use walk::{FONT_EXTENSIONS, FontFileWalker, is_font_file};
