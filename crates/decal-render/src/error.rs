//! Error types for the render crate.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::font::FontLoadError;

/// Errors that can occur during catalog, layout or rasterization operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },

    /// The font cache file could not be encoded or decoded.
    #[error("font cache format error: {0}")]
    CacheFormat(#[from] serde_json::Error),

    /// A font could not be opened.
    #[error(transparent)]
    FontLoad(#[from] FontLoadError),

    /// Invalid canvas dimensions (zero width or height).
    #[error("invalid canvas dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

impl RenderError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;
