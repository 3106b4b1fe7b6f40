//! Error types for export and settings.

use std::io;
use std::path::PathBuf;

use decal_core::CoreError;
use decal_render::RenderError;
use thiserror::Error;

/// Errors surfaced by the export pipeline.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Rendering failed before anything was written.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// An image could not be encoded or written.
    #[error("failed to write image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The job could not be handed to the worker.
    #[error("export worker unavailable: {0}")]
    Worker(#[from] CoreError),
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors reading or writing the settings file.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid settings file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("unsupported canvas size {0} (expected 256, 512 or 1024)")]
    InvalidCanvas(u32),

    #[error("no configuration directory available")]
    NoConfigDir,
}
