//! Decal: text textures for game materials.
//!
//! This crate ties the font and layout machinery of [`decal_render`] to the
//! two things a user does with it:
//!
//! - **Preview**: [`PreviewScheduler`] debounces parameter changes and renders
//!   the newest request on a background [`Worker`](decal_core::Worker)
//! - **Export**: [`ExportPipeline`] writes the color image, an optional
//!   translucency mask and an optional material descriptor, either for one
//!   text or for the digits `0`..`9`
//!
//! User defaults live in a TOML file, see [`Settings`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use decal::{ExportJob, ExportPipeline, Settings};
//! use decal_render::font::{FontLibrary, FontObjectCache};
//! use decal_render::{CosmicBackend, LayoutEngine};
//!
//! let settings = Settings::load_default().unwrap_or_default();
//! let library = Arc::new(FontLibrary::new(settings.font_library_config()));
//! library.load_or_scan();
//!
//! let fonts = Arc::new(FontObjectCache::new(library, Arc::new(CosmicBackend::new())));
//! let pipeline = ExportPipeline::new(Arc::new(LayoutEngine::new(fonts)));
//!
//! let job = ExportJob::new(settings.render_request("EXIT"), "materials/signs/exit")
//!     .with_material("csgo_static_overlay.vfx");
//! let outcome = pipeline.export(&job)?;
//! println!("wrote {:?}", outcome.files());
//! # Ok::<(), decal::ExportError>(())
//! ```

mod error;
pub mod export;
pub mod preview;
pub mod settings;

pub use error::{ExportError, ExportResult, SettingsError};
pub use export::{
    BatchJob, BatchOutcome, ExportJob, ExportOutcome, ExportPipeline, material_descriptor,
    material_reference, output_prefix,
};
pub use preview::{
    PreviewFrame, PreviewScheduler, PreviewState, PreviewStats, SequenceGate, display_size,
};
pub use settings::Settings;
