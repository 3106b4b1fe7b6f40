//! Logging facilities for Decal.
//!
//! Decal uses the `tracing` crate for instrumentation. Library crates only
//! emit events; installing a subscriber is left to the application. The
//! [`init`] helper sets up the formatter the `decal` binary uses.
//!
//! ```ignore
//! use decal_core::logging;
//!
//! fn main() {
//!     logging::init("info");
//!     tracing::info!(target: logging::targets::FONT, count = 12, "fonts loaded");
//! }
//! ```
//!
//! Per-subsystem filtering works with the usual directives, for example
//! `RUST_LOG=decal::preview=trace,decal::font=debug`.

use tracing_subscriber::EnvFilter;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Font catalog scanning, cache persistence and font loading.
    pub const FONT: &str = "decal::font";
    /// Layout and rasterization.
    pub const RENDER: &str = "decal::render";
    /// Debounced preview scheduling.
    pub const PREVIEW: &str = "decal::preview";
    /// Single-item export.
    pub const EXPORT: &str = "decal::export";
    /// Numeric batch export.
    pub const BATCH: &str = "decal::batch";
    /// Background worker thread.
    pub const WORKER: &str = "decal::worker";
    /// Debounce timers.
    pub const TIMER: &str = "decal::timer";
}

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; `default_directive` is used when it is unset
/// or invalid. Calling this more than once is harmless: later calls leave the
/// first subscriber in place.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Milliseconds elapsed since `start`, for `elapsed_ms` log fields.
pub fn elapsed_ms(start: std::time::Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
