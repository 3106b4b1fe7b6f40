//! Core systems for Decal.
//!
//! This crate provides the small runtime pieces the rest of the workspace is
//! built on:
//!
//! - **Worker**: a dedicated background thread that executes tasks one at a
//!   time, in submission order
//! - **Debouncer**: a reset-on-change one-shot deadline used to coalesce
//!   bursts of parameter changes
//! - **Logging**: `tracing` targets and subscriber setup
//!
//! # Worker Example
//!
//! ```no_run
//! use decal_core::Worker;
//!
//! let worker = Worker::new();
//!
//! worker.send_with_callback(
//!     || 6 * 7,
//!     |answer| println!("answer: {answer}"),
//! );
//!
//! assert_eq!(worker.send_sync(|| "done"), Some("done"));
//! worker.stop_and_join();
//! ```
//!
//! # Debounce Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use decal_core::Debouncer;
//!
//! let mut debounce = Debouncer::new(Duration::from_millis(150));
//! let start = Instant::now();
//!
//! debounce.trigger(start);
//! debounce.trigger(start + Duration::from_millis(100));
//!
//! // Only quiescence after the *last* trigger fires.
//! assert!(!debounce.fire_if_due(start + Duration::from_millis(200)));
//! assert!(debounce.fire_if_due(start + Duration::from_millis(250)));
//! ```

mod error;
pub mod logging;
mod timer;
pub mod worker;

pub use error::{CoreError, Result};
pub use timer::Debouncer;
pub use worker::{Worker, WorkerBuilder, WorkerConfig};
