//! Error types for Decal core systems.

use std::fmt;

/// The main error type for core operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The worker has been stopped and no longer accepts tasks.
    WorkerStopped,
    /// The worker's task queue is full.
    QueueFull,
    /// A task panicked while executing on the worker thread.
    TaskPanicked(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkerStopped => write!(f, "Worker has been stopped"),
            Self::QueueFull => write!(f, "Worker task queue is full"),
            Self::TaskPanicked(msg) => write!(f, "Worker task panicked: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}

/// A specialized Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
