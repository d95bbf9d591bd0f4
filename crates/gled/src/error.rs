//! # Engine Error Types

use std::path::PathBuf;

use gled_core::MemoryError;
use gled_rendering::GraphicsError;
use thiserror::Error;

/// Errors surfaced by the engine layer.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file could not be read.
    #[error("cannot read configuration {}: {source}", .path.display())]
    ConfigIo {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A memory tier operation failed.
    #[error(transparent)]
    Memory(#[from] MemoryError),

    /// A graphics operation failed.
    #[error(transparent)]
    Graphics(#[from] GraphicsError),

    /// An engine thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    ThreadSpawn {
        /// Thread name.
        name: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
