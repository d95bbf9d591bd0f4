//! # Graphics Error Types
//!
//! Errors produced while executing render commands on the render thread.

use gled_core::MemoryError;
use thiserror::Error;

/// Errors that can occur in the rendering crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphicsError {
    /// The graphics device reported an error.
    #[error("graphics device error {code:#06x}: {message}")]
    Device {
        /// Device error code.
        code: u32,
        /// Human-readable description.
        message: String,
    },

    /// A delete referenced an object the device never created (or already deleted).
    #[error("unknown {kind} object {id}")]
    UnknownObject {
        /// Object kind ("buffer", "texture").
        kind: &'static str,
        /// Raw object name.
        id: u32,
    },

    /// Frame scratch for the command's results could not be allocated.
    #[error("command scratch allocation failed: {0}")]
    Scratch(#[from] MemoryError),

    /// The render command queue no longer exists.
    #[error("render command queue closed")]
    QueueClosed,
}

/// Result type for graphics operations.
pub type GraphicsResult<T> = Result<T, GraphicsError>;
