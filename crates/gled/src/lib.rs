//! # GLED
//!
//! The engine crate: ties the memory tiers and the render command queue
//! into a frame lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                              GLED ENGINE                            │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌─────────────────┐     ┌─────────────────┐     ┌───────────────┐  │
//! │  │   gled_core     │     │  gled_rendering │     │   gled        │  │
//! │  │                 │────>│                 │────>│               │  │
//! │  │  • Bump / Heap  │     │  • Commands     │     │  • Context    │  │
//! │  │  • Alignment    │     │  • Queue        │     │  • Frames     │  │
//! │  │  • Tiers        │     │  • GPU slots    │     │  • Update     │  │
//! │  │  • Owned/Shared │     │  • Headless     │     │  • Config     │  │
//! │  └─────────────────┘     └─────────────────┘     └───────────────┘  │
//! │                                                                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: TOML engine configuration
//! - `engine`: shared context and render-thread frame lifecycle
//! - `frame`: per-frame timing and statistics
//! - `update_thread`: the simulation thread

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod update_thread;

// Re-export the layers
pub use gled_core as core;
pub use gled_rendering as rendering;

// Re-export commonly used types
pub use config::{DebugConfig, EngineConfig, MemoryConfig, VideoConfig};
pub use engine::{Engine, EngineContext};
pub use error::{EngineError, EngineResult};
pub use frame::{FrameStats, FrameStatsAccumulator};
pub use update_thread::{UpdateThread, UPDATE_THREAD_NAME};
