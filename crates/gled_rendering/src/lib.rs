//! # GLED Rendering
//!
//! Deferral of graphics-object work to the thread that owns the context.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                 ANY THREAD                                  │
//! │  GpuBuffers / GpuTexture ──> RenderCommandSender::push      │
//! ├────────────────────────────────────────────────────────────┤
//! │                 RENDER THREAD                               │
//! │  RenderCommandQueue::drain ──> RenderCommand::execute       │
//! │        │                              │                     │
//! │        │                     GraphicsDevice (context)       │
//! │        └──> continuations (names lent from the frame arena) │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//!
//! - Only the render thread touches a [`GraphicsDevice`]
//! - `push` never executes; `drain` executes everything pending
//! - Generate continuations always run exactly once, with a `Result`

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod command;
pub mod device;
pub mod error;
pub mod headless;
pub mod queue;
pub mod resources;

pub use command::{NamesCallback, RenderCommand, TextureCallback};
pub use device::{BufferId, GraphicsDevice, PolygonFace, PolygonMode, TextureId};
pub use error::{GraphicsError, GraphicsResult};
pub use headless::{DeviceCall, HeadlessDevice};
pub use queue::{DrainStats, RenderCommandQueue, RenderCommandSender};
pub use resources::{GpuBuffers, GpuTexture, SlotStatus};
