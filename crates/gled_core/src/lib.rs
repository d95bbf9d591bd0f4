//! # GLED Core
//!
//! Tiered manual memory for the engine:
//! - Bump arenas with O(1) allocate and O(1) reset
//! - A heap allocator for objects with no bulk lifetime
//! - Power-of-two alignment on top of either
//! - Typed handles that destroy their object and return its storage
//!
//! ## Architecture Rules
//!
//! 1. **Every object names its tier** - System, Scene or Frame, fixed at construction
//! 2. **Destroy before reset** - an allocator with live objects refuses to reset
//! 3. **Handles borrow their allocator** - they cannot outlive it
//!
//! ## Example
//!
//! ```rust
//! use gled_core::memory::{Allocator, LifetimeTier, MemoryTiers, OwnedSlice, TierSizes};
//!
//! let tiers = MemoryTiers::new(TierSizes::default()).unwrap();
//! {
//!     let scratch = OwnedSlice::<u8>::zeroed_in(256, tiers.frame()).unwrap();
//!     assert_eq!(scratch.len(), 256);
//! }
//! tiers.reset(LifetimeTier::Frame).unwrap();
//! assert_eq!(tiers.frame().used(), 0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;

pub use error::{MemoryError, MemoryResult};
pub use memory::{
    Allocator, AllocatorKind, AllocatorStats, BumpAllocator, HeapAllocator, LifetimeTier,
    MemoryTiers, Owned, OwnedSlice, Shared, TierSizes,
};
