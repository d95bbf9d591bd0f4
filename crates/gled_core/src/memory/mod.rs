//! # Memory Management
//!
//! Allocators, the alignment layer and the owned-object handles built on
//! top of them.
//!
//! ## Design Philosophy
//!
//! Every dynamically created engine object lives in one of three tiers:
//! - **System**: heap-backed, lives as long as the process
//! - **Scene**: arena reset when the scene unloads
//! - **Frame**: arena reset at the end of every frame
//!
//! Arenas never free individual blocks. Objects are destroyed through their
//! handles, then the arena is rewound in O(1).

mod alignment;
mod allocator;
mod bump;
mod heap;
mod owned;
mod shared;
mod tier;

pub use alignment::{allocate_aligned, AlignedBlock, Alignment};
pub use allocator::{
    new_allocator, Allocator, AllocatorId, AllocatorKind, AllocatorStats, Block, BlockRequest,
};
pub use bump::BumpAllocator;
pub use heap::HeapAllocator;
pub use owned::{Owned, OwnedSlice};
pub use shared::Shared;
pub use tier::{LifetimeTier, MemoryReport, MemoryTiers, TierReport, TierSizes};
