//! # Allocator Interface
//!
//! The contract shared by every allocator in the engine.
//!
//! ```text
//!   reserve(request) ──> Block { ptr, request, origin }
//!        │                         │
//!        │                         └──> release(block)   (no-op for bump, free for heap)
//!        │
//!   allocate(n)            = reserve(n bytes)
//!   allocate_aligned(n, A) = reserve(n + A bytes), round the base up to A
//!
//!   reset()                = rewind everything (refused while objects are live)
//! ```
//!
//! Blocks remember which allocator produced them and how many bytes the
//! caller asked for, so statistics always reflect the caller's request and
//! never the slack reserved for alignment.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{MemoryError, MemoryResult};

use super::alignment::{self, AlignedBlock, Alignment};
use super::bump::BumpAllocator;
use super::heap::HeapAllocator;

/// Identity of an allocator instance, stamped on every block it hands out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AllocatorId(u64);

impl AllocatorId {
    /// Returns a process-unique id.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// The allocator variants the engine knows how to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocatorKind {
    /// Monotonic arena over a fixed pool (a.k.a. "stack" allocator).
    Bump,
    /// Forwards every request to the general-purpose heap (a.k.a. "system" allocator).
    Heap,
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bump => f.write_str("bump"),
            Self::Heap => f.write_str("heap"),
        }
    }
}

/// A request for raw memory.
///
/// `reserved` is what the allocator must carve out; `requested` is what the
/// caller asked for and what the statistics record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRequest {
    reserved: usize,
    requested: usize,
    object: bool,
}

impl BlockRequest {
    /// A plain request for `bytes` bytes.
    #[inline]
    #[must_use]
    pub const fn new(bytes: usize) -> Self {
        Self {
            reserved: bytes,
            requested: bytes,
            object: false,
        }
    }

    /// Marks the block as storage for a constructed object.
    ///
    /// Object blocks count as live until released, and a live object
    /// blocks `reset()`.
    #[inline]
    #[must_use]
    pub const fn for_object(mut self) -> Self {
        self.object = true;
        self
    }

    /// Reserves `extra` bytes beyond the request without recording them.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::SizeOverflow`] if the total does not fit in `usize`.
    #[inline]
    pub fn padded(mut self, extra: usize) -> MemoryResult<Self> {
        self.reserved = self
            .reserved
            .checked_add(extra)
            .ok_or(MemoryError::SizeOverflow)?;
        Ok(self)
    }

    /// Bytes the allocator must carve out.
    #[inline]
    #[must_use]
    pub const fn reserved(self) -> usize {
        self.reserved
    }

    /// Bytes the caller asked for.
    #[inline]
    #[must_use]
    pub const fn requested(self) -> usize {
        self.requested
    }

    /// Whether the block will hold a constructed object.
    #[inline]
    #[must_use]
    pub const fn is_object(self) -> bool {
        self.object
    }
}

/// A raw, unaligned block handed out by an [`Allocator`].
///
/// The block does not free itself. It must be handed back to the allocator
/// that produced it with [`Allocator::release`].
#[derive(Debug)]
pub struct Block {
    ptr: NonNull<u8>,
    request: BlockRequest,
    origin: AllocatorId,
}

// SAFETY: a block is an address plus bookkeeping. Access to the memory
// behind it is governed by whoever owns the block.
unsafe impl Send for Block {}
// SAFETY: see above, `&Block` only exposes the address.
unsafe impl Sync for Block {}

impl Block {
    /// Builds a block from its parts.
    ///
    /// # Safety
    ///
    /// `ptr` must point at `request.reserved()` writable bytes owned by the
    /// allocator identified by `origin`.
    #[inline]
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, request: BlockRequest, origin: AllocatorId) -> Self {
        Self { ptr, request, origin }
    }

    /// Start of the block.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Start of the block as a non-null pointer.
    #[inline]
    #[must_use]
    pub fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Numeric address of the block.
    #[inline]
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Bytes the caller asked for.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.request.requested()
    }

    /// Whether the caller asked for zero bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes actually carved out of the allocator.
    #[inline]
    #[must_use]
    pub fn reserved(&self) -> usize {
        self.request.reserved()
    }

    /// The request this block satisfied.
    #[inline]
    #[must_use]
    pub fn request(&self) -> BlockRequest {
        self.request
    }

    /// The allocator that produced this block.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> AllocatorId {
        self.origin
    }
}

/// Point-in-time usage figures for one allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Capacity in bytes.
    pub total: usize,
    /// Bytes currently carved out.
    pub used: usize,
    /// Number of allocations recorded.
    pub allocation_count: usize,
    /// Bytes recorded across those allocations.
    pub allocation_bytes: usize,
    /// Constructed objects not yet destroyed.
    pub live_objects: usize,
}

impl AllocatorStats {
    /// Bytes still available.
    #[inline]
    #[must_use]
    pub fn unused(&self) -> usize {
        self.total.saturating_sub(self.used)
    }

    /// Fraction of the capacity in use, in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn used_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64
    }
}

/// The allocator contract.
///
/// All operations take `&self`; implementations serialize mutation behind
/// their own lock so one allocator can be shared by many threads.
pub trait Allocator: Send + Sync {
    /// Name used in log lines and errors.
    fn label(&self) -> &'static str;

    /// Identity stamped on every block this allocator hands out.
    fn id(&self) -> AllocatorId;

    /// Which variant this is.
    fn kind(&self) -> AllocatorKind;

    /// Snapshot of the usage figures, taken under one lock.
    fn stats(&self) -> AllocatorStats;

    /// Carves out a block for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if the request cannot be satisfied.
    fn reserve(&self, request: BlockRequest) -> MemoryResult<Block>;

    /// Hands a block back. A deliberate no-op for arena allocators apart
    /// from live-object bookkeeping.
    fn release(&self, block: Block);

    /// Rewinds the allocator, logically freeing every block.
    ///
    /// No destructors run. Objects created through the owned-object
    /// handles must already be destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::LiveObjects`] if any object is still alive,
    /// or [`MemoryError::OutstandingBlocks`] for a heap allocator that still
    /// has unreleased blocks.
    fn reset(&self) -> MemoryResult<()>;

    /// Capacity in bytes.
    fn total(&self) -> usize {
        self.stats().total
    }

    /// Bytes currently carved out.
    fn used(&self) -> usize {
        self.stats().used
    }

    /// Bytes still available.
    fn unused(&self) -> usize {
        self.stats().unused()
    }

    /// Number of allocations recorded.
    fn allocation_count(&self) -> usize {
        self.stats().allocation_count
    }

    /// Bytes recorded across those allocations.
    fn allocation_bytes(&self) -> usize {
        self.stats().allocation_bytes
    }

    /// Constructed objects not yet destroyed.
    fn live_objects(&self) -> usize {
        self.stats().live_objects
    }

    /// Allocates `bytes` unaligned bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if the request cannot be satisfied.
    fn allocate(&self, bytes: usize) -> MemoryResult<Block> {
        self.reserve(BlockRequest::new(bytes))
    }

    /// Allocates `bytes` bytes starting on an `alignment` boundary.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::OutOfMemory`] if `bytes + alignment` cannot be
    /// satisfied, or [`MemoryError::SizeOverflow`] if that sum overflows.
    fn allocate_aligned(&self, bytes: usize, alignment: Alignment) -> MemoryResult<AlignedBlock> {
        alignment::allocate_aligned(self, BlockRequest::new(bytes), alignment)
    }

    /// Hands an aligned block back, releasing the original unaligned block.
    fn release_aligned(&self, block: AlignedBlock) {
        self.release(block.into_base());
    }
}

/// Builds an allocator of the given kind.
///
/// For [`AllocatorKind::Bump`], `capacity` is the pool size; for
/// [`AllocatorKind::Heap`], it is the budget of outstanding bytes.
///
/// # Errors
///
/// Returns [`MemoryError::PoolUnavailable`] if a bump pool cannot be reserved.
pub fn new_allocator(
    kind: AllocatorKind,
    label: &'static str,
    capacity: usize,
) -> MemoryResult<Box<dyn Allocator>> {
    Ok(match kind {
        AllocatorKind::Bump => Box::new(BumpAllocator::labeled(label, capacity)?),
        AllocatorKind::Heap => Box::new(HeapAllocator::labeled(label, capacity)),
    })
}

/// Returns `true` (and complains) if `block` was not produced by `id`.
///
/// Foreign blocks are leaked rather than released into the wrong pool.
pub(crate) fn is_foreign(label: &'static str, id: AllocatorId, block: &Block) -> bool {
    if block.origin() == id {
        return false;
    }
    tracing::error!(
        allocator = label,
        address = block.address(),
        "release of a block owned by another allocator, leaking it"
    );
    debug_assert!(false, "block released to the wrong allocator ({label})");
    true
}
