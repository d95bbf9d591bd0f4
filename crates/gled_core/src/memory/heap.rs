//! # Heap Allocator
//!
//! Forwards every request to the general-purpose heap.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::error::{MemoryError, MemoryResult};

use super::allocator::{self as contract, Allocator, AllocatorId, AllocatorKind, AllocatorStats, Block, BlockRequest};

/// An allocator that hands out fresh heap blocks and frees them on release.
///
/// Used where "lives until the next bulk reset" does not describe the
/// object's lifetime. Statistics mirror net outstanding allocations:
/// releasing a block takes it back out of the count, the byte total and
/// `used`.
///
/// `capacity` is a budget, not a pool. Requests that would push the
/// outstanding bytes past it fail with [`MemoryError::OutOfMemory`].
pub struct HeapAllocator {
    id: AllocatorId,
    label: &'static str,
    budget: usize,
    state: Mutex<HeapState>,
}

#[derive(Debug, Default)]
struct HeapState {
    used: usize,
    allocation_count: usize,
    allocation_bytes: usize,
    live_objects: usize,
}

impl HeapAllocator {
    /// Creates a heap allocator with a budget of `budget` outstanding bytes.
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self::labeled("heap", budget)
    }

    /// Creates a heap allocator whose log lines and errors carry `label`.
    #[must_use]
    pub fn labeled(label: &'static str, budget: usize) -> Self {
        Self {
            id: AllocatorId::next(),
            label,
            budget,
            state: Mutex::new(HeapState::default()),
        }
    }

    /// Layout of a block carving out `reserved` bytes.
    fn layout(reserved: usize) -> MemoryResult<Layout> {
        Layout::from_size_align(reserved.max(1), 1).map_err(|_| MemoryError::SizeOverflow)
    }
}

impl Allocator for HeapAllocator {
    fn label(&self) -> &'static str {
        self.label
    }

    fn id(&self) -> AllocatorId {
        self.id
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Heap
    }

    fn stats(&self) -> AllocatorStats {
        let state = self.state.lock();
        AllocatorStats {
            total: self.budget,
            used: state.used,
            allocation_count: state.allocation_count,
            allocation_bytes: state.allocation_bytes,
            live_objects: state.live_objects,
        }
    }

    fn reserve(&self, request: BlockRequest) -> MemoryResult<Block> {
        let mut state = self.state.lock();

        let available = self.budget.saturating_sub(state.used);
        if request.reserved() > available {
            return Err(MemoryError::OutOfMemory {
                allocator: self.label,
                requested: request.reserved(),
                available,
            });
        }

        let layout = Self::layout(request.reserved())?;
        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        let ptr = NonNull::new(raw).ok_or(MemoryError::OutOfMemory {
            allocator: self.label,
            requested: request.reserved(),
            available,
        })?;

        state.used += request.reserved();
        state.allocation_count += 1;
        state.allocation_bytes += request.requested();
        if request.is_object() {
            state.live_objects += 1;
        }

        tracing::trace!(allocator = self.label, bytes = request.reserved(), "heap allocation");

        // SAFETY: the heap just handed us `reserved` (at least) writable bytes.
        Ok(unsafe { Block::from_raw_parts(ptr, request, self.id) })
    }

    fn release(&self, block: Block) {
        if contract::is_foreign(self.label, self.id, &block) {
            return;
        }

        let mut state = self.state.lock();
        if let Ok(layout) = Self::layout(block.reserved()) {
            // SAFETY: the block came from `reserve` with this exact layout and
            // ownership of it is consumed here.
            unsafe { alloc::dealloc(block.as_ptr(), layout) };
        }

        state.used = state.used.saturating_sub(block.reserved());
        state.allocation_count = state.allocation_count.saturating_sub(1);
        state.allocation_bytes = state.allocation_bytes.saturating_sub(block.len());
        if block.request().is_object() {
            state.live_objects = state.live_objects.saturating_sub(1);
        }
    }

    fn reset(&self) -> MemoryResult<()> {
        let mut state = self.state.lock();
        if state.live_objects > 0 {
            return Err(MemoryError::LiveObjects {
                allocator: self.label,
                live: state.live_objects,
            });
        }

        // Heap blocks are freed one by one, so the figures only drop back to
        // zero through `release`.
        if state.allocation_count > 0 {
            return Err(MemoryError::OutstandingBlocks {
                allocator: self.label,
                blocks: state.allocation_count,
                bytes: state.used,
            });
        }

        tracing::debug!(allocator = self.label, "heap reset with nothing outstanding");
        Ok(())
    }
}

impl std::fmt::Debug for HeapAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapAllocator")
            .field("label", &self.label)
            .field("budget", &self.budget)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
