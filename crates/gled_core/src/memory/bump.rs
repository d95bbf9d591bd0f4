//! # Bump Allocator
//!
//! A monotonic arena for allocations that are freed all at once.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::error::{MemoryError, MemoryResult};

use super::allocator::{self as contract, Allocator, AllocatorId, AllocatorKind, AllocatorStats, Block, BlockRequest};

/// Alignment of the backing pool itself.
const POOL_ALIGN: usize = 16;

/// A bump-pointer arena over a fixed pool.
///
/// Allocations are fast (just bump a cursor). Individual release is a no-op;
/// memory is reclaimed all at once by [`Allocator::reset`].
///
/// ```text
///   ┌─────┬─────┬────────┬──────────────────────────────┐
///   │ A1  │ A2  │   A3   │          free                │
///   └─────┴─────┴────────┴──────────────────────────────┘
///   0                    ▲ cursor                      capacity
/// ```
///
/// # Thread Safety
///
/// The cursor lives behind a mutex, so one arena can be shared by every
/// thread that allocates into a tier.
///
/// # Example
///
/// ```rust
/// use gled_core::memory::{Allocator, BumpAllocator};
///
/// let arena = BumpAllocator::new(1024).unwrap();
/// let first = arena.allocate(100).unwrap();
/// let second = arena.allocate(50).unwrap();
/// assert_eq!(arena.offset_of(second.as_ptr()), Some(100));
///
/// arena.reset().unwrap();
/// let again = arena.allocate(10).unwrap();
/// assert_eq!(again.as_ptr(), first.as_ptr());
/// ```
pub struct BumpAllocator {
    id: AllocatorId,
    label: &'static str,
    /// Start of the backing pool.
    pool: NonNull<u8>,
    /// Total capacity in bytes.
    capacity: usize,
    state: Mutex<BumpState>,
}

#[derive(Debug, Default)]
struct BumpState {
    cursor: usize,
    allocation_count: usize,
    allocation_bytes: usize,
    live_objects: usize,
    resets: u64,
}

// SAFETY: the pool is owned by the allocator and the cursor that hands out
// disjoint ranges of it is only touched under the mutex.
unsafe impl Send for BumpAllocator {}
// SAFETY: see above.
unsafe impl Sync for BumpAllocator {}

impl BumpAllocator {
    /// Creates an arena with a pool of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::PoolUnavailable`] if the pool cannot be reserved.
    pub fn new(capacity: usize) -> MemoryResult<Self> {
        Self::labeled("bump", capacity)
    }

    /// Creates an arena whose log lines and errors carry `label`.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::PoolUnavailable`] if the pool cannot be reserved.
    pub fn labeled(label: &'static str, capacity: usize) -> MemoryResult<Self> {
        let pool = if capacity == 0 {
            NonNull::dangling()
        } else {
            let layout = Layout::from_size_align(capacity, POOL_ALIGN)
                .map_err(|_| MemoryError::PoolUnavailable { capacity })?;
            // SAFETY: the layout has a non-zero size.
            let raw = unsafe { alloc::alloc(layout) };
            NonNull::new(raw).ok_or(MemoryError::PoolUnavailable { capacity })?
        };

        tracing::debug!(allocator = label, capacity, "bump pool reserved");

        Ok(Self {
            id: AllocatorId::next(),
            label,
            pool,
            capacity,
            state: Mutex::new(BumpState::default()),
        })
    }

    /// Byte offset of `ptr` from the start of the pool, if it points into it.
    #[must_use]
    pub fn offset_of(&self, ptr: *const u8) -> Option<usize> {
        let start = self.pool.as_ptr() as usize;
        let address = ptr as usize;
        (address >= start && address < start + self.capacity).then(|| address - start)
    }

    /// Number of successful resets since construction.
    #[must_use]
    pub fn reset_count(&self) -> u64 {
        self.state.lock().resets
    }
}

impl Allocator for BumpAllocator {
    fn label(&self) -> &'static str {
        self.label
    }

    fn id(&self) -> AllocatorId {
        self.id
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Bump
    }

    fn stats(&self) -> AllocatorStats {
        let state = self.state.lock();
        AllocatorStats {
            total: self.capacity,
            used: state.cursor,
            allocation_count: state.allocation_count,
            allocation_bytes: state.allocation_bytes,
            live_objects: state.live_objects,
        }
    }

    fn reserve(&self, request: BlockRequest) -> MemoryResult<Block> {
        let mut state = self.state.lock();

        let offset = state.cursor;
        let end = offset
            .checked_add(request.reserved())
            .filter(|&end| end <= self.capacity)
            .ok_or(MemoryError::OutOfMemory {
                allocator: self.label,
                requested: request.reserved(),
                available: self.capacity - offset,
            })?;

        state.cursor = end;
        state.allocation_count += 1;
        state.allocation_bytes += request.requested();
        if request.is_object() {
            state.live_objects += 1;
        }

        // SAFETY: offset <= capacity, so the pointer stays inside the pool
        // (or one past its end for an empty request at the very end).
        let ptr = unsafe { NonNull::new_unchecked(self.pool.as_ptr().add(offset)) };

        // SAFETY: [offset, end) is inside the pool and was never handed out
        // since the last reset.
        Ok(unsafe { Block::from_raw_parts(ptr, request, self.id) })
    }

    fn release(&self, block: Block) {
        if contract::is_foreign(self.label, self.id, &block) {
            return;
        }
        // Memory comes back on reset; only the object count moves here.
        if block.request().is_object() {
            let mut state = self.state.lock();
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

        tracing::debug!(allocator = self.label, used = state.cursor, "bump reset");
        state.cursor = 0;
        state.resets += 1;
        Ok(())
    }
}

impl Drop for BumpAllocator {
    fn drop(&mut self) {
        if self.capacity == 0 {
            return;
        }
        // SAFETY: the pool was allocated in `labeled` with exactly this layout.
        unsafe {
            alloc::dealloc(
                self.pool.as_ptr(),
                Layout::from_size_align_unchecked(self.capacity, POOL_ALIGN),
            );
        }
    }
}

impl std::fmt::Debug for BumpAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BumpAllocator")
            .field("label", &self.label)
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
