//! # Owned Objects
//!
//! Typed objects constructed in place inside an allocator's memory.
//!
//! Each handle pairs the object with the allocator it came from. Dropping
//! the handle runs the destructor and hands the storage back, so the
//! destroy step can never be forgotten or paired with the wrong allocator.
//!
//! ```text
//!   Owned::new_in(value, &arena)
//!        │  reserve (aligned if T needs it) ─> write value
//!        ▼
//!   Owned<'arena, T> ──drop──> drop_in_place(value) ─> arena.release(block)
//! ```
//!
//! Handles borrow their allocator, and every object counts as live in it
//! until dropped. An allocator refuses to `reset()` while objects are live.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

use bytemuck::{Pod, Zeroable};

use crate::error::{MemoryError, MemoryResult};

use super::alignment::{self, AlignedBlock, Alignment};
use super::allocator::{Allocator, Block, BlockRequest};

/// Object storage, aligned when the element type needs it.
pub(crate) enum Placement {
    Plain(Block),
    Aligned(AlignedBlock),
}

impl Placement {
    /// Reserves object storage for `count` values of `T`.
    pub(crate) fn reserve<T>(allocator: &dyn Allocator, count: usize) -> MemoryResult<Self> {
        let bytes = mem::size_of::<T>()
            .checked_mul(count)
            .ok_or(MemoryError::SizeOverflow)?;
        let request = BlockRequest::new(bytes).for_object();

        match Alignment::of::<T>() {
            None => allocator.reserve(request).map(Self::Plain),
            Some(alignment) => {
                alignment::allocate_aligned(allocator, request, alignment).map(Self::Aligned)
            }
        }
    }

    /// Start of the usable storage.
    pub(crate) fn as_non_null(&self) -> NonNull<u8> {
        match self {
            Self::Plain(block) => block.as_non_null(),
            Self::Aligned(block) => block.as_non_null(),
        }
    }

    /// Hands the storage back to `allocator`.
    pub(crate) fn release(self, allocator: &dyn Allocator) {
        match self {
            Self::Plain(block) => allocator.release(block),
            Self::Aligned(block) => allocator.release_aligned(block),
        }
    }
}

/// Drops `len` values starting at `ptr`, highest index first.
///
/// # Safety
///
/// The `len` values must be initialized and never used again.
unsafe fn destroy_reverse<T>(ptr: NonNull<T>, len: usize) {
    if !mem::needs_drop::<T>() {
        return;
    }
    for index in (0..len).rev() {
        ptr::drop_in_place(ptr.as_ptr().add(index));
    }
}

// ============================================================================
// Owned
// ============================================================================

/// A uniquely owned object living in an allocator's memory.
///
/// # Example
///
/// ```rust
/// use gled_core::memory::{Allocator, BumpAllocator, Owned};
///
/// let scene = BumpAllocator::new(4096).unwrap();
/// let mut position = Owned::new_in([0.0_f32; 3], &scene).unwrap();
/// position[1] = 2.5;
/// assert_eq!(scene.live_objects(), 1);
///
/// drop(position);
/// scene.reset().unwrap();
/// ```
pub struct Owned<'a, T> {
    ptr: NonNull<T>,
    placement: ManuallyDrop<Placement>,
    allocator: &'a dyn Allocator,
    _owns: PhantomData<T>,
}

// SAFETY: the handle uniquely owns its `T`; the allocator is `Sync`.
unsafe impl<T: Send> Send for Owned<'_, T> {}
// SAFETY: `&Owned<T>` only hands out `&T`.
unsafe impl<T: Sync> Sync for Owned<'_, T> {}

impl<'a, T> Owned<'a, T> {
    /// Moves `value` into storage carved from `allocator`.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if the storage cannot be reserved; the
    /// value is dropped in that case.
    pub fn new_in(value: T, allocator: &'a dyn Allocator) -> MemoryResult<Self> {
        let placement = Placement::reserve::<T>(allocator, 1)?;
        let ptr = placement.as_non_null().cast::<T>();
        // SAFETY: the placement holds room for one properly aligned `T`.
        unsafe { ptr.as_ptr().write(value) };

        Ok(Self {
            ptr,
            placement: ManuallyDrop::new(placement),
            allocator,
            _owns: PhantomData,
        })
    }

    /// The allocator holding this object.
    #[inline]
    #[must_use]
    pub fn allocator(this: &Self) -> &'a dyn Allocator {
        this.allocator
    }

    /// Moves the value out and releases its storage.
    #[must_use]
    pub fn into_inner(this: Self) -> T {
        let mut this = ManuallyDrop::new(this);
        // SAFETY: the value is initialized and `this` is never dropped, so it
        // is read exactly once.
        let value = unsafe { this.ptr.as_ptr().read() };
        // SAFETY: the placement is taken exactly once.
        let placement = unsafe { ManuallyDrop::take(&mut this.placement) };
        placement.release(this.allocator);
        value
    }
}

impl<T> Deref for Owned<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the value stays initialized until the handle drops.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for Owned<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: as above, and `&mut self` guarantees uniqueness.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T> Drop for Owned<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the value is initialized and the placement is taken once.
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            ManuallyDrop::take(&mut self.placement).release(self.allocator);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Owned<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("allocator", &self.allocator.label())
            .field("value", &**self)
            .finish()
    }
}

// ============================================================================
// OwnedSlice
// ============================================================================

/// A fixed-length array of objects living in one allocator block.
///
/// Elements are constructed front to back and destroyed back to front,
/// then the block is released once.
pub struct OwnedSlice<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    placement: ManuallyDrop<Placement>,
    allocator: &'a dyn Allocator,
    _owns: PhantomData<T>,
}

// SAFETY: the handle uniquely owns its elements; the allocator is `Sync`.
unsafe impl<T: Send> Send for OwnedSlice<'_, T> {}
// SAFETY: `&OwnedSlice<T>` only hands out `&[T]`.
unsafe impl<T: Sync> Sync for OwnedSlice<'_, T> {}

/// Cleans up a partially constructed array if an element constructor panics.
struct InitGuard<'g, T> {
    ptr: NonNull<T>,
    initialized: usize,
    placement: ManuallyDrop<Placement>,
    allocator: &'g dyn Allocator,
}

impl<T> InitGuard<'_, T> {
    /// Disarms the guard, handing the placement over to the finished array.
    fn finish(self) -> ManuallyDrop<Placement> {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the placement moves out once.
        unsafe { ptr::read(&this.placement) }
    }
}

impl<T> Drop for InitGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: exactly `initialized` leading elements were written.
        unsafe {
            destroy_reverse(self.ptr, self.initialized);
            ManuallyDrop::take(&mut self.placement).release(self.allocator);
        }
    }
}

impl<'a, T> OwnedSlice<'a, T> {
    /// Builds `len` elements, calling `init` with each index in order.
    ///
    /// If `init` panics, the elements built so far are destroyed in reverse
    /// order and the block is released before the panic continues.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::SizeOverflow`] if the array size overflows, or
    /// the allocator's error if the block cannot be reserved.
    pub fn from_fn_in<F>(len: usize, allocator: &'a dyn Allocator, mut init: F) -> MemoryResult<Self>
    where
        F: FnMut(usize) -> T,
    {
        let placement = Placement::reserve::<T>(allocator, len)?;
        let ptr = placement.as_non_null().cast::<T>();
        let mut guard = InitGuard {
            ptr,
            initialized: 0,
            placement: ManuallyDrop::new(placement),
            allocator,
        };

        while guard.initialized < len {
            let value = init(guard.initialized);
            // SAFETY: the index is below `len` and the slot is uninitialized.
            unsafe { ptr.as_ptr().add(guard.initialized).write(value) };
            guard.initialized += 1;
        }

        Ok(Self {
            ptr,
            len,
            placement: guard.finish(),
            allocator,
            _owns: PhantomData,
        })
    }

    /// Builds `len` default-constructed elements.
    ///
    /// # Errors
    ///
    /// See [`OwnedSlice::from_fn_in`].
    pub fn new_default_in(len: usize, allocator: &'a dyn Allocator) -> MemoryResult<Self>
    where
        T: Default,
    {
        Self::from_fn_in(len, allocator, |_| T::default())
    }

    /// Clones `values` into the allocator.
    ///
    /// # Errors
    ///
    /// See [`OwnedSlice::from_fn_in`].
    pub fn from_slice_in(values: &[T], allocator: &'a dyn Allocator) -> MemoryResult<Self>
    where
        T: Clone,
    {
        Self::from_fn_in(values.len(), allocator, |index| values[index].clone())
    }

    /// Builds `len` all-zero elements.
    ///
    /// # Errors
    ///
    /// See [`OwnedSlice::from_fn_in`].
    pub fn zeroed_in(len: usize, allocator: &'a dyn Allocator) -> MemoryResult<Self>
    where
        T: Zeroable,
    {
        let placement = Placement::reserve::<T>(allocator, len)?;
        let ptr = placement.as_non_null().cast::<T>();
        // SAFETY: the block holds `len` aligned slots and all-zero is a valid `T`.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, len) };

        Ok(Self {
            ptr,
            len,
            placement: ManuallyDrop::new(placement),
            allocator,
            _owns: PhantomData,
        })
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array has no elements.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The elements.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: all `len` elements are initialized until the handle drops.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The elements, mutably.
    #[inline]
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and `&mut self` guarantees uniqueness.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// The allocator holding the array.
    #[inline]
    #[must_use]
    pub fn allocator(&self) -> &'a dyn Allocator {
        self.allocator
    }
}

impl<T: Pod> OwnedSlice<'_, T> {
    /// Raw bytes of the elements.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.as_slice())
    }
}

impl<T> Deref for OwnedSlice<'_, T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for OwnedSlice<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> Drop for OwnedSlice<'_, T> {
    fn drop(&mut self) {
        // SAFETY: every element is initialized and the placement is taken once.
        unsafe {
            destroy_reverse(self.ptr, self.len);
            ManuallyDrop::take(&mut self.placement).release(self.allocator);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for OwnedSlice<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedSlice")
            .field("allocator", &self.allocator.label())
            .field("elements", &self.as_slice())
            .finish()
    }
}
