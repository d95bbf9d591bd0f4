//! # Alignment Layer
//!
//! Satisfies power-of-two alignment requests on top of any allocator's
//! unaligned primitive.
//!
//! ```text
//!   reserve(n + A)
//!   ┌─────────┬───────────────────────────────┬──────────┐
//!   │ padding │ n bytes handed to the caller  │  slack   │
//!   └─────────┴───────────────────────────────┴──────────┘
//!   ▲         ▲
//!   base      aligned (multiple of A)
//! ```
//!
//! The base block travels with the aligned pointer, so releasing never has
//! to read bookkeeping out of the padding.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::error::MemoryResult;

use super::allocator::{Allocator, Block, BlockRequest};

/// A power-of-two alignment strictly greater than one.
///
/// Building one from an invalid value is a programming error. In a `const`
/// context it fails at compile time:
///
/// ```
/// use gled_core::memory::Alignment;
///
/// const SIMD: Alignment = Alignment::new(16);
/// assert_eq!(SIMD.get(), 16);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alignment(usize);

impl Alignment {
    /// Wraps `value`.
    ///
    /// # Panics
    ///
    /// Panics if `value` is not a power of two greater than one.
    #[must_use]
    pub const fn new(value: usize) -> Self {
        assert!(
            value > 1 && value.is_power_of_two(),
            "alignment must be a power of two greater than 1"
        );
        Self(value)
    }

    /// Wraps `value` if it is a power of two greater than one.
    #[must_use]
    pub const fn try_new(value: usize) -> Option<Self> {
        if value > 1 && value.is_power_of_two() {
            Some(Self(value))
        } else {
            None
        }
    }

    /// The alignment `T` requires, or `None` when any address will do.
    #[must_use]
    pub const fn of<T>() -> Option<Self> {
        Self::try_new(std::mem::align_of::<T>())
    }

    /// The raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Bytes needed to round `address` up to this alignment.
    #[inline]
    #[must_use]
    pub const fn padding_for(self, address: usize) -> usize {
        let mask = self.0 - 1;
        (self.0 - (address & mask)) & mask
    }
}

/// A block whose start satisfies an [`Alignment`].
///
/// Carries the original unaligned block it was carved from.
#[derive(Debug)]
pub struct AlignedBlock {
    ptr: NonNull<u8>,
    alignment: Alignment,
    base: Block,
}

// SAFETY: like `Block`, this is an address plus bookkeeping.
unsafe impl Send for AlignedBlock {}
// SAFETY: see above.
unsafe impl Sync for AlignedBlock {}

impl AlignedBlock {
    /// Aligned start handed to the caller.
    #[inline]
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Aligned start as a non-null pointer.
    #[inline]
    #[must_use]
    pub fn as_non_null(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Numeric address of the aligned start.
    #[inline]
    #[must_use]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Bytes usable from the aligned start.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.base.len()
    }

    /// Whether the caller asked for zero bytes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// The alignment this block satisfies.
    #[inline]
    #[must_use]
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Bytes skipped between the base and the aligned start.
    #[inline]
    #[must_use]
    pub fn padding(&self) -> usize {
        self.address() - self.base.address()
    }

    /// The original unaligned block.
    #[inline]
    #[must_use]
    pub fn base(&self) -> &Block {
        &self.base
    }

    /// Gives up the aligned view, returning the block to release.
    #[inline]
    #[must_use]
    pub fn into_base(self) -> Block {
        self.base
    }
}

/// Reserves `request` plus `alignment` bytes and rounds the start up.
///
/// Only `request.requested()` is recorded in the allocator's statistics.
///
/// # Errors
///
/// Propagates the allocator's error, or [`crate::MemoryError::SizeOverflow`]
/// if the padded size overflows.
pub fn allocate_aligned<A>(
    allocator: &A,
    request: BlockRequest,
    alignment: Alignment,
) -> MemoryResult<AlignedBlock>
where
    A: Allocator + ?Sized,
{
    let base = allocator.reserve(request.padded(alignment.get())?)?;
    let padding = alignment.padding_for(base.address());

    // SAFETY: padding < alignment and the block reserved `alignment` extra
    // bytes, so the aligned start and `requested` bytes after it are inside it.
    let ptr = unsafe { NonNull::new_unchecked(base.as_ptr().add(padding)) };

    tracing::trace!(
        allocator = allocator.label(),
        bytes = request.requested(),
        alignment = alignment.get(),
        padding,
        "aligned allocation"
    );

    Ok(AlignedBlock {
        ptr,
        alignment,
        base,
    })
}
