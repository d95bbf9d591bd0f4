//! # Shared Objects
//!
//! Reference-counted objects whose counter lives next to the value inside
//! the allocator block. The last handle to drop destroys the value and
//! releases the block.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::atomic::{self, AtomicUsize, Ordering};

use crate::error::MemoryResult;

use super::allocator::Allocator;
use super::owned::Placement;

/// Upper bound on the reference count before we abort rather than wrap.
const MAX_REFCOUNT: usize = usize::MAX >> 1;

struct SharedInner<'a, T> {
    count: AtomicUsize,
    placement: Placement,
    allocator: &'a dyn Allocator,
    value: T,
}

/// A thread-safe reference-counted object living in an allocator's memory.
///
/// Cloning bumps the counter; the destroy step runs exactly once, when the
/// last clone drops.
///
/// # Example
///
/// ```rust
/// use gled_core::memory::{Allocator, HeapAllocator, Shared};
///
/// let system = HeapAllocator::new(1 << 16);
/// let a = Shared::new_in(String::from("renderer"), &system).unwrap();
/// let b = a.clone();
/// assert_eq!(Shared::strong_count(&a), 2);
///
/// drop(a);
/// assert_eq!(system.live_objects(), 1);
/// drop(b);
/// assert_eq!(system.live_objects(), 0);
/// ```
pub struct Shared<'a, T> {
    inner: NonNull<SharedInner<'a, T>>,
    _owns: PhantomData<SharedInner<'a, T>>,
}

// SAFETY: same bounds as `Arc`: the value may be dropped on any thread that
// holds a clone and is reachable from all of them.
unsafe impl<T: Send + Sync> Send for Shared<'_, T> {}
// SAFETY: see above.
unsafe impl<T: Send + Sync> Sync for Shared<'_, T> {}

impl<'a, T> Shared<'a, T> {
    /// Moves `value` into storage carved from `allocator` with a count of one.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if the storage cannot be reserved.
    pub fn new_in(value: T, allocator: &'a dyn Allocator) -> MemoryResult<Self> {
        let placement = Placement::reserve::<SharedInner<'a, T>>(allocator, 1)?;
        let inner = placement.as_non_null().cast::<SharedInner<'a, T>>();
        // SAFETY: the placement holds room for one aligned `SharedInner`.
        unsafe {
            inner.as_ptr().write(SharedInner {
                count: AtomicUsize::new(1),
                placement,
                allocator,
                value,
            });
        }

        Ok(Self {
            inner,
            _owns: PhantomData,
        })
    }

    fn inner(&self) -> &SharedInner<'a, T> {
        // SAFETY: the inner block stays initialized while any handle exists.
        unsafe { self.inner.as_ref() }
    }

    /// Number of handles pointing at the value.
    #[must_use]
    pub fn strong_count(this: &Self) -> usize {
        this.inner().count.load(Ordering::Acquire)
    }

    /// Whether both handles point at the same value.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.inner == b.inner
    }

    /// The allocator holding the value.
    #[must_use]
    pub fn allocator(this: &Self) -> &'a dyn Allocator {
        this.inner().allocator
    }
}

impl<T> Clone for Shared<'_, T> {
    fn clone(&self) -> Self {
        let previous = self.inner().count.fetch_add(1, Ordering::Relaxed);
        if previous > MAX_REFCOUNT {
            std::process::abort();
        }
        Self {
            inner: self.inner,
            _owns: PhantomData,
        }
    }
}

impl<T> Deref for Shared<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.inner().value
    }
}

impl<T> Drop for Shared<'_, T> {
    fn drop(&mut self) {
        if self.inner().count.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        atomic::fence(Ordering::Acquire);

        let inner = self.inner.as_ptr();
        // SAFETY: this was the last handle. The value is dropped once, then the
        // bookkeeping is moved out of the block before the block goes back.
        unsafe {
            ptr::drop_in_place(ptr::addr_of_mut!((*inner).value));
            let placement = ptr::read(ptr::addr_of!((*inner).placement));
            let allocator = (*inner).allocator;
            placement.release(allocator);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("allocator", &self.inner().allocator.label())
            .field("count", &Shared::strong_count(self))
            .field("value", &**self)
            .finish()
    }
}
