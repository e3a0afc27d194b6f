//! Underlying general-purpose allocator.
//!
//! The tracked allocator treats the backing allocator as a black box: it asks
//! for blocks, resizes and frees them, and never looks at placement. The
//! default is the C heap via `libc`; [`BudgetBacking`] caps the bytes handed
//! out so exhaustion can be provoked deterministically.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Raw block provider behind the tracked allocator.
///
/// Zero-byte requests must still produce a unique, releasable block.
pub trait BackingAllocator: Send + Sync {
    /// Allocate `size` bytes with unspecified contents.
    fn allocate(&self, size: usize) -> Option<NonNull<u8>>;

    /// Allocate `size` zeroed bytes.
    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>>;

    /// Resize a block. On `None` the original block is untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block obtained from this allocator whose current
    /// size is `old_size`.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>>;

    /// Return a block.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live block obtained from this allocator whose current
    /// size is `size`; it must not be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

/// The C heap (`malloc`/`calloc`/`realloc`/`free`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcBacking;

impl BackingAllocator for LibcBacking {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: malloc accepts any size; a null return is mapped to None.
        let ptr = unsafe { libc::malloc(size.max(1)) };
        NonNull::new(ptr.cast::<u8>())
    }

    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        // SAFETY: calloc accepts any size; a null return is mapped to None.
        let ptr = unsafe { libc::calloc(1, size.max(1)) };
        NonNull::new(ptr.cast::<u8>())
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        _old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        // SAFETY: caller guarantees ptr came from malloc/calloc/realloc and is
        // live. realloc leaves the block untouched when it returns null.
        let moved = unsafe { libc::realloc(ptr.as_ptr().cast(), new_size.max(1)) };
        NonNull::new(moved.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>, _size: usize) {
        // SAFETY: caller guarantees ptr is a live block from this allocator.
        unsafe { libc::free(ptr.as_ptr().cast()) };
    }
}

/// Backing allocator that refuses requests once `budget` bytes are in use.
#[derive(Debug)]
pub struct BudgetBacking {
    inner: LibcBacking,
    budget: usize,
    in_use: AtomicUsize,
}

impl BudgetBacking {
    #[must_use]
    pub fn new(budget: usize) -> Self {
        Self {
            inner: LibcBacking,
            budget,
            in_use: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    fn claim(&self, size: usize) -> bool {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(size).filter(|&next| next <= self.budget)
            })
            .is_ok()
    }

    fn unclaim(&self, size: usize) {
        self.in_use.fetch_sub(size, Ordering::AcqRel);
    }
}

impl BackingAllocator for BudgetBacking {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        if !self.claim(size) {
            return None;
        }
        let ptr = self.inner.allocate(size);
        if ptr.is_none() {
            self.unclaim(size);
        }
        ptr
    }

    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        if !self.claim(size) {
            return None;
        }
        let ptr = self.inner.allocate_zeroed(size);
        if ptr.is_none() {
            self.unclaim(size);
        }
        ptr
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        if new_size > old_size && !self.claim(new_size - old_size) {
            return None;
        }
        // SAFETY: forwarded caller contract.
        let moved = unsafe { self.inner.reallocate(ptr, old_size, new_size) };
        match moved {
            Some(_) if new_size < old_size => self.unclaim(old_size - new_size),
            None if new_size > old_size => self.unclaim(new_size - old_size),
            _ => {}
        }
        moved
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.release(ptr, size) };
        self.unclaim(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn libc_zeroed_block_is_zero() {
        let backing = LibcBacking;
        let ptr = backing.allocate_zeroed(64).expect("calloc");
        // SAFETY: ptr is valid for 64 bytes.
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 64) };
        assert!(bytes.iter().all(|&b| b == 0));
        // SAFETY: ptr is live and from this backing.
        unsafe { backing.release(ptr, 64) };
    }

    #[test]
    fn libc_zero_size_yields_releasable_block() {
        let backing = LibcBacking;
        let ptr = backing.allocate(0).expect("malloc(0) is bumped to one byte");
        // SAFETY: ptr is live and from this backing.
        unsafe { backing.release(ptr, 0) };
    }

    #[test]
    fn budget_refuses_beyond_limit_and_recovers_after_release() {
        let backing = BudgetBacking::new(100);
        let a = backing.allocate(60).expect("within budget");
        assert!(backing.allocate(60).is_none(), "120 > 100");
        assert_eq!(backing.in_use(), 60);

        // SAFETY: a is live with size 60.
        unsafe { backing.release(a, 60) };
        assert_eq!(backing.in_use(), 0);
        let b = backing.allocate(100).expect("budget restored");
        // SAFETY: b is live with size 100.
        unsafe { backing.release(b, 100) };
    }

    #[test]
    fn budget_failed_grow_keeps_block_and_accounting() {
        let backing = BudgetBacking::new(64);
        let ptr = backing.allocate(32).expect("alloc");
        // SAFETY: ptr is live with size 32.
        let grown = unsafe { backing.reallocate(ptr, 32, 128) };
        assert!(grown.is_none());
        assert_eq!(backing.in_use(), 32);

        // SAFETY: ptr is still live with size 32.
        let shrunk = unsafe { backing.reallocate(ptr, 32, 8) }.expect("shrink");
        assert_eq!(backing.in_use(), 8);
        // SAFETY: shrunk is live with size 8.
        unsafe { backing.release(shrunk, 8) };
        assert_eq!(backing.in_use(), 0);
    }
}
