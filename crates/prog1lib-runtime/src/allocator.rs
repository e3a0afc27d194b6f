//! Tracked allocator.
//!
//! Wraps the backing allocator and keeps the registry consistent:
//! - every block handed out has exactly one live record;
//! - a reallocated block is re-attributed to the reallocating site;
//! - releasing or reallocating an address without a live record is an
//!   `UntrackedPointer` error;
//! - a failed backing call leaves the registry untouched.
//!
//! The `try_*` operations return [`MemoryError`]. The plain operations treat
//! every error as fatal and route it through the termination controller, so
//! they never return null (except a zero-size reallocation under
//! [`ZeroSizeRealloc::Release`]).

#![allow(unsafe_code)]

use std::ptr::{self, NonNull};

use crate::config::ZeroSizeRealloc;
use crate::error::{MemoryError, Operation};
use crate::lifecycle::{LifecycleRecord, LogLevel};
use crate::runtime::Runtime;
use crate::site::Site;

/// Pointer types accepted as block handles.
pub trait BlockPtr {
    fn as_block_ptr(&self) -> *mut u8;
}

impl<T> BlockPtr for *mut T {
    fn as_block_ptr(&self) -> *mut u8 {
        self.cast()
    }
}

impl<T> BlockPtr for *const T {
    fn as_block_ptr(&self) -> *mut u8 {
        self.cast_mut().cast()
    }
}

impl<T> BlockPtr for NonNull<T> {
    fn as_block_ptr(&self) -> *mut u8 {
        self.as_ptr().cast()
    }
}

impl<T> BlockPtr for Option<NonNull<T>> {
    fn as_block_ptr(&self) -> *mut u8 {
        self.map_or(ptr::null_mut(), |block| block.as_ptr().cast())
    }
}

impl Runtime {
    fn note_error(&self, symbol: &str, event: &str, err: MemoryError) -> MemoryError {
        let record = match err {
            MemoryError::AllocationFailure { size, site } => {
                LifecycleRecord::new(LogLevel::Warn, symbol, event, "oom")
                    .with_size(size)
                    .with_site(site)
            }
            MemoryError::SizeOverflow { site, .. } => {
                LifecycleRecord::new(LogLevel::Warn, symbol, event, "overflow").with_site(site)
            }
            MemoryError::UntrackedPointer { address, .. } => {
                LifecycleRecord::new(LogLevel::Error, symbol, event, "untracked").with_ptr(address)
            }
            MemoryError::DuplicateRecord { address, site } => {
                LifecycleRecord::new(LogLevel::Error, symbol, event, "duplicate")
                    .with_ptr(address)
                    .with_site(site)
            }
        };
        self.log(record.with_details(err.to_string()).with_stats(self.stats()));
        err
    }

    fn track(
        &self,
        symbol: &str,
        block: NonNull<u8>,
        size: usize,
        site: Site,
    ) -> Result<NonNull<u8>, MemoryError> {
        let address = block.as_ptr() as usize;
        let (inserted, stats) = {
            let mut registry = self.registry.lock();
            let inserted = registry.insert(address, size, site);
            (inserted, registry.stats())
        };
        if inserted.is_err() {
            return Err(self.note_error(
                symbol,
                "alloc",
                MemoryError::DuplicateRecord { address, site },
            ));
        }
        self.log(
            LifecycleRecord::new(LogLevel::Trace, symbol, "alloc", "success")
                .with_ptr(address)
                .with_size(size)
                .with_site(site)
                .with_stats(stats),
        );
        Ok(block)
    }

    /// Allocate `size` bytes with unspecified contents.
    pub fn try_allocate(&self, size: usize, site: Site) -> Result<NonNull<u8>, MemoryError> {
        let Some(block) = self.backing.allocate(size) else {
            return Err(self.note_error(
                "allocate",
                "alloc",
                MemoryError::AllocationFailure { size, site },
            ));
        };
        self.track("allocate", block, size, site)
    }

    /// Allocate `count * size` zeroed bytes; an overflowing product is an error.
    pub fn try_allocate_zeroed(
        &self,
        count: usize,
        size: usize,
        site: Site,
    ) -> Result<NonNull<u8>, MemoryError> {
        let Some(total) = count.checked_mul(size) else {
            return Err(self.note_error(
                "allocate_zeroed",
                "alloc",
                MemoryError::SizeOverflow { count, size, site },
            ));
        };
        let Some(block) = self.backing.allocate_zeroed(total) else {
            return Err(self.note_error(
                "allocate_zeroed",
                "alloc",
                MemoryError::AllocationFailure { size: total, site },
            ));
        };
        self.track("allocate_zeroed", block, total, site)
    }

    /// Resize a tracked block and re-attribute it to `site`.
    ///
    /// A null `ptr` allocates. Returns null only for a zero-size request
    /// under [`ZeroSizeRealloc::Release`].
    pub fn try_reallocate(
        &self,
        ptr: impl BlockPtr,
        new_size: usize,
        site: Site,
    ) -> Result<*mut u8, MemoryError> {
        let Some(block) = NonNull::new(ptr.as_block_ptr()) else {
            return self.try_allocate(new_size, site).map(NonNull::as_ptr);
        };
        if new_size == 0 && self.config.zero_size_realloc == ZeroSizeRealloc::Release {
            self.release_block(block, Operation::Reallocate(site))?;
            return Ok(ptr::null_mut());
        }

        let address = block.as_ptr() as usize;
        let mut registry = self.registry.lock();
        let Some(old) = registry.get(address) else {
            drop(registry);
            return Err(self.note_error(
                "reallocate",
                "realloc",
                MemoryError::UntrackedPointer {
                    address,
                    operation: Operation::Reallocate(site),
                },
            ));
        };
        // SAFETY: the live record proves `block` came from this backing
        // allocator and currently spans `old.size` bytes.
        let resized = unsafe { self.backing.reallocate(block, old.size, new_size) };
        let Some(moved) = resized else {
            drop(registry);
            return Err(self.note_error(
                "reallocate",
                "realloc",
                MemoryError::AllocationFailure {
                    size: new_size,
                    site,
                },
            ));
        };
        let new_address = moved.as_ptr() as usize;
        let updated = registry.update(address, new_address, new_size, site);
        if updated.is_err() {
            // The backing allocator moved the block onto an address that is
            // still tracked. The old block is gone either way.
            let _ = registry.remove(address);
        }
        let stats = registry.stats();
        drop(registry);

        if updated.is_err() {
            return Err(self.note_error(
                "reallocate",
                "realloc",
                MemoryError::DuplicateRecord {
                    address: new_address,
                    site,
                },
            ));
        }
        self.log(
            LifecycleRecord::new(LogLevel::Trace, "reallocate", "realloc", "success")
                .with_ptr(new_address)
                .with_size(new_size)
                .with_site(site)
                .with_details(format!("from={address:#x};old_size={}", old.size))
                .with_stats(stats),
        );
        Ok(moved.as_ptr())
    }

    /// Release a tracked block. Null is a no-op.
    pub fn try_release(&self, ptr: impl BlockPtr) -> Result<(), MemoryError> {
        match NonNull::new(ptr.as_block_ptr()) {
            None => Ok(()),
            Some(block) => self.release_block(block, Operation::Release),
        }
    }

    fn release_block(&self, block: NonNull<u8>, operation: Operation) -> Result<(), MemoryError> {
        let symbol = match operation {
            Operation::Release => "release",
            Operation::Reallocate(_) => "reallocate",
        };
        let address = block.as_ptr() as usize;
        let mut registry = self.registry.lock();
        let Ok(record) = registry.remove(address) else {
            drop(registry);
            return Err(self.note_error(
                symbol,
                "free",
                MemoryError::UntrackedPointer { address, operation },
            ));
        };
        // SAFETY: the removed record proves `block` is a live block of this
        // backing allocator spanning `record.size` bytes. It is no longer
        // tracked, so no later release can reach it.
        unsafe { self.backing.release(block, record.size) };
        let stats = registry.stats();
        drop(registry);

        self.log(
            LifecycleRecord::new(LogLevel::Trace, symbol, "free", "success")
                .with_ptr(address)
                .with_size(record.size)
                .with_site(record.site)
                .with_stats(stats),
        );
        Ok(())
    }

    /// Report `err` and terminate with the failure status.
    #[cold]
    pub fn fail(&self, err: MemoryError) -> ! {
        self.fatal(err.kind(), &err.to_string())
    }

    /// Allocate `size` bytes; terminates on failure.
    pub fn allocate(&self, size: usize, site: Site) -> NonNull<u8> {
        match self.try_allocate(size, site) {
            Ok(block) => block,
            Err(err) => self.fail(err),
        }
    }

    /// Allocate `count * size` zeroed bytes; terminates on failure or overflow.
    pub fn allocate_zeroed(&self, count: usize, size: usize, site: Site) -> NonNull<u8> {
        match self.try_allocate_zeroed(count, size, site) {
            Ok(block) => block,
            Err(err) => self.fail(err),
        }
    }

    /// Resize a tracked block; terminates on an untracked pointer or failure.
    pub fn reallocate(&self, ptr: impl BlockPtr, new_size: usize, site: Site) -> *mut u8 {
        match self.try_reallocate(ptr, new_size, site) {
            Ok(block) => block,
            Err(err) => self.fail(err),
        }
    }

    /// Release a tracked block; terminates on an untracked pointer.
    pub fn release(&self, ptr: impl BlockPtr) {
        if let Err(err) = self.try_release(ptr) {
            self.fail(err);
        }
    }
}
