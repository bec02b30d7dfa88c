//! Memory allocator traits, allocation accounting and the scoped allocation guard
//!
//! Every allocation in densolve goes through a client's [`Allocator`]. Allocators keep
//! an [`AllocStats`] so callers (and tests) can observe how many buffers are live and
//! how many bytes they hold, and can optionally refuse to grow past a byte capacity.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory allocator trait for runtime backends
pub trait Allocator: Clone + Send + Sync {
    /// Allocate memory of given size
    ///
    /// Returns a device pointer (u64). Zero-sized requests return the null pointer
    /// without touching the device or the accounting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfMemory`] if the device or the configured capacity cannot
    /// satisfy the request.
    fn allocate(&self, size_bytes: usize) -> Result<u64>;

    /// Deallocate memory previously returned by [`Allocator::allocate`]
    fn deallocate(&self, ptr: u64, size_bytes: usize);

    /// Total bytes currently allocated through this allocator
    fn allocated_bytes(&self) -> usize {
        0
    }

    /// Number of allocations currently live
    fn live_allocations(&self) -> usize {
        0
    }
}

/// Shared allocation accounting
///
/// Cloned allocators share one `AllocStats`, so the counters reflect every buffer
/// handed out by any clone of the same client.
#[derive(Clone, Debug, Default)]
pub struct AllocStats {
    inner: Arc<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    bytes: AtomicUsize,
    live: AtomicUsize,
    capacity: Option<usize>,
}

impl AllocStats {
    /// Accounting without a byte limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounting that refuses to hold more than `capacity` bytes at once
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(StatsInner {
                capacity: Some(capacity),
                ..Default::default()
            }),
        }
    }

    /// Reserve `size_bytes` against the capacity
    ///
    /// Must be paired with either [`AllocStats::record_release`] or
    /// [`AllocStats::cancel_reserve`].
    pub fn reserve(&self, size_bytes: usize) -> Result<()> {
        let inner = &self.inner;
        match inner.capacity {
            None => {
                inner.bytes.fetch_add(size_bytes, Ordering::AcqRel);
            }
            Some(capacity) => {
                inner
                    .bytes
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |held| {
                        held.checked_add(size_bytes).filter(|&total| total <= capacity)
                    })
                    .map_err(|_| Error::OutOfMemory { size: size_bytes })?;
            }
        }
        inner.live.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Undo a reservation whose device allocation then failed
    pub fn cancel_reserve(&self, size_bytes: usize) {
        self.record_release(size_bytes);
    }

    /// Record that a buffer of `size_bytes` was returned to the device
    pub fn record_release(&self, size_bytes: usize) {
        self.inner.bytes.fetch_sub(size_bytes, Ordering::AcqRel);
        self.inner.live.fetch_sub(1, Ordering::AcqRel);
    }

    /// Bytes currently held
    pub fn bytes(&self) -> usize {
        self.inner.bytes.load(Ordering::Acquire)
    }

    /// Buffers currently held
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Configured byte limit, if any
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }
}

/// Scoped device allocation
///
/// The buffer is returned to the allocator when the guard is dropped, unless ownership
/// was taken with [`AllocGuard::release`]. Error paths therefore free everything they
/// allocated simply by returning.
pub struct AllocGuard<A: Allocator> {
    allocator: A,
    ptr: u64,
    size: usize,
}

impl<A: Allocator> AllocGuard<A> {
    /// Allocate `size` bytes
    pub fn new(allocator: &A, size: usize) -> Result<Self> {
        let ptr = allocator.allocate(size)?;
        Ok(Self {
            allocator: allocator.clone(),
            ptr,
            size,
        })
    }

    /// Device pointer of the guarded buffer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    /// Size of the guarded buffer in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Give up ownership; the caller becomes responsible for deallocation
    pub fn release(mut self) -> u64 {
        std::mem::replace(&mut self.ptr, 0)
    }
}

impl<A: Allocator> Drop for AllocGuard<A> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            self.allocator.deallocate(self.ptr, self.size);
        }
    }
}
