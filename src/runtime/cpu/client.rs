//! CPU client and allocator implementation

use super::device::CpuDevice;
use super::runtime::CpuRuntime;
use crate::algorithm::linalg::LinalgConfig;
use crate::error::{Error, Result};
use crate::runtime::{AllocStats, Allocator, RuntimeClient};
use std::alloc::{Layout as AllocLayout, alloc_zeroed, dealloc};
use std::sync::Arc;
use tracing::trace;

/// Alignment of every CPU allocation (AVX-512)
const CPU_ALIGN: usize = 64;

/// CPU execution context
///
/// Clones share the allocator (and its accounting) and the configuration.
#[derive(Clone, Debug)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
    allocator: CpuAllocator,
    config: Arc<LinalgConfig>,
}

impl CpuClient {
    /// Create a new CPU client with the default configuration
    pub fn new(device: CpuDevice) -> Self {
        Self {
            device,
            allocator: CpuAllocator::new(AllocStats::new()),
            config: Arc::new(LinalgConfig::default()),
        }
    }

    /// Create a CPU client with the given decomposition settings
    pub fn with_config(config: LinalgConfig) -> Self {
        Self {
            config: Arc::new(config),
            ..Self::default()
        }
    }

    /// Create a CPU client whose allocator holds at most `capacity_bytes` at once
    ///
    /// Allocations past the limit fail with [`Error::OutOfMemory`].
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        Self {
            allocator: CpuAllocator::new(AllocStats::with_capacity(capacity_bytes)),
            ..Self::default()
        }
    }
}

impl Default for CpuClient {
    fn default() -> Self {
        Self::new(CpuDevice::new())
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // CPU operations are synchronous, nothing to do
        Ok(())
    }

    fn allocator(&self) -> &CpuAllocator {
        &self.allocator
    }

    fn config(&self) -> &LinalgConfig {
        &self.config
    }

    fn copy_to_device(&self, src: &[u8], dst: u64) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst as *mut u8, src.len());
        }
        Ok(())
    }

    fn copy_from_device(&self, src: u64, dst: &mut [u8]) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }
        unsafe {
            std::ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    fn copy_within_device(&self, src: u64, dst: u64, size_bytes: usize) -> Result<()> {
        if size_bytes == 0 || src == 0 || dst == 0 {
            return Ok(());
        }
        unsafe {
            // Use copy (not copy_nonoverlapping) in case src and dst overlap
            std::ptr::copy(src as *const u8, dst as *mut u8, size_bytes);
        }
        Ok(())
    }
}

/// Heap allocator with allocation accounting and an optional byte limit
#[derive(Clone, Debug)]
pub struct CpuAllocator {
    stats: AllocStats,
}

impl CpuAllocator {
    fn new(stats: AllocStats) -> Self {
        Self { stats }
    }

    /// Allocation accounting shared by all clones of this allocator
    pub fn stats(&self) -> &AllocStats {
        &self.stats
    }

    fn layout(size: usize) -> Result<AllocLayout> {
        AllocLayout::from_size_align(size, CPU_ALIGN).map_err(|e| Error::InvalidArgument {
            arg: "size_bytes",
            reason: e.to_string(),
        })
    }
}

impl Allocator for CpuAllocator {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }
        let layout = Self::layout(size_bytes)?;
        self.stats.reserve(size_bytes)?;

        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            self.stats.cancel_reserve(size_bytes);
            return Err(Error::OutOfMemory { size: size_bytes });
        }

        trace!(
            ptr = ptr as u64,
            size_bytes,
            live = self.stats.live(),
            "cpu allocate"
        );
        Ok(ptr as u64)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        if ptr == 0 || size_bytes == 0 {
            return;
        }
        // The layout was valid when the block was allocated.
        let Ok(layout) = Self::layout(size_bytes) else {
            return;
        };
        unsafe {
            dealloc(ptr as *mut u8, layout);
        }
        self.stats.record_release(size_bytes);
        trace!(ptr, size_bytes, live = self.stats.live(), "cpu deallocate");
    }

    fn allocated_bytes(&self) -> usize {
        self.stats.bytes()
    }

    fn live_allocations(&self) -> usize {
        self.stats.live()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_accounting() {
        let client = CpuClient::default();
        let allocator = client.allocator();
        let ptr = allocator.allocate(128).unwrap();
        assert_ne!(ptr, 0);
        assert_eq!(ptr % CPU_ALIGN as u64, 0);
        assert_eq!(allocator.live_allocations(), 1);
        assert_eq!(allocator.allocated_bytes(), 128);
        allocator.deallocate(ptr, 128);
        assert_eq!(allocator.live_allocations(), 0);
        assert_eq!(allocator.allocated_bytes(), 0);
    }

    #[test]
    fn test_zero_sized_allocation_is_free() {
        let client = CpuClient::default();
        assert_eq!(client.allocator().allocate(0).unwrap(), 0);
        assert_eq!(client.allocator().live_allocations(), 0);
    }

    #[test]
    fn test_capacity_limit() {
        let client = CpuClient::with_capacity(256);
        let allocator = client.allocator();
        let first = allocator.allocate(200).unwrap();
        assert!(matches!(
            allocator.allocate(100),
            Err(Error::OutOfMemory { size: 100 })
        ));
        assert_eq!(allocator.live_allocations(), 1);
        allocator.deallocate(first, 200);
        let second = allocator.allocate(100).unwrap();
        allocator.deallocate(second, 100);
    }

    #[test]
    fn test_clones_share_accounting() {
        let client = CpuClient::default();
        let other = client.clone();
        let ptr = client.allocator().allocate(8).unwrap();
        assert_eq!(other.allocator().live_allocations(), 1);
        other.allocator().deallocate(ptr, 8);
        assert_eq!(client.allocator().live_allocations(), 0);
    }

    #[test]
    fn test_copies_round_trip() {
        let client = CpuClient::default();
        let ptr = client.allocator().allocate(4).unwrap();
        client.copy_to_device(&[1, 2, 3, 4], ptr).unwrap();
        let mut out = [0u8; 4];
        client.copy_from_device(ptr, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4]);
        client.allocator().deallocate(ptr, 4);
    }
}
