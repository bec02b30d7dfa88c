//! Storage: device memory management with Arc-based sharing

use crate::dtype::{DType, Element};
use crate::error::Result;
use crate::runtime::{Allocator, Runtime, RuntimeClient};
use std::sync::Arc;

/// Storage for tensor data on a device
///
/// Storage wraps device memory with reference counting, enabling zero-copy
/// views (transpose) that share the underlying buffer.
///
/// Each storage keeps a handle to the client that allocated it. Memory is returned to
/// that client's allocator when the last reference is dropped.
pub struct Storage<R: Runtime> {
    inner: Arc<StorageInner<R>>,
}

struct StorageInner<R: Runtime> {
    /// Raw device pointer (GPU address or CPU ptr cast to u64)
    ptr: u64,
    /// Number of elements (not bytes)
    len: usize,
    /// Element type
    dtype: DType,
    /// Client whose allocator owns the memory
    client: R::Client,
}

impl<R: Runtime> Storage<R> {
    /// Create new storage with allocated memory
    ///
    /// Allocates `len` elements of type `dtype` through the client's allocator.
    pub fn new(len: usize, dtype: DType, client: &R::Client) -> Result<Self> {
        let ptr = client.allocator().allocate(len * dtype.size_in_bytes())?;
        Ok(Self::from_parts(ptr, len, dtype, client))
    }

    /// Create storage from existing host data with inferred dtype
    pub fn from_slice<T: Element>(data: &[T], client: &R::Client) -> Result<Self> {
        let storage = Self::new(data.len(), T::DTYPE, client)?;
        // On copy failure `storage` drops here and frees the allocation.
        client.copy_to_device(bytemuck::cast_slice(data), storage.ptr())?;
        Ok(storage)
    }

    /// Take ownership of device memory allocated by `client`'s allocator
    ///
    /// # Safety
    /// - `ptr` must have been returned by `client.allocator().allocate` for exactly
    ///   `len * dtype.size_in_bytes()` bytes
    /// - No one else may deallocate it
    pub unsafe fn from_owned_ptr(ptr: u64, len: usize, dtype: DType, client: &R::Client) -> Self {
        Self::from_parts(ptr, len, dtype, client)
    }

    fn from_parts(ptr: u64, len: usize, dtype: DType, client: &R::Client) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                ptr,
                len,
                dtype,
                client: client.clone(),
            }),
        }
    }

    /// Get the raw device pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Get the number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Check if storage is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    /// Get the owning client
    #[inline]
    pub fn client(&self) -> &R::Client {
        &self.inner.client
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.inner.client.device()
    }

    /// Get size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.len * self.inner.dtype.size_in_bytes()
    }

    /// Get the reference count
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Copy the whole buffer from device to host
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Result<Vec<T>> {
        // Allocate with correct alignment for T, then cast to bytes for copy.
        let mut result = vec![T::zeroed(); self.size_in_bytes() / std::mem::size_of::<T>()];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        self.inner.client.copy_from_device(self.inner.ptr, bytes)?;
        Ok(result)
    }
}

impl<R: Runtime> Clone for Storage<R> {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runtime> Drop for StorageInner<R> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            self.client
                .allocator()
                .deallocate(self.ptr, self.len * self.dtype.size_in_bytes());
        }
    }
}

impl<R: Runtime> std::fmt::Debug for Storage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ptr", &format!("0x{:x}", self.inner.ptr))
            .field("len", &self.inner.len)
            .field("dtype", &self.inner.dtype)
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuClient;

    #[test]
    fn test_storage_frees_on_last_drop() {
        let client = CpuClient::default();
        let storage = Storage::<crate::runtime::cpu::CpuRuntime>::from_slice(&[1.0f64, 2.0], &client)
            .unwrap();
        let view = storage.clone();
        assert_eq!(storage.ref_count(), 2);
        assert_eq!(client.allocator().live_allocations(), 1);
        drop(storage);
        assert_eq!(client.allocator().live_allocations(), 1);
        assert_eq!(view.to_vec::<f64>().unwrap(), [1.0, 2.0]);
        drop(view);
        assert_eq!(client.allocator().live_allocations(), 0);
    }
}
