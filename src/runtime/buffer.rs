//! Typed, call-scoped device buffers

use super::{AllocGuard, Runtime, RuntimeClient};
use crate::dtype::Element;
use crate::error::Result;
use crate::tensor::Storage;
use std::marker::PhantomData;
use tracing::trace;

/// A device allocation of `len` elements of `T`
///
/// The memory is freed when the buffer is dropped unless it was handed over to a
/// tensor with [`DeviceBuffer::into_storage`].
pub struct DeviceBuffer<R: Runtime, T: Element> {
    guard: AllocGuard<R::Allocator>,
    len: usize,
    _marker: PhantomData<fn() -> (R, T)>,
}

impl<R: Runtime, T: Element> DeviceBuffer<R, T> {
    /// Allocate an uninitialized buffer of `len` elements
    pub fn new(client: &R::Client, len: usize) -> Result<Self> {
        let guard = AllocGuard::new(client.allocator(), len * std::mem::size_of::<T>())?;
        trace!(ptr = guard.ptr(), len, dtype = %T::DTYPE, "device buffer allocated");
        Ok(Self {
            guard,
            len,
            _marker: PhantomData,
        })
    }

    /// Allocate a buffer and upload `data` into it
    pub fn from_host(client: &R::Client, data: &[T]) -> Result<Self> {
        let buffer = Self::new(client, data.len())?;
        client.copy_to_device(bytemuck::cast_slice(data), buffer.ptr())?;
        Ok(buffer)
    }

    /// Device pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.guard.ptr()
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.guard.size()
    }

    /// Download the buffer contents
    pub fn to_host(&self, client: &R::Client) -> Result<Vec<T>> {
        let mut host = vec![T::zero(); self.len];
        client.copy_from_device(self.ptr(), bytemuck::cast_slice_mut(&mut host))?;
        Ok(host)
    }

    /// Copy the first `len` elements of `self` into `dst`
    pub fn copy_prefix_to(&self, client: &R::Client, dst: &Self, len: usize) -> Result<()> {
        debug_assert!(len <= self.len && len <= dst.len);
        client.copy_within_device(self.ptr(), dst.ptr(), len * std::mem::size_of::<T>())
    }

    /// Hand the allocation over to tensor storage
    pub fn into_storage(self, client: &R::Client) -> Storage<R> {
        let len = self.len;
        let ptr = self.guard.release();
        // SAFETY: the pointer came from `client`'s allocator for exactly this many bytes
        // and the guard no longer owns it.
        unsafe { Storage::from_owned_ptr(ptr, len, T::DTYPE, client) }
    }
}

impl<R: Runtime, T: Element> std::fmt::Debug for DeviceBuffer<R, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("ptr", &format!("0x{:x}", self.ptr()))
            .field("len", &self.len)
            .field("dtype", &T::DTYPE)
            .finish()
    }
}
