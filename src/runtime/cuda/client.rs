//! CUDA Client implementation
//!
//! CudaClient owns the context, one stream, and the cuSOLVER dense handle bound to
//! that stream.
//!
//! # Thread Safety
//!
//! `CudaClient` is `Clone` and can be shared across threads. The context, stream and
//! handle are reference-counted via `Arc`; the cuSOLVER handle is locked for the
//! duration of each solver call. Raw driver calls bind the context to the calling
//! thread first.

use cudarc::cusolver::safe::DnHandle;
use cudarc::driver::safe::{CudaContext, CudaStream};
use cudarc::driver::sys::{self as driver_sys, CUresult};
use parking_lot::Mutex;
use std::ffi::c_void;
use std::sync::Arc;
use tracing::{trace, warn};

use super::CudaRuntime;
use super::device::CudaDevice;
use crate::algorithm::linalg::LinalgConfig;
use crate::error::{Error, Result};
use crate::runtime::{AllocStats, Allocator, RuntimeClient};

/// Check if the CUDA context on the current thread is valid.
///
/// # Safety
///
/// This function calls CUDA driver API directly.
#[inline]
unsafe fn is_cuda_context_valid() -> bool {
    let mut ctx: driver_sys::CUcontext = std::ptr::null_mut();
    // SAFETY: cuCtxGetCurrent is safe to call at any time and writes to the provided pointer.
    let result = unsafe { driver_sys::cuCtxGetCurrent(&mut ctx) };
    result == CUresult::CUDA_SUCCESS && !ctx.is_null()
}

fn check(operation: &str, bytes: usize, result: CUresult) -> Result<()> {
    if result == CUresult::CUDA_SUCCESS {
        Ok(())
    } else {
        Err(Error::Backend(format!(
            "{operation} failed: {bytes} bytes ({result:?})"
        )))
    }
}

/// CUDA Runtime Client
///
/// All device work of a decomposition (copies, solver calls, stream-ordered frees)
/// is queued on `self.stream`, so it executes in call order.
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device index
    pub(crate) device: CudaDevice,

    /// CUDA context for this device
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all work launches
    pub(crate) stream: Arc<CudaStream>,

    /// cuSOLVER dense handle bound to `stream`
    pub(crate) solver: Arc<Mutex<DnHandle>>,

    /// Stream-ordered allocator
    pub(crate) allocator: CudaAllocator,

    config: Arc<LinalgConfig>,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CudaClient {
    /// Create a new CUDA client for a device.
    ///
    /// This initializes the CUDA context, creates a stream, and sets up cuSOLVER.
    ///
    /// # Errors
    ///
    /// Returns an error if context creation (e.g. invalid device ID), stream creation
    /// or cuSOLVER initialization fails.
    pub fn new(device: CudaDevice) -> Result<Self> {
        let context = CudaContext::new(device.index)?;
        context.bind_to_thread()?;
        let stream = context.new_stream()?;
        let solver = Self::solver_handle(&stream)?;
        let allocator = CudaAllocator {
            stream: stream.clone(),
            stats: AllocStats::new(),
        };

        Ok(Self {
            device,
            context,
            stream,
            solver,
            allocator,
            config: Arc::new(LinalgConfig::default()),
        })
    }

    fn solver_handle(stream: &Arc<CudaStream>) -> Result<Arc<Mutex<DnHandle>>> {
        let handle = DnHandle::new(stream.clone())
            .map_err(|e| Error::Backend(format!("failed to initialize cuSOLVER: {e:?}")))?;
        Ok(Arc::new(Mutex::new(handle)))
    }

    /// Replace the decomposition settings of this client
    pub fn with_config(mut self, config: LinalgConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    /// Client on a new stream of the same context, with its own cuSOLVER handle
    ///
    /// Decompositions on the returned client run independently of this one. Both
    /// share allocation accounting and settings.
    pub fn fork_stream(&self) -> Result<Self> {
        self.context.bind_to_thread()?;
        let stream = self.context.new_stream()?;
        let solver = Self::solver_handle(&stream)?;
        Ok(Self {
            device: self.device.clone(),
            context: self.context.clone(),
            allocator: CudaAllocator {
                stream: stream.clone(),
                stats: self.allocator.stats.clone(),
            },
            stream,
            solver,
            config: self.config.clone(),
        })
    }

    /// Get reference to the CUDA stream.
    #[inline]
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    /// Get reference to the CUDA context.
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize()?;
        Ok(())
    }

    fn allocator(&self) -> &CudaAllocator {
        &self.allocator
    }

    fn config(&self) -> &LinalgConfig {
        &self.config
    }

    fn copy_to_device(&self, src: &[u8], dst: u64) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }
        self.context.bind_to_thread()?;
        // SAFETY: `dst` is a device allocation of at least `src.len()` bytes; the stream
        // is synchronized before `src` can go out of scope.
        let result = unsafe {
            driver_sys::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const c_void,
                src.len(),
                self.stream.cu_stream(),
            )
        };
        check("cuMemcpyHtoDAsync", src.len(), result)?;
        self.synchronize()
    }

    fn copy_from_device(&self, src: u64, dst: &mut [u8]) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }
        self.context.bind_to_thread()?;
        // SAFETY: `src` is a device allocation of at least `dst.len()` bytes; the stream
        // is synchronized before `dst` is read.
        let result = unsafe {
            driver_sys::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut c_void,
                src,
                dst.len(),
                self.stream.cu_stream(),
            )
        };
        check("cuMemcpyDtoHAsync", dst.len(), result)?;
        self.synchronize()
    }

    fn copy_within_device(&self, src: u64, dst: u64, size_bytes: usize) -> Result<()> {
        if size_bytes == 0 || src == 0 || dst == 0 {
            return Ok(());
        }
        self.context.bind_to_thread()?;
        // SAFETY: both pointers are device allocations of at least `size_bytes` bytes.
        let result = unsafe {
            driver_sys::cuMemcpyDtoDAsync_v2(dst, src, size_bytes, self.stream.cu_stream())
        };
        check("cuMemcpyDtoDAsync", size_bytes, result)
    }
}

/// CUDA allocator that uses stream-ordered allocation.
///
/// This allocator uses `cuMemAllocAsync` and `cuMemFreeAsync` on the client's stream,
/// so frees are ordered after the work that uses the memory.
#[derive(Clone)]
pub struct CudaAllocator {
    stream: Arc<CudaStream>,
    stats: AllocStats,
}

impl CudaAllocator {
    /// Allocation accounting shared by all clones of this allocator
    pub fn stats(&self) -> &AllocStats {
        &self.stats
    }

    /// # Safety
    ///
    /// Calls the CUDA driver directly; the stream's context must be current.
    unsafe fn alloc_async(&self, size_bytes: usize) -> std::result::Result<u64, CUresult> {
        let mut ptr: u64 = 0;
        // SAFETY: `ptr` is a valid out-pointer and the stream belongs to the current context.
        let result =
            unsafe { driver_sys::cuMemAllocAsync(&mut ptr, size_bytes, self.stream.cu_stream()) };
        if result == CUresult::CUDA_SUCCESS {
            Ok(ptr)
        } else {
            Err(result)
        }
    }
}

impl Allocator for CudaAllocator {
    /// Allocate GPU memory using stream-ordered allocation.
    ///
    /// Returns `Err(OutOfMemory)` if CUDA memory allocation fails after flushing the
    /// stream's pending frees.
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }
        self.stats.reserve(size_bytes)?;
        if let Err(e) = self.stream.context().bind_to_thread() {
            self.stats.cancel_reserve(size_bytes);
            return Err(e.into());
        }

        // SAFETY: the stream's context was bound above.
        let first = unsafe { self.alloc_async(size_bytes) };
        let ptr = match first {
            Ok(ptr) => ptr,
            Err(_) => {
                // Flush pending frees and try once more
                let _ = self.stream.synchronize();
                // SAFETY: as above.
                match unsafe { self.alloc_async(size_bytes) } {
                    Ok(ptr) => ptr,
                    Err(result) => {
                        self.stats.cancel_reserve(size_bytes);
                        warn!(size_bytes, ?result, "cuMemAllocAsync failed");
                        return Err(Error::OutOfMemory { size: size_bytes });
                    }
                }
            }
        };

        trace!(ptr, size_bytes, live = self.stats.live(), "cuda allocate");
        Ok(ptr)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        if ptr == 0 {
            return;
        }
        self.stats.record_release(size_bytes);

        // SAFETY: only queries the current context.
        if !unsafe { is_cuda_context_valid() } {
            // Context is gone - memory was reclaimed with it
            return;
        }
        // SAFETY: `ptr` came from `cuMemAllocAsync` on this stream and is freed once.
        let result = unsafe { driver_sys::cuMemFreeAsync(ptr, self.stream.cu_stream()) };
        if result != CUresult::CUDA_SUCCESS && result != CUresult::CUDA_ERROR_ILLEGAL_ADDRESS {
            warn!(ptr, ?result, "cuMemFreeAsync failed");
        }
        trace!(ptr, size_bytes, live = self.stats.live(), "cuda deallocate");
    }

    fn allocated_bytes(&self) -> usize {
        self.stats.bytes()
    }

    fn live_allocations(&self) -> usize {
        self.stats.live()
    }
}
