//! CUDA runtime implementation

use super::client::{CudaAllocator, CudaClient};
use super::device::CudaDevice;
use crate::error::Result;
use crate::runtime::Runtime;

/// CUDA Runtime adapter
///
/// Implements the generic Runtime trait for the CUDA backend. Clients are created
/// explicitly; there is no process-wide client cache.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;
    type Allocator = CudaAllocator;

    fn name() -> &'static str {
        "cuda"
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        CudaClient::new(device.clone())
    }
}

/// Check if a CUDA device can be opened on this system
pub fn is_cuda_available() -> bool {
    CudaClient::new(CudaDevice::new(0)).is_ok()
}
