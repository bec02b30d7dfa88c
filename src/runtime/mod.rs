//! Runtime backends for the decomposition routines
//!
//! This module defines the `Runtime` trait and provides implementations
//! for the CPU reference backend and the CUDA backend.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity)
//! ├── Device (identifies a specific GPU/CPU)
//! ├── Client (owns allocator, stream, solver handle and configuration)
//! └── Allocator (accounted memory management)
//! ```
//!
//! There is no global state: every operation receives its client explicitly, and every
//! buffer remembers the client that allocated it.

mod allocator;
mod buffer;

pub mod cpu;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use allocator::{AllocGuard, AllocStats, Allocator};
pub use buffer::DeviceBuffer;

use crate::algorithm::linalg::LinalgConfig;
use crate::error::Result;

/// Core trait for compute backends
///
/// `Runtime` abstracts over different compute devices (CPU, GPU).
/// It uses static dispatch via generics for zero-cost abstraction.
///
/// # Associated Types
///
/// - `Device`: Identifies a specific compute unit (e.g., GPU 0, GPU 1)
/// - `Client`: Execution context; owns memory, streams and solver handles
/// - `Allocator`: Accounted memory management
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Execution context for this backend
    type Client: RuntimeClient<Self>;

    /// Memory allocator type
    type Allocator: Allocator;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Create a client for a device with the default configuration
    fn default_client(device: &Self::Device) -> Result<Self::Client>;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Execution context of a runtime
///
/// Clients are cheap to clone, `Send` and `Sync`. Clones share the allocator and its
/// accounting. All device work for a call is ordered on the client's stream.
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Wait for all pending work on this client's stream
    fn synchronize(&self) -> Result<()>;

    /// Get the allocator for this client
    fn allocator(&self) -> &R::Allocator;

    /// Decomposition settings of this context
    fn config(&self) -> &LinalgConfig;

    /// Copy host bytes to device memory
    fn copy_to_device(&self, src: &[u8], dst: u64) -> Result<()>;

    /// Copy device memory to host bytes
    fn copy_from_device(&self, src: u64, dst: &mut [u8]) -> Result<()>;

    /// Copy `size_bytes` between two device buffers
    fn copy_within_device(&self, src: u64, dst: u64, size_bytes: usize) -> Result<()>;
}
