//! CPU runtime implementation
//!
//! The CPU runtime uses standard heap allocation and ships a reference implementation
//! of the dense solver capability (unblocked LAPACK-semantics kernels). It runs the
//! full decomposition pipeline on machines without an accelerator.

mod client;
mod device;
mod lapack;
mod linalg;
mod runtime;
mod solver;

pub use crate::tensor::Tensor;
pub use client::{CpuAllocator, CpuClient};
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
