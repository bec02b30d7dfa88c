//! # densolve
//!
//! **Dense Cholesky and QR decompositions dispatched onto accelerator solver routines.**
//!
//! densolve takes a 2-D tensor of any supported dtype and layout, stages a column-major
//! copy in the compute precision, runs the runtime's dense solver routines (cuSOLVER on
//! CUDA, reference kernels on the CPU) and hands the factors back in the shapes of the
//! familiar `linalg.cholesky` / `linalg.qr` interface.
//!
//! ## Quick Start
//!
//! ```rust
//! use densolve::prelude::*;
//!
//! let client = CpuClient::default();
//! let a = Tensor::<CpuRuntime>::from_slice(&[4.0f64, 12.0, 12.0, 37.0], &[2, 2], &client);
//!
//! let l = client.cholesky(&a, None)?;
//! assert_eq!(l.to_vec::<f64>(), [2.0, 0.0, 6.0, 1.0]);
//!
//! let (q, r) = client.qr(&a, QrMode::Reduced, None)?.into_pair().unwrap();
//! assert_eq!(q.shape(), &[2, 2]);
//! assert_eq!(r.shape(), &[2, 2]);
//! # Ok::<(), densolve::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cpu` (default): CPU backend
//! - `rayon` (default): Multi-threaded CPU kernels
//! - `cuda`: NVIDIA CUDA backend with cuSOLVER
//! - `f16`: Half-precision input tensors (rejected by the decompositions)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod algorithm;
pub mod dtype;
pub mod error;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithm::linalg::{DecompositionAlgorithms, LinalgConfig, QrMode, QrOutput};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::runtime::{Device, Runtime, RuntimeClient};
    pub use crate::tensor::{Layout, MemoryOrder, Tensor};

    #[cfg(feature = "cpu")]
    pub use crate::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};

    #[cfg(feature = "cuda")]
    pub use crate::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};
}

/// Default runtime based on enabled features
///
/// - With `cuda` feature: `CudaRuntime`
/// - Otherwise: `CpuRuntime`
#[cfg(feature = "cuda")]
pub type DefaultRuntime = runtime::cuda::CudaRuntime;

/// Default runtime based on enabled features
#[cfg(not(feature = "cuda"))]
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
