//! CUDA runtime implementation
//!
//! This module provides GPU acceleration via NVIDIA CUDA using cudarc.
//!
//! # Features
//!
//! - `CudaDevice` - Represents a CUDA GPU device
//! - `CudaClient` - Owns the context, the stream and the cuSOLVER handle
//! - `CudaRuntime` - Implements the generic Runtime trait
//! - `DenseSolver` - cuSOLVER dense `S`/`D` routines (`potrf`, `geqrf`, `orgqr`)
//!
//! Memory is allocated stream-ordered (`cuMemAllocAsync` / `cuMemFreeAsync`) on the
//! client's stream, so buffers freed at the end of a decomposition are reclaimed after
//! the work that uses them.

mod client;
mod device;
mod linalg;
mod runtime;
mod solver;

pub use client::{CudaAllocator, CudaClient};
pub use device::CudaDevice;
pub use runtime::{CudaRuntime, is_cuda_available};
