//! Tensor types
//!
//! This module provides the `Tensor` type, an n-dimensional array stored on a compute
//! device (CPU, GPU), together with its `Layout` and reference-counted `Storage`.

mod core;
mod layout;
mod storage;

pub use core::Tensor;
pub use layout::{Layout, MemoryOrder, Shape, Strides};
pub use storage::Storage;
