//! Decompositions on the CPU runtime
//!
//! The CPU client runs the shared pipeline over its reference solver kernels.

use super::{CpuClient, CpuRuntime};
use crate::algorithm::linalg::DecompositionAlgorithms;

impl DecompositionAlgorithms<CpuRuntime> for CpuClient {}
