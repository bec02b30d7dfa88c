//! Decompositions on the CUDA runtime

use super::{CudaClient, CudaRuntime};
use crate::algorithm::linalg::DecompositionAlgorithms;

impl DecompositionAlgorithms<CudaRuntime> for CudaClient {}
