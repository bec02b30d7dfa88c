//! Algorithm contracts for runtime backends
//!
//! Every algorithm is defined once, generically over [`Runtime`](crate::runtime::Runtime),
//! and reaches the hardware only through a capability trait the backend implements.
//!
//! # Available Algorithm Contracts
//!
//! - [`DecompositionAlgorithms`] - Cholesky and Householder QR, driven through the
//!   [`DenseSolver`] routines of the runtime

pub mod linalg;

pub use linalg::{DecompositionAlgorithms, DenseSolver, QrMode, QrOutput};
