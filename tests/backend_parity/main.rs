//! CPU vs CUDA parity for the decompositions
//!
//! Skipped unless the `cuda` feature is enabled. With the feature enabled, a missing
//! device skips the comparison instead of failing.

#![cfg(feature = "cuda")]

#[path = "../common/mod.rs"]
mod common;
mod helpers;

mod cholesky;
mod qr;
