//! Common test utilities
#![allow(dead_code)]

use densolve::runtime::Runtime;
use densolve::runtime::cpu::{CpuClient, CpuDevice, CpuRuntime};
#[cfg(feature = "cuda")]
use densolve::runtime::cuda::{CudaClient, CudaDevice, CudaRuntime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Create a CPU client and device for testing
pub fn create_cpu_client() -> (CpuClient, CpuDevice) {
    let device = CpuDevice::new();
    let client = CpuRuntime::default_client(&device).unwrap();
    (client, device)
}

/// Create a CUDA client and device, returning None if CUDA is unavailable
#[cfg(feature = "cuda")]
pub fn create_cuda_client() -> Option<(CudaClient, CudaDevice)> {
    let device = CudaDevice::new(0);
    let client = CudaRuntime::default_client(&device).ok()?;
    Some((client, device))
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Row-major `m×k` times row-major `k×n`
pub fn matmul(a: &[f64], b: &[f64], m: usize, k: usize, n: usize) -> Vec<f64> {
    assert_eq!(a.len(), m * k, "matmul: lhs length");
    assert_eq!(b.len(), k * n, "matmul: rhs length");
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        for p in 0..k {
            let aip = a[i * k + p];
            for j in 0..n {
                out[i * n + j] += aip * b[p * n + j];
            }
        }
    }
    out
}

/// Transpose of a row-major `m×n` matrix
pub fn transpose(a: &[f64], m: usize, n: usize) -> Vec<f64> {
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        for j in 0..n {
            out[j * m + i] = a[i * n + j];
        }
    }
    out
}

/// Row-major `n×n` identity
pub fn identity(n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        out[i * n + i] = 1.0;
    }
    out
}

/// Seeded `m×n` matrix with standard normal entries
pub fn random_matrix(m: usize, n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..m * n).map(|_| rng.sample(StandardNormal)).collect()
}

/// Seeded `n×n` symmetric positive-definite `X·Xᵗ` with integer `X` in `[0, 100)`
///
/// A multiple of the identity is added so the result is well conditioned for any seed.
pub fn random_spd_int(n: usize, seed: u64) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let x: Vec<i64> = (0..n * n).map(|_| rng.random_range(0..100)).collect();
    let mut a = vec![0i64; n * n];
    for i in 0..n {
        for j in 0..n {
            a[i * n + j] = (0..n).map(|p| x[i * n + p] * x[j * n + p]).sum();
        }
        a[i * n + i] += n as i64;
    }
    a
}

/// Assert the strict lower (`upper = true`) or strict upper triangle is zero
pub fn assert_triangular(a: &[f64], m: usize, n: usize, upper: bool, msg: &str) {
    for i in 0..m {
        for j in 0..n {
            let outside = if upper { i > j } else { j > i };
            if outside {
                assert_eq!(a[i * n + j], 0.0, "{}: element ({}, {}) not zero", msg, i, j);
            }
        }
    }
}
