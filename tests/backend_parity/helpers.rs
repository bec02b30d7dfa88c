//! Shared helpers for backend parity tests: assertion utilities, backend lock, client creation.

use crate::common::create_cuda_client;
use densolve::runtime::cuda::{CudaClient, CudaDevice};
use std::sync::{Mutex, OnceLock};

static CUDA_BACKEND_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

pub fn assert_parity_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, op: &str) {
    assert_eq!(
        a.len(),
        b.len(),
        "parity_f64[{}]: length mismatch: {} vs {}",
        op,
        a.len(),
        b.len()
    );

    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();

        if diff > tol {
            panic!(
                "parity_f64[{}] at index {}: {} vs {} (diff={}, tol={})",
                op, i, x, y, diff, tol
            );
        }
    }
}

/// Run `f` with exclusive use of device 0, or skip when no device is present
pub fn with_cuda_backend<F>(mut f: F)
where
    F: FnMut(CudaClient, CudaDevice),
{
    let _guard = CUDA_BACKEND_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if !densolve::runtime::cuda::is_cuda_available() {
        eprintln!("skipping: no CUDA device");
        return;
    }
    let (client, device) =
        create_cuda_client().expect("CUDA device is present but client creation failed");
    f(client, device);
}

/// Flip each row of a row-major `rows×cols` upper-triangular factor so its diagonal is
/// non-negative
///
/// Householder QR is unique only up to these signs.
pub fn canonical_rows(r: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = r.to_vec();
    for i in 0..rows.min(cols) {
        if r[i * cols + i] < 0.0 {
            for x in &mut out[i * cols..(i + 1) * cols] {
                *x = -*x;
            }
        }
    }
    out
}
