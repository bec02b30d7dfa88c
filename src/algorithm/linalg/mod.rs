//! Dense Cholesky and QR decompositions
//!
//! The entry points validate the input, resolve the compute dtype once, and run the
//! decomposition driver monomorphized over `f32` or `f64`. Solver kernels come from the
//! runtime's [`DenseSolver`] implementation.
//!
//! # Module Structure
//!
//! - `normalize`: shape and dtype preconditions, compute plan
//! - `staging`: column-major device copy of the input
//! - `driver`: the decomposition state machine
//! - `assemble`: output tensors and [`QrOutput`]
//! - `mode`: QR mode table
//! - `status`: status classification and error translation
//! - `solver`: the [`DenseSolver`] capability
//! - `config`: per-client [`LinalgConfig`]
//! - `traits`: [`DecompositionAlgorithms`]

mod assemble;
mod config;
mod driver;
mod mode;
mod normalize;
mod solver;
mod staging;
mod status;
mod traits;

pub use assemble::QrOutput;
pub use config::LinalgConfig;
pub use mode::{ModePolicy, ModeRejection, QrMode};
pub use normalize::ComputePlan;
pub use solver::{DenseSolver, FillMode, SolverResult, SolverScalar, SolverStatus};
pub use status::{FactorizationStatus, StatusClass, StatusTable};
pub use traits::DecompositionAlgorithms;

use crate::dtype::{ComputeDType, DType};
use crate::error::{DecompositionKind, Error, Result};
use crate::runtime::Runtime;
use crate::tensor::Tensor;
use driver::Driver;
use tracing::debug_span;

/// Cholesky decomposition `A = L·Lᵗ`, returning the lower-triangular `L`
///
/// `dtype` optionally requests the compute dtype (`F32` or `F64`). Without it, float
/// inputs keep their precision and integer inputs are computed in `F64`. The result
/// has the compute dtype.
///
/// # Example
///
/// ```
/// use densolve::prelude::*;
/// use densolve::algorithm::linalg::cholesky;
///
/// let client = CpuClient::default();
/// let a = Tensor::<CpuRuntime>::from_slice(&[1i32, 2, 2, 13], &[2, 2], &client);
/// let l = cholesky(&client, &a, None).unwrap();
/// assert_eq!(l.dtype(), DType::F64);
/// assert_eq!(l.to_vec::<f64>(), [1.0, 0.0, 2.0, 3.0]);
/// ```
pub fn cholesky<R>(client: &R::Client, a: &Tensor<R>, dtype: Option<DType>) -> Result<Tensor<R>>
where
    R: Runtime,
    R::Client: DenseSolver<R>,
{
    let span = debug_span!(
        "decompose",
        kind = %DecompositionKind::Cholesky,
        shape = ?a.shape(),
        dtype = %a.dtype()
    );
    let _enter = span.enter();

    let plan = ComputePlan::cholesky(a.shape(), a.dtype(), dtype)?;
    let mut driver = Driver::<R>::new(client, &plan);
    match plan.compute() {
        ComputeDType::F32 => driver.execute::<f32, _>(a, assemble::cholesky),
        ComputeDType::F64 => driver.execute::<f64, _>(a, assemble::cholesky),
    }
}

/// QR decomposition with the mode given by name
///
/// Accepts `"reduced"`, `"complete"`, `"r"` and `"raw"`. Any other string, including
/// the legacy `"full"`, `"f"`, `"economic"` and `"e"`, fails with
/// [`Error::InvalidMode`] before the input is inspected further.
///
/// # Example
///
/// ```
/// use densolve::prelude::*;
/// use densolve::algorithm::linalg::qr;
///
/// let client = CpuClient::default();
/// let a = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], &client);
/// let (h, tau) = qr(&client, &a, "raw", None).unwrap().into_pair().unwrap();
/// assert_eq!(h.shape(), &[3, 2]);
/// assert_eq!(tau.shape(), &[2]);
/// assert_eq!(h.dtype(), DType::F64);
///
/// assert!(qr(&client, &a, "economic", None).is_err());
/// ```
pub fn qr<R>(
    client: &R::Client,
    a: &Tensor<R>,
    mode: &str,
    dtype: Option<DType>,
) -> Result<QrOutput<R>>
where
    R: Runtime,
    R::Client: DenseSolver<R>,
{
    let parsed = mode.parse::<QrMode>().map_err(|rejection| {
        Error::invalid_mode(DecompositionKind::Qr, a.shape(), mode, rejection.to_string())
    })?;
    qr_with_mode(client, a, parsed, dtype)
}

/// QR decomposition with a typed mode
///
/// Shapes for an `m×n` input with `k = min(m, n)`:
///
/// | mode | output |
/// |---|---|
/// | `R` | `R: k×n` |
/// | `Raw` | `H: n×m`, `tau: k` |
/// | `Reduced` | `Q: m×k`, `R: k×n` |
/// | `Complete` | `Q: m×m`, `R: m×n` |
///
/// Raw outputs are `F64` when the client's [`LinalgConfig::raw_outputs_f64`] is set
/// (the default); everything else has the compute dtype.
pub fn qr_with_mode<R>(
    client: &R::Client,
    a: &Tensor<R>,
    mode: QrMode,
    dtype: Option<DType>,
) -> Result<QrOutput<R>>
where
    R: Runtime,
    R::Client: DenseSolver<R>,
{
    let span = debug_span!(
        "decompose",
        kind = %DecompositionKind::Qr,
        mode = %mode,
        shape = ?a.shape(),
        dtype = %a.dtype()
    );
    let _enter = span.enter();

    let plan = ComputePlan::qr(a.shape(), a.dtype(), mode, dtype)?;
    let mut driver = Driver::<R>::new(client, &plan);
    match plan.compute() {
        ComputeDType::F32 => driver.execute::<f32, _>(a, |c, f| assemble::qr(c, &plan, f)),
        ComputeDType::F64 => driver.execute::<f64, _>(a, |c, f| assemble::qr(c, &plan, f)),
    }
}
