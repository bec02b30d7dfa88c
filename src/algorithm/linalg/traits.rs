//! Decomposition contract implemented by every runtime client

use super::assemble::QrOutput;
use super::mode::QrMode;
use super::solver::DenseSolver;
use crate::dtype::DType;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Cholesky and QR decompositions on a runtime client
///
/// The pipeline is shared by every backend: validate, stage a column-major compute
/// copy, run the [`DenseSolver`] routines, assemble the outputs. A backend opts in by
/// implementing `DenseSolver` and this trait with an empty body.
///
/// # Example
///
/// ```
/// use densolve::prelude::*;
///
/// let client = CpuClient::default();
/// let a = Tensor::<CpuRuntime>::from_slice(&[4.0f64, 2.0, 2.0, 3.0], &[2, 2], &client);
/// let l = client.cholesky(&a, None).unwrap();
/// let l: Vec<f64> = l.to_vec();
/// assert!((l[0] - 2.0).abs() < 1e-12);
/// assert_eq!(l[1], 0.0);
/// ```
pub trait DecompositionAlgorithms<R: Runtime<Client = Self>>: DenseSolver<R> + Sized {
    /// Lower-triangular `L` with `L·Lᵗ = A`
    ///
    /// Only the lower triangle of `a` is read. Integer inputs are computed in `f64`;
    /// `dtype` may request `f32` or `f64` explicitly.
    ///
    /// # Errors
    ///
    /// - [`Error::ShapeError`](crate::error::Error::ShapeError) if `a` is not a
    ///   non-empty square matrix
    /// - [`Error::UnsupportedDType`](crate::error::Error::UnsupportedDType) for
    ///   unsupported input or requested dtypes
    /// - [`Error::SingularOrIllConditioned`](crate::error::Error::SingularOrIllConditioned)
    ///   if `a` is not positive definite
    /// - [`Error::ResourceExhausted`](crate::error::Error::ResourceExhausted) and
    ///   [`Error::BackendFailure`](crate::error::Error::BackendFailure) for device
    ///   failures
    fn cholesky(&self, a: &Tensor<R>, dtype: Option<DType>) -> Result<Tensor<R>> {
        super::cholesky(self, a, dtype)
    }

    /// QR decomposition of an `m×n` matrix in the given mode
    ///
    /// See [`QrMode`] for the shapes each mode returns.
    fn qr(&self, a: &Tensor<R>, mode: QrMode, dtype: Option<DType>) -> Result<QrOutput<R>> {
        super::qr_with_mode(self, a, mode, dtype)
    }
}
