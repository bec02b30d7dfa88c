//! Dense solver capability
//!
//! [`DenseSolver`] is the seam between the decomposition pipeline and whatever library
//! provides the factorization kernels. Its shape follows the vendor dense-solver
//! convention: every routine works in place on a column-major buffer with a leading
//! dimension, every routine has a separate workspace-size query, library-level failures
//! come back as a [`SolverStatus`], and numerical outcomes are written to a one-element
//! device `info` buffer.

use crate::dtype::{ComputeDType, Element};
use crate::runtime::{DeviceBuffer, Runtime};
use num_traits::Float;
use std::fmt;

/// Scalar types the solver routines run in (`f32` and `f64`)
pub trait SolverScalar: Element + Float {
    /// Compute dtype tag for this scalar
    const COMPUTE: ComputeDType;
}

impl SolverScalar for f32 {
    const COMPUTE: ComputeDType = ComputeDType::F32;
}

impl SolverScalar for f64 {
    const COMPUTE: ComputeDType = ComputeDType::F64;
}

/// Which triangle of a symmetric matrix a routine reads and writes
///
/// Decompositions always factor the lower triangle. `Upper` is part of the solver
/// surface for callers driving [`DenseSolver`] directly.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FillMode {
    /// Lower triangle (`A = L·Lᵗ`)
    Lower,
    /// Upper triangle (`A = Uᵗ·U`)
    Upper,
}

/// Status returned by a solver library call
///
/// This is distinct from the factorization status written to the `info` buffer: a
/// library status reports whether the call itself could run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    /// The library could not allocate its internal resources
    AllocFailed,
    /// A dimension, leading dimension or workspace size was rejected
    InvalidValue,
    /// The kernel failed to launch or execute
    ExecutionFailed,
    /// The routine is not available for this configuration
    NotSupported,
    /// Any other library-specific code
    Other(i32),
}

impl SolverStatus {
    /// Numeric code, following the cuSOLVER status numbering
    pub const fn code(self) -> i32 {
        match self {
            Self::AllocFailed => 3,
            Self::InvalidValue => 4,
            Self::ExecutionFailed => 6,
            Self::NotSupported => 9,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocFailed => f.write_str("allocation failed"),
            Self::InvalidValue => f.write_str("invalid value"),
            Self::ExecutionFailed => f.write_str("execution failed"),
            Self::NotSupported => f.write_str("not supported"),
            Self::Other(code) => write!(f, "status {code}"),
        }
    }
}

/// Result of a solver library call
pub type SolverResult<T> = std::result::Result<T, SolverStatus>;

/// Dense factorization routines of a runtime
///
/// All matrices are column-major with leading dimension `lda`. Workspace lengths are in
/// elements of `T`. Each routine writes its factorization status to `info[0]`:
///
/// - `potrf`: `0` on success, `j > 0` if the leading minor of order `j` is not positive
///   definite, `-i` if parameter `i` was illegal
/// - `geqrf` / `orgqr`: `0` on success, `-i` if parameter `i` was illegal
pub trait DenseSolver<R: Runtime> {
    /// Workspace length for [`DenseSolver::potrf`]
    fn potrf_buffer_size<T: SolverScalar>(
        &self,
        uplo: FillMode,
        n: usize,
        a: &DeviceBuffer<R, T>,
        lda: usize,
    ) -> SolverResult<usize>;

    /// Cholesky factorization of the `n×n` matrix in `a`, in place
    ///
    /// Only the `uplo` triangle is read; the factor overwrites it.
    #[allow(clippy::too_many_arguments)]
    fn potrf<T: SolverScalar>(
        &self,
        uplo: FillMode,
        n: usize,
        a: &mut DeviceBuffer<R, T>,
        lda: usize,
        work: &mut DeviceBuffer<R, T>,
        info: &mut DeviceBuffer<R, i32>,
    ) -> SolverResult<()>;

    /// Workspace length for [`DenseSolver::geqrf`]
    fn geqrf_buffer_size<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        a: &DeviceBuffer<R, T>,
        lda: usize,
    ) -> SolverResult<usize>;

    /// Householder QR of the `m×n` matrix in `a`, in place
    ///
    /// On return the upper triangle holds `R`, the entries below the diagonal hold the
    /// essential parts of the reflectors (`v[0] = 1` implied), and `tau` holds their
    /// `min(m, n)` scalar factors.
    #[allow(clippy::too_many_arguments)]
    fn geqrf<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        a: &mut DeviceBuffer<R, T>,
        lda: usize,
        tau: &mut DeviceBuffer<R, T>,
        work: &mut DeviceBuffer<R, T>,
        info: &mut DeviceBuffer<R, i32>,
    ) -> SolverResult<()>;

    /// Workspace length for [`DenseSolver::orgqr`]
    fn orgqr_buffer_size<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &DeviceBuffer<R, T>,
        lda: usize,
        tau: &DeviceBuffer<R, T>,
    ) -> SolverResult<usize>;

    /// Form the first `n` columns of `Q = H(0)·…·H(k-1)` from `k` reflectors, in place
    ///
    /// Requires `m >= n >= k`.
    #[allow(clippy::too_many_arguments)]
    fn orgqr<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &mut DeviceBuffer<R, T>,
        lda: usize,
        tau: &DeviceBuffer<R, T>,
        work: &mut DeviceBuffer<R, T>,
        info: &mut DeviceBuffer<R, i32>,
    ) -> SolverResult<()>;
}
