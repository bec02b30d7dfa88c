//! Result assembly
//!
//! Turns the column-major factor buffers left by the driver into output tensors with
//! the shapes of the QR mode table, masked to the right triangle and laid out in the
//! client's output order.

use super::driver::Factors;
use super::mode::QrMode;
use super::normalize::ComputePlan;
use super::solver::SolverScalar;
use super::staging::ComputeMatrix;
use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::{Runtime, RuntimeClient};
use crate::tensor::{Layout, MemoryOrder, Tensor};

/// Result of a QR decomposition
///
/// One variant per return convention: `R` alone, the raw reflector pair, or the
/// explicit `(Q, R)` pair of the reduced and complete modes.
///
/// # Example
///
/// ```
/// use densolve::prelude::*;
///
/// let client = CpuClient::default();
/// let a = Tensor::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], &[3, 2], &client);
/// let (q, r) = client.qr(&a, QrMode::Reduced, None).unwrap().into_pair().unwrap();
/// assert_eq!(q.shape(), &[3, 2]);
/// assert_eq!(r.shape(), &[2, 2]);
/// ```
#[derive(Clone, Debug)]
pub enum QrOutput<R: Runtime> {
    /// Upper-triangular `R` (mode `r`)
    R(Tensor<R>),
    /// Packed reflectors `H` (`n×m`) and their scale factors `tau` (mode `raw`)
    Raw {
        /// Householder vectors below the diagonal and `R` on and above it, transposed
        h: Tensor<R>,
        /// Reflector scale factors
        tau: Tensor<R>,
    },
    /// Orthonormal `Q` and upper-triangular `R` (modes `reduced` and `complete`)
    Factors {
        /// Orthonormal factor
        q: Tensor<R>,
        /// Upper-triangular factor
        r: Tensor<R>,
        /// Which of the two modes produced them
        mode: QrMode,
    },
}

impl<R: Runtime> QrOutput<R> {
    /// Mode that produced this output
    pub fn mode(&self) -> QrMode {
        match self {
            Self::R(_) => QrMode::R,
            Self::Raw { .. } => QrMode::Raw,
            Self::Factors { mode, .. } => *mode,
        }
    }

    /// First returned tensor (`R`, `H` or `Q`)
    pub fn first(&self) -> &Tensor<R> {
        match self {
            Self::R(r) => r,
            Self::Raw { h, .. } => h,
            Self::Factors { q, .. } => q,
        }
    }

    /// Second returned tensor (`tau` or `R`), `None` in mode `r`
    pub fn second(&self) -> Option<&Tensor<R>> {
        match self {
            Self::R(_) => None,
            Self::Raw { tau, .. } => Some(tau),
            Self::Factors { r, .. } => Some(r),
        }
    }

    /// The single tensor of mode `r`
    pub fn into_single(self) -> Option<Tensor<R>> {
        match self {
            Self::R(r) => Some(r),
            _ => None,
        }
    }

    /// The pair `(H, tau)` or `(Q, R)`, `None` in mode `r`
    pub fn into_pair(self) -> Option<(Tensor<R>, Tensor<R>)> {
        match self {
            Self::R(_) => None,
            Self::Raw { h, tau } => Some((h, tau)),
            Self::Factors { q, r, .. } => Some((q, r)),
        }
    }
}

/// Which part of a matrix survives into the output
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Triangle {
    Lower,
    Upper,
    Full,
}

impl Triangle {
    #[inline]
    fn keeps(self, i: usize, j: usize) -> bool {
        match self {
            Self::Lower => i >= j,
            Self::Upper => i <= j,
            Self::Full => true,
        }
    }
}

/// Copy the leading `rows×cols` block of a column-major matrix into a new tensor
fn block_tensor<R: Runtime, T: SolverScalar>(
    client: &R::Client,
    matrix: &ComputeMatrix<R, T>,
    rows: usize,
    cols: usize,
    triangle: Triangle,
) -> Result<Tensor<R>> {
    if rows > matrix.rows() || cols > matrix.cols() {
        return Err(Error::shape_mismatch(
            &[rows, cols],
            &[matrix.rows(), matrix.cols()],
        ));
    }
    let source = matrix.to_host(client)?;
    let lda = matrix.lda();
    let order = client.config().output_order();
    let zero = T::from_f64(0.0);
    let pick = |i: usize, j: usize| {
        if triangle.keeps(i, j) {
            source[i + j * lda]
        } else {
            zero
        }
    };

    let data: Vec<T> = match order {
        MemoryOrder::RowMajor => (0..rows)
            .flat_map(|i| (0..cols).map(move |j| (i, j)))
            .map(|(i, j)| pick(i, j))
            .collect(),
        MemoryOrder::ColumnMajor => (0..cols)
            .flat_map(|j| (0..rows).map(move |i| (i, j)))
            .map(|(i, j)| pick(i, j))
            .collect(),
    };
    Tensor::try_from_slice_ordered(&data, &[rows, cols], order, client)
}

/// Build the Cholesky factor `L`
pub(crate) fn cholesky<R: Runtime, T: SolverScalar>(
    client: &R::Client,
    factors: Factors<R, T>,
) -> Result<Tensor<R>> {
    match factors {
        Factors::Cholesky(a) => {
            let n = a.cols();
            block_tensor(client, &a, n, n, Triangle::Lower)
        }
        Factors::Qr { .. } => Err(Error::InvalidArgument {
            arg: "factors",
            reason: "expected Cholesky factors, got QR factors".to_string(),
        }),
    }
}

/// Build the QR output of the plan's mode
pub(crate) fn qr<R: Runtime, T: SolverScalar>(
    client: &R::Client,
    plan: &ComputePlan,
    factors: Factors<R, T>,
) -> Result<QrOutput<R>> {
    let (Factors::Qr { packed, tau, q }, Some(policy)) = (factors, plan.qr_policy()) else {
        return Err(Error::InvalidArgument {
            arg: "factors",
            reason: "expected QR factors for a QR plan".to_string(),
        });
    };
    let (m, n, k) = (plan.m(), plan.n(), policy.k());

    match policy.mode() {
        QrMode::R => Ok(QrOutput::R(block_tensor(
            client,
            &packed,
            k,
            n,
            Triangle::Upper,
        )?)),
        QrMode::Raw => {
            let raw_f64 = client.config().raw_outputs_f64();
            // Column-major m×n is row-major n×m
            let h = Tensor::from_parts(
                packed.into_buffer().into_storage(client),
                Layout::contiguous(&[n, m]),
            );
            let tau = Tensor::from_parts(tau.into_storage(client), Layout::contiguous(&[k]));
            if raw_f64 && T::DTYPE != DType::F64 {
                Ok(QrOutput::Raw {
                    h: upcast_f64(client, &h)?,
                    tau: upcast_f64(client, &tau)?,
                })
            } else {
                Ok(QrOutput::Raw { h, tau })
            }
        }
        mode @ (QrMode::Reduced | QrMode::Complete) => {
            let q = q.ok_or_else(|| Error::InvalidArgument {
                arg: "factors",
                reason: format!("mode '{mode}' needs the explicit Q"),
            })?;
            let q_cols = policy.q_cols();
            let r_rows = policy.r_shape().map_or(k, |[rows, _]| rows);
            Ok(QrOutput::Factors {
                q: block_tensor(client, &q, m, q_cols, Triangle::Full)?,
                r: block_tensor(client, &packed, r_rows, n, Triangle::Upper)?,
                mode,
            })
        }
    }
}

fn upcast_f64<R: Runtime>(client: &R::Client, tensor: &Tensor<R>) -> Result<Tensor<R>> {
    Tensor::try_from_slice(&tensor.to_f64_vec()?, tensor.shape(), client)
}
