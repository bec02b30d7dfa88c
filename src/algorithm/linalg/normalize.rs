//! Input validation and compute dtype resolution
//!
//! Everything here is checked before the first device allocation of a call.

use super::mode::{ModePolicy, QrMode};
use crate::dtype::{ComputeDType, DType, resolve_compute_dtype};
use crate::error::{DecompositionKind, Error, Result};

/// Validated description of one decomposition call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComputePlan {
    kind: DecompositionKind,
    shape: [usize; 2],
    input: DType,
    compute: ComputeDType,
    qr: Option<ModePolicy>,
}

impl ComputePlan {
    /// Validate a Cholesky input
    ///
    /// # Errors
    ///
    /// - [`Error::ShapeError`] if the input is not a non-empty square matrix
    /// - [`Error::UnsupportedDType`] if the input or requested dtype cannot be used
    pub fn cholesky(shape: &[usize], input: DType, requested: Option<DType>) -> Result<Self> {
        let kind = DecompositionKind::Cholesky;
        let [m, n] = matrix_dims(kind, shape)?;
        if m != n {
            return Err(Error::shape(kind, shape, "matrix must be square"));
        }
        let compute = compute_dtype(kind, shape, input, requested)?;
        Ok(Self {
            kind,
            shape: [m, n],
            input,
            compute,
            qr: None,
        })
    }

    /// Validate a QR input
    ///
    /// # Errors
    ///
    /// - [`Error::ShapeError`] if the input is not a non-empty matrix
    /// - [`Error::UnsupportedDType`] if the input or requested dtype cannot be used
    pub fn qr(
        shape: &[usize],
        input: DType,
        mode: QrMode,
        requested: Option<DType>,
    ) -> Result<Self> {
        let kind = DecompositionKind::Qr;
        let [m, n] = matrix_dims(kind, shape)?;
        let compute = compute_dtype(kind, shape, input, requested)?;
        Ok(Self {
            kind,
            shape: [m, n],
            input,
            compute,
            qr: Some(mode.policy(m, n)),
        })
    }

    /// Decomposition kind
    #[inline]
    pub fn kind(&self) -> DecompositionKind {
        self.kind
    }

    /// Input shape `[m, n]`
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of rows
    #[inline]
    pub fn m(&self) -> usize {
        self.shape[0]
    }

    /// Number of columns
    #[inline]
    pub fn n(&self) -> usize {
        self.shape[1]
    }

    /// Input dtype
    #[inline]
    pub fn input_dtype(&self) -> DType {
        self.input
    }

    /// Dtype the solver routines run in
    #[inline]
    pub fn compute(&self) -> ComputeDType {
        self.compute
    }

    /// QR result contract, `None` for Cholesky
    #[inline]
    pub fn qr_policy(&self) -> Option<&ModePolicy> {
        self.qr.as_ref()
    }
}

fn matrix_dims(kind: DecompositionKind, shape: &[usize]) -> Result<[usize; 2]> {
    let &[m, n] = shape else {
        return Err(Error::shape(
            kind,
            shape,
            format!("expected a 2-D matrix, got {} dimensions", shape.len()),
        ));
    };
    if m == 0 || n == 0 {
        return Err(Error::shape(kind, shape, "matrix has a zero-sized dimension"));
    }
    Ok([m, n])
}

fn compute_dtype(
    kind: DecompositionKind,
    shape: &[usize],
    input: DType,
    requested: Option<DType>,
) -> Result<ComputeDType> {
    resolve_compute_dtype(input, requested)
        .map_err(|dtype| Error::unsupported_dtype(kind, shape, dtype))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cholesky_plan() {
        let plan = ComputePlan::cholesky(&[3, 3], DType::I32, None).unwrap();
        assert_eq!(plan.kind(), DecompositionKind::Cholesky);
        assert_eq!(plan.compute(), ComputeDType::F64);
        assert_eq!(plan.input_dtype(), DType::I32);
        assert!(plan.qr_policy().is_none());

        let plan = ComputePlan::cholesky(&[2, 2], DType::F64, Some(DType::F32)).unwrap();
        assert_eq!(plan.compute(), ComputeDType::F32);
    }

    #[test]
    fn test_cholesky_rejects_non_square() {
        let err = ComputePlan::cholesky(&[2, 3], DType::F32, None).unwrap_err();
        assert!(matches!(err, Error::ShapeError { .. }));
        assert_eq!(err.input_shape(), Some(&[2usize, 3][..]));
    }

    #[test]
    fn test_rank_and_empty_checks() {
        for shape in [&[4][..], &[2, 2, 2][..], &[0, 0][..], &[3, 0][..]] {
            let err = ComputePlan::qr(shape, DType::F64, QrMode::Reduced, None).unwrap_err();
            assert!(matches!(err, Error::ShapeError { kind: DecompositionKind::Qr, .. }));
        }
    }

    #[test]
    fn test_shape_checked_before_dtype() {
        let err = ComputePlan::cholesky(&[2, 3], DType::I8, None).unwrap_err();
        assert!(matches!(err, Error::ShapeError { .. }));
    }

    #[test]
    fn test_unsupported_dtypes() {
        let err = ComputePlan::qr(&[2, 2], DType::U8, QrMode::R, None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDType { dtype: DType::U8, .. }));

        let err = ComputePlan::qr(&[2, 2], DType::F32, QrMode::R, Some(DType::I64)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedDType { dtype: DType::I64, .. }));
    }

    #[test]
    fn test_qr_plan_carries_policy() {
        let plan = ComputePlan::qr(&[4, 3], DType::U64, QrMode::Complete, None).unwrap();
        assert_eq!(plan.compute(), ComputeDType::F64);
        let policy = plan.qr_policy().unwrap();
        assert_eq!(policy.q_shape(), Some([4, 4]));
        assert_eq!(plan.m(), 4);
        assert_eq!(plan.n(), 3);
    }
}
