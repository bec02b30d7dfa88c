//! Compute dtype resolution for the decomposition routines
//!
//! The solver routines only run in `f32` or `f64`. Every input dtype falls into one
//! [`DTypeCategory`], and the pair (requested dtype, input category) is looked up in
//! [`COMPUTE_DISPATCH`] exactly once per call. Everything downstream is monomorphized
//! over the resulting scalar type.

use super::DType;

/// Scalar types the solver routines run in
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ComputeDType {
    /// Single precision (`S` routines)
    F32,
    /// Double precision (`D` routines)
    F64,
}

impl ComputeDType {
    /// The tensor dtype this compute type stores as
    #[inline]
    pub const fn dtype(self) -> DType {
        match self {
            Self::F32 => DType::F32,
            Self::F64 => DType::F64,
        }
    }

    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        self.dtype().size_in_bytes()
    }

    /// Compute type for a tensor dtype, if it is one
    #[inline]
    pub const fn from_dtype(dtype: DType) -> Option<Self> {
        match dtype {
            DType::F32 => Some(Self::F32),
            DType::F64 => Some(Self::F64),
            _ => None,
        }
    }
}

/// How an input dtype participates in compute dtype resolution
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DTypeCategory {
    /// `f32` input
    Float32,
    /// `f64` input
    Float64,
    /// 32/64-bit integer input, promoted to `f64`
    Integer,
    /// Anything else; rejected regardless of the requested dtype
    Unsupported,
}

impl DTypeCategory {
    /// Classify a tensor dtype
    pub const fn of(dtype: DType) -> Self {
        match dtype {
            DType::F32 => Self::Float32,
            DType::F64 => Self::Float64,
            DType::I32 | DType::I64 | DType::U32 | DType::U64 => Self::Integer,
            _ => Self::Unsupported,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Float32 => 0,
            Self::Float64 => 1,
            Self::Integer => 2,
            Self::Unsupported => 3,
        }
    }
}

/// Resolution table, indexed by `[requested][category]`
///
/// Row 0 is "no dtype requested", rows 1 and 2 are explicit `f32` / `f64` requests.
/// Columns follow [`DTypeCategory`] order. `None` means the combination is rejected.
pub const COMPUTE_DISPATCH: [[Option<ComputeDType>; 4]; 3] = {
    use ComputeDType::{F32, F64};
    [
        // inferred
        [Some(F32), Some(F64), Some(F64), None],
        // requested f32
        [Some(F32), Some(F32), Some(F32), None],
        // requested f64
        [Some(F64), Some(F64), Some(F64), None],
    ]
};

/// Resolve the compute dtype for an input dtype and an optional requested dtype
///
/// On failure returns the offending dtype: the requested one if it is not a compute
/// type, otherwise the input dtype.
pub fn resolve_compute_dtype(
    input: DType,
    requested: Option<DType>,
) -> std::result::Result<ComputeDType, DType> {
    let row = match requested {
        None => 0,
        Some(dtype) => match ComputeDType::from_dtype(dtype) {
            Some(ComputeDType::F32) => 1,
            Some(ComputeDType::F64) => 2,
            None => return Err(dtype),
        },
    };
    COMPUTE_DISPATCH[row][DTypeCategory::of(input).index()].ok_or(input)
}
