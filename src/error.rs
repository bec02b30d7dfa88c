//! Error types for densolve

use crate::dtype::DType;
use std::fmt;
use thiserror::Error;

/// Result type alias using densolve's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Which decomposition an error was raised by
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DecompositionKind {
    /// Cholesky factorization `A = L Lᵗ`
    Cholesky,
    /// Householder QR factorization `A = Q R`
    Qr,
}

impl DecompositionKind {
    /// Short lowercase name used in messages and log fields
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cholesky => "cholesky",
            Self::Qr => "qr",
        }
    }
}

impl fmt::Display for DecompositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors that can occur in densolve operations
///
/// The first six variants form the caller-facing decomposition taxonomy and always carry
/// the decomposition kind and the input shape. The remaining variants are raised by the
/// array, allocator and runtime collaborators; the decomposition driver translates them
/// into the taxonomy before they reach a `cholesky`/`qr` caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Input shape violates the decomposition's preconditions
    #[error("{kind}: invalid input shape {shape:?}: {reason}")]
    ShapeError {
        /// Decomposition that rejected the input
        kind: DecompositionKind,
        /// Input shape
        shape: Vec<usize>,
        /// What was wrong with it
        reason: String,
    },

    /// Input dtype cannot be promoted, or the requested compute dtype is not supported
    #[error("{kind}: unsupported dtype {dtype} for input of shape {shape:?}")]
    UnsupportedDType {
        /// Decomposition that rejected the dtype
        kind: DecompositionKind,
        /// Input shape
        shape: Vec<usize>,
        /// The offending dtype (input or requested)
        dtype: DType,
    },

    /// Unrecognized QR mode string
    #[error("{kind}: invalid mode '{mode}' for input of shape {shape:?}: {reason}")]
    InvalidMode {
        /// Decomposition that rejected the mode
        kind: DecompositionKind,
        /// Input shape
        shape: Vec<usize>,
        /// The mode string as given
        mode: String,
        /// Why it was rejected
        reason: String,
    },

    /// Device allocation failed at some stage of the pipeline
    #[error("{kind}: device memory exhausted allocating {size} bytes for input of shape {shape:?}")]
    ResourceExhausted {
        /// Decomposition that was running
        kind: DecompositionKind,
        /// Input shape
        shape: Vec<usize>,
        /// Requested allocation size in bytes (0 if reported by the solver library)
        size: usize,
    },

    /// The factorization kernel reported numerically invalid input
    ///
    /// For Cholesky the matrix is not positive-definite (the status is the order of the
    /// failing leading minor); for QR the input is degenerate.
    #[error("{kind}: input of shape {shape:?} is singular or ill-conditioned (status {status})")]
    SingularOrIllConditioned {
        /// Decomposition that was running
        kind: DecompositionKind,
        /// Input shape
        shape: Vec<usize>,
        /// Factorization status reported by the solver
        status: i32,
    },

    /// Any other accelerator failure; not retryable
    #[error("{kind}: backend failure for input of shape {shape:?} (status {status}): {reason}")]
    BackendFailure {
        /// Decomposition that was running
        kind: DecompositionKind,
        /// Input shape
        shape: Vec<usize>,
        /// Raw status code
        status: i32,
        /// Description of the failing call
        reason: String,
    },

    /// Out of memory
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// Shape mismatch in an operation
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// DType mismatch between a tensor and the requested element type
    #[error("DType mismatch: {lhs:?} vs {rhs:?}")]
    DTypeMismatch {
        /// Tensor dtype
        lhs: DType,
        /// Requested dtype
        rhs: DType,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Backend-specific error
    #[error("Backend error: {0}")]
    Backend(String),

    /// CUDA-specific error
    #[cfg(feature = "cuda")]
    #[error("CUDA error: {0}")]
    Cuda(#[from] cudarc::driver::DriverError),
}

impl Error {
    /// Create a shape precondition error
    pub fn shape(kind: DecompositionKind, shape: &[usize], reason: impl Into<String>) -> Self {
        Self::ShapeError {
            kind,
            shape: shape.to_vec(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(kind: DecompositionKind, shape: &[usize], dtype: DType) -> Self {
        Self::UnsupportedDType {
            kind,
            shape: shape.to_vec(),
            dtype,
        }
    }

    /// Create an invalid mode error
    pub fn invalid_mode(
        kind: DecompositionKind,
        shape: &[usize],
        mode: &str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidMode {
            kind,
            shape: shape.to_vec(),
            mode: mode.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Decomposition kind carried by a taxonomy error, if any
    pub fn kind(&self) -> Option<DecompositionKind> {
        match self {
            Self::ShapeError { kind, .. }
            | Self::UnsupportedDType { kind, .. }
            | Self::InvalidMode { kind, .. }
            | Self::ResourceExhausted { kind, .. }
            | Self::SingularOrIllConditioned { kind, .. }
            | Self::BackendFailure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Input shape carried by a taxonomy error, if any
    pub fn input_shape(&self) -> Option<&[usize]> {
        match self {
            Self::ShapeError { shape, .. }
            | Self::UnsupportedDType { shape, .. }
            | Self::InvalidMode { shape, .. }
            | Self::ResourceExhausted { shape, .. }
            | Self::SingularOrIllConditioned { shape, .. }
            | Self::BackendFailure { shape, .. } => Some(shape),
            _ => None,
        }
    }

    /// True for errors detected before any device work (shape, dtype, mode)
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ShapeError { .. } | Self::UnsupportedDType { .. } | Self::InvalidMode { .. }
        )
    }
}
