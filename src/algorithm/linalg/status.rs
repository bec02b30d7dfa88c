//! Status classification and error translation
//!
//! Solver routines report two kinds of failure: a library status for the call itself
//! ([`SolverStatus`]) and a factorization status written to the device `info` slot
//! ([`FactorizationStatus`]). Collaborators (allocator, copies) report low-level
//! [`Error`]s. Everything is turned into the decomposition error taxonomy here, tagged
//! with the decomposition kind and the input shape.

use super::solver::SolverStatus;
use crate::error::{DecompositionKind, Error, Result};
use std::fmt;
use tracing::warn;

/// Factorization status read back from the device `info` slot
///
/// `0` is success. For Cholesky a positive value is the order of the leading minor that
/// is not positive definite. A negative value `-i` means parameter `i` was illegal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FactorizationStatus(pub i32);

impl FactorizationStatus {
    /// Successful factorization
    pub const SUCCESS: Self = Self(0);

    /// Check if the factorization succeeded
    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Raw status value
    #[inline]
    pub const fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for FactorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error class a nonzero factorization status maps to
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// [`Error::SingularOrIllConditioned`]
    SingularOrIllConditioned,
    /// [`Error::BackendFailure`]
    BackendFailure,
    /// [`Error::ResourceExhausted`]
    ResourceExhausted,
}

/// Classification of nonzero factorization statuses
///
/// By default positive statuses are numerical failures and negative statuses are
/// backend failures. Individual codes can be overridden.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusTable {
    positive: StatusClass,
    negative: StatusClass,
    overrides: Vec<(i32, StatusClass)>,
}

impl Default for StatusTable {
    fn default() -> Self {
        Self {
            positive: StatusClass::SingularOrIllConditioned,
            negative: StatusClass::BackendFailure,
            overrides: Vec::new(),
        }
    }
}

impl StatusTable {
    /// Default classification
    pub fn new() -> Self {
        Self::default()
    }

    /// Class for every positive status without an override
    pub fn with_positive(mut self, class: StatusClass) -> Self {
        self.positive = class;
        self
    }

    /// Class for every negative status without an override
    pub fn with_negative(mut self, class: StatusClass) -> Self {
        self.negative = class;
        self
    }

    /// Classify one specific nonzero status
    ///
    /// Later overrides of the same code replace earlier ones. An override for `0` is
    /// ignored: success is never an error.
    pub fn with_override(mut self, code: i32, class: StatusClass) -> Self {
        self.overrides.retain(|&(c, _)| c != code);
        self.overrides.push((code, class));
        self
    }

    /// Class of a status, or `None` for success
    pub fn classify(&self, status: FactorizationStatus) -> Option<StatusClass> {
        if status.is_success() {
            return None;
        }
        let code = status.code();
        let class = self
            .overrides
            .iter()
            .find(|&&(c, _)| c == code)
            .map(|&(_, class)| class)
            .unwrap_or(if code > 0 { self.positive } else { self.negative });
        Some(class)
    }
}

/// Decomposition kind and input shape every translated error carries
#[derive(Copy, Clone, Debug)]
pub(crate) struct ErrorContext<'a> {
    pub(crate) kind: DecompositionKind,
    pub(crate) shape: &'a [usize],
}

impl<'a> ErrorContext<'a> {
    pub(crate) fn new(kind: DecompositionKind, shape: &'a [usize]) -> Self {
        Self { kind, shape }
    }

    /// Check the factorization status of `routine`
    pub(crate) fn check_info(
        &self,
        table: &StatusTable,
        routine: &str,
        status: FactorizationStatus,
    ) -> Result<()> {
        let Some(class) = table.classify(status) else {
            return Ok(());
        };
        let code = status.code();
        let err = match class {
            StatusClass::SingularOrIllConditioned => Error::SingularOrIllConditioned {
                kind: self.kind,
                shape: self.shape.to_vec(),
                status: code,
            },
            StatusClass::ResourceExhausted => Error::ResourceExhausted {
                kind: self.kind,
                shape: self.shape.to_vec(),
                size: 0,
            },
            StatusClass::BackendFailure => {
                let reason = if code < 0 {
                    format!("{routine}: parameter {} had an illegal value", -code)
                } else {
                    format!("{routine}: factorization failed")
                };
                self.backend_failure(code, reason)
            }
        };
        Err(err)
    }

    /// Translate the library status of a failed `routine` call
    pub(crate) fn solver(&self, routine: &str, status: SolverStatus) -> Error {
        match status {
            SolverStatus::AllocFailed => Error::ResourceExhausted {
                kind: self.kind,
                shape: self.shape.to_vec(),
                size: 0,
            },
            other => self.backend_failure(other.code(), format!("{routine}: {other}")),
        }
    }

    /// Lift a collaborator error into the taxonomy
    pub(crate) fn lift(&self, err: Error) -> Error {
        if err.kind().is_some() {
            return err;
        }
        match err {
            Error::OutOfMemory { size } => Error::ResourceExhausted {
                kind: self.kind,
                shape: self.shape.to_vec(),
                size,
            },
            other => self.backend_failure(-1, other.to_string()),
        }
    }

    fn backend_failure(&self, status: i32, reason: String) -> Error {
        warn!(
            kind = %self.kind,
            shape = ?self.shape,
            status,
            reason = %reason,
            "backend failure"
        );
        Error::BackendFailure {
            kind: self.kind,
            shape: self.shape.to_vec(),
            status,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_classification() {
        let table = StatusTable::default();
        assert_eq!(table.classify(FactorizationStatus::SUCCESS), None);
        assert_eq!(
            table.classify(FactorizationStatus(3)),
            Some(StatusClass::SingularOrIllConditioned)
        );
        assert_eq!(
            table.classify(FactorizationStatus(-2)),
            Some(StatusClass::BackendFailure)
        );
    }

    #[test]
    fn test_overrides() {
        let table = StatusTable::new()
            .with_override(1, StatusClass::BackendFailure)
            .with_override(1, StatusClass::ResourceExhausted)
            .with_negative(StatusClass::SingularOrIllConditioned)
            .with_override(0, StatusClass::BackendFailure);
        assert_eq!(
            table.classify(FactorizationStatus(1)),
            Some(StatusClass::ResourceExhausted)
        );
        assert_eq!(
            table.classify(FactorizationStatus(2)),
            Some(StatusClass::SingularOrIllConditioned)
        );
        assert_eq!(
            table.classify(FactorizationStatus(-4)),
            Some(StatusClass::SingularOrIllConditioned)
        );
        assert_eq!(table.classify(FactorizationStatus(0)), None);

        let table = StatusTable::new().with_positive(StatusClass::BackendFailure);
        assert_eq!(
            table.classify(FactorizationStatus(5)),
            Some(StatusClass::BackendFailure)
        );
    }

    #[test]
    fn test_check_info_carries_context() {
        let shape = [3, 3];
        let ctx = ErrorContext::new(DecompositionKind::Cholesky, &shape);
        let err = ctx
            .check_info(&StatusTable::default(), "potrf", FactorizationStatus(2))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SingularOrIllConditioned {
                kind: DecompositionKind::Cholesky,
                status: 2,
                ..
            }
        ));
        assert_eq!(err.input_shape(), Some(&shape[..]));

        let err = ctx
            .check_info(&StatusTable::default(), "potrf", FactorizationStatus(-4))
            .unwrap_err();
        match err {
            Error::BackendFailure { status, reason, .. } => {
                assert_eq!(status, -4);
                assert!(reason.contains("parameter 4"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_solver_status_translation() {
        let shape = [4, 2];
        let ctx = ErrorContext::new(DecompositionKind::Qr, &shape);
        assert!(matches!(
            ctx.solver("geqrf_bufferSize", SolverStatus::AllocFailed),
            Error::ResourceExhausted { size: 0, .. }
        ));
        assert!(matches!(
            ctx.solver("geqrf", SolverStatus::InvalidValue),
            Error::BackendFailure { status: 4, .. }
        ));
    }

    #[test]
    fn test_lift_collaborator_errors() {
        let shape = [2, 2];
        let ctx = ErrorContext::new(DecompositionKind::Qr, &shape);
        assert!(matches!(
            ctx.lift(Error::OutOfMemory { size: 32 }),
            Error::ResourceExhausted { size: 32, .. }
        ));
        assert!(matches!(
            ctx.lift(Error::Backend("copy failed".into())),
            Error::BackendFailure { status: -1, .. }
        ));
        let already = Error::shape(DecompositionKind::Cholesky, &[1], "x");
        assert!(matches!(ctx.lift(already), Error::ShapeError { .. }));
    }
}
