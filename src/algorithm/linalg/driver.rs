//! Decomposition driver
//!
//! Runs one decomposition as an explicit state machine:
//!
//! ```text
//! Idle → Staged → WorkspaceSized → Factorized ─┬─────────────────────→ Done → Released
//!                                              └→ ExtractionPending ─→ Done
//! ```
//!
//! Any failing transition moves to `Error` and then `Released`. Every device buffer a
//! state owns is a guard, so leaving a state by any path (including `?`) returns its
//! memory to the allocator. The workspace of a routine is dropped before the next
//! state is entered.

use super::normalize::ComputePlan;
use super::solver::{DenseSolver, FillMode, SolverScalar};
use super::staging::{ComputeMatrix, stage};
use super::status::{ErrorContext, FactorizationStatus};
use crate::error::{DecompositionKind, Result};
use crate::runtime::{DeviceBuffer, Runtime, RuntimeClient};
use crate::tensor::Tensor;
use smallvec::SmallVec;
use std::fmt;
use tracing::debug;

/// Driver state, as recorded in the phase log
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Idle,
    Staged,
    WorkspaceSized,
    Factorized,
    ExtractionPending,
    Done,
    Released,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Scratch space and status slot of one solver routine
struct Workspace<R: Runtime, T: SolverScalar> {
    scratch: DeviceBuffer<R, T>,
    info: DeviceBuffer<R, i32>,
}

impl<R: Runtime, T: SolverScalar> Workspace<R, T> {
    fn new(client: &R::Client, lwork: usize) -> Result<Self> {
        Ok(Self {
            scratch: DeviceBuffer::new(client, lwork)?,
            info: DeviceBuffer::new(client, 1)?,
        })
    }

    /// Read the factorization status back from the device
    fn status(&self, client: &R::Client) -> Result<FactorizationStatus> {
        let host = self.info.to_host(client)?;
        Ok(FactorizationStatus(host.first().copied().unwrap_or_default()))
    }
}

/// Raw factors handed to the result assembler
pub(crate) enum Factors<R: Runtime, T: SolverScalar> {
    /// Column-major buffer whose lower triangle holds `L`
    Cholesky(ComputeMatrix<R, T>),
    /// `geqrf` output, its reflector scales and, if requested, the explicit `Q`
    Qr {
        packed: ComputeMatrix<R, T>,
        tau: DeviceBuffer<R, T>,
        q: Option<ComputeMatrix<R, T>>,
    },
}

enum Stage<R: Runtime, T: SolverScalar> {
    Idle,
    Staged(ComputeMatrix<R, T>),
    WorkspaceSized {
        a: ComputeMatrix<R, T>,
        tau: Option<DeviceBuffer<R, T>>,
        workspace: Workspace<R, T>,
    },
    Factorized {
        a: ComputeMatrix<R, T>,
        tau: Option<DeviceBuffer<R, T>>,
    },
    ExtractionPending {
        packed: ComputeMatrix<R, T>,
        tau: DeviceBuffer<R, T>,
        q: ComputeMatrix<R, T>,
    },
    Done(Factors<R, T>),
}

impl<R: Runtime, T: SolverScalar> Stage<R, T> {
    fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Staged(_) => Phase::Staged,
            Self::WorkspaceSized { .. } => Phase::WorkspaceSized,
            Self::Factorized { .. } => Phase::Factorized,
            Self::ExtractionPending { .. } => Phase::ExtractionPending,
            Self::Done(_) => Phase::Done,
        }
    }
}

/// Runs one decomposition call on a client
pub(crate) struct Driver<'a, R: Runtime> {
    client: &'a R::Client,
    plan: &'a ComputePlan,
    ctx: ErrorContext<'a>,
    phases: SmallVec<[Phase; 8]>,
}

impl<'a, R> Driver<'a, R>
where
    R: Runtime,
    R::Client: DenseSolver<R>,
{
    pub(crate) fn new(client: &'a R::Client, plan: &'a ComputePlan) -> Self {
        let mut phases = SmallVec::new();
        phases.push(Phase::Idle);
        Self {
            client,
            plan,
            ctx: ErrorContext::new(plan.kind(), plan.shape()),
            phases,
        }
    }

    /// States entered so far
    pub(crate) fn phases(&self) -> &[Phase] {
        &self.phases
    }

    /// Run the state machine to `Done`, hand the factors to `assemble`, then release
    ///
    /// Errors from `assemble` are translated like any other collaborator error.
    pub(crate) fn execute<T, O>(
        &mut self,
        input: &Tensor<R>,
        assemble: impl FnOnce(&R::Client, Factors<R, T>) -> Result<O>,
    ) -> Result<O>
    where
        T: SolverScalar,
    {
        let result = self
            .run::<T>(input)
            .and_then(|factors| assemble(self.client, factors).map_err(|e| self.ctx.lift(e)));
        if result.is_err() {
            self.enter(Phase::Error);
        }
        self.enter(Phase::Released);
        result
    }

    fn run<T: SolverScalar>(&mut self, input: &Tensor<R>) -> Result<Factors<R, T>> {
        let mut stage = Stage::<R, T>::Idle;
        loop {
            stage = match stage {
                Stage::Idle => self.stage_input(input)?,
                Stage::Staged(a) => self.size_workspace(a)?,
                Stage::WorkspaceSized { a, tau, workspace } => {
                    self.factorize(a, tau, workspace)?
                }
                Stage::Factorized { a, tau } => self.prepare_extraction(a, tau)?,
                Stage::ExtractionPending { packed, tau, q } => self.extract_q(packed, tau, q)?,
                Stage::Done(factors) => return Ok(factors),
            };
            self.enter(stage.phase());
        }
    }

    fn enter(&mut self, phase: Phase) {
        debug!(
            kind = %self.plan.kind(),
            shape = ?self.plan.shape(),
            phase = %phase,
            "decomposition state"
        );
        self.phases.push(phase);
    }

    fn k(&self) -> usize {
        self.plan.m().min(self.plan.n())
    }

    /// `Idle → Staged`
    fn stage_input<T: SolverScalar>(&self, input: &Tensor<R>) -> Result<Stage<R, T>> {
        stage::<R, T>(self.client, input)
            .map(Stage::Staged)
            .map_err(|e| self.ctx.lift(e))
    }

    /// `Staged → WorkspaceSized`
    fn size_workspace<T: SolverScalar>(&self, a: ComputeMatrix<R, T>) -> Result<Stage<R, T>> {
        let (m, n, lda) = (a.rows(), a.cols(), a.lda());
        let (routine, query) = match self.plan.kind() {
            DecompositionKind::Cholesky => (
                "potrf_buffer_size",
                self.client
                    .potrf_buffer_size(FillMode::Lower, n, a.buffer(), lda),
            ),
            DecompositionKind::Qr => (
                "geqrf_buffer_size",
                self.client.geqrf_buffer_size(m, n, a.buffer(), lda),
            ),
        };
        let lwork = query.map_err(|status| self.ctx.solver(routine, status))?;

        let tau = match self.plan.kind() {
            DecompositionKind::Cholesky => None,
            DecompositionKind::Qr => {
                Some(DeviceBuffer::new(self.client, self.k()).map_err(|e| self.ctx.lift(e))?)
            }
        };
        let workspace = Workspace::new(self.client, lwork).map_err(|e| self.ctx.lift(e))?;
        Ok(Stage::WorkspaceSized { a, tau, workspace })
    }

    /// `WorkspaceSized → Factorized`
    fn factorize<T: SolverScalar>(
        &self,
        mut a: ComputeMatrix<R, T>,
        mut tau: Option<DeviceBuffer<R, T>>,
        mut workspace: Workspace<R, T>,
    ) -> Result<Stage<R, T>> {
        let (m, n, lda) = (a.rows(), a.cols(), a.lda());
        let Workspace { scratch, info } = &mut workspace;
        let (routine, call) = match tau.as_mut() {
            None => (
                "potrf",
                self.client
                    .potrf(FillMode::Lower, n, a.buffer_mut(), lda, scratch, info),
            ),
            Some(tau) => (
                "geqrf",
                self.client
                    .geqrf(m, n, a.buffer_mut(), lda, tau, scratch, info),
            ),
        };
        call.map_err(|status| self.ctx.solver(routine, status))?;

        let status = workspace
            .status(self.client)
            .map_err(|e| self.ctx.lift(e))?;
        drop(workspace);
        self.ctx
            .check_info(self.client.config().status_table(), routine, status)?;
        Ok(Stage::Factorized { a, tau })
    }

    /// `Factorized → ExtractionPending | Done`
    fn prepare_extraction<T: SolverScalar>(
        &self,
        a: ComputeMatrix<R, T>,
        tau: Option<DeviceBuffer<R, T>>,
    ) -> Result<Stage<R, T>> {
        let (Some(tau), Some(policy)) = (tau, self.plan.qr_policy()) else {
            return Ok(Stage::Done(Factors::Cholesky(a)));
        };
        if !policy.extracts_q() {
            return Ok(Stage::Done(Factors::Qr {
                packed: a,
                tau,
                q: None,
            }));
        }

        let q_cols = policy.q_cols();
        let q = ComputeMatrix::uninit(self.client, a.rows(), q_cols)
            .map_err(|e| self.ctx.lift(e))?;
        a.copy_columns_to(self.client, &q, q_cols.min(a.cols()))
            .map_err(|e| self.ctx.lift(e))?;
        Ok(Stage::ExtractionPending { packed: a, tau, q })
    }

    /// `ExtractionPending → Done`
    fn extract_q<T: SolverScalar>(
        &self,
        packed: ComputeMatrix<R, T>,
        tau: DeviceBuffer<R, T>,
        mut q: ComputeMatrix<R, T>,
    ) -> Result<Stage<R, T>> {
        let (m, cols, lda, k) = (q.rows(), q.cols(), q.lda(), self.k());
        let lwork = self
            .client
            .orgqr_buffer_size(m, cols, k, q.buffer(), lda, &tau)
            .map_err(|status| self.ctx.solver("orgqr_buffer_size", status))?;
        let mut workspace = Workspace::new(self.client, lwork).map_err(|e| self.ctx.lift(e))?;

        let Workspace { scratch, info } = &mut workspace;
        self.client
            .orgqr(m, cols, k, q.buffer_mut(), lda, &tau, scratch, info)
            .map_err(|status| self.ctx.solver("orgqr", status))?;

        let status = workspace
            .status(self.client)
            .map_err(|e| self.ctx.lift(e))?;
        drop(workspace);
        self.ctx
            .check_info(self.client.config().status_table(), "orgqr", status)?;
        Ok(Stage::Done(Factors::Qr {
            packed,
            tau,
            q: Some(q),
        }))
    }
}
