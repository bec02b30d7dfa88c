//! Dense solver capability of the CUDA runtime
//!
//! Thin wrappers over the cuSOLVER dense `S`/`D` routines. Every call runs on the
//! client's stream with the client's handle; the `info` slot stays on the device until
//! the driver reads it back.

use super::{CudaClient, CudaRuntime};
use crate::algorithm::linalg::{DenseSolver, FillMode, SolverResult, SolverScalar, SolverStatus};
use crate::dtype::ComputeDType;
use crate::runtime::DeviceBuffer;
use cudarc::cusolver::sys::{self, cublasFillMode_t, cusolverStatus_t};
use std::ffi::c_int;

/// Call the `S` or `D` variant of a cuSOLVER dense routine
///
/// `$t` names the element type inside the argument list.
macro_rules! dn_call {
    ($compute:expr, $routine:ident, $t:ident => ($($arg:expr),* $(,)?)) => {
        paste::paste! {
            match $compute {
                ComputeDType::F32 => {
                    type $t = f32;
                    sys::[<cusolverDnS $routine>]($($arg),*)
                }
                ComputeDType::F64 => {
                    type $t = f64;
                    sys::[<cusolverDnD $routine>]($($arg),*)
                }
            }
        }
    };
}

fn status(code: cusolverStatus_t) -> SolverResult<()> {
    match code {
        cusolverStatus_t::CUSOLVER_STATUS_SUCCESS => Ok(()),
        cusolverStatus_t::CUSOLVER_STATUS_ALLOC_FAILED => Err(SolverStatus::AllocFailed),
        cusolverStatus_t::CUSOLVER_STATUS_INVALID_VALUE => Err(SolverStatus::InvalidValue),
        cusolverStatus_t::CUSOLVER_STATUS_EXECUTION_FAILED => Err(SolverStatus::ExecutionFailed),
        cusolverStatus_t::CUSOLVER_STATUS_NOT_SUPPORTED => Err(SolverStatus::NotSupported),
        other => Err(SolverStatus::Other(other as i32)),
    }
}

fn dim(value: usize) -> SolverResult<c_int> {
    c_int::try_from(value).map_err(|_| SolverStatus::InvalidValue)
}

fn fill_mode(uplo: FillMode) -> cublasFillMode_t {
    match uplo {
        FillMode::Lower => cublasFillMode_t::CUBLAS_FILL_MODE_LOWER,
        FillMode::Upper => cublasFillMode_t::CUBLAS_FILL_MODE_UPPER,
    }
}

fn workspace_len(lwork: c_int) -> SolverResult<usize> {
    usize::try_from(lwork)
        .map(|len| len.max(1))
        .map_err(|_| SolverStatus::InvalidValue)
}

impl CudaClient {
    fn bind(&self) -> SolverResult<()> {
        self.context
            .bind_to_thread()
            .map_err(|_| SolverStatus::ExecutionFailed)
    }
}

impl DenseSolver<CudaRuntime> for CudaClient {
    fn potrf_buffer_size<T: SolverScalar>(
        &self,
        uplo: FillMode,
        n: usize,
        a: &DeviceBuffer<CudaRuntime, T>,
        lda: usize,
    ) -> SolverResult<usize> {
        self.bind()?;
        let handle = self.solver.lock();
        let mut lwork: c_int = 0;
        // SAFETY: `a` is a live device buffer; the handle is locked for the call.
        let code = unsafe {
            dn_call!(T::COMPUTE, potrf_bufferSize, E => (
                handle.cu(),
                fill_mode(uplo),
                dim(n)?,
                a.ptr() as *mut E,
                dim(lda)?,
                &mut lwork,
            ))
        };
        status(code)?;
        workspace_len(lwork)
    }

    fn potrf<T: SolverScalar>(
        &self,
        uplo: FillMode,
        n: usize,
        a: &mut DeviceBuffer<CudaRuntime, T>,
        lda: usize,
        work: &mut DeviceBuffer<CudaRuntime, T>,
        info: &mut DeviceBuffer<CudaRuntime, i32>,
    ) -> SolverResult<()> {
        self.bind()?;
        let handle = self.solver.lock();
        // SAFETY: all buffers are live device allocations of the lengths passed.
        let code = unsafe {
            dn_call!(T::COMPUTE, potrf, E => (
                handle.cu(),
                fill_mode(uplo),
                dim(n)?,
                a.ptr() as *mut E,
                dim(lda)?,
                work.ptr() as *mut E,
                dim(work.len())?,
                info.ptr() as *mut c_int,
            ))
        };
        status(code)
    }

    fn geqrf_buffer_size<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        a: &DeviceBuffer<CudaRuntime, T>,
        lda: usize,
    ) -> SolverResult<usize> {
        self.bind()?;
        let handle = self.solver.lock();
        let mut lwork: c_int = 0;
        // SAFETY: `a` is a live device buffer; the handle is locked for the call.
        let code = unsafe {
            dn_call!(T::COMPUTE, geqrf_bufferSize, E => (
                handle.cu(),
                dim(m)?,
                dim(n)?,
                a.ptr() as *mut E,
                dim(lda)?,
                &mut lwork,
            ))
        };
        status(code)?;
        workspace_len(lwork)
    }

    fn geqrf<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        a: &mut DeviceBuffer<CudaRuntime, T>,
        lda: usize,
        tau: &mut DeviceBuffer<CudaRuntime, T>,
        work: &mut DeviceBuffer<CudaRuntime, T>,
        info: &mut DeviceBuffer<CudaRuntime, i32>,
    ) -> SolverResult<()> {
        if tau.len() < m.min(n) {
            return Err(SolverStatus::InvalidValue);
        }
        self.bind()?;
        let handle = self.solver.lock();
        // SAFETY: all buffers are live device allocations of the lengths passed.
        let code = unsafe {
            dn_call!(T::COMPUTE, geqrf, E => (
                handle.cu(),
                dim(m)?,
                dim(n)?,
                a.ptr() as *mut E,
                dim(lda)?,
                tau.ptr() as *mut E,
                work.ptr() as *mut E,
                dim(work.len())?,
                info.ptr() as *mut c_int,
            ))
        };
        status(code)
    }

    fn orgqr_buffer_size<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &DeviceBuffer<CudaRuntime, T>,
        lda: usize,
        tau: &DeviceBuffer<CudaRuntime, T>,
    ) -> SolverResult<usize> {
        self.bind()?;
        let handle = self.solver.lock();
        let mut lwork: c_int = 0;
        // SAFETY: `a` and `tau` are live device buffers; the handle is locked.
        let code = unsafe {
            dn_call!(T::COMPUTE, orgqr_bufferSize, E => (
                handle.cu(),
                dim(m)?,
                dim(n)?,
                dim(k)?,
                a.ptr() as *const E,
                dim(lda)?,
                tau.ptr() as *const E,
                &mut lwork,
            ))
        };
        status(code)?;
        workspace_len(lwork)
    }

    fn orgqr<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &mut DeviceBuffer<CudaRuntime, T>,
        lda: usize,
        tau: &DeviceBuffer<CudaRuntime, T>,
        work: &mut DeviceBuffer<CudaRuntime, T>,
        info: &mut DeviceBuffer<CudaRuntime, i32>,
    ) -> SolverResult<()> {
        if tau.len() < k {
            return Err(SolverStatus::InvalidValue);
        }
        self.bind()?;
        let handle = self.solver.lock();
        // SAFETY: all buffers are live device allocations of the lengths passed.
        let code = unsafe {
            dn_call!(T::COMPUTE, orgqr, E => (
                handle.cu(),
                dim(m)?,
                dim(n)?,
                dim(k)?,
                a.ptr() as *mut E,
                dim(lda)?,
                tau.ptr() as *const E,
                work.ptr() as *mut E,
                dim(work.len())?,
                info.ptr() as *mut c_int,
            ))
        };
        status(code)
    }
}
