//! Dense solver capability of the CPU runtime
//!
//! Device buffers on the CPU are host memory, so the routines view them as slices and
//! run the reference kernels from [`super::lapack`] directly.

use super::lapack;
use super::{CpuClient, CpuRuntime};
use crate::algorithm::linalg::{DenseSolver, FillMode, SolverResult, SolverScalar, SolverStatus};
use crate::dtype::Element;
use crate::runtime::DeviceBuffer;

/// View a CPU device buffer as a host slice
fn host_slice<T: Element>(buf: &DeviceBuffer<CpuRuntime, T>) -> &[T] {
    if buf.is_empty() {
        return &[];
    }
    // SAFETY: CPU buffers are 64-byte aligned host allocations of `len` elements that
    // live as long as `buf`.
    unsafe { std::slice::from_raw_parts(buf.ptr() as *const T, buf.len()) }
}

/// View a CPU device buffer as a mutable host slice
fn host_slice_mut<T: Element>(buf: &mut DeviceBuffer<CpuRuntime, T>) -> &mut [T] {
    if buf.is_empty() {
        return &mut [];
    }
    // SAFETY: as in `host_slice`; the exclusive borrow of `buf` makes the view unique.
    unsafe { std::slice::from_raw_parts_mut(buf.ptr() as *mut T, buf.len()) }
}

/// Check that an `rows×cols` matrix with leading dimension `lda` fits in `len` elements
fn check_matrix(rows: usize, cols: usize, lda: usize, len: usize) -> SolverResult<()> {
    if lda < rows.max(1) {
        return Err(SolverStatus::InvalidValue);
    }
    let needed = if cols == 0 { 0 } else { (cols - 1) * lda + rows };
    if len < needed {
        return Err(SolverStatus::InvalidValue);
    }
    Ok(())
}

fn write_info(info: &mut DeviceBuffer<CpuRuntime, i32>, value: i32) -> SolverResult<()> {
    match host_slice_mut(info).first_mut() {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(SolverStatus::InvalidValue),
    }
}

impl DenseSolver<CpuRuntime> for CpuClient {
    fn potrf_buffer_size<T: SolverScalar>(
        &self,
        _uplo: FillMode,
        n: usize,
        a: &DeviceBuffer<CpuRuntime, T>,
        lda: usize,
    ) -> SolverResult<usize> {
        check_matrix(n, n, lda, a.len())?;
        Ok(n.max(1))
    }

    fn potrf<T: SolverScalar>(
        &self,
        uplo: FillMode,
        n: usize,
        a: &mut DeviceBuffer<CpuRuntime, T>,
        lda: usize,
        work: &mut DeviceBuffer<CpuRuntime, T>,
        info: &mut DeviceBuffer<CpuRuntime, i32>,
    ) -> SolverResult<()> {
        check_matrix(n, n, lda, a.len())?;
        if work.len() < n {
            return Err(SolverStatus::InvalidValue);
        }
        let status = lapack::potrf(uplo, n, host_slice_mut(a), lda, host_slice_mut(work));
        write_info(info, status)
    }

    fn geqrf_buffer_size<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        a: &DeviceBuffer<CpuRuntime, T>,
        lda: usize,
    ) -> SolverResult<usize> {
        check_matrix(m, n, lda, a.len())?;
        Ok(m.max(1))
    }

    fn geqrf<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        a: &mut DeviceBuffer<CpuRuntime, T>,
        lda: usize,
        tau: &mut DeviceBuffer<CpuRuntime, T>,
        work: &mut DeviceBuffer<CpuRuntime, T>,
        info: &mut DeviceBuffer<CpuRuntime, i32>,
    ) -> SolverResult<()> {
        check_matrix(m, n, lda, a.len())?;
        if tau.len() < m.min(n) || work.len() < m {
            return Err(SolverStatus::InvalidValue);
        }
        lapack::geqrf(
            m,
            n,
            host_slice_mut(a),
            lda,
            host_slice_mut(tau),
            host_slice_mut(work),
        );
        write_info(info, 0)
    }

    fn orgqr_buffer_size<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &DeviceBuffer<CpuRuntime, T>,
        lda: usize,
        tau: &DeviceBuffer<CpuRuntime, T>,
    ) -> SolverResult<usize> {
        if n > m || k > n || tau.len() < k {
            return Err(SolverStatus::InvalidValue);
        }
        check_matrix(m, n, lda, a.len())?;
        Ok(m.max(1))
    }

    fn orgqr<T: SolverScalar>(
        &self,
        m: usize,
        n: usize,
        k: usize,
        a: &mut DeviceBuffer<CpuRuntime, T>,
        lda: usize,
        tau: &DeviceBuffer<CpuRuntime, T>,
        work: &mut DeviceBuffer<CpuRuntime, T>,
        info: &mut DeviceBuffer<CpuRuntime, i32>,
    ) -> SolverResult<()> {
        if n > m || k > n || tau.len() < k || work.len() < m {
            return Err(SolverStatus::InvalidValue);
        }
        check_matrix(m, n, lda, a.len())?;
        lapack::orgqr(
            m,
            n,
            k,
            host_slice_mut(a),
            lda,
            host_slice(tau),
            host_slice_mut(work),
        );
        write_info(info, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_rejects_short_lda() {
        let client = CpuClient::default();
        let a = DeviceBuffer::<CpuRuntime, f64>::new(&client, 6).unwrap();
        assert_eq!(
            client.geqrf_buffer_size(3, 2, &a, 2),
            Err(SolverStatus::InvalidValue)
        );
        assert_eq!(client.geqrf_buffer_size(3, 2, &a, 3), Ok(3));
    }

    #[test]
    fn test_potrf_writes_info() {
        let client = CpuClient::default();
        // [[1, 2], [2, 1]] is indefinite
        let mut a = DeviceBuffer::<CpuRuntime, f64>::from_host(&client, &[1.0, 2.0, 2.0, 1.0])
            .unwrap();
        let lwork = client.potrf_buffer_size(FillMode::Lower, 2, &a, 2).unwrap();
        let mut work = DeviceBuffer::<CpuRuntime, f64>::new(&client, lwork).unwrap();
        let mut info = DeviceBuffer::<CpuRuntime, i32>::new(&client, 1).unwrap();
        client
            .potrf(FillMode::Lower, 2, &mut a, 2, &mut work, &mut info)
            .unwrap();
        assert_eq!(info.to_host(&client).unwrap(), [2]);
    }

    #[test]
    fn test_short_workspace_is_invalid_value() {
        let client = CpuClient::default();
        let mut a = DeviceBuffer::<CpuRuntime, f32>::new(&client, 4).unwrap();
        let mut tau = DeviceBuffer::<CpuRuntime, f32>::new(&client, 2).unwrap();
        let mut work = DeviceBuffer::<CpuRuntime, f32>::new(&client, 1).unwrap();
        let mut info = DeviceBuffer::<CpuRuntime, i32>::new(&client, 1).unwrap();
        assert_eq!(
            client.geqrf(2, 2, &mut a, 2, &mut tau, &mut work, &mut info),
            Err(SolverStatus::InvalidValue)
        );
    }
}
