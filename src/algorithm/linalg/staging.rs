//! Device staging of decomposition inputs
//!
//! The solver routines work in place on a dense column-major buffer in the compute
//! dtype. Staging always makes a private copy, so the caller's tensor is never
//! mutated. A column-major input that is already in the compute dtype is copied on
//! the device; anything else is gathered on the host, converted, and uploaded.

use super::solver::SolverScalar;
use crate::dtype::{Element, dispatch_dtype};
use crate::error::{Error, Result};
use crate::runtime::{DeviceBuffer, Runtime, RuntimeClient};
use crate::tensor::Tensor;

/// Dense column-major `m×n` matrix in device memory, with `lda = m`
pub(crate) struct ComputeMatrix<R: Runtime, T: SolverScalar> {
    buffer: DeviceBuffer<R, T>,
    m: usize,
    n: usize,
}

impl<R: Runtime, T: SolverScalar> ComputeMatrix<R, T> {
    /// Allocate an uninitialized `m×n` matrix
    pub(crate) fn uninit(client: &R::Client, m: usize, n: usize) -> Result<Self> {
        Ok(Self {
            buffer: DeviceBuffer::new(client, m * n)?,
            m,
            n,
        })
    }

    #[inline]
    pub(crate) fn rows(&self) -> usize {
        self.m
    }

    #[inline]
    pub(crate) fn cols(&self) -> usize {
        self.n
    }

    /// Leading dimension
    #[inline]
    pub(crate) fn lda(&self) -> usize {
        self.m
    }

    #[inline]
    pub(crate) fn buffer(&self) -> &DeviceBuffer<R, T> {
        &self.buffer
    }

    #[inline]
    pub(crate) fn buffer_mut(&mut self) -> &mut DeviceBuffer<R, T> {
        &mut self.buffer
    }

    pub(crate) fn into_buffer(self) -> DeviceBuffer<R, T> {
        self.buffer
    }

    /// Copy the leading `cols` columns of `self` into the leading columns of `dst`
    ///
    /// Both matrices must have the same number of rows.
    pub(crate) fn copy_columns_to(
        &self,
        client: &R::Client,
        dst: &Self,
        cols: usize,
    ) -> Result<()> {
        if dst.m != self.m || cols > self.n.min(dst.n) {
            return Err(Error::shape_mismatch(&[self.m, cols], &[dst.m, dst.n]));
        }
        self.buffer.copy_prefix_to(client, &dst.buffer, self.m * cols)
    }

    /// Download the matrix in column-major order
    pub(crate) fn to_host(&self, client: &R::Client) -> Result<Vec<T>> {
        self.buffer.to_host(client)
    }
}

/// Materialize the column-major compute copy of a 2-D input
pub(crate) fn stage<R: Runtime, T: SolverScalar>(
    client: &R::Client,
    input: &Tensor<R>,
) -> Result<ComputeMatrix<R, T>> {
    let &[m, n] = input.shape() else {
        return Err(Error::InvalidArgument {
            arg: "input",
            reason: format!("expected a 2-D matrix, got shape {:?}", input.shape()),
        });
    };
    input.check_storage_bounds()?;

    if input.dtype() == T::DTYPE && input.is_col_major() {
        let matrix = ComputeMatrix::uninit(client, m, n)?;
        client.copy_within_device(
            input.storage().ptr(),
            matrix.buffer.ptr(),
            matrix.buffer.size_in_bytes(),
        )?;
        return Ok(matrix);
    }

    let row_major = gather_as::<R, T>(input)?;
    let mut column_major = vec![<T as Element>::zero(); m * n];
    for (i, row) in row_major.chunks_exact(n).enumerate() {
        for (j, &x) in row.iter().enumerate() {
            column_major[i + j * m] = x;
        }
    }
    Ok(ComputeMatrix {
        buffer: DeviceBuffer::from_host(client, &column_major)?,
        m,
        n,
    })
}

/// Read the input back in row-major order, converted to `T`
fn gather_as<R: Runtime, T: SolverScalar>(input: &Tensor<R>) -> Result<Vec<T>> {
    if input.dtype() == T::DTYPE {
        return input.try_to_vec::<T>();
    }
    dispatch_dtype!(input.dtype(), S => {
        Ok(input
            .try_to_vec::<S>()?
            .into_iter()
            .map(|x| T::from_f64(Element::to_f64(x)))
            .collect())
    }, {
        Err(Error::InvalidArgument {
            arg: "input",
            reason: format!("{} has no host element type in this build", input.dtype()),
        })
    })
}
