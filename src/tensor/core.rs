//! Core Tensor type

use super::{Layout, MemoryOrder, Storage};
use crate::dtype::{DType, Element, dispatch_dtype};
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use std::fmt;

/// N-dimensional array stored on a compute device
///
/// `Tensor` consists of:
/// - **Storage**: Reference-counted device memory, tied to the client that allocated it
/// - **Layout**: Shape, strides, and offset defining the view into storage
/// - **DType**: Element type (determined at runtime)
///
/// Decomposition inputs may have any strides (row-major, column-major, transposed
/// views); they are only ever read.
///
/// # Example
///
/// ```
/// use densolve::prelude::*;
///
/// let client = CpuClient::default();
/// let a = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[2, 2], &client);
/// let b = a.t().unwrap(); // Zero-copy, shares storage with a
/// assert!(b.is_col_major());
/// ```
pub struct Tensor<R: Runtime> {
    /// Device memory
    storage: Storage<R>,
    /// Shape, strides, offset
    layout: Layout,
}

impl<R: Runtime> Tensor<R> {
    /// Create a tensor from storage and layout
    pub fn from_parts(storage: Storage<R>, layout: Layout) -> Self {
        Self { storage, layout }
    }

    /// Create a tensor from a slice of row-major data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of the `shape` dimensions.
    /// For a fallible alternative, use [`Self::try_from_slice`].
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize], client: &R::Client) -> Self {
        Self::try_from_slice(data, shape, client).expect("Tensor::from_slice failed")
    }

    /// Create a tensor from a slice of row-major data (fallible version)
    ///
    /// Returns an error if `data.len()` does not equal the product of the `shape` dimensions,
    /// or if memory allocation fails.
    pub fn try_from_slice<T: Element>(
        data: &[T],
        shape: &[usize],
        client: &R::Client,
    ) -> Result<Self> {
        Self::try_from_slice_ordered(data, shape, MemoryOrder::RowMajor, client)
    }

    /// Create a tensor from a dense slice stored in the given element order
    pub fn try_from_slice_ordered<T: Element>(
        data: &[T],
        shape: &[usize],
        order: MemoryOrder,
        client: &R::Client,
    ) -> Result<Self> {
        let expected_len: usize = shape.iter().product();
        if data.len() != expected_len {
            return Err(Error::ShapeMismatch {
                expected: shape.to_vec(),
                got: vec![data.len()],
            });
        }

        let storage = Storage::from_slice(data, client)?;
        Ok(Self {
            storage,
            layout: Layout::with_order(shape, order),
        })
    }

    // ===== Accessors =====

    /// Get the storage
    #[inline]
    pub fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Get the number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Get the total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.elem_count()
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Get the client that owns this tensor's memory
    #[inline]
    pub fn client(&self) -> &R::Client {
        self.storage.client()
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.storage.device()
    }

    /// Check if the tensor is contiguous in row-major order
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Check if the tensor is dense in column-major order
    #[inline]
    pub fn is_col_major(&self) -> bool {
        self.layout.is_col_major()
    }

    /// Check that the storage holds every element the layout addresses
    pub fn check_storage_bounds(&self) -> Result<()> {
        match self.layout.storage_span() {
            Some(span) if span <= self.storage.len() => Ok(()),
            span => Err(Error::InvalidArgument {
                arg: "layout",
                reason: format!(
                    "layout {:?} reaches {} elements but storage holds {}",
                    self.layout,
                    span.map_or_else(|| "out-of-range".to_string(), |s| s.to_string()),
                    self.storage.len()
                ),
            }),
        }
    }

    // ===== View Operations (Zero-Copy) =====

    /// Transpose two dimensions (zero-copy)
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Result<Self> {
        let new_layout =
            self.layout
                .transpose(dim0, dim1)
                .ok_or_else(|| Error::InvalidArgument {
                    arg: "dim",
                    reason: format!(
                        "cannot transpose dims ({dim0}, {dim1}) of a {}-D tensor",
                        self.ndim()
                    ),
                })?;

        Ok(Self {
            storage: self.storage.clone(),
            layout: new_layout,
        })
    }

    /// Transpose last two dimensions (matrix transpose)
    pub fn t(&self) -> Result<Self> {
        self.transpose(-2, -1)
    }

    // ===== Data Access =====

    /// Copy tensor data to a Vec on the host, in row-major logical order
    ///
    /// # Panics
    ///
    /// Panics if `T` does not match the tensor dtype or the device copy fails.
    /// For a fallible alternative, use [`Self::try_to_vec`].
    pub fn to_vec<T: Element>(&self) -> Vec<T> {
        self.try_to_vec().expect("Tensor::to_vec failed")
    }

    /// Copy tensor data to a Vec on the host, in row-major logical order (fallible version)
    ///
    /// Strided views are gathered on the host, so the result always matches the
    /// tensor's logical shape.
    pub fn try_to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype() {
            return Err(Error::DTypeMismatch {
                lhs: self.dtype(),
                rhs: T::DTYPE,
            });
        }
        self.check_storage_bounds()?;
        let raw: Vec<T> = self.storage.to_vec()?;
        if self.is_contiguous() && raw.len() == self.numel() {
            return Ok(raw);
        }
        Ok(self.layout.offsets().map(|offset| raw[offset]).collect())
    }

    /// Copy tensor data to the host as `f64`, whatever the dtype
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        dispatch_dtype!(self.dtype(), T => {
            Ok(self
                .try_to_vec::<T>()?
                .into_iter()
                .map(Element::to_f64)
                .collect())
        }, {
            Err(Error::InvalidArgument {
                arg: "dtype",
                reason: format!("{} has no host element type in this build", self.dtype()),
            })
        })
    }
}

impl<R: Runtime> Clone for Tensor<R> {
    /// Clone creates a new tensor sharing the same storage (zero-copy)
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            layout: self.layout.clone(),
        }
    }
}

impl<R: Runtime> fmt::Debug for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .field("strides", &self.strides())
            .field("dtype", &self.dtype())
            .finish()
    }
}

impl<R: Runtime> fmt::Display for Tensor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({:?}, dtype={})", self.shape(), self.dtype())
    }
}
