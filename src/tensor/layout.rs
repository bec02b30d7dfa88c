//! Layout: shape, strides, and offset for tensor memory layout

use smallvec::SmallVec;
use std::fmt;

/// Stack allocation threshold for dimensions
/// Matrices are 2-D; anything up to 4 dimensions stays on the stack
const STACK_DIMS: usize = 4;

/// Shape type: dimensions of a tensor
pub type Shape = SmallVec<[usize; STACK_DIMS]>;

/// Strides type: element offsets between consecutive elements along each dimension
/// NOTE: Strides are in ELEMENTS, not bytes
pub type Strides = SmallVec<[isize; STACK_DIMS]>;

/// Element order of a dense buffer
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MemoryOrder {
    /// Last dimension varies fastest (C order)
    #[default]
    RowMajor,
    /// First dimension varies fastest (Fortran order, the solver's native layout)
    ColumnMajor,
}

/// Layout describes the memory layout of a tensor
///
/// A tensor's elements are stored in a contiguous buffer, but not necessarily
/// in row-major order. The layout specifies how to compute the memory address
/// of any element given its indices.
///
/// Address of element at indices [i0, i1, ..., in]:
///   offset + i0 * strides[0] + i1 * strides[1] + ... + in * strides[n]
#[derive(Clone, PartialEq, Eq)]
pub struct Layout {
    /// Shape: size along each dimension
    shape: Shape,
    /// Strides: offset (in elements) between consecutive elements along each dimension
    strides: Strides,
    /// Offset: starting element index in the underlying storage
    offset: usize,
}

impl Layout {
    /// Create a new contiguous (row-major/C-order) layout from a shape
    ///
    /// # Example
    /// ```
    /// use densolve::tensor::Layout;
    /// let layout = Layout::contiguous(&[2, 3, 4]);
    /// assert_eq!(layout.shape(), &[2, 3, 4]);
    /// assert_eq!(layout.strides(), &[12, 4, 1]);
    /// ```
    pub fn contiguous(shape: &[usize]) -> Self {
        let shape: Shape = shape.iter().copied().collect();
        let strides = Self::compute_contiguous_strides(&shape);
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create a column-major (Fortran-order) layout from a shape
    ///
    /// # Example
    /// ```
    /// use densolve::tensor::Layout;
    /// let layout = Layout::column_major(&[2, 3]);
    /// assert_eq!(layout.strides(), &[1, 2]);
    /// assert!(layout.is_col_major());
    /// ```
    pub fn column_major(shape: &[usize]) -> Self {
        let shape: Shape = shape.iter().copied().collect();
        let strides = Self::compute_col_major_strides(&shape);
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Dense layout in the given order
    pub fn with_order(shape: &[usize], order: MemoryOrder) -> Self {
        match order {
            MemoryOrder::RowMajor => Self::contiguous(shape),
            MemoryOrder::ColumnMajor => Self::column_major(shape),
        }
    }

    /// Compute contiguous strides for a given shape (row-major order)
    fn compute_contiguous_strides(shape: &[usize]) -> Strides {
        let mut strides: Strides = SmallVec::with_capacity(shape.len());
        let mut stride = 1isize;

        // Compute strides from last dimension to first
        for &dim in shape.iter().rev() {
            strides.push(stride);
            stride *= dim as isize;
        }

        strides.reverse();
        strides
    }

    fn compute_col_major_strides(shape: &[usize]) -> Strides {
        let mut strides: Strides = SmallVec::with_capacity(shape.len());
        let mut stride = 1isize;
        for &dim in shape.iter() {
            strides.push(stride);
            stride *= dim as isize;
        }
        strides
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check if memory is contiguous (row-major order)
    pub fn is_contiguous(&self) -> bool {
        self.offset == 0 && Self::strides_match(&self.shape, &self.strides, false)
    }

    /// Check if memory is dense column-major
    ///
    /// A column-major `m×n` matrix is the row-major `n×m` buffer of its transpose, which
    /// is exactly the layout the solver routines operate on.
    pub fn is_col_major(&self) -> bool {
        self.offset == 0 && Self::strides_match(&self.shape, &self.strides, true)
    }

    /// Compare strides against the dense strides of `shape`, ignoring size-1 dimensions
    fn strides_match(shape: &[usize], strides: &[isize], col_major: bool) -> bool {
        let expected = if col_major {
            Self::compute_col_major_strides(shape)
        } else {
            Self::compute_contiguous_strides(shape)
        };
        shape
            .iter()
            .zip(strides.iter().zip(expected.iter()))
            .all(|(&dim, (&got, &want))| dim <= 1 || got == want)
    }

    /// Normalize a dimension index (handle negative indices)
    pub fn normalize_dim(&self, d: isize) -> Option<usize> {
        let ndim = self.ndim() as isize;
        let idx = if d < 0 { ndim + d } else { d };
        if idx >= 0 && idx < ndim {
            Some(idx as usize)
        } else {
            None
        }
    }

    /// Number of storage elements the layout reaches
    ///
    /// Zero for an empty layout. `None` if an index would fall before the start of the
    /// storage or overflow.
    pub fn storage_span(&self) -> Option<usize> {
        if self.elem_count() == 0 {
            return Some(0);
        }
        let (mut lo, mut hi) = (self.offset as isize, self.offset as isize);
        for (&dim, &stride) in self.shape.iter().zip(self.strides.iter()) {
            let reach = (dim as isize - 1).checked_mul(stride)?;
            if reach < 0 {
                lo = lo.checked_add(reach)?;
            } else {
                hi = hi.checked_add(reach)?;
            }
        }
        if lo < 0 {
            return None;
        }
        usize::try_from(hi).ok()?.checked_add(1)
    }

    /// Storage offsets of every element, visited in row-major logical order
    pub fn offsets(&self) -> impl Iterator<Item = usize> + '_ {
        let numel = self.elem_count();
        let mut indices: Shape = SmallVec::from_elem(0, self.ndim());
        (0..numel).map(move |_| {
            let mut linear = self.offset as isize;
            for (&idx, &stride) in indices.iter().zip(self.strides.iter()) {
                linear += idx as isize * stride;
            }
            // Increment indices (row-major order)
            for dim in (0..indices.len()).rev() {
                indices[dim] += 1;
                if indices[dim] < self.shape[dim] {
                    break;
                }
                indices[dim] = 0;
            }
            linear as usize
        })
    }

    /// Create a transposed layout (swap two dimensions)
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Option<Self> {
        let d0 = self.normalize_dim(dim0)?;
        let d1 = self.normalize_dim(dim1)?;

        let mut new_shape = self.shape.clone();
        let mut new_strides = self.strides.clone();

        new_shape.swap(d0, d1);
        new_strides.swap(d0, d1);

        Some(Self {
            shape: new_shape,
            strides: new_strides,
            offset: self.offset,
        })
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("shape", &self.shape.as_slice())
            .field("strides", &self.strides.as_slice())
            .field("offset", &self.offset)
            .finish()
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.shape.as_slice())
    }
}
