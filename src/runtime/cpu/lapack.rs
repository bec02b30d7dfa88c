//! Reference dense factorization kernels
//!
//! Unblocked LAPACK-semantics `potrf`, `geqrf` (`geqr2`) and `orgqr` (`org2r`) on
//! column-major slices. Element `(i, j)` of a matrix with leading dimension `lda` lives
//! at `a[i + j * lda]`. Trailing-column updates run on rayon when the `rayon` feature is
//! enabled.

use crate::algorithm::linalg::{FillMode, SolverScalar};
use crate::dtype::Element;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Cholesky factorization in place; returns the LAPACK `info` value
///
/// `work` must hold at least `n` elements.
pub(crate) fn potrf<T: SolverScalar>(
    uplo: FillMode,
    n: usize,
    a: &mut [T],
    lda: usize,
    work: &mut [T],
) -> i32 {
    match uplo {
        FillMode::Lower => potrf_lower(n, a, lda, work),
        FillMode::Upper => potrf_upper(n, a, lda),
    }
}

/// Left-looking column Cholesky on the lower triangle
fn potrf_lower<T: SolverScalar>(n: usize, a: &mut [T], lda: usize, work: &mut [T]) -> i32 {
    for j in 0..n {
        // Row j of L computed so far
        for p in 0..j {
            work[p] = a[j + p * lda];
        }
        let row = &work[..j];

        let mut diag = a[j + j * lda];
        for &l in row {
            diag = diag - l * l;
        }
        if diag.is_nan() || diag <= T::from_f64(0.0) {
            return (j + 1) as i32;
        }
        let diag = diag.sqrt();
        a[j + j * lda] = diag;

        let (prev, rest) = a.split_at_mut(j * lda);
        let prev = &*prev;
        let below = &mut rest[j + 1..n];
        let update = |(offset, x): (usize, &mut T)| {
            let i = j + 1 + offset;
            let mut acc = *x;
            for (p, &l) in row.iter().enumerate() {
                acc = acc - prev[i + p * lda] * l;
            }
            *x = acc / diag;
        };

        #[cfg(feature = "rayon")]
        below.par_iter_mut().enumerate().for_each(update);
        #[cfg(not(feature = "rayon"))]
        below.iter_mut().enumerate().for_each(update);
    }
    0
}

/// Column Cholesky on the upper triangle (`A = Uᵗ·U`)
fn potrf_upper<T: SolverScalar>(n: usize, a: &mut [T], lda: usize) -> i32 {
    for j in 0..n {
        for i in 0..j {
            let mut acc = a[i + j * lda];
            for p in 0..i {
                acc = acc - a[p + i * lda] * a[p + j * lda];
            }
            a[i + j * lda] = acc / a[i + i * lda];
        }

        let mut diag = a[j + j * lda];
        for p in 0..j {
            let u = a[p + j * lda];
            diag = diag - u * u;
        }
        if diag.is_nan() || diag <= T::from_f64(0.0) {
            return (j + 1) as i32;
        }
        a[j + j * lda] = diag.sqrt();
    }
    0
}

/// Generate an elementary reflector `H = I - tau·v·vᵗ` with `H·[alpha; x] = [beta; 0]`
///
/// Overwrites `x` with `v[1..]` and returns `(beta, tau)`.
fn larfg<T: SolverScalar>(alpha: T, x: &mut [T]) -> (T, T) {
    let zero = T::from_f64(0.0);
    let xnorm = x.iter().fold(zero, |acc, &v| acc.hypot(v));
    if xnorm == zero {
        return (alpha, zero);
    }
    let norm = alpha.hypot(xnorm);
    let beta = if alpha >= zero { -norm } else { norm };
    let tau = (beta - alpha) / beta;
    let scale = T::from_f64(1.0) / (alpha - beta);
    for v in x.iter_mut() {
        *v = *v * scale;
    }
    (beta, tau)
}

/// Apply `H = I - tau·v·vᵗ` from the left to column segments `rows` of every column
/// in `cols` (each chunk of `lda` elements is one column)
fn apply_reflector<T: SolverScalar>(
    v: &[T],
    tau: T,
    rows: usize,
    cols: &mut [T],
    lda: usize,
) {
    let reflect = |col: &mut [T]| {
        let segment = &mut col[rows..rows + v.len()];
        let mut dot = T::from_f64(0.0);
        for (&vi, &ci) in v.iter().zip(segment.iter()) {
            dot = dot + vi * ci;
        }
        let scaled = tau * dot;
        for (&vi, ci) in v.iter().zip(segment.iter_mut()) {
            *ci = *ci - scaled * vi;
        }
    };

    #[cfg(feature = "rayon")]
    cols.par_chunks_mut(lda).for_each(reflect);
    #[cfg(not(feature = "rayon"))]
    cols.chunks_mut(lda).for_each(reflect);
}

/// Trailing columns `from..n` of a column-major buffer
fn columns_from<T>(a: &mut [T], lda: usize, from: usize, n: usize) -> &mut [T] {
    if from >= n {
        return &mut [];
    }
    let end = (n * lda).min(a.len());
    &mut a[from * lda..end]
}

/// Householder QR in place
///
/// `tau` must hold `min(m, n)` elements and `work` at least `m`.
pub(crate) fn geqrf<T: SolverScalar>(
    m: usize,
    n: usize,
    a: &mut [T],
    lda: usize,
    tau: &mut [T],
    work: &mut [T],
) {
    let k = m.min(n);
    for i in 0..k {
        let column = &mut a[i * lda..i * lda + m];
        let (head, tail) = column[i..].split_at_mut(1);
        let (beta, t) = larfg(head[0], tail);
        head[0] = beta;
        tau[i] = t;

        if i + 1 < n && t != <T as Element>::zero() {
            // v = [1; a[i+1..m, i]]
            let v = &mut work[..m - i];
            v[0] = T::from_f64(1.0);
            v[1..].copy_from_slice(tail);
            let trailing = columns_from(a, lda, i + 1, n);
            apply_reflector(v, t, i, trailing, lda);
        }
    }
}

/// Form the first `n` columns of `Q` from `k` reflectors in place
///
/// Requires `m >= n >= k`, `tau` with `k` elements and `work` with at least `m`.
pub(crate) fn orgqr<T: SolverScalar>(
    m: usize,
    n: usize,
    k: usize,
    a: &mut [T],
    lda: usize,
    tau: &[T],
    work: &mut [T],
) {
    let zero = T::from_f64(0.0);
    let one = T::from_f64(1.0);

    // Columns k..n start as columns of the identity
    for j in k..n {
        let column = &mut a[j * lda..j * lda + m];
        column.fill(zero);
        column[j] = one;
    }

    for i in (0..k).rev() {
        if i + 1 < n {
            let v = &mut work[..m - i];
            v[0] = one;
            v[1..].copy_from_slice(&a[i * lda + i + 1..i * lda + m]);
            let trailing = columns_from(a, lda, i + 1, n);
            apply_reflector(v, tau[i], i, trailing, lda);
        }
        let column = &mut a[i * lda..i * lda + m];
        for x in column[i + 1..].iter_mut() {
            *x = -tau[i] * *x;
        }
        column[i] = one - tau[i];
        column[..i].fill(zero);
    }
}
