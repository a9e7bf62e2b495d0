//! Dense linear-algebra helpers bridging `ndarray` storage to `nalgebra`.
//!
//! Purpose
//! -------
//! The engine stores per-component D×D blocks inside `ndarray` arrays but
//! needs determinants and inverses, which `nalgebra::DMatrix` provides.
//! This module owns that conversion plus the zero-flooring regularization
//! applied to responsibilities and effective counts before logarithms or
//! reciprocals.
//!
//! Conventions
//! -----------
//! - All matrices are row-major `f64` views of shape D×D; D is small (the
//!   sample dimensionality), so per-call copies into a `DMatrix` are cheap
//!   relative to the surrounding per-sample loops.
//! - [`inverse`] reports singularity via `None`; callers decide whether
//!   that is fatal for their context.
//! - [`regularize`] never changes a nonzero entry; it only replaces exact
//!   zeros with the smallest positive normal `f64`.
use nalgebra::DMatrix;
use ndarray::{Array, Array2, ArrayView2, Dimension};

/// Copy a square `ndarray` view into a freshly allocated `DMatrix`.
fn to_dmatrix(m: &ArrayView2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(m.nrows(), m.ncols(), |i, j| m[[i, j]])
}

/// Determinant of a square matrix view.
pub fn det(m: &ArrayView2<f64>) -> f64 {
    to_dmatrix(m).determinant()
}

/// Inverse of a square matrix view, or `None` if the matrix is singular.
pub fn inverse(m: &ArrayView2<f64>) -> Option<Array2<f64>> {
    let d = m.nrows();
    to_dmatrix(m)
        .try_inverse()
        .map(|inv| Array2::from_shape_fn((d, d), |(i, j)| inv[(i, j)]))
}

/// Replace exact zeros by the smallest positive normal `f64`.
///
/// Applied to responsibilities before `ln` and to effective counts before
/// taking reciprocals, so downstream arithmetic never sees `ln(0)` or a
/// division by zero. Entries that are already nonzero are left untouched.
pub fn regularize<D: Dimension>(x: &mut Array<f64, D>) {
    x.mapv_inplace(|v| if v == 0.0 { f64::MIN_POSITIVE } else { v });
}
