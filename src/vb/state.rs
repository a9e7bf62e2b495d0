//! Hyperparameter state — validated prior/posterior arrays for K components.
//!
//! Purpose
//! -------
//! Turn scalar-or-vector-or-matrix user input into fully shaped, validated
//! K-length (or K×D, K×D×D) arrays, synthesize defaults when absent, and
//! own the resulting prior and posterior hyperparameters for the engine's
//! lifetime. Every per-component array the E/M iteration mutates lives
//! here.
//!
//! Key behaviors
//! -------------
//! - Accept each scalar family (`alpha`, `beta`, `nu`) as a single value
//!   broadcast to all K components or as a length-K vector taken verbatim;
//!   anything else is a shape error naming the offending array.
//! - Accept mean parameters as one D vector (broadcast to K rows) or a
//!   full K×D matrix, and the Wishart scale as one D×D matrix (broadcast)
//!   or a full K×D×D stack; `inv_W0` is precomputed and cached.
//! - Enforce `alpha, beta > 0` and `nu > D−1` element-wise before any
//!   K-sized array is committed to the state.
//! - Default the posterior initial value of each family to its prior, and
//!   default the posterior means to K×D values linearly spaced over
//!   [−1, 1] to break symmetry.
//!
//! Invariants & assumptions
//! ------------------------
//! - After construction, all eleven arrays exist with mutually consistent
//!   shapes for the same K and D, and satisfy the domain constraints above.
//! - If all posterior means are identical initially, they remain identical
//!   under the update equations; the linspace default avoids this, but a
//!   caller-supplied constant `m` is accepted as given (documented caveat,
//!   not corrected).
//! - Shrinking K during pruning is performed by the engine via row
//!   selection on these arrays; this module never changes K itself.
//!
//! Conventions
//! -----------
//! - The `0` suffix marks prior values (`alpha0`, …); the unsuffixed name
//!   is the posterior initial/current value, as in Bishop chapter 10.
//! - Errors are reported via `VBResult`; this module performs no I/O.
//!
//! Downstream usage
//! ----------------
//! - The engine builds a [`ParamState`] from a [`VariationalSpec`] at
//!   construction and mutates the posterior arrays in place each M-step.
//! - [`ParamState::posterior_spec`] re-packages the current posterior as
//!   the prior of a fresh spec, which is how chained/incremental fits are
//!   seeded.
//!
//! Testing notes
//! -------------
//! - Unit tests below cover broadcasting, defaults, every rejection path,
//!   and the posterior-to-prior round trip. Mutation during E/M cycles is
//!   tested with the engine.
use crate::vb::errors::{VBError, VBResult};
use crate::vb::linalg;
use ndarray::{Array1, Array2, Array3, Axis};

/// Scalar-or-vector initializer for the `alpha`, `beta`, and `nu` families.
///
/// `Scalar(v)` is broadcast to all K components; `Vector(v)` must have
/// length K and is taken verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum HyperInit {
    Scalar(f64),
    Vector(Array1<f64>),
}

impl From<f64> for HyperInit {
    fn from(value: f64) -> HyperInit {
        HyperInit::Scalar(value)
    }
}

impl From<Array1<f64>> for HyperInit {
    fn from(value: Array1<f64>) -> HyperInit {
        HyperInit::Vector(value)
    }
}

/// Vector-or-matrix initializer for the mean parameters `m0` and `m`.
///
/// `Broadcast(v)` is a single D vector copied to all K rows; `Full(m)`
/// must be K×D.
#[derive(Debug, Clone, PartialEq)]
pub enum MeanInit {
    Broadcast(Array1<f64>),
    Full(Array2<f64>),
}

/// Matrix-or-stack initializer for the Wishart scale parameters `W0`, `W`.
///
/// `Broadcast(w)` is a single D×D matrix copied to all K components;
/// `Full(w)` must be K×D×D.
#[derive(Debug, Clone, PartialEq)]
pub enum PrecisionInit {
    Broadcast(Array2<f64>),
    Full(Array3<f64>),
}

/// User-facing bundle of optional hyperparameter initializers.
///
/// Purpose
/// -------
/// Collect every recognized hyperparameter of the variational scheme in
/// one typed value. Absent fields fall back to the documented defaults:
/// `alpha0 = beta0 = 1e-5`, `nu0 = (D−1) + 1e-5`, `m0 = 0`, `W0 = I`,
/// posterior families equal to their priors, and posterior means linearly
/// spaced over [−1, 1].
///
/// Notes
/// -----
/// - The original kwargs-style surface could receive an unrecognized key
///   at run time; with this typed spec that mistake cannot be expressed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariationalSpec {
    /// Dirichlet prior concentration (scalar broadcast or length-K).
    pub alpha0: Option<HyperInit>,
    /// Dirichlet posterior initial value.
    pub alpha: Option<HyperInit>,
    /// Gaussian-Wishart prior scale on the mean precision.
    pub beta0: Option<HyperInit>,
    /// Posterior initial value of `beta`.
    pub beta: Option<HyperInit>,
    /// Wishart prior degrees of freedom; each element must exceed D−1.
    pub nu0: Option<HyperInit>,
    /// Posterior initial degrees of freedom.
    pub nu: Option<HyperInit>,
    /// Prior mean(s); one D vector broadcast or a K×D matrix.
    pub m0: Option<MeanInit>,
    /// Posterior initial mean(s).
    pub m: Option<MeanInit>,
    /// Wishart prior scale matrix; one D×D broadcast or a K×D×D stack.
    pub w0: Option<PrecisionInit>,
    /// Posterior initial scale matrix.
    pub w: Option<PrecisionInit>,
}

/// Snapshot of prior and posterior values of all variational parameters.
///
/// Returned by the engine for inspection; every array is a clone taken
/// between mutating calls, so the snapshot stays valid when iteration
/// continues.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorPosterior {
    pub alpha0: Array1<f64>,
    pub alpha: Array1<f64>,
    pub beta0: Array1<f64>,
    pub beta: Array1<f64>,
    pub nu0: Array1<f64>,
    pub nu: Array1<f64>,
    pub m0: Array2<f64>,
    pub m: Array2<f64>,
    pub w0: Array3<f64>,
    pub w: Array3<f64>,
    /// Component count K the arrays are sized for.
    pub components: usize,
}

/// Owned prior and posterior hyperparameter arrays for K components.
///
/// Fields
/// ------
/// - `alpha0`, `beta0`, `nu0`: prior scalars per component (length K).
/// - `alpha`, `beta`, `nu`: posterior counterparts, mutated each M-step.
/// - `m0`, `m`: prior/posterior means (K×D).
/// - `w0`, `inv_w0`, `w`: prior Wishart scale, its cached inverse, and the
///   posterior scale (each K×D×D).
///
/// Invariants
/// ----------
/// - Positivity and `nu > D−1` hold element-wise at construction; the
///   M-step preserves them because effective counts are non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamState {
    pub alpha0: Array1<f64>,
    pub alpha: Array1<f64>,
    pub beta0: Array1<f64>,
    pub beta: Array1<f64>,
    pub nu0: Array1<f64>,
    pub nu: Array1<f64>,
    pub m0: Array2<f64>,
    pub m: Array2<f64>,
    pub w0: Array3<f64>,
    pub inv_w0: Array3<f64>,
    pub w: Array3<f64>,
}

impl ParamState {
    /// Build a validated state for `k` components in `dim` dimensions.
    ///
    /// Parameters
    /// ----------
    /// - `spec`: optional initializers; see [`VariationalSpec`] for the
    ///   defaults applied to absent fields.
    /// - `k`: component count K (> 0).
    /// - `dim`: dimensionality D (> 0).
    ///
    /// Errors
    /// ------
    /// - [`VBError::VectorLengthMismatch`] / [`VBError::MatrixShapeMismatch`] /
    ///   [`VBError::CubeShapeMismatch`] when a supplied array has the wrong
    ///   shape; the message names the offending parameter.
    /// - [`VBError::DomainViolation`] when an element of `alpha`, `beta`
    ///   (must be > 0) or `nu` (must exceed D−1) is out of domain.
    /// - [`VBError::SingularMatrix`] when a supplied `W0` block cannot be
    ///   inverted.
    ///
    /// Notes
    /// -----
    /// - All validation happens before any array is stored, so a failed
    ///   call leaves nothing partially initialized.
    pub fn from_spec(spec: VariationalSpec, k: usize, dim: usize) -> VBResult<ParamState> {
        let nu_min = dim as f64 - 1.0;

        let alpha0 = resolve_hyper("alpha0", spec.alpha0, 1e-5, k, 0.0)?;
        let alpha = match spec.alpha {
            Some(init) => broadcast_hyper("alpha", init, k, 0.0)?,
            None => alpha0.clone(),
        };
        let beta0 = resolve_hyper("beta0", spec.beta0, 1e-5, k, 0.0)?;
        let beta = match spec.beta {
            Some(init) => broadcast_hyper("beta", init, k, 0.0)?,
            None => beta0.clone(),
        };
        let nu0 = resolve_hyper("nu0", spec.nu0, nu_min + 1e-5, k, nu_min)?;
        let nu = match spec.nu {
            Some(init) => broadcast_hyper("nu", init, k, nu_min)?,
            None => nu0.clone(),
        };

        let m0 = match spec.m0 {
            Some(init) => broadcast_mean("m0", init, k, dim)?,
            None => Array2::zeros((k, dim)),
        };
        let m = match spec.m {
            Some(init) => broadcast_mean("m", init, k, dim)?,
            None => linspaced_means(k, dim),
        };

        let w0 = match spec.w0 {
            Some(init) => broadcast_precision("W0", init, k, dim)?,
            None => identity_stack(k, dim),
        };
        let mut inv_w0 = Array3::zeros((k, dim, dim));
        for component in 0..k {
            let block = w0.index_axis(Axis(0), component);
            let inv = linalg::inverse(&block)
                .ok_or(VBError::SingularMatrix { context: "W0", component })?;
            inv_w0.index_axis_mut(Axis(0), component).assign(&inv);
        }
        let w = match spec.w {
            Some(init) => broadcast_precision("W", init, k, dim)?,
            None => w0.clone(),
        };

        Ok(ParamState { alpha0, alpha, beta0, beta, nu0, nu, m0, m, w0, inv_w0, w })
    }

    /// Re-package the current posterior as the prior of a fresh spec.
    ///
    /// Feeding the result (with the same component count) into a new
    /// engine continues inference from where this one stopped.
    pub fn posterior_spec(&self) -> VariationalSpec {
        VariationalSpec {
            alpha0: Some(HyperInit::Vector(self.alpha.clone())),
            beta0: Some(HyperInit::Vector(self.beta.clone())),
            nu0: Some(HyperInit::Vector(self.nu.clone())),
            m0: Some(MeanInit::Full(self.m.clone())),
            w0: Some(PrecisionInit::Full(self.w.clone())),
            ..VariationalSpec::default()
        }
    }

    /// Clone prior and posterior values into a [`PriorPosterior`] snapshot.
    pub fn snapshot(&self) -> PriorPosterior {
        PriorPosterior {
            alpha0: self.alpha0.clone(),
            alpha: self.alpha.clone(),
            beta0: self.beta0.clone(),
            beta: self.beta.clone(),
            nu0: self.nu0.clone(),
            nu: self.nu.clone(),
            m0: self.m0.clone(),
            m: self.m.clone(),
            w0: self.w0.clone(),
            w: self.w.clone(),
            components: self.alpha.len(),
        }
    }
}

/// Resolve an optional scalar-family initializer against its default.
fn resolve_hyper(
    name: &'static str, init: Option<HyperInit>, default: f64, k: usize, min: f64,
) -> VBResult<Array1<f64>> {
    match init {
        Some(init) => broadcast_hyper(name, init, k, min),
        None => Ok(Array1::from_elem(k, default)),
    }
}

/// Broadcast and domain-check one scalar family (`alpha`, `beta`, `nu`).
fn broadcast_hyper(
    name: &'static str, init: HyperInit, k: usize, min: f64,
) -> VBResult<Array1<f64>> {
    let v = match init {
        HyperInit::Scalar(value) => Array1::from_elem(k, value),
        HyperInit::Vector(v) => {
            if v.len() != k {
                return Err(VBError::VectorLengthMismatch {
                    name,
                    expected: k,
                    actual: v.len(),
                });
            }
            v
        }
    };
    for &value in &v {
        // NaN fails the comparison as well, so non-finite input is caught here.
        if !(value > min) {
            return Err(VBError::DomainViolation { name, min, value });
        }
    }
    Ok(v)
}

/// Broadcast one mean parameter to K×D.
fn broadcast_mean(name: &'static str, init: MeanInit, k: usize, dim: usize) -> VBResult<Array2<f64>> {
    match init {
        MeanInit::Broadcast(v) => {
            if v.len() != dim {
                return Err(VBError::MatrixShapeMismatch {
                    name,
                    expected: (k, dim),
                    actual: (1, v.len()),
                });
            }
            Ok(Array2::from_shape_fn((k, dim), |(_, j)| v[j]))
        }
        MeanInit::Full(m) => {
            if m.dim() != (k, dim) {
                return Err(VBError::MatrixShapeMismatch {
                    name,
                    expected: (k, dim),
                    actual: m.dim(),
                });
            }
            Ok(m)
        }
    }
}

/// Broadcast one Wishart scale parameter to K×D×D.
fn broadcast_precision(
    name: &'static str, init: PrecisionInit, k: usize, dim: usize,
) -> VBResult<Array3<f64>> {
    match init {
        PrecisionInit::Broadcast(w) => {
            if w.dim() != (dim, dim) {
                return Err(VBError::CubeShapeMismatch {
                    name,
                    expected: (k, dim, dim),
                    actual: (1, w.nrows(), w.ncols()),
                });
            }
            Ok(Array3::from_shape_fn((k, dim, dim), |(_, i, j)| w[[i, j]]))
        }
        PrecisionInit::Full(w) => {
            if w.dim() != (k, dim, dim) {
                return Err(VBError::CubeShapeMismatch {
                    name,
                    expected: (k, dim, dim),
                    actual: w.dim(),
                });
            }
            Ok(w)
        }
    }
}

/// K×D means linearly spaced over [−1, 1], row-major.
///
/// Spreading the initial posterior means breaks the permutation symmetry
/// of the update equations; identical initial means would stay identical
/// forever.
fn linspaced_means(k: usize, dim: usize) -> Array2<f64> {
    let total = k * dim;
    if total == 1 {
        return Array2::from_elem((1, 1), -1.0);
    }
    Array2::from_shape_fn((k, dim), |(i, j)| {
        -1.0 + 2.0 * ((i * dim + j) as f64) / ((total - 1) as f64)
    })
}

/// K copies of the D×D identity, stacked along the component axis.
fn identity_stack(k: usize, dim: usize) -> Array3<f64> {
    Array3::from_shape_fn((k, dim, dim), |(_, i, j)| if i == j { 1.0 } else { 0.0 })
}
