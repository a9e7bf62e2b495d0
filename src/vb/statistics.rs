//! Statistics providers — E-step formulas for raw samples or summarized
//! input components.
//!
//! Purpose
//! -------
//! The E-step needs three data-dependent computations: the expected
//! Gaussian exponent, the log-responsibility assembly, and the
//! responsibility-weighted sufficient statistics. Their formulas differ
//! between the two inference modes — raw weighted samples versus a fixed
//! set of pre-aggregated input components — while everything downstream
//! (M-step, bound, pruning, output) only reads the shared posterior
//! arrays. This module captures exactly that seam as the
//! [`StatisticsProvider`] trait with two implementations,
//! [`SampleProvider`] and [`MergeProvider`], selected once at engine
//! construction.
//!
//! Key behaviors
//! -------------
//! - [`SampleProvider`] owns the N×D data matrix and a weight vector
//!   normalized to sum to N (unit weights when none are supplied); every
//!   statistic is the responsibility- and weight-contracted moment of the
//!   raw points.
//! - [`MergeProvider`] owns the L input means, covariances, and the
//!   effective-count vector `Nω = N · input weights`; its exponent and
//!   scatter formulas substitute each input component's own covariance
//!   trace for the raw per-point contribution. Raw points are never
//!   touched in this mode.
//! - Scatter matrices are accumulated from explicit outer products of
//!   centered vectors, which keeps them symmetric positive semi-definite
//!   by construction.
//! - Effective counts are floored via [`crate::vb::linalg::regularize`]
//!   before reciprocals, so empty components yield huge-but-finite
//!   inverses instead of division by zero.
//!
//! Invariants & assumptions
//! ------------------------
//! - `rows()` is N for samples and L for merge mode; the responsibility
//!   matrix and the Gaussian-exponent cache are `rows()×K`.
//! - Immediately after [`StatisticsProvider::accumulate`],
//!   `Σ_k n_comp[k]` equals [`StatisticsProvider::total_weight`] up to the
//!   flooring of empty components.
//! - Providers are read-only over their data; all outputs go into caller-
//!   owned buffers so the engine controls allocation and reuse.
//!
//! Conventions
//! -----------
//! - Formula references in comments are to Bishop (10.xx) for the sample
//!   case and to Bruneau et al. (BGP10, eq. 40–44) for the merge case.
//!
//! Downstream usage
//! ----------------
//! - The engine holds a `Box<dyn StatisticsProvider>` and calls the trait
//!   methods in the fixed E-step order; it never inspects which variant it
//!   holds.
//!
//! Testing notes
//! -------------
//! - Unit tests below check the statistics against hand-computed weighted
//!   moments for K = 1 (where responsibilities are exactly one) and the
//!   weight-normalization/validation rules. Cross-mode behavior inside
//!   the full iteration is covered by engine and integration tests.
use crate::mixture::MixtureDensity;
use crate::vb::errors::{VBError, VBResult};
use crate::vb::linalg;
use crate::vb::state::ParamState;
use ndarray::{Array1, Array2, Array3, Axis};

/// Responsibility-weighted sufficient statistics for K components.
///
/// Fields
/// ------
/// - `n_comp`: effective sample counts (length K), floored away from zero.
/// - `inv_n_comp`: cached reciprocals of the floored counts.
/// - `x_mean_comp`: responsibility-weighted means (K×D).
/// - `s`: scatter estimates around those means (K×D×D).
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    pub n_comp: Array1<f64>,
    pub inv_n_comp: Array1<f64>,
    pub x_mean_comp: Array2<f64>,
    pub s: Array3<f64>,
}

impl SufficientStats {
    /// Zero-initialized statistics for `k` components in `dim` dimensions.
    pub fn zeros(k: usize, dim: usize) -> SufficientStats {
        SufficientStats {
            n_comp: Array1::zeros(k),
            inv_n_comp: Array1::zeros(k),
            x_mean_comp: Array2::zeros((k, dim)),
            s: Array3::zeros((k, dim, dim)),
        }
    }
}

/// Expectation caches recomputed by every E-step.
///
/// Fields
/// ------
/// - `det_ln_lambda`: `E[ln|Λ_k|]` per component (length K).
/// - `ln_pi`: `E[ln π_k]` per component (length K).
/// - `gauss_exponent`: expected quadratic form per (row, component),
///   `rows×K` where rows is N or L depending on the provider.
/// - `r`: responsibilities, same shape as `gauss_exponent`; each row is a
///   probability distribution with entries floored away from exact zero.
///
/// None of these survive a pruning step without full recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectations {
    pub det_ln_lambda: Array1<f64>,
    pub ln_pi: Array1<f64>,
    pub gauss_exponent: Array2<f64>,
    pub r: Array2<f64>,
}

impl Expectations {
    /// Zero-initialized caches for `rows` data rows and `k` components.
    pub fn zeros(rows: usize, k: usize) -> Expectations {
        Expectations {
            det_ln_lambda: Array1::zeros(k),
            ln_pi: Array1::zeros(k),
            gauss_exponent: Array2::zeros((rows, k)),
            r: Array2::zeros((rows, k)),
        }
    }
}

/// Data-facing half of the E-step, selected once at engine construction.
///
/// The engine calls these methods in a fixed order (exponent, log-rho,
/// statistics) and treats the provider as a black box; both variants must
/// uphold the row-count and total-weight invariants documented on each
/// method.
pub trait StatisticsProvider: std::fmt::Debug {
    /// Number of data rows: N samples or L input components.
    fn rows(&self) -> usize;

    /// Dimensionality D of the data.
    fn dim(&self) -> usize;

    /// Total weight mass: `Σ w_n` (= N after normalization) or `Σ Nω_l`.
    fn total_weight(&self) -> f64;

    /// Expected Gaussian exponent per (row, component) into `out`
    /// (`rows()×K`).
    fn gauss_exponent(&self, state: &ParamState, out: &mut Array2<f64>);

    /// Unnormalized log-responsibilities per (row, component) into `out`,
    /// assembled from the caches of the current E-step.
    fn log_rho(&self, cache: &Expectations, dim: usize, out: &mut Array2<f64>);

    /// Effective counts, weighted means, and scatter estimates from the
    /// responsibilities `r` into `stats`.
    fn accumulate(&self, r: &Array2<f64>, stats: &mut SufficientStats);

    /// `E[ln q(Z)]` for the bound; the only bound term whose formula
    /// depends on the data mode.
    fn expectation_log_q_z(&self, r: &Array2<f64>) -> f64;
}

/// E-step formulas over raw, weighted samples.
#[derive(Debug, Clone)]
pub struct SampleProvider {
    data: Array2<f64>,
    weights: Array1<f64>,
}

impl SampleProvider {
    /// Validate the data matrix and normalize the optional weights.
    ///
    /// Parameters
    /// ----------
    /// - `data`: N×D sample matrix; both axes must be non-empty.
    /// - `weights`: optional length-N vector of finite, strictly positive
    ///   weights; rescaled so that it sums to N. `None` means unit
    ///   weights, which leaves the classical unweighted formulas.
    ///
    /// Errors
    /// ------
    /// - [`VBError::EmptyData`], [`VBError::WeightLengthMismatch`],
    ///   [`VBError::InvalidWeight`].
    pub fn new(data: Array2<f64>, weights: Option<Array1<f64>>) -> VBResult<SampleProvider> {
        let (n, dim) = data.dim();
        if n == 0 || dim == 0 {
            return Err(VBError::EmptyData);
        }
        let weights = match weights {
            Some(w) => {
                if w.len() != n {
                    return Err(VBError::WeightLengthMismatch { expected: n, actual: w.len() });
                }
                for (index, &value) in w.iter().enumerate() {
                    if !value.is_finite() || value <= 0.0 {
                        return Err(VBError::InvalidWeight { index, value });
                    }
                }
                // normalize weights to N (not one)
                let sum = w.sum();
                w * (n as f64 / sum)
            }
            None => Array1::ones(n),
        };
        Ok(SampleProvider { data, weights })
    }
}

impl StatisticsProvider for SampleProvider {
    fn rows(&self) -> usize {
        self.data.nrows()
    }

    fn dim(&self) -> usize {
        self.data.ncols()
    }

    fn total_weight(&self) -> f64 {
        self.weights.sum()
    }

    // (10.64)
    fn gauss_exponent(&self, state: &ParamState, out: &mut Array2<f64>) {
        let (n, dim) = self.data.dim();
        let k = state.beta.len();
        for comp in 0..k {
            let w_k = state.w.index_axis(Axis(0), comp);
            let m_k = state.m.row(comp);
            let base = dim as f64 / state.beta[comp];
            let nu_k = state.nu[comp];
            for sample in 0..n {
                let diff = &self.data.row(sample) - &m_k;
                let quad = diff.dot(&w_k.dot(&diff));
                out[[sample, comp]] = base + nu_k * quad;
            }
        }
    }

    // (10.46); written out term by term for numerical precision
    fn log_rho(&self, cache: &Expectations, dim: usize, out: &mut Array2<f64>) {
        let half_norm = 0.5 * dim as f64 * (2.0 * std::f64::consts::PI).ln();
        for ((sample, comp), dst) in out.indexed_iter_mut() {
            *dst = cache.ln_pi[comp] + 0.5 * cache.det_ln_lambda[comp]
                - 0.5 * cache.gauss_exponent[[sample, comp]]
                - half_norm;
        }
    }

    // (10.51), (10.52), (10.53) with sample weights folded in
    fn accumulate(&self, r: &Array2<f64>, stats: &mut SufficientStats) {
        let (n, dim) = self.data.dim();
        let k = stats.n_comp.len();

        for comp in 0..k {
            let mut acc = 0.0;
            for sample in 0..n {
                acc += self.weights[sample] * r[[sample, comp]];
            }
            stats.n_comp[comp] = acc;
        }
        linalg::regularize(&mut stats.n_comp);
        for comp in 0..k {
            stats.inv_n_comp[comp] = 1.0 / stats.n_comp[comp];
        }

        for comp in 0..k {
            let mut mean = stats.x_mean_comp.row_mut(comp);
            mean.fill(0.0);
            for sample in 0..n {
                let c = self.weights[sample] * r[[sample, comp]];
                mean.scaled_add(c, &self.data.row(sample));
            }
            mean *= stats.inv_n_comp[comp];
        }

        // Outer products of centered vectors keep S symmetric positive
        // semi-definite; expanding into moment terms loses that for large N.
        let mut diff = Array1::zeros(dim);
        for comp in 0..k {
            let xbar = stats.x_mean_comp.row(comp);
            let mut s_k = stats.s.index_axis_mut(Axis(0), comp);
            s_k.fill(0.0);
            for sample in 0..n {
                let c = self.weights[sample] * r[[sample, comp]];
                for j in 0..dim {
                    diff[j] = self.data[[sample, j]] - xbar[j];
                }
                for i in 0..dim {
                    let di = c * diff[i];
                    for j in 0..dim {
                        s_k[[i, j]] += di * diff[j];
                    }
                }
            }
            s_k *= stats.inv_n_comp[comp];
        }
    }

    // (10.75) with sample weights folded in
    fn expectation_log_q_z(&self, r: &Array2<f64>) -> f64 {
        let mut total = 0.0;
        for (sample, row) in r.rows().into_iter().enumerate() {
            let mut inner = 0.0;
            for &v in row {
                inner += v * v.ln();
            }
            total += self.weights[sample] * inner;
        }
        total
    }
}

/// E-step formulas over a fixed set of summarized input components.
#[derive(Debug, Clone)]
pub struct MergeProvider {
    mu: Array2<f64>,
    sigma: Array3<f64>,
    nomega: Array1<f64>,
}

impl MergeProvider {
    /// Summarize an input mixture for compression.
    ///
    /// Parameters
    /// ----------
    /// - `input`: the mixture to be compressed; means and covariances are
    ///   copied once, the mixture itself is never mutated.
    /// - `n`: the number of (virtual) samples the input mixture is based
    ///   on; the effective count of input component l is `Nω_l = n · ω_l`.
    pub fn new(input: &MixtureDensity, n: usize) -> MergeProvider {
        let l = input.len();
        let dim = input.dim();
        let mut mu = Array2::zeros((l, dim));
        let mut sigma = Array3::zeros((l, dim, dim));
        for (row, comp) in input.components().iter().enumerate() {
            mu.row_mut(row).assign(&comp.mu);
            sigma.index_axis_mut(Axis(0), row).assign(&comp.sigma);
        }
        let nomega = input.weights() * n as f64;
        MergeProvider { mu, sigma, nomega }
    }
}

impl StatisticsProvider for MergeProvider {
    fn rows(&self) -> usize {
        self.mu.nrows()
    }

    fn dim(&self) -> usize {
        self.mu.ncols()
    }

    fn total_weight(&self) -> f64 {
        self.nomega.sum()
    }

    // after (40) in BGP10: the input covariance trace replaces the raw
    // per-point contribution
    fn gauss_exponent(&self, state: &ParamState, out: &mut Array2<f64>) {
        let (rows, dim) = self.mu.dim();
        let k = state.beta.len();
        for comp in 0..k {
            let w_k = state.w.index_axis(Axis(0), comp);
            let m_k = state.m.row(comp);
            let base = dim as f64 / state.beta[comp];
            let nu_k = state.nu[comp];
            for input in 0..rows {
                let sig = self.sigma.index_axis(Axis(0), input);
                let mut trace = 0.0;
                for i in 0..dim {
                    for j in 0..dim {
                        trace += w_k[[i, j]] * sig[[j, i]];
                    }
                }
                let diff = &self.mu.row(input) - &m_k;
                let quad = diff.dot(&w_k.dot(&diff));
                out[[input, comp]] = base + nu_k * (trace + quad);
            }
        }
    }

    // (40) in BGP10: every term is scaled by the input effective count
    fn log_rho(&self, cache: &Expectations, dim: usize, out: &mut Array2<f64>) {
        let ln_2pi = (2.0 * std::f64::consts::PI).ln();
        for ((input, comp), dst) in out.indexed_iter_mut() {
            let head =
                2.0 * cache.ln_pi[comp] + cache.det_ln_lambda[comp] - dim as f64 * ln_2pi;
            *dst = 0.5 * self.nomega[input] * (head - cache.gauss_exponent[[input, comp]]);
        }
    }

    // (41), (42), and (43)+(44) combined: only the sum of scatter and
    // input covariance is ever needed downstream
    fn accumulate(&self, r: &Array2<f64>, stats: &mut SufficientStats) {
        let (rows, dim) = self.mu.dim();
        let k = stats.n_comp.len();

        for comp in 0..k {
            let mut acc = 0.0;
            for input in 0..rows {
                acc += self.nomega[input] * r[[input, comp]];
            }
            stats.n_comp[comp] = acc;
        }
        linalg::regularize(&mut stats.n_comp);
        for comp in 0..k {
            stats.inv_n_comp[comp] = 1.0 / stats.n_comp[comp];
        }

        for comp in 0..k {
            let mut mean = stats.x_mean_comp.row_mut(comp);
            mean.fill(0.0);
            for input in 0..rows {
                let c = self.nomega[input] * r[[input, comp]];
                mean.scaled_add(c, &self.mu.row(input));
            }
            mean *= stats.inv_n_comp[comp];
        }

        let mut diff = Array1::zeros(dim);
        for comp in 0..k {
            let xbar = stats.x_mean_comp.row(comp);
            let mut s_k = stats.s.index_axis_mut(Axis(0), comp);
            s_k.fill(0.0);
            for input in 0..rows {
                let c = self.nomega[input] * r[[input, comp]];
                let sig = self.sigma.index_axis(Axis(0), input);
                for j in 0..dim {
                    diff[j] = self.mu[[input, j]] - xbar[j];
                }
                for i in 0..dim {
                    for j in 0..dim {
                        s_k[[i, j]] += c * (diff[i] * diff[j] + sig[[i, j]]);
                    }
                }
            }
            s_k *= stats.inv_n_comp[comp];
        }
    }

    // (10.75); input components carry no per-sample weight here
    fn expectation_log_q_z(&self, r: &Array2<f64>) -> f64 {
        r.iter().map(|&v| v * v.ln()).sum()
    }
}
