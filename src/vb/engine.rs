//! engine — the shared E/M, bound, pruning, and output machinery.
//!
//! Purpose
//! -------
//! Drive the mean-field variational-Bayes fixed point for a finite
//! Gaussian mixture: alternate closed-form M-steps over the Dirichlet and
//! Gaussian-Wishart posterior hyperparameters with E-steps delegated to a
//! [`StatisticsProvider`], evaluate the variational lower bound as the
//! convergence criterion, prune negligible components with consistent
//! reindexing of all per-component arrays, and extract a point-estimate
//! [`MixtureDensity`] from the posterior mode.
//!
//! Key behaviors
//! -------------
//! - The E-step runs in a fixed order and fails fast on an invalid
//!   precision matrix before the expensive per-sample loop.
//! - The M-step is prior-plus-effective-count throughout; the only matrix
//!   inversion is the posterior Wishart scale assembly, whose singularity
//!   is fatal for the call.
//! - The bound is recomputable at any time from state alone; there is no
//!   hidden accumulation across calls.
//! - [`GaussianInference::run`] reuses the previous iteration's bound as
//!   the baseline only while K is unchanged; any pruning forces a fresh
//!   baseline because the bound's terms are summed over a different
//!   component set.
//! - Pruning compacts an explicit, statically listed set of per-component
//!   arrays to the surviving index set (ascending original order), then
//!   forces a full E-step so every cache is consistent with the new K.
//!
//! Invariants & assumptions
//! ------------------------
//! - K never grows; pruning is the only place the component axis changes.
//! - Every mutating operation takes `&mut self` and runs to completion;
//!   snapshots (`posterior2prior`, `prior_posterior`) are safe between,
//!   not during, mutating calls.
//! - Responsibility rows sum to one with entries in (0, 1]; effective
//!   counts sum to the provider's total weight after every E-step.
//!
//! Conventions
//! -----------
//! - Update-equation references are to Bishop chapter 10; merge-mode
//!   deviations live in the provider and are referenced there.
//! - Non-fatal anomalies (a decreasing bound, components skipped in the
//!   output) are reported via `log::warn!`; `verbose` progress goes
//!   through `log::info!`.
//!
//! Downstream usage
//! ----------------
//! - Construct with [`GaussianInference::new`] (raw weighted samples) or
//!   [`GaussianInference::merge`] (compress an existing mixture), call
//!   [`GaussianInference::run`], then [`GaussianInference::make_mixture`];
//!   chain fits via [`GaussianInference::posterior2prior`].
//!
//! Testing notes
//! -------------
//! - Unit tests below cover E-step invariants, the scalar M-step closed
//!   form, fail-fast on invalid precisions, prune order/compaction, bound
//!   recomputability and monotonicity, and the run/convergence contract.
//! - Cluster-recovery, pruning-to-truth, and compression scenarios live
//!   in `tests/integration_vb.rs`.
use crate::mixture::{Gauss, MixtureDensity};
use crate::vb::errors::{VBError, VBResult};
use crate::vb::linalg;
use crate::vb::options::RunOptions;
use crate::vb::special;
use crate::vb::state::{ParamState, PriorPosterior, VariationalSpec};
use crate::vb::statistics::{
    Expectations, MergeProvider, SampleProvider, StatisticsProvider, SufficientStats,
};
use log::{info, warn};
use ndarray::{Array1, Array2, Axis};
use statrs::function::gamma::digamma;

/// Variational-Bayes inference engine for finite Gaussian mixtures.
///
/// Purpose
/// -------
/// Own every piece of mutable inference state — posterior hyperparameters,
/// responsibilities, sufficient statistics, expectation caches — and drive
/// the E/M fixed point over it. The data-facing statistics are supplied by
/// a [`StatisticsProvider`] chosen at construction, so one engine serves
/// both the raw-sample and the mixture-compression mode.
///
/// Fields
/// ------
/// - `dim`, `k`: dimensionality D and current component count K.
/// - `provider`: raw-sample or merge-mode statistics strategy.
/// - `state`: prior and posterior hyperparameter arrays ([`ParamState`]).
/// - `stats`: responsibility-weighted sufficient statistics.
/// - `cache`: per-E-step expectation values, including responsibilities.
/// - `log_rho`: reusable scratch for the unnormalized log-responsibilities.
///
/// Invariants
/// ----------
/// - A constructed engine has already run one E-step, so a valid bound is
///   available immediately.
/// - All arrays agree on K and D at every public-method boundary.
#[derive(Debug)]
pub struct GaussianInference {
    dim: usize,
    k: usize,
    provider: Box<dyn StatisticsProvider>,
    state: ParamState,
    stats: SufficientStats,
    cache: Expectations,
    log_rho: Array2<f64>,
}

impl GaussianInference {
    /// Build an engine over raw (optionally weighted) samples.
    ///
    /// Parameters
    /// ----------
    /// - `data`: N×D sample matrix, read-only input.
    /// - `components`: K, the number of mixture components (> 0).
    /// - `weights`: optional length-N positive weights, normalized so
    ///   they sum to N.
    /// - `spec`: hyperparameter initializers; see [`VariationalSpec`].
    ///
    /// Errors
    /// ------
    /// - Configuration errors from data/weight validation and from
    ///   [`ParamState::from_spec`]; `components == 0` is rejected as
    ///   [`VBError::UnspecifiedComponents`].
    /// - Numerical faults from the initial E-step (invalid `W`).
    pub fn new(
        data: Array2<f64>, components: usize, weights: Option<Array1<f64>>,
        spec: VariationalSpec,
    ) -> VBResult<GaussianInference> {
        if components == 0 {
            return Err(VBError::UnspecifiedComponents);
        }
        let provider = SampleProvider::new(data, weights)?;
        let dim = provider.dim();
        let state = ParamState::from_spec(spec, components, dim)?;
        GaussianInference::from_parts(Box::new(provider), components, dim, state)
    }

    /// Build an engine that compresses an existing mixture ("merge mode").
    ///
    /// Parameters
    /// ----------
    /// - `input`: the mixture to be compressed; never mutated.
    /// - `n`: the number of (virtual) samples `input` was fitted to; sets
    ///   the effective counts `Nω_l = n · ω_l`.
    /// - `components`: maximum number of output components K.
    /// - `initial_guess`: optional starting mixture; when given, its size
    ///   defines K (ignoring `components`), its means seed `m`, its
    ///   inverse covariances seed `W` via `Σ⁻¹/(ν_k − D)`, and its
    ///   weights seed `α = n · ω`. The seeding requires `ν_k > D`, or
    ///   the constructor's initial E-step rejects the negative scale.
    /// - `spec`: hyperparameter initializers applied before the guess.
    ///
    /// Errors
    /// ------
    /// - [`VBError::UnspecifiedComponents`] when neither `components` nor
    ///   `initial_guess` fixes K.
    /// - [`VBError::GuessDimensionMismatch`] when the guess and the input
    ///   disagree on D, plus the usual spec validation errors.
    pub fn merge(
        input: &MixtureDensity, n: usize, components: Option<usize>,
        initial_guess: Option<&MixtureDensity>, spec: VariationalSpec,
    ) -> VBResult<GaussianInference> {
        let dim = input.dim();
        let k = match (initial_guess, components) {
            (Some(guess), _) => guess.len(),
            (None, Some(components)) if components > 0 => components,
            _ => return Err(VBError::UnspecifiedComponents),
        };
        if let Some(guess) = initial_guess {
            if guess.dim() != dim {
                return Err(VBError::GuessDimensionMismatch {
                    expected: dim,
                    actual: guess.dim(),
                });
            }
        }

        let provider = MergeProvider::new(input, n);
        let mut state = ParamState::from_spec(spec, k, dim)?;
        if let Some(guess) = initial_guess {
            for (comp, gauss) in guess.components().iter().enumerate() {
                state.m.row_mut(comp).assign(&gauss.mu);
                let scale = 1.0 / (state.nu[comp] - dim as f64);
                state.w.index_axis_mut(Axis(0), comp).assign(&(&gauss.inv_sigma * scale));
            }
            state.alpha.assign(&(guess.weights() * n as f64));
        }
        GaussianInference::from_parts(Box::new(provider), k, dim, state)
    }

    /// Allocate the K-sized buffers and run the initial E-step.
    fn from_parts(
        provider: Box<dyn StatisticsProvider>, k: usize, dim: usize, state: ParamState,
    ) -> VBResult<GaussianInference> {
        let rows = provider.rows();
        let mut engine = GaussianInference {
            dim,
            k,
            provider,
            state,
            stats: SufficientStats::zeros(k, dim),
            cache: Expectations::zeros(rows, k),
            log_rho: Array2::zeros((rows, k)),
        };
        // compute expectation values for the initial parameter values so a
        // valid bound is available right after construction
        engine.e_step()?;
        Ok(engine)
    }

    /// Current component count K.
    pub fn components(&self) -> usize {
        self.k
    }

    /// Dimensionality D.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Responsibilities from the most recent E-step (`rows×K`).
    pub fn responsibilities(&self) -> &Array2<f64> {
        &self.cache.r
    }

    /// Effective sample counts from the most recent E-step (length K).
    pub fn effective_counts(&self) -> &Array1<f64> {
        &self.stats.n_comp
    }

    /// Compute expectation values and summary statistics (the E-step).
    ///
    /// The order is fixed: expected precision log-determinants (checked
    /// for validity before anything touches the per-sample loop), Gaussian
    /// exponents, expected log mixing weights, responsibilities, then the
    /// sufficient statistics.
    ///
    /// Errors
    /// ------
    /// - [`VBError::PrecisionNotPositiveDefinite`] when any `W_k` has a
    ///   non-positive determinant.
    pub fn e_step(&mut self) -> VBResult<()> {
        // check W first to catch an invalid matrix before the expensive
        // loop over samples
        self.update_det_ln_lambda()?;
        self.provider.gauss_exponent(&self.state, &mut self.cache.gauss_exponent);
        self.update_ln_pi();
        self.update_r();
        self.provider.accumulate(&self.cache.r, &mut self.stats);
        Ok(())
    }

    /// Update the Gaussian-Wishart and Dirichlet posterior hyperparameters
    /// from the current sufficient statistics (the M-step).
    ///
    /// Errors
    /// ------
    /// - [`VBError::SingularMatrix`] when a posterior scale assembly
    ///   cannot be inverted.
    pub fn m_step(&mut self) -> VBResult<()> {
        for comp in 0..self.k {
            let n_k = self.stats.n_comp[comp];
            self.state.nu[comp] = self.state.nu0[comp] + n_k;
            self.state.alpha[comp] = self.state.alpha0[comp] + n_k;
            self.state.beta[comp] = self.state.beta0[comp] + n_k;
        }
        self.update_m();
        self.update_w()
    }

    /// One M-step followed by one E-step.
    pub fn update(&mut self) -> VBResult<()> {
        self.m_step()?;
        self.e_step()
    }

    // (10.65)
    fn update_det_ln_lambda(&mut self) -> VBResult<()> {
        for comp in 0..self.k {
            let w_k = self.state.w.index_axis(Axis(0), comp);
            let det = linalg::det(&w_k);
            // the negated comparison also traps NaN determinants
            if !(det > 0.0) {
                return Err(VBError::PrecisionNotPositiveDefinite { component: comp, det });
            }
            self.cache.det_ln_lambda[comp] =
                special::wishart_expect_log_det(det, self.dim, self.state.nu[comp]);
        }
        Ok(())
    }

    // (10.66)
    fn update_ln_pi(&mut self) {
        let total = digamma(self.state.alpha.sum());
        for comp in 0..self.k {
            self.cache.ln_pi[comp] = digamma(self.state.alpha[comp]) - total;
        }
    }

    // (10.49): row-max-stabilized softmax over the log-responsibilities,
    // then a floor so later logarithms never see an exact zero
    fn update_r(&mut self) {
        self.provider.log_rho(&self.cache, self.dim, &mut self.log_rho);
        for (mut r_row, rho_row) in
            self.cache.r.rows_mut().into_iter().zip(self.log_rho.rows())
        {
            let max = rho_row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
            let mut sum = 0.0;
            for (dst, &v) in r_row.iter_mut().zip(rho_row) {
                let e = (v - max).exp();
                *dst = e;
                sum += e;
            }
            // the shared scale factor from the max-shift cancels here
            r_row /= sum;
        }
        linalg::regularize(&mut self.cache.r);
    }

    // (10.61)
    fn update_m(&mut self) {
        for comp in 0..self.k {
            let beta0 = self.state.beta0[comp];
            let n_k = self.stats.n_comp[comp];
            let inv_beta = 1.0 / self.state.beta[comp];
            for j in 0..self.dim {
                self.state.m[[comp, j]] = inv_beta
                    * (beta0 * self.state.m0[[comp, j]]
                        + n_k * self.stats.x_mean_comp[[comp, j]]);
            }
        }
    }

    // (10.62): assemble W_k⁻¹ from the prior inverse scale, the scaled
    // scatter, and the mean-shift correction, then invert once
    fn update_w(&mut self) -> VBResult<()> {
        let dim = self.dim;
        let mut assembly = Array2::zeros((dim, dim));
        for comp in 0..self.k {
            let beta0 = self.state.beta0[comp];
            let n_k = self.stats.n_comp[comp];
            let shrink = beta0 * n_k / (beta0 + n_k);
            let s_k = self.stats.s.index_axis(Axis(0), comp);
            let inv_w0 = self.state.inv_w0.index_axis(Axis(0), comp);
            for i in 0..dim {
                let di = self.stats.x_mean_comp[[comp, i]] - self.state.m0[[comp, i]];
                for j in 0..dim {
                    let dj = self.stats.x_mean_comp[[comp, j]] - self.state.m0[[comp, j]];
                    assembly[[i, j]] = inv_w0[[i, j]] + n_k * s_k[[i, j]] + shrink * di * dj;
                }
            }
            let inverted = linalg::inverse(&assembly.view()).ok_or(VBError::SingularMatrix {
                context: "the posterior scale assembly",
                component: comp,
            })?;
            self.state.w.index_axis_mut(Axis(0), comp).assign(&inverted);
        }
        Ok(())
    }

    /// Lower bound on the log marginal likelihood given the current
    /// parameter estimates.
    ///
    /// A pure function of the current state and caches: calling it twice
    /// without an intervening update returns the same value, and the run
    /// loop relies on that to re-baseline after pruning.
    pub fn likelihood_bound(&self) -> f64 {
        self.expectation_log_p_x()
            + self.expectation_log_p_z()
            + self.expectation_log_p_pi()
            + self.expectation_log_p_mu_lambda()
            - self.provider.expectation_log_q_z(&self.cache.r)
            - self.expectation_log_q_pi()
            - self.expectation_log_q_mu_lambda()
    }

    // (10.71)
    fn expectation_log_p_x(&self) -> f64 {
        let dim = self.dim as f64;
        let ln_2pi = (2.0 * std::f64::consts::PI).ln();
        let mut total = 0.0;
        for comp in 0..self.k {
            let w_k = self.state.w.index_axis(Axis(0), comp);
            let s_k = self.stats.s.index_axis(Axis(0), comp);
            let mut trace = 0.0;
            for i in 0..self.dim {
                for j in 0..self.dim {
                    trace += s_k[[i, j]] * w_k[[j, i]];
                }
            }
            let diff = &self.stats.x_mean_comp.row(comp) - &self.state.m.row(comp);
            let quad = diff.dot(&w_k.dot(&diff));
            let mut res = self.cache.det_ln_lambda[comp];
            res -= dim / self.state.beta[comp];
            res -= self.state.nu[comp] * (trace + quad);
            res -= dim * ln_2pi;
            total += self.stats.n_comp[comp] * res;
        }
        0.5 * total
    }

    // (10.72), with the sum over samples already folded into N_k
    fn expectation_log_p_z(&self) -> f64 {
        (0..self.k).map(|comp| self.stats.n_comp[comp] * self.cache.ln_pi[comp]).sum()
    }

    // (10.73)
    fn expectation_log_p_pi(&self) -> f64 {
        let mut res = special::dirichlet_log_c(&self.state.alpha0);
        for comp in 0..self.k {
            res += (self.state.alpha0[comp] - 1.0) * self.cache.ln_pi[comp];
        }
        res
    }

    // (10.74)
    fn expectation_log_p_mu_lambda(&self) -> f64 {
        let dim = self.dim as f64;
        let two_pi = 2.0 * std::f64::consts::PI;
        let mut res = 0.0;
        for comp in 0..self.k {
            let w_k = self.state.w.index_axis(Axis(0), comp);
            let beta0 = self.state.beta0[comp];
            let diff = &self.state.m.row(comp) - &self.state.m0.row(comp);
            res += dim * (beta0 / two_pi).ln();
            res += self.cache.det_ln_lambda[comp] - dim * beta0 / self.state.beta[comp]
                - beta0 * self.state.nu[comp] * diff.dot(&w_k.dot(&diff));

            // Wishart normalization of the prior
            let w0_det = linalg::det(&self.state.w0.index_axis(Axis(0), comp));
            res += 2.0 * special::wishart_log_b(w0_det, self.dim, self.state.nu0[comp]);

            res += (self.state.nu0[comp] - dim - 1.0) * self.cache.det_ln_lambda[comp];

            let inv_w0 = self.state.inv_w0.index_axis(Axis(0), comp);
            let mut trace = 0.0;
            for i in 0..self.dim {
                for j in 0..self.dim {
                    trace += inv_w0[[i, j]] * w_k[[j, i]];
                }
            }
            res -= self.state.nu[comp] * trace;
        }
        0.5 * res
    }

    // (10.76)
    fn expectation_log_q_pi(&self) -> f64 {
        let mut res = special::dirichlet_log_c(&self.state.alpha);
        for comp in 0..self.k {
            res += (self.state.alpha[comp] - 1.0) * self.cache.ln_pi[comp];
        }
        res
    }

    // (10.77)
    fn expectation_log_q_mu_lambda(&self) -> f64 {
        let dim = self.dim as f64;
        let two_pi = 2.0 * std::f64::consts::PI;
        let mut res = -0.5 * self.k as f64 * dim;
        for comp in 0..self.k {
            res += 0.5
                * (self.cache.det_ln_lambda[comp]
                    + dim * (self.state.beta[comp] / two_pi).ln());
            let det = linalg::det(&self.state.w.index_axis(Axis(0), comp));
            res -= special::wishart_entropy(
                det,
                self.dim,
                self.state.nu[comp],
                self.cache.det_ln_lambda[comp],
            );
        }
        res
    }

    /// Remove components whose effective sample count is below `threshold`.
    ///
    /// Survivors keep their ascending original order; every per-component
    /// array is compacted to the surviving prefix and a full E-step is
    /// forced afterwards so all caches match the new K. A zero (or
    /// negative) threshold disables pruning entirely.
    ///
    /// Errors
    /// ------
    /// - Numerical faults from the forced E-step.
    pub fn prune(&mut self, threshold: f64) -> VBResult<()> {
        // nothing to do for a zero threshold
        if threshold <= 0.0 {
            return Ok(());
        }
        let survivors: Vec<usize> =
            (0..self.k).filter(|&comp| self.stats.n_comp[comp] >= threshold).collect();
        if survivors.len() == self.k {
            // the E-step is a pure function of the hyperparameters, so
            // recompacting with every component surviving would only
            // recompute identical values
            return Ok(());
        }
        self.k = survivors.len();
        self.compact(&survivors);
        // recreate consistent expectation values for the new K
        self.e_step()
    }

    /// Compact every per-component array to the surviving index set.
    ///
    /// The explicit field list below is the single source of truth for
    /// "arrays carrying a K axis"; a new per-component array must be added
    /// here or pruning would desynchronize it.
    fn compact(&mut self, keep: &[usize]) {
        let state = &mut self.state;
        state.alpha0 = state.alpha0.select(Axis(0), keep);
        state.alpha = state.alpha.select(Axis(0), keep);
        state.beta0 = state.beta0.select(Axis(0), keep);
        state.beta = state.beta.select(Axis(0), keep);
        state.nu0 = state.nu0.select(Axis(0), keep);
        state.nu = state.nu.select(Axis(0), keep);
        state.m0 = state.m0.select(Axis(0), keep);
        state.m = state.m.select(Axis(0), keep);
        state.w0 = state.w0.select(Axis(0), keep);
        state.inv_w0 = state.inv_w0.select(Axis(0), keep);
        state.w = state.w.select(Axis(0), keep);

        let stats = &mut self.stats;
        stats.n_comp = stats.n_comp.select(Axis(0), keep);
        stats.inv_n_comp = stats.inv_n_comp.select(Axis(0), keep);
        stats.x_mean_comp = stats.x_mean_comp.select(Axis(0), keep);
        stats.s = stats.s.select(Axis(0), keep);

        let cache = &mut self.cache;
        cache.det_ln_lambda = cache.det_ln_lambda.select(Axis(0), keep);
        cache.ln_pi = cache.ln_pi.select(Axis(0), keep);
        cache.gauss_exponent = cache.gauss_exponent.select(Axis(1), keep);
        cache.r = cache.r.select(Axis(1), keep);
        self.log_rho = self.log_rho.select(Axis(1), keep);
    }

    /// Run E/M updates until the bound converges, the iteration cap is
    /// reached, or a numerical fault occurs.
    ///
    /// Per iteration: re-baseline the bound if pruning changed K (a bound
    /// summed over a different component set is not comparable), apply one
    /// update, evaluate the new bound, test for exact then approximate
    /// convergence (the latter only when the bound increased), then prune.
    ///
    /// Returns
    /// -------
    /// `Ok(Some(i))` with the 1-based iteration count at convergence;
    /// `Ok(None)` when the cap is exhausted without convergence — by
    /// design that outcome is a report, not an error.
    ///
    /// Errors
    /// ------
    /// - Numerical faults propagated from the update or the post-prune
    ///   E-step.
    pub fn run(&mut self, opts: &RunOptions) -> VBResult<Option<usize>> {
        let mut old_k: Option<usize> = None;
        let mut bound = f64::NAN;
        for i in 1..=opts.iterations {
            // recompute the baseline in the first step or whenever the
            // previous prune changed K
            let old_bound = if Some(self.k) == old_k {
                bound
            } else {
                let fresh = self.likelihood_bound();
                if opts.verbose {
                    info!(
                        "new bound = {fresh:.6e}, K = {}, N_k = {:?}",
                        self.k, self.stats.n_comp
                    );
                }
                fresh
            };

            self.update()?;
            bound = self.likelihood_bound();

            if opts.verbose {
                info!("after update {i}: bound = {bound:.6e}, K = {}", self.k);
            }

            // a numerical regression is reported but does not stop the run
            if bound < old_bound {
                warn!("bound decreased from {old_bound:.6e} to {bound:.6e}");
            }

            // exact convergence
            if bound == old_bound {
                return Ok(Some(i));
            }
            // approximate convergence, but only if the bound increased
            let diff = bound - old_bound;
            if diff > 0.0 {
                if old_bound.abs() < opts.abs_tol {
                    // the bound is close to zero; compare absolutely
                    if diff.abs() < opts.abs_tol {
                        return Ok(Some(i));
                    }
                } else if (diff / old_bound).abs() < opts.rel_tol {
                    // the relative change is measured against the previous
                    // bound, not the freshly computed one
                    return Ok(Some(i));
                }
            }

            // save K *before* pruning
            old_k = Some(self.k);
            self.prune(opts.prune)?;
        }
        // not converged
        Ok(None)
    }

    /// Extract the mixture defined by the mode of the posterior.
    ///
    /// Per component: the Dirichlet mode weight is `α_k − 1` (components
    /// with non-positive weight are skipped with a warning); the
    /// Gauss-Wishart mode covariance is `((ν_k − D) W_k)⁻¹`, which exists
    /// only for `ν_k > D` and invertible scale — otherwise the component
    /// is skipped, again non-fatally. Relative weights are handed to the
    /// mixture constructor unnormalized; it performs the normalization.
    ///
    /// Errors
    /// ------
    /// - [`VBError::Mixture`] wrapping `EmptyMixture` when every component
    ///   had to be skipped.
    pub fn make_mixture(&self) -> VBResult<MixtureDensity> {
        let dim = self.dim as f64;
        let mut components = Vec::with_capacity(self.k);
        let mut weights = Vec::with_capacity(self.k);
        let mut skipped = Vec::new();
        for comp in 0..self.k {
            // Dirichlet mode, left unnormalized: normalizing here would
            // hide the nonsense case where alpha_k < 1 makes the ratio of
            // two negative numbers look positive
            let pi = self.state.alpha[comp] - 1.0;
            if pi <= 0.0 {
                warn!("skipped component {comp} because of zero weight");
                skipped.push(comp);
                continue;
            }

            // the Gauss-Wishart mode exists only for nu > D
            let nu = self.state.nu[comp];
            if nu <= dim {
                warn!("Gauss-Wishart mode of component {comp} is not defined (nu = {nu})");
                skipped.push(comp);
                continue;
            }

            let precision = &self.state.w.index_axis(Axis(0), comp) * (nu - dim);
            let cov = match linalg::inverse(&precision.view()) {
                Some(cov) => cov,
                None => {
                    warn!("could not invert the mode precision of component {comp}");
                    skipped.push(comp);
                    continue;
                }
            };
            match Gauss::new(self.state.m.row(comp).to_owned(), cov) {
                Ok(gauss) => {
                    components.push(gauss);
                    weights.push(pi);
                }
                Err(err) => {
                    warn!("could not create component {comp}: {err}");
                    skipped.push(comp);
                }
            }
        }
        if !skipped.is_empty() {
            warn!("the following components have been skipped: {skipped:?}");
        }
        Ok(MixtureDensity::new(components, Some(Array1::from(weights)))?)
    }

    /// The current posterior re-packaged as the prior of a fresh
    /// [`VariationalSpec`], for chained/incremental fitting.
    pub fn posterior2prior(&self) -> VariationalSpec {
        self.state.posterior_spec()
    }

    /// Snapshot of all prior and posterior hyperparameters plus K.
    pub fn prior_posterior(&self) -> PriorPosterior {
        self.state.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vb::state::HyperInit;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - E-step invariants: responsibility rows normalize, entries stay in
    //   (0, 1], effective counts sum to the total weight.
    // - Fail-fast on an invalid precision matrix.
    // - The scalar (1-D, K = 1) M-step closed form.
    // - Bound recomputability, finiteness, and fixed-K monotonicity.
    // - Prune compaction order and the run/convergence contract.
    // - Merge-mode construction seeding and the missing-K error.
    //
    // They intentionally DO NOT cover:
    // - Statistical recovery quality on realistic data; that lives in the
    //   integration suite.
    // -------------------------------------------------------------------------

    /// Twelve fixed 2-D points forming two loose groups around (−2, −2)
    /// and (2, 2); deterministic so every test sees identical input.
    fn two_group_data() -> Array2<f64> {
        array![
            [-2.1, -1.9],
            [-1.8, -2.2],
            [-2.3, -2.0],
            [-1.9, -1.8],
            [-2.0, -2.1],
            [-2.2, -2.3],
            [1.9, 2.1],
            [2.2, 1.8],
            [2.0, 2.3],
            [1.8, 1.9],
            [2.1, 2.0],
            [2.3, 2.2],
        ]
    }

    fn engine_on_two_groups(k: usize) -> GaussianInference {
        GaussianInference::new(two_group_data(), k, None, VariationalSpec::default()).unwrap()
    }

    #[test]
    // Purpose
    // -------
    // Verify the E-step invariants right after construction.
    //
    // Given
    // -----
    // - The fixed two-group data with K = 2 and default priors.
    //
    // Expect
    // ------
    // - Each responsibility row sums to 1 with entries in (0, 1], and the
    //   effective counts sum to N = 12.
    fn e_step_normalizes_responsibilities_and_counts() {
        // Arrange + Act
        let engine = engine_on_two_groups(2);

        // Assert
        for row in engine.responsibilities().rows() {
            let sum: f64 = row.sum();
            assert_relative_eq!(sum, 1.0, max_relative = 1e-10);
            for &v in row {
                assert!(v > 0.0 && v <= 1.0, "responsibility out of (0, 1]: {v}");
            }
        }
        assert_relative_eq!(engine.effective_counts().sum(), 12.0, max_relative = 1e-10);
    }

    #[test]
    // Purpose
    // -------
    // Verify that the engine is debug-formattable regardless of which
    // provider it holds; `unwrap_err` on a constructor result needs this.
    //
    // Given
    // -----
    // - A raw-sample engine and a merge-mode engine.
    //
    // Expect
    // ------
    // - Both Debug renderings name the type.
    fn engine_is_debug_formattable_for_both_providers() {
        // Arrange
        let sample = engine_on_two_groups(2);
        let comp = Gauss::new(array![0.0], array![[1.0]]).unwrap();
        let input = MixtureDensity::new(vec![comp], None).unwrap();
        let spec = VariationalSpec {
            nu: Some(HyperInit::Scalar(3.0)),
            ..VariationalSpec::default()
        };
        let merge =
            GaussianInference::merge(&input, 10, Some(1), None, spec).unwrap();

        // Act + Assert
        assert!(format!("{sample:?}").contains("GaussianInference"));
        assert!(format!("{merge:?}").contains("GaussianInference"));
    }

    #[test]
    // Purpose
    // -------
    // Verify that an invalid precision matrix aborts the E-step before
    // any statistics are touched.
    //
    // Given
    // -----
    // - A constructed engine whose W[0] is overwritten with a matrix of
    //   negative determinant.
    //
    // Expect
    // ------
    // - `PrecisionNotPositiveDefinite` naming component 0.
    fn e_step_fails_fast_on_invalid_precision() {
        // Arrange
        let mut engine = engine_on_two_groups(2);
        engine.state.w.index_axis_mut(Axis(0), 0).assign(&array![[1.0, 0.0], [0.0, -1.0]]);

        // Act
        let err = engine.e_step().unwrap_err();

        // Assert
        match err {
            VBError::PrecisionNotPositiveDefinite { component, det } => {
                assert_eq!(component, 0);
                assert!(det < 0.0);
            }
            other => panic!("expected PrecisionNotPositiveDefinite, got {other:?}"),
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify the M-step closed form in the scalar case.
    //
    // Given
    // -----
    // - A 1-D, K = 1 engine whose sufficient statistics after the initial
    //   E-step are known: responsibilities are exactly one, so N_1 = N,
    //   x̄ is the sample mean and S the sample variance.
    //
    // Expect
    // ------
    // - nu/alpha/beta equal prior + N; m equals the precision-weighted
    //   blend; W equals the scalar assembly inverse.
    fn m_step_matches_scalar_closed_form() {
        // Arrange
        let data = array![[1.0], [2.0], [3.0]];
        let mut engine =
            GaussianInference::new(data, 1, None, VariationalSpec::default()).unwrap();
        let n = 3.0;
        let xbar = 2.0;
        let s = 2.0 / 3.0;
        let alpha0 = engine.state.alpha0[0];
        let beta0 = engine.state.beta0[0];
        let nu0 = engine.state.nu0[0];
        let m0 = engine.state.m0[[0, 0]];
        assert_relative_eq!(engine.stats.n_comp[0], n, max_relative = 1e-12);
        assert_relative_eq!(engine.stats.x_mean_comp[[0, 0]], xbar, max_relative = 1e-12);
        assert_relative_eq!(engine.stats.s[[0, 0, 0]], s, max_relative = 1e-12);

        // Act
        engine.m_step().unwrap();

        // Assert
        assert_relative_eq!(engine.state.alpha[0], alpha0 + n, max_relative = 1e-12);
        assert_relative_eq!(engine.state.beta[0], beta0 + n, max_relative = 1e-12);
        assert_relative_eq!(engine.state.nu[0], nu0 + n, max_relative = 1e-12);
        let expected_m = (beta0 * m0 + n * xbar) / (beta0 + n);
        assert_relative_eq!(engine.state.m[[0, 0]], expected_m, max_relative = 1e-12);
        let shrink = beta0 * n / (beta0 + n);
        let expected_w = 1.0 / (1.0 + n * s + shrink * (xbar - m0) * (xbar - m0));
        assert_relative_eq!(engine.state.w[[0, 0, 0]], expected_w, max_relative = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify that the bound is recomputable and finite, with no hidden
    // accumulation between calls.
    //
    // Given
    // -----
    // - A freshly constructed engine.
    //
    // Expect
    // ------
    // - Two consecutive bound evaluations return the identical finite
    //   value.
    fn likelihood_bound_is_pure_and_finite() {
        // Arrange
        let engine = engine_on_two_groups(2);

        // Act
        let first = engine.likelihood_bound();
        let second = engine.likelihood_bound();

        // Assert
        assert!(first.is_finite());
        assert_eq!(first, second);
    }

    #[test]
    // Purpose
    // -------
    // Verify fixed-K monotonicity of the bound under standard updates.
    //
    // Given
    // -----
    // - The two-group engine with K = 2, no pruning, ten manual updates.
    //
    // Expect
    // ------
    // - The bound never decreases beyond floating slack between
    //   consecutive iterations.
    fn bound_is_monotone_for_fixed_k() {
        // Arrange
        let mut engine = engine_on_two_groups(2);
        let mut previous = engine.likelihood_bound();

        // Act + Assert
        for _ in 0..10 {
            engine.update().unwrap();
            let current = engine.likelihood_bound();
            assert!(
                current >= previous - 1e-8 * previous.abs().max(1.0),
                "bound decreased: {previous} -> {current}"
            );
            previous = current;
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify prune compaction: survivors keep their ascending order, dead
    // components disappear from every per-component array, and the forced
    // E-step leaves a finite bound.
    //
    // Given
    // -----
    // - K = 3 on the two-group data with distinguishable alpha0 values
    //   (0.1, 0.2, 0.3); after convergence one component must starve.
    //
    // Expect
    // ------
    // - K shrinks, the surviving alpha0 values appear as a subsequence of
    //   the original ones, and the bound is finite.
    fn prune_compacts_in_order_and_leaves_consistent_state() {
        // Arrange
        let spec = VariationalSpec {
            alpha0: Some(HyperInit::Vector(array![0.1, 0.2, 0.3])),
            ..VariationalSpec::default()
        };
        let mut engine =
            GaussianInference::new(two_group_data(), 3, None, spec).unwrap();
        for _ in 0..20 {
            engine.update().unwrap();
        }
        let original = array![0.1, 0.2, 0.3];

        // Act
        engine.prune(1.0).unwrap();

        // Assert
        let k = engine.components();
        assert!(k < 3, "expected at least one component to starve; K = {k}");
        assert!(k >= 1);
        // surviving alpha0 values form an in-order subsequence of the originals
        let mut cursor = 0;
        for &survivor in &engine.state.alpha0 {
            while cursor < 3 && original[cursor] != survivor {
                cursor += 1;
            }
            assert!(cursor < 3, "survivor {survivor} out of order");
            cursor += 1;
        }
        assert_eq!(engine.state.alpha.len(), k);
        assert_eq!(engine.state.m.nrows(), k);
        assert_eq!(engine.state.w.dim().0, k);
        assert_eq!(engine.responsibilities().ncols(), k);
        assert!(engine.likelihood_bound().is_finite());
    }

    #[test]
    // Purpose
    // -------
    // Verify the run contract: convergence yields an iteration count
    // within the cap, and a cap of one on fresh data reports "not
    // converged" without erroring.
    //
    // Given
    // -----
    // - The two-group engine with K = 2, pruning disabled.
    //
    // Expect
    // ------
    // - A generous cap returns `Some(i)` with `i <= cap`; a one-iteration
    //   cap returns `None`.
    fn run_reports_convergence_or_exhaustion() {
        // Arrange
        let mut engine = engine_on_two_groups(2);
        let opts = RunOptions { iterations: 200, prune: 0.0, ..RunOptions::default() };

        // Act
        let outcome = engine.run(&opts).unwrap();

        // Assert
        let iterations = outcome.expect("expected convergence within 200 iterations");
        assert!(iterations <= 200);

        // Arrange: fresh engine, starved cap
        let mut fresh = engine_on_two_groups(2);
        let tight = RunOptions { iterations: 1, prune: 0.0, ..RunOptions::default() };

        // Act + Assert
        assert_eq!(fresh.run(&tight).unwrap(), None);
    }

    #[test]
    // Purpose
    // -------
    // Verify that `make_mixture` produces a normalized mixture whose
    // means sit near the posterior means.
    //
    // Given
    // -----
    // - The two-group engine after a converged run without pruning.
    //
    // Expect
    // ------
    // - At most K components, weights summing to one, and each output
    //   mean equal to the corresponding posterior mean row.
    fn make_mixture_extracts_posterior_modes() {
        // Arrange
        let mut engine = engine_on_two_groups(2);
        let opts = RunOptions { iterations: 200, prune: 0.0, ..RunOptions::default() };
        engine.run(&opts).unwrap();

        // Act
        let mixture = engine.make_mixture().unwrap();

        // Assert
        assert!(mixture.len() <= 2);
        assert_relative_eq!(mixture.weights().sum(), 1.0, max_relative = 1e-12);
        for (comp, gauss) in mixture.components().iter().enumerate() {
            for j in 0..2 {
                assert_relative_eq!(
                    gauss.mu[j],
                    engine.state.m[[comp, j]],
                    max_relative = 1e-12
                );
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Verify merge-mode construction: an initial guess fixes K and seeds
    // the posterior, and omitting both K sources is a configuration
    // error.
    //
    // Given
    // -----
    // - A two-component input mixture, a one-component initial guess with
    //   ν = 3 (> D, so the seeded scale `Σ⁻¹/(ν − D)` is positive), and a
    //   call with neither `components` nor a guess.
    //
    // Expect
    // ------
    // - K = 1 with `m` seeded from the guess mean, `W = Σ⁻¹/(ν − D)`, and
    //   `alpha = n·ω`; the degenerate call fails with
    //   `UnspecifiedComponents`.
    fn merge_uses_initial_guess_and_requires_k() {
        // Arrange
        let a = Gauss::new(array![-1.0], array![[1.0]]).unwrap();
        let b = Gauss::new(array![1.0], array![[1.0]]).unwrap();
        let input = MixtureDensity::new(vec![a, b], None).unwrap();
        let guess_comp = Gauss::new(array![0.5], array![[2.0]]).unwrap();
        let guess = MixtureDensity::new(vec![guess_comp], None).unwrap();
        let spec = VariationalSpec {
            nu: Some(HyperInit::Scalar(3.0)),
            ..VariationalSpec::default()
        };

        // Act
        let engine =
            GaussianInference::merge(&input, 50, Some(4), Some(&guess), spec).unwrap();
        let missing =
            GaussianInference::merge(&input, 50, None, None, VariationalSpec::default())
                .unwrap_err();

        // Assert
        assert_eq!(engine.components(), 1, "guess size overrides `components`");
        assert_relative_eq!(engine.state.m[[0, 0]], 0.5, max_relative = 1e-12);
        // Σ⁻¹/(ν − D) = 0.5 / (3 − 1)
        assert_relative_eq!(engine.state.w[[0, 0, 0]], 0.25, max_relative = 1e-12);
        assert_relative_eq!(engine.state.alpha[0], 50.0, max_relative = 1e-12);
        assert_eq!(missing, VBError::UnspecifiedComponents);
    }
}
