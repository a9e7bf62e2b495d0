//! Closed-form log-normalizers and entropies for Wishart and Dirichlet
//! distributions.
//!
//! Purpose
//! -------
//! Provide the scalar building blocks of the variational lower bound:
//! the Wishart log-normalizer ln B(W, ν) (Bishop B.79), the Wishart
//! expected log-determinant E[ln|Λ|] (B.81), the Wishart entropy H[q(Λ)]
//! (B.82), and the Dirichlet log-normalizer ln C(α) (B.23). All are pure
//! functions of scalar parameters (and a precomputed determinant), so the
//! caller controls when determinants are evaluated and can share them with
//! its own positive-definiteness checks.
//!
//! Conventions
//! -----------
//! - `det` is the determinant of the D×D scale matrix W, which must be
//!   positive; these functions do not re-validate it.
//! - `nu` is the Wishart degrees of freedom; the usual domain constraint
//!   ν > D−1 is enforced upstream by hyperparameter validation, not here.
//! - Gamma-family evaluations go through `statrs` (`ln_gamma`, `digamma`)
//!   to stay overflow-safe on the log scale.
use statrs::function::gamma::{digamma, ln_gamma};

/// Multivariate digamma sum `Σ_{i=1..d} ψ((nu + 1 − i)/2)`.
///
/// Shared term of the Wishart expected log-determinant and its entropy.
pub fn multivariate_digamma_half(nu: f64, d: usize) -> f64 {
    (1..=d).map(|i| digamma(0.5 * (nu + 1.0 - i as f64))).sum()
}

/// Wishart log-normalizer `ln B(W, ν)` (Bishop B.79) from `det = |W|`.
pub fn wishart_log_b(det: f64, d: usize, nu: f64) -> f64 {
    let dd = d as f64;
    let mut log_b = -0.5 * nu * det.ln();
    log_b -= 0.5 * nu * dd * std::f64::consts::LN_2;
    log_b -= 0.25 * dd * (dd - 1.0) * std::f64::consts::PI.ln();
    for i in 1..=d {
        log_b -= ln_gamma(0.5 * (nu + 1.0 - i as f64));
    }
    log_b
}

/// Wishart expected log-determinant `E[ln|Λ|]` (Bishop B.81) from `det = |W|`.
pub fn wishart_expect_log_det(det: f64, d: usize, nu: f64) -> f64 {
    multivariate_digamma_half(nu, d) + d as f64 * std::f64::consts::LN_2 + det.ln()
}

/// Wishart entropy `H[q(Λ)]` (Bishop B.82).
///
/// Takes the already-cached `expect_log_det = E[ln|Λ|]` so the E-step's
/// value is reused instead of recomputed.
pub fn wishart_entropy(det: f64, d: usize, nu: f64, expect_log_det: f64) -> f64 {
    let dd = d as f64;
    -wishart_log_b(det, d, nu) - 0.5 * (nu - dd - 1.0) * expect_log_det + 0.5 * nu * dd
}

/// Dirichlet log-normalizer `ln C(α)` (Bishop B.23).
///
/// Computed with `ln_gamma` throughout to avoid overflow for large
/// concentration sums.
pub fn dirichlet_log_c<'a, I>(alpha: I) -> f64
where
    I: IntoIterator<Item = &'a f64> + Clone,
{
    let sum: f64 = alpha.clone().into_iter().sum();
    let mut log_c = ln_gamma(sum);
    for &a in alpha {
        log_c -= ln_gamma(a);
    }
    log_c
}
