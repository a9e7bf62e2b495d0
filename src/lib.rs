//! vbmix — variational-Bayes inference for finite Gaussian mixtures.
//!
//! Purpose
//! -------
//! Fit the approximate posterior of a finite Gaussian mixture to a weighted
//! point cloud with a mean-field variational-Bayes scheme (chapter 10.2 of
//! Bishop's *Pattern Recognition and Machine Learning*), or compress an
//! already-fitted mixture into a smaller one without access to the original
//! samples (Bruneau, Gelgon, Picarougne 2010). Both modes share one
//! deterministic E/M fixed-point engine driven by a closed-form variational
//! lower bound.
//!
//! Key behaviors
//! -------------
//! - Expose [`GaussianInference`], the inference engine: coupled E/M updates
//!   over Dirichlet and Gaussian-Wishart hyperparameters, a recomputable
//!   likelihood bound, component pruning with consistent reindexing, and a
//!   point-estimate extractor producing a [`MixtureDensity`].
//! - Select the data-facing statistics at construction time: raw weighted
//!   samples ([`GaussianInference::new`]) or an input mixture summarized by
//!   per-component statistics ([`GaussianInference::merge`]).
//! - Validate and broadcast user-supplied hyperparameters through
//!   [`VariationalSpec`], and control run-time behavior through
//!   [`RunOptions`].
//!
//! Invariants & assumptions
//! ------------------------
//! - All heavy numerical state is dense `ndarray` storage owned by the
//!   engine; inputs (data matrix, input mixture) are never mutated.
//! - The component-count axis K only ever shrinks, and only during pruning.
//! - Every operation is synchronous batch computation; an engine instance is
//!   not meant for concurrent mutating access.
//!
//! Conventions
//! -----------
//! - N = number of samples, D = dimensionality, K = current component count,
//!   L = number of input components in merge mode.
//! - Fatal conditions (shape/domain violations, non-positive-definite
//!   precisions, singular inversions) surface as [`VBError`]; non-fatal
//!   numerical anomalies are reported through the `log` facade and never
//!   stop the iteration.
//!
//! Downstream usage
//! ----------------
//! - Typical raw-sample flow: build the engine from an N×D matrix, call
//!   [`GaussianInference::run`], then [`GaussianInference::make_mixture`].
//! - Typical compression flow: build with [`GaussianInference::merge`] from
//!   an existing [`MixtureDensity`] plus its originating sample count, run,
//!   and extract the reduced mixture.
//! - Chained fitting: feed [`GaussianInference::posterior2prior`] into a
//!   follow-up engine as its prior.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each module; end-to-end recovery, pruning, and
//!   compression scenarios live in `tests/integration_vb.rs`.

pub mod mixture;
pub mod vb;

pub use mixture::{Gauss, MixtureDensity};
pub use vb::engine::GaussianInference;
pub use vb::errors::{VBError, VBResult};
pub use vb::options::RunOptions;
pub use vb::state::{HyperInit, MeanInit, PrecisionInit, PriorPosterior, VariationalSpec};
