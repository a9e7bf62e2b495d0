//! Variational-Bayes inference for Gaussian mixtures.
//!
//! Purpose
//! -------
//! Fit the posterior of a Bayesian Gaussian mixture by mean-field
//! variational inference: Dirichlet mixing weights and Gaussian-Wishart
//! component parameters, updated by closed-form E/M iteration until the
//! variational lower bound converges. Two input modes share the full
//! machinery: raw (optionally weighted) samples, and compression of an
//! existing mixture from per-component summaries alone.
//!
//! Submodules
//! ----------
//! - [`engine`]: the E/M iteration, bound, pruning, run loop, and output
//!   extraction ([`engine::GaussianInference`]).
//! - [`state`]: hyperparameter initializers and the validated prior and
//!   posterior arrays.
//! - [`statistics`]: the data-facing E-step strategies for the two input
//!   modes.
//! - [`options`]: run-loop configuration.
//! - [`special`]: Wishart/Dirichlet log-normalization helpers.
//! - [`linalg`]: determinant/inverse bridging and zero-flooring.
//! - [`errors`]: the unified error type and result alias.
//!
//! Conventions
//! -----------
//! - Shapes follow K components, D dimensions, N samples (or L input
//!   components in merge mode); per-component arrays carry K on axis 0.
//! - Fallible operations return [`errors::VBResult`]; non-fatal anomalies
//!   are reported through the `log` facade instead.
pub mod engine;
pub mod errors;
pub mod linalg;
pub mod options;
pub mod special;
pub mod state;
pub mod statistics;
