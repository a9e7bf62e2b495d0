//! mixture — Gaussian component and mixture-density value types.
//!
//! Purpose
//! -------
//! Define the concrete values the inference engine consumes and produces:
//! a single Gaussian component ([`Gauss`]) holding a mean, a covariance,
//! and a cached inverse covariance, and an ordered weighted collection of
//! such components ([`MixtureDensity`]) with weights normalized to sum to
//! one at construction.
//!
//! Key behaviors
//! -------------
//! - Validate covariance shape and invertibility once, at [`Gauss::new`],
//!   so downstream code can read `inv_sigma` without re-checking.
//! - Normalize mixture weights in [`MixtureDensity::new`]; the engine's
//!   output builder deliberately hands over *unnormalized* Dirichlet mode
//!   weights and relies on this.
//! - Enforce that every component of a mixture shares one dimensionality.
//!
//! Invariants & assumptions
//! ------------------------
//! - `Gauss::sigma` is square, matches the mean's dimension, and is
//!   invertible; `inv_sigma` is its inverse as computed at construction.
//! - `MixtureDensity::weights` has one entry per component, entries are
//!   non-negative and finite, and they sum to 1 after construction.
//! - Symmetry/positive-definiteness of `sigma` beyond invertibility is the
//!   caller's responsibility; the inference engine validates its own
//!   precision matrices separately.
//!
//! Downstream usage
//! ----------------
//! - Raw-sample inference returns a `MixtureDensity` from
//!   `GaussianInference::make_mixture`.
//! - Mixture compression consumes a `MixtureDensity` (plus its originating
//!   sample count) through `GaussianInference::merge` and never mutates it.
//!
//! Testing notes
//! -------------
//! - Unit tests below cover construction validation and weight
//!   normalization; end-to-end production of mixtures is exercised by the
//!   engine's integration tests.
pub mod errors;

use crate::vb::linalg;
use errors::{MixtureError, MixtureResult};
use ndarray::{Array1, Array2};

/// A single Gaussian component: mean, covariance, and cached inverse.
///
/// Purpose
/// -------
/// Immutable value type for one mixture component. The inverse covariance
/// is computed once at construction because both importance-style density
/// evaluation and the merge-mode engine read it repeatedly.
///
/// Invariants
/// ----------
/// - `sigma` is D×D where D = `mu.len()`, and `inv_sigma = sigma⁻¹`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gauss {
    /// Mean vector (length D).
    pub mu: Array1<f64>,
    /// Covariance matrix (D×D).
    pub sigma: Array2<f64>,
    /// Inverse covariance matrix (D×D), cached at construction.
    pub inv_sigma: Array2<f64>,
}

impl Gauss {
    /// Construct a component from a mean and covariance.
    ///
    /// Parameters
    /// ----------
    /// - `mu`: mean vector of length D.
    /// - `sigma`: covariance matrix; must be D×D and invertible.
    ///
    /// Returns
    /// -------
    /// `MixtureResult<Gauss>` with the inverse covariance cached.
    ///
    /// Errors
    /// ------
    /// - [`MixtureError::NonSquareCovariance`] if `sigma` is not square.
    /// - [`MixtureError::CovarianceDimensionMismatch`] if `sigma` does not
    ///   match `mu`'s length.
    /// - [`MixtureError::SingularCovariance`] if `sigma` cannot be inverted.
    pub fn new(mu: Array1<f64>, sigma: Array2<f64>) -> MixtureResult<Gauss> {
        if sigma.nrows() != sigma.ncols() {
            return Err(MixtureError::NonSquareCovariance {
                rows: sigma.nrows(),
                cols: sigma.ncols(),
            });
        }
        if sigma.nrows() != mu.len() {
            return Err(MixtureError::CovarianceDimensionMismatch {
                mean_dim: mu.len(),
                cov_dim: sigma.nrows(),
            });
        }
        let inv_sigma =
            linalg::inverse(&sigma.view()).ok_or(MixtureError::SingularCovariance)?;
        Ok(Gauss { mu, sigma, inv_sigma })
    }

    /// Dimensionality D of the component.
    pub fn dim(&self) -> usize {
        self.mu.len()
    }
}

/// An ordered, weighted collection of Gaussian components.
///
/// Purpose
/// -------
/// The mixture value produced by inference and consumed by compression.
/// Weights are normalized to sum to one at construction; component order
/// is preserved exactly as given.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureDensity {
    components: Vec<Gauss>,
    weights: Array1<f64>,
}

impl MixtureDensity {
    /// Construct a mixture from components and optional relative weights.
    ///
    /// Parameters
    /// ----------
    /// - `components`: at least one component; all must share one D.
    /// - `weights`: optional relative weights (same length as
    ///   `components`); normalized to sum to 1. `None` means equal weights.
    ///
    /// Errors
    /// ------
    /// - [`MixtureError::EmptyMixture`] for an empty component list.
    /// - [`MixtureError::ComponentDimensionMismatch`] if dimensions differ.
    /// - [`MixtureError::WeightLengthMismatch`],
    ///   [`MixtureError::InvalidWeight`], [`MixtureError::ZeroWeightSum`]
    ///   for malformed weights.
    pub fn new(
        components: Vec<Gauss>, weights: Option<Array1<f64>>,
    ) -> MixtureResult<MixtureDensity> {
        if components.is_empty() {
            return Err(MixtureError::EmptyMixture);
        }
        let dim = components[0].dim();
        for (index, comp) in components.iter().enumerate().skip(1) {
            if comp.dim() != dim {
                return Err(MixtureError::ComponentDimensionMismatch {
                    index,
                    expected: dim,
                    actual: comp.dim(),
                });
            }
        }

        let mut weights = match weights {
            Some(w) => {
                if w.len() != components.len() {
                    return Err(MixtureError::WeightLengthMismatch {
                        expected: components.len(),
                        actual: w.len(),
                    });
                }
                w
            }
            None => Array1::from_elem(components.len(), 1.0),
        };
        for (index, &value) in weights.iter().enumerate() {
            if !value.is_finite() || value < 0.0 {
                return Err(MixtureError::InvalidWeight { index, value });
            }
        }
        let sum = weights.sum();
        if sum <= 0.0 {
            return Err(MixtureError::ZeroWeightSum);
        }
        weights /= sum;

        Ok(MixtureDensity { components, weights })
    }

    /// The ordered components.
    pub fn components(&self) -> &[Gauss] {
        &self.components
    }

    /// Normalized weights (sum to 1), aligned with [`Self::components`].
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the mixture has no components. Never true for a constructed
    /// value; provided for the conventional `len`/`is_empty` pair.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Dimensionality D shared by all components.
    pub fn dim(&self) -> usize {
        self.components[0].dim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - `Gauss` construction validation and inverse caching.
    // - `MixtureDensity` weight normalization, defaulting, and dimension
    //   agreement.
    //
    // They intentionally DO NOT cover:
    // - Density evaluation or sampling; this crate only carries the value
    //   types the inference engine needs.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that `Gauss::new` caches the covariance inverse.
    //
    // Given
    // -----
    // - A diagonal covariance diag(2, 4).
    //
    // Expect
    // ------
    // - `inv_sigma` is diag(0.5, 0.25).
    fn gauss_new_caches_inverse_covariance() {
        // Arrange
        let mu = array![0.0, 1.0];
        let sigma = array![[2.0, 0.0], [0.0, 4.0]];

        // Act
        let g = Gauss::new(mu, sigma).unwrap();

        // Assert
        assert_relative_eq!(g.inv_sigma[[0, 0]], 0.5, max_relative = 1e-12);
        assert_relative_eq!(g.inv_sigma[[1, 1]], 0.25, max_relative = 1e-12);
        assert_relative_eq!(g.inv_sigma[[0, 1]], 0.0, epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // Verify rejection of a covariance that does not match the mean.
    //
    // Given
    // -----
    // - A 3-vector mean with a 2x2 covariance.
    //
    // Expect
    // ------
    // - `CovarianceDimensionMismatch` with both dimensions reported.
    fn gauss_new_rejects_dimension_mismatch() {
        // Arrange
        let mu = array![0.0, 0.0, 0.0];
        let sigma = array![[1.0, 0.0], [0.0, 1.0]];

        // Act
        let err = Gauss::new(mu, sigma).unwrap_err();

        // Assert
        assert_eq!(err, MixtureError::CovarianceDimensionMismatch { mean_dim: 3, cov_dim: 2 });
    }

    #[test]
    // Purpose
    // -------
    // Verify that a singular covariance is rejected.
    //
    // Given
    // -----
    // - A rank-1 2x2 covariance.
    //
    // Expect
    // ------
    // - `SingularCovariance`.
    fn gauss_new_rejects_singular_covariance() {
        // Arrange
        let mu = array![0.0, 0.0];
        let sigma = array![[1.0, 1.0], [1.0, 1.0]];

        // Act + Assert
        assert_eq!(Gauss::new(mu, sigma).unwrap_err(), MixtureError::SingularCovariance);
    }

    #[test]
    // Purpose
    // -------
    // Verify that mixture weights are normalized and order is preserved.
    //
    // Given
    // -----
    // - Two unit-covariance components with relative weights (3, 1).
    //
    // Expect
    // ------
    // - Stored weights are (0.75, 0.25) in the original order.
    fn mixture_new_normalizes_relative_weights() {
        // Arrange
        let a = Gauss::new(array![-1.0], array![[1.0]]).unwrap();
        let b = Gauss::new(array![1.0], array![[1.0]]).unwrap();

        // Act
        let mix = MixtureDensity::new(vec![a, b], Some(array![3.0, 1.0])).unwrap();

        // Assert
        assert_relative_eq!(mix.weights()[0], 0.75, max_relative = 1e-12);
        assert_relative_eq!(mix.weights()[1], 0.25, max_relative = 1e-12);
        assert_relative_eq!(mix.components()[0].mu[0], -1.0, epsilon = 1e-15);
    }

    #[test]
    // Purpose
    // -------
    // Verify the default of equal weights and the empty-mixture rejection.
    //
    // Given
    // -----
    // - Two components with `weights = None`, and an empty component list.
    //
    // Expect
    // ------
    // - Equal weights 0.5/0.5; empty list yields `EmptyMixture`.
    fn mixture_new_defaults_to_equal_weights_and_rejects_empty() {
        // Arrange
        let a = Gauss::new(array![0.0], array![[1.0]]).unwrap();
        let b = Gauss::new(array![2.0], array![[1.0]]).unwrap();

        // Act
        let mix = MixtureDensity::new(vec![a, b], None).unwrap();
        let empty = MixtureDensity::new(Vec::new(), None);

        // Assert
        assert_relative_eq!(mix.weights()[0], 0.5, max_relative = 1e-12);
        assert_relative_eq!(mix.weights()[1], 0.5, max_relative = 1e-12);
        assert_eq!(empty.unwrap_err(), MixtureError::EmptyMixture);
    }

    #[test]
    // Purpose
    // -------
    // Verify that components of differing dimension are rejected.
    //
    // Given
    // -----
    // - A 1-D and a 2-D component in one mixture.
    //
    // Expect
    // ------
    // - `ComponentDimensionMismatch` naming index 1.
    fn mixture_new_rejects_mixed_dimensions() {
        // Arrange
        let a = Gauss::new(array![0.0], array![[1.0]]).unwrap();
        let b = Gauss::new(array![0.0, 0.0], array![[1.0, 0.0], [0.0, 1.0]]).unwrap();

        // Act
        let err = MixtureDensity::new(vec![a, b], None).unwrap_err();

        // Assert
        assert_eq!(
            err,
            MixtureError::ComponentDimensionMismatch { index: 1, expected: 1, actual: 2 }
        );
    }
}
