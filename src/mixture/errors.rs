//! Errors for the Gaussian-component and mixture-density value types.
//!
//! [`MixtureError`] covers construction-time validation of [`crate::Gauss`]
//! and [`crate::MixtureDensity`]: covariance shape and invertibility, weight
//! vector length and positivity, and dimensional agreement across
//! components. It implements `Display`/`Error` by hand and converts into the
//! engine-level `VBError` at the inference boundary.

/// Result alias for mixture value-type construction.
pub type MixtureResult<T> = Result<T, MixtureError>;

/// Errors raised while constructing mixture value types.
#[derive(Debug, Clone, PartialEq)]
pub enum MixtureError {
    /// Covariance matrix is not square.
    NonSquareCovariance { rows: usize, cols: usize },

    /// Covariance shape does not match the mean's dimension.
    CovarianceDimensionMismatch { mean_dim: usize, cov_dim: usize },

    /// Covariance matrix could not be inverted.
    SingularCovariance,

    /// A component's dimension differs from the first component's.
    ComponentDimensionMismatch { index: usize, expected: usize, actual: usize },

    /// Weight vector length does not match the number of components.
    WeightLengthMismatch { expected: usize, actual: usize },

    /// A component weight is negative or non-finite.
    InvalidWeight { index: usize, value: f64 },

    /// Weights sum to zero, so they cannot be normalized.
    ZeroWeightSum,

    /// A mixture must contain at least one component.
    EmptyMixture,
}

impl std::error::Error for MixtureError {}

impl std::fmt::Display for MixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MixtureError::NonSquareCovariance { rows, cols } => {
                write!(f, "Covariance matrix must be square; got {rows}x{cols}")
            }
            MixtureError::CovarianceDimensionMismatch { mean_dim, cov_dim } => {
                write!(
                    f,
                    "Covariance dimension ({cov_dim}) does not match mean dimension ({mean_dim})"
                )
            }
            MixtureError::SingularCovariance => {
                write!(f, "Covariance matrix is singular and cannot be inverted.")
            }
            MixtureError::ComponentDimensionMismatch { index, expected, actual } => {
                write!(
                    f,
                    "Component {index} has dimension {actual}; expected {expected}"
                )
            }
            MixtureError::WeightLengthMismatch { expected, actual } => {
                write!(
                    f,
                    "The number of components ({expected}) does not match the number of weights ({actual})"
                )
            }
            MixtureError::InvalidWeight { index, value } => {
                write!(f, "Component weight at index {index} must be finite and >= 0; got {value}")
            }
            MixtureError::ZeroWeightSum => {
                write!(f, "Component weights sum to zero and cannot be normalized.")
            }
            MixtureError::EmptyMixture => {
                write!(f, "A mixture density must contain at least one component.")
            }
        }
    }
}
