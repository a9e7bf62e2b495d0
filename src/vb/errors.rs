//! Errors for variational-Bayes mixture inference (hyperparameter shape and
//! domain checks, data validation, and mid-computation numerical faults).
//!
//! This module defines the engine error type, [`VBError`], used across
//! construction, the E/M iteration, pruning, and output extraction. It
//! implements `Display`/`Error` by hand and carries enough context (array
//! name, component index, offending value) to make a failure actionable
//! without a debugger.
//!
//! ## Conventions
//! - **Indices are 0-based** and refer to components (K axis) or samples
//!   (N axis) as documented per variant.
//! - Configuration errors are raised before any K-sized posterior array is
//!   committed; numerical faults abort the current call.
//! - Non-fatal anomalies (a decreasing bound, a component skipped in the
//!   output, floored denominators) are *not* errors; they are reported via
//!   the `log` facade by the engine and iteration continues.
use crate::mixture::errors::MixtureError;

/// Result alias for engine operations that may produce [`VBError`].
pub type VBResult<T> = Result<T, VBError>;

/// Unified error type for variational-Bayes mixture inference.
///
/// Covers hyperparameter shape/domain validation, sample-weight checks,
/// construction-time configuration problems, and numerical faults detected
/// during the E/M iteration or output extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum VBError {
    // ---- Hyperparameter shape validation ----
    /// A per-component hyperparameter vector has the wrong length.
    VectorLengthMismatch { name: &'static str, expected: usize, actual: usize },

    /// A mean parameter is neither a D vector nor a K×D matrix of the
    /// expected shape.
    MatrixShapeMismatch {
        name: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A precision parameter is neither a D×D matrix nor a K×D×D array of
    /// the expected shape.
    CubeShapeMismatch {
        name: &'static str,
        expected: (usize, usize, usize),
        actual: (usize, usize, usize),
    },

    // ---- Hyperparameter domain validation ----
    /// An element of a hyperparameter vector does not exceed its lower
    /// bound (0 for `alpha`/`beta`, D−1 for `nu`).
    DomainViolation { name: &'static str, min: f64, value: f64 },

    // ---- Data validation ----
    /// The sample matrix has zero rows or zero columns.
    EmptyData,

    /// The weight vector length does not match the number of samples.
    WeightLengthMismatch { expected: usize, actual: usize },

    /// A sample weight is non-positive or non-finite.
    InvalidWeight { index: usize, value: f64 },

    /// Merge-mode construction received neither `components` nor an
    /// `initial_guess` to fix K.
    UnspecifiedComponents,

    /// An initial-guess mixture has a different dimensionality than the
    /// input mixture.
    GuessDimensionMismatch { expected: usize, actual: usize },

    // ---- Numerical faults ----
    /// A posterior precision matrix `W_k` has a non-positive determinant;
    /// detected at the start of the E-step, before the per-sample loop.
    PrecisionNotPositiveDefinite { component: usize, det: f64 },

    /// A matrix inversion failed (singular matrix) in the named context.
    SingularMatrix { context: &'static str, component: usize },

    // ---- Mixture value types ----
    /// Error propagated from the mixture value-type layer.
    Mixture(MixtureError),
}

impl std::error::Error for VBError {}

impl std::fmt::Display for VBError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Hyperparameter shape validation ----
            VBError::VectorLengthMismatch { name, expected, actual } => {
                write!(f, "len({name})={actual} does not match K={expected}")
            }
            VBError::MatrixShapeMismatch { name, expected, actual } => {
                write!(
                    f,
                    "Shape of {name} {actual:?} matches neither (D,)=({},) nor (K, D)={expected:?}",
                    expected.1
                )
            }
            VBError::CubeShapeMismatch { name, expected, actual } => {
                write!(
                    f,
                    "Shape of {name} {actual:?} matches neither (D, D)=({}, {}) nor (K, D, D)={expected:?}",
                    expected.1, expected.2
                )
            }
            // ---- Hyperparameter domain validation ----
            VBError::DomainViolation { name, min, value } => {
                write!(f, "All elements of {name} must exceed {min}; got {value}")
            }
            // ---- Data validation ----
            VBError::EmptyData => {
                write!(f, "Sample matrix must have at least one row and one column.")
            }
            VBError::WeightLengthMismatch { expected, actual } => {
                write!(
                    f,
                    "The number of samples ({expected}) does not match the number of weights ({actual})"
                )
            }
            VBError::InvalidWeight { index, value } => {
                write!(f, "Sample weight at index {index} must be finite and > 0; got {value}")
            }
            VBError::UnspecifiedComponents => {
                write!(
                    f,
                    "Specify either `components` or `initial_guess` to set the initial values"
                )
            }
            VBError::GuessDimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Initial guess has dimension {actual}; the input mixture has dimension {expected}"
                )
            }
            // ---- Numerical faults ----
            VBError::PrecisionNotPositiveDefinite { component, det } => {
                write!(
                    f,
                    "Precision matrix W[{component}] is not positive definite (det = {det})"
                )
            }
            VBError::SingularMatrix { context, component } => {
                write!(f, "Singular matrix while inverting {context} for component {component}")
            }
            // ---- Mixture value types ----
            VBError::Mixture(err) => {
                write!(f, "{err}")
            }
        }
    }
}

impl From<MixtureError> for VBError {
    fn from(err: MixtureError) -> VBError {
        VBError::Mixture(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - That Display output names the offending array and the expected size,
    //   which downstream code and users rely on for diagnosis.
    // - That mixture-layer errors convert losslessly into `VBError`.
    //
    // They intentionally DO NOT cover:
    // - The conditions under which each error is raised; those are tested in
    //   the modules that produce them (`state`, `statistics`, `engine`).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Verify that a length-mismatch message carries the vector name and the
    // expected length K.
    //
    // Given
    // -----
    // - A `VectorLengthMismatch` for `alpha0` with expected 5, actual 4.
    //
    // Expect
    // ------
    // - The rendered message mentions "alpha0", "4", and "K=5".
    fn vector_length_mismatch_names_array_and_expected_length() {
        // Arrange
        let err = VBError::VectorLengthMismatch { name: "alpha0", expected: 5, actual: 4 };

        // Act
        let msg = err.to_string();

        // Assert
        assert!(msg.contains("alpha0"), "message should name the vector: {msg}");
        assert!(msg.contains("K=5"), "message should state expected length: {msg}");
        assert!(msg.contains('4'), "message should state actual length: {msg}");
    }

    #[test]
    // Purpose
    // -------
    // Verify that a domain violation names the array and the lower bound.
    //
    // Given
    // -----
    // - A `DomainViolation` for `nu0` with min 1.0 and value 0.5.
    //
    // Expect
    // ------
    // - The rendered message mentions "nu0" and both numbers.
    fn domain_violation_names_array_and_bound() {
        // Arrange
        let err = VBError::DomainViolation { name: "nu0", min: 1.0, value: 0.5 };

        // Act + Assert
        let msg = err.to_string();
        assert!(msg.contains("nu0"));
        assert!(msg.contains("1"));
        assert!(msg.contains("0.5"));
    }

    #[test]
    // Purpose
    // -------
    // Verify that `MixtureError` converts into `VBError::Mixture` and keeps
    // its message.
    //
    // Given
    // -----
    // - A `MixtureError::EmptyMixture`.
    //
    // Expect
    // ------
    // - `VBError::from` wraps it and Display forwards the inner message.
    fn mixture_error_converts_and_forwards_message() {
        // Arrange
        let inner = MixtureError::EmptyMixture;
        let inner_msg = inner.to_string();

        // Act
        let err = VBError::from(inner);

        // Assert
        assert_eq!(err.to_string(), inner_msg);
    }
}
