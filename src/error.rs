//! Error types for Mezcla operations.
//!
//! Provides rich error context for library consumers.

use std::fmt;

/// Main error type for Mezcla operations.
///
/// Covers configuration faults (bad hyperparameters, unknown emission
/// families, malformed nested descriptors), data shape mismatches, and
/// estimation failures where every random restart diverged.
///
/// # Examples
///
/// ```
/// use mezcla::error::MezclaError;
///
/// let err = MezclaError::DimensionMismatch {
///     expected: "1000x4".to_string(),
///     actual: "1000x3".to_string(),
/// };
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Debug)]
pub enum MezclaError {
    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// Matrix is singular (non-invertible).
    SingularMatrix {
        /// Determinant value (close to zero)
        det: f64,
    },

    /// Every random restart produced a non-finite log-likelihood.
    FittingFailure {
        /// Number of restarts attempted
        n_init: usize,
    },

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for MezclaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MezclaError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Matrix dimension mismatch: expected {expected}, got {actual}"
                )
            }
            MezclaError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            MezclaError::SingularMatrix { det } => {
                write!(
                    f,
                    "Singular matrix detected: determinant = {det}, cannot invert"
                )
            }
            MezclaError::FittingFailure { n_init } => {
                write!(
                    f,
                    "Fitting failure: all {n_init} restarts produced a non-finite log-likelihood"
                )
            }
            MezclaError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for MezclaError {}

impl From<&str> for MezclaError {
    fn from(msg: &str) -> Self {
        MezclaError::Other(msg.to_string())
    }
}

impl From<String> for MezclaError {
    fn from(msg: String) -> Self {
        MezclaError::Other(msg)
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, MezclaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = MezclaError::DimensionMismatch {
            expected: "100x10".to_string(),
            actual: "100x5".to_string(),
        };
        assert!(err.to_string().contains("dimension mismatch"));
        assert!(err.to_string().contains("100x10"));
        assert!(err.to_string().contains("100x5"));
    }

    #[test]
    fn test_invalid_hyperparameter_display() {
        let err = MezclaError::InvalidHyperparameter {
            param: "lr".to_string(),
            value: "-0.1".to_string(),
            constraint: "> 0".to_string(),
        };
        assert!(err.to_string().contains("Invalid hyperparameter"));
        assert!(err.to_string().contains("lr"));
        assert!(err.to_string().contains("-0.1"));
    }

    #[test]
    fn test_singular_matrix_display() {
        let err = MezclaError::SingularMatrix { det: 0.0 };
        assert!(err.to_string().contains("Singular matrix"));
    }

    #[test]
    fn test_fitting_failure_display() {
        let err = MezclaError::FittingFailure { n_init: 10 };
        let msg = err.to_string();
        assert!(msg.contains("Fitting failure"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn test_from_str() {
        let err: MezclaError = "test error".into();
        assert!(matches!(err, MezclaError::Other(_)));
        assert_eq!(err.to_string(), "test error");
    }

    #[test]
    fn test_from_string() {
        let err: MezclaError = "test error".to_string().into();
        assert!(matches!(err, MezclaError::Other(_)));
    }
}
