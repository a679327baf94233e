//! Assignment and bias-correction strategies for 3-step estimation.
//!
//! Using estimated rather than true class memberships as regression
//! targets biases structural coefficients toward zero. The correction step
//! compensates by reweighting the assignments with the inverse of the
//! estimated classification-error matrix.

use crate::error::{MezclaError, Result};
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};

/// How soft responsibilities become structural-model targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Assignment {
    /// Harden to a one-hot modal assignment (argmax per row).
    #[default]
    Modal,
    /// Keep the soft posterior probabilities.
    Soft,
}

/// Bias-correction method applied between the measurement and structural
/// stages of 3-step estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Correction {
    /// No correction: assignments pass through unchanged.
    #[default]
    None,
    /// Bolck-Croon-Hagenaars correction: multiply the assignments by the
    /// inverse of the classification-error matrix estimated from the
    /// posterior.
    Bch,
}

impl Correction {
    /// Turns raw assignments into corrected structural-model targets.
    ///
    /// `resp` is the soft posterior from the measurement stage and
    /// `assignments` the (modal or soft) matrix derived from it.
    ///
    /// # Errors
    ///
    /// Returns an error if the classification-error matrix is singular,
    /// which happens when two classes are statistically indistinguishable.
    pub fn correct(self, resp: &Matrix<f64>, assignments: &Matrix<f64>) -> Result<Matrix<f64>> {
        match self {
            Correction::None => Ok(assignments.clone()),
            Correction::Bch => {
                let error_matrix = classification_error(resp, assignments);
                let inverse = error_matrix
                    .inverse()
                    .map_err(|_| MezclaError::SingularMatrix { det: 0.0 })?;
                assignments
                    .matmul(&inverse)
                    .map_err(MezclaError::from)
            }
        }
    }
}

/// Classification-error matrix `D[c][s]`: probability that an individual
/// whose true class is `c` (under the posterior) receives assignment `s`.
fn classification_error(resp: &Matrix<f64>, assignments: &Matrix<f64>) -> Matrix<f64> {
    let (n_samples, n_components) = resp.shape();
    let mut error = resp
        .transpose()
        .matmul(assignments)
        .expect("posterior and assignments share their sample count");

    for c in 0..n_components {
        let mass: f64 = (0..n_samples).map(|i| resp.get(i, c)).sum::<f64>().max(1e-12);
        for s in 0..n_components {
            error.set(c, s, error.get(c, s) / mass);
        }
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::modal;

    fn noisy_posterior() -> Matrix<f64> {
        Matrix::from_vec(
            6,
            2,
            vec![
                0.9, 0.1, //
                0.8, 0.2, //
                0.7, 0.3, //
                0.2, 0.8, //
                0.1, 0.9, //
                0.3, 0.7,
            ],
        )
        .expect("valid matrix")
    }

    #[test]
    fn test_none_passes_assignments_through() {
        let resp = noisy_posterior();
        let hard = modal(&resp);
        let targets = Correction::None.correct(&resp, &hard).expect("no correction");
        assert_eq!(targets, hard);
    }

    #[test]
    fn test_classification_error_rows_sum_to_one() {
        let resp = noisy_posterior();
        let hard = modal(&resp);
        let error = classification_error(&resp, &hard);
        for c in 0..2 {
            let sum: f64 = (0..2).map(|s| error.get(c, s)).sum();
            assert!((sum - 1.0).abs() < 1e-9, "row {c} sums to {sum}");
        }
        // The diagonal dominates when classes are mostly well separated.
        assert!(error.get(0, 0) > error.get(0, 1));
        assert!(error.get(1, 1) > error.get(1, 0));
    }

    #[test]
    fn test_bch_rows_still_sum_to_one() {
        let resp = noisy_posterior();
        let hard = modal(&resp);
        let targets = Correction::Bch.correct(&resp, &hard).expect("invertible");
        for i in 0..6 {
            let sum: f64 = (0..2).map(|c| targets.get(i, c)).sum();
            assert!((sum - 1.0).abs() < 1e-9, "row {i} sums to {sum}");
        }
    }

    #[test]
    fn test_bch_sharpens_toward_true_memberships() {
        // With perfect separation the error matrix is the identity and the
        // correction is a no-op.
        let resp = modal(&noisy_posterior());
        let targets = Correction::Bch.correct(&resp, &resp).expect("invertible");
        for i in 0..6 {
            for c in 0..2 {
                assert!((targets.get(i, c) - resp.get(i, c)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_bch_singular_error_matrix() {
        // Identical posterior columns make assignment uninformative and the
        // error matrix singular.
        let resp = Matrix::from_vec(4, 2, vec![0.5; 8]).expect("valid matrix");
        let hard = modal(&resp);
        let result = Correction::Bch.correct(&resp, &hard);
        assert!(result.is_err());
    }
}
