//! Covariate (structural regression) emission model.

use super::{Emission, EmissionParameters};
use crate::error::{MezclaError, Result};
use crate::numeric::{clip_prob, softmax_rows, standard_normal};
use crate::primitives::Matrix;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Hyperparameters for the covariate model's inner gradient solver.
///
/// With one inner iteration per M-step (the default) the solver interleaves
/// with the outer EM loop, which is the right setting for 1-step and 2-step
/// estimation. Three-step estimation calls the M-step once, so it needs
/// enough inner iterations to converge on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructuralParams {
    /// Gradient step size.
    pub lr: f64,
    /// Inner solver iteration count per M-step call.
    pub max_iter: usize,
    /// Stopping bound on the gradient sup-norm.
    pub tol: f64,
}

impl Default for StructuralParams {
    fn default() -> Self {
        Self {
            lr: 1e-3,
            max_iter: 1,
            tol: 1e-4,
        }
    }
}

/// Covariate model: multinomial logistic regression of class membership on
/// external covariates, fit against soft responsibility targets.
///
/// This is the one emission family whose M-step is an inner iterative
/// solver rather than a closed form. Targets may be hard one-hot labels or
/// soft responsibilities; both flow through the same cross-entropy
/// gradient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Covariate {
    /// Number of latent classes.
    n_components: usize,
    /// Inner solver settings.
    params: StructuralParams,
    /// Coefficients after initialization (`(D+1) x C`, row 0 intercept).
    beta: Option<Matrix<f64>>,
}

impl Covariate {
    /// Creates an uninitialized covariate model.
    #[must_use]
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            params: StructuralParams::default(),
            beta: None,
        }
    }

    /// Sets the inner solver hyperparameters.
    #[must_use]
    pub fn with_params(mut self, params: &StructuralParams) -> Self {
        self.params = *params;
        self
    }

    /// Fitted coefficient matrix (`(n_covariates + 1) x n_components`,
    /// intercepts in row 0).
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    #[must_use]
    pub fn beta(&self) -> &Matrix<f64> {
        self.beta
            .as_ref()
            .expect("Model not initialized. Call initialize() first.")
    }

    /// Predicts the most probable class per sample from the covariates
    /// alone.
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    #[must_use]
    pub fn predict(&self, x: &Matrix<f64>) -> Vec<usize> {
        let probs = self.forward(&full_matrix(x));
        (0..probs.n_rows())
            .map(|i| crate::numeric::argmax_row(&probs, i))
            .collect()
    }

    fn forward(&self, x_full: &Matrix<f64>) -> Matrix<f64> {
        let logits = x_full
            .matmul(self.beta())
            .expect("covariate counts of X and beta match");
        softmax_rows(&logits)
    }
}

/// Prepends an all-ones intercept column.
fn full_matrix(x: &Matrix<f64>) -> Matrix<f64> {
    Matrix::ones(x.n_rows(), 1)
        .hcat(x)
        .expect("intercept column has the same row count")
}

impl Emission for Covariate {
    fn family(&self) -> &'static str {
        "covariate"
    }

    fn initialize(&mut self, x: &Matrix<f64>, rng: &mut StdRng) {
        // Coefficients start near 0 so the first softmax is well scaled.
        let d = x.n_cols() + 1;
        let mut beta = Matrix::zeros(d, self.n_components);
        for i in 0..d {
            for c in 0..self.n_components {
                beta.set(i, c, 1e-3 * standard_normal(rng));
            }
        }
        self.beta = Some(beta);
    }

    fn m_step(&mut self, x: &Matrix<f64>, resp: &Matrix<f64>) {
        let x_full = full_matrix(x);
        let n = x_full.n_rows() as f64;

        for _ in 0..self.params.max_iter {
            let probs = self.forward(&x_full);

            // Cross-entropy gradient: X_full^T (softmax - targets).
            let residual = probs
                .sub(resp)
                .expect("probabilities and targets share the same shape");
            let grad = x_full
                .transpose()
                .matmul(&residual)
                .expect("sample counts of X and targets match");

            let sup_norm = grad
                .as_slice()
                .iter()
                .fold(0.0_f64, |acc, g| acc.max(g.abs()));
            if sup_norm < self.params.tol {
                break;
            }

            let beta = self.beta().sub(&grad.mul_scalar(self.params.lr / n));
            self.beta = Some(beta.expect("gradient and beta share the same shape"));
        }
    }

    fn log_likelihood(&self, x: &Matrix<f64>) -> Matrix<f64> {
        self.forward(&full_matrix(x))
            .map(|p| clip_prob(p).ln())
    }

    fn sample(&self, _class_no: usize, _n_samples: usize, _rng: &mut StdRng) -> Result<Matrix<f64>> {
        Err(MezclaError::Other(
            "covariate emission does not support sampling".to_string(),
        ))
    }

    fn n_parameters(&self) -> usize {
        let (rows, cols) = self.beta().shape();
        rows * cols
    }

    fn parameters(&self) -> EmissionParameters {
        let beta = self.beta();
        let d = beta.n_rows();
        EmissionParameters::Covariate {
            coef: beta.slice_rows(1, d - 1),
            intercept: beta.slice_rows(0, 1),
        }
    }

    fn set_parameters(&mut self, params: EmissionParameters) -> Result<()> {
        match params {
            EmissionParameters::Covariate { coef, intercept } => {
                if coef.n_cols() != self.n_components
                    || intercept.n_cols() != self.n_components
                    || intercept.n_rows() != 1
                {
                    return Err(MezclaError::DimensionMismatch {
                        expected: format!(
                            "coef and a single intercept row with {} columns",
                            self.n_components
                        ),
                        actual: format!("{:?} and {:?}", coef.shape(), intercept.shape()),
                    });
                }
                let mut beta = Matrix::zeros(coef.n_rows() + 1, self.n_components);
                for c in 0..self.n_components {
                    beta.set(0, c, intercept.get(0, c));
                }
                for r in 0..coef.n_rows() {
                    for c in 0..self.n_components {
                        beta.set(r + 1, c, coef.get(r, c));
                    }
                }
                self.beta = Some(beta);
                Ok(())
            }
            other => Err(MezclaError::Other(format!(
                "Parameter bundle mismatch: expected covariate, got {}",
                other.family()
            ))),
        }
    }

    fn clone_box(&self) -> Box<dyn Emission> {
        Box::new(self.clone())
    }
}
