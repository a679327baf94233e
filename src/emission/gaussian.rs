//! Gaussian emission models for continuous indicators.

use super::{random_resp, Emission, EmissionParameters};
use crate::error::{MezclaError, Result};
use crate::numeric::standard_normal;
use crate::primitives::Matrix;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

const VAR_FLOOR: f64 = 1e-6;

/// Covariance structure for the Gaussian emission family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CovarianceKind {
    /// Fixed unit variance for every feature and class.
    Unit,
    /// One shared variance per class (isotropic).
    Spherical,
    /// One variance per feature and class (feature independence).
    Diag,
}

/// Gaussian emission model with per-class means and a configurable
/// covariance structure.
///
/// Features are conditionally independent given the class; the covariance
/// kind controls how many variance parameters are estimated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gaussian {
    /// Number of latent classes.
    n_components: usize,
    /// Covariance structure.
    kind: CovarianceKind,
    /// Class means after initialization (`C x K`).
    means: Option<Matrix<f64>>,
    /// Class variances after initialization (`C x K`).
    variances: Option<Matrix<f64>>,
}

impl Gaussian {
    /// Creates an uninitialized Gaussian emission model.
    #[must_use]
    pub fn new(n_components: usize, kind: CovarianceKind) -> Self {
        Self {
            n_components,
            kind,
            means: None,
            variances: None,
        }
    }

    /// Covariance structure.
    #[must_use]
    pub fn kind(&self) -> CovarianceKind {
        self.kind
    }

    /// Fitted class means (`n_components x n_features`).
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    #[must_use]
    pub fn means(&self) -> &Matrix<f64> {
        self.means
            .as_ref()
            .expect("Model not initialized. Call initialize() first.")
    }

    /// Fitted class variances (`n_components x n_features`).
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    #[must_use]
    pub fn variances(&self) -> &Matrix<f64> {
        self.variances
            .as_ref()
            .expect("Model not initialized. Call initialize() first.")
    }

    fn weighted_moments(&self, x: &Matrix<f64>, resp: &Matrix<f64>) -> (Matrix<f64>, Matrix<f64>) {
        let (n_samples, n_features) = x.shape();
        let n_components = self.n_components;

        let mut means = Matrix::zeros(n_components, n_features);
        let mut variances = Matrix::ones(n_components, n_features);

        for c in 0..n_components {
            let mass: f64 = (0..n_samples).map(|i| resp.get(i, c)).sum::<f64>().max(1e-10);

            for k in 0..n_features {
                let weighted: f64 = (0..n_samples).map(|i| resp.get(i, c) * x.get(i, k)).sum();
                means.set(c, k, weighted / mass);
            }

            match self.kind {
                CovarianceKind::Unit => {}
                CovarianceKind::Spherical => {
                    let mut pooled = 0.0;
                    for k in 0..n_features {
                        let mean = means.get(c, k);
                        pooled += (0..n_samples)
                            .map(|i| {
                                let diff = x.get(i, k) - mean;
                                resp.get(i, c) * diff * diff
                            })
                            .sum::<f64>()
                            / mass;
                    }
                    let var = (pooled / n_features as f64).max(VAR_FLOOR);
                    for k in 0..n_features {
                        variances.set(c, k, var);
                    }
                }
                CovarianceKind::Diag => {
                    for k in 0..n_features {
                        let mean = means.get(c, k);
                        let var = (0..n_samples)
                            .map(|i| {
                                let diff = x.get(i, k) - mean;
                                resp.get(i, c) * diff * diff
                            })
                            .sum::<f64>()
                            / mass;
                        variances.set(c, k, var.max(VAR_FLOOR));
                    }
                }
            }
        }

        (means, variances)
    }
}

impl Emission for Gaussian {
    fn family(&self) -> &'static str {
        match self.kind {
            CovarianceKind::Unit => "gaussian_unit",
            CovarianceKind::Spherical => "gaussian_spherical",
            CovarianceKind::Diag => "gaussian_diag",
        }
    }

    fn initialize(&mut self, x: &Matrix<f64>, rng: &mut StdRng) {
        let resp = random_resp(x.n_rows(), self.n_components, rng);
        let (means, variances) = self.weighted_moments(x, &resp);
        self.means = Some(means);
        self.variances = Some(variances);
    }

    fn m_step(&mut self, x: &Matrix<f64>, resp: &Matrix<f64>) {
        let (means, variances) = self.weighted_moments(x, resp);
        self.means = Some(means);
        self.variances = Some(variances);
    }

    fn log_likelihood(&self, x: &Matrix<f64>) -> Matrix<f64> {
        let means = self.means();
        let variances = self.variances();
        let (n_samples, n_features) = x.shape();
        let ln_2pi = (2.0 * std::f64::consts::PI).ln();

        let mut ll = Matrix::zeros(n_samples, self.n_components);
        for i in 0..n_samples {
            for c in 0..self.n_components {
                let mut total = 0.0;
                for k in 0..n_features {
                    let var = variances.get(c, k);
                    let diff = x.get(i, k) - means.get(c, k);
                    total += -0.5 * (ln_2pi + var.ln() + diff * diff / var);
                }
                ll.set(i, c, total);
            }
        }
        ll
    }

    fn sample(&self, class_no: usize, n_samples: usize, rng: &mut StdRng) -> Result<Matrix<f64>> {
        let means = self.means();
        let variances = self.variances();
        let n_features = means.n_cols();

        let mut out = Matrix::zeros(n_samples, n_features);
        for i in 0..n_samples {
            for k in 0..n_features {
                let std = variances.get(class_no, k).sqrt();
                out.set(
                    i,
                    k,
                    means.get(class_no, k) + std * standard_normal(rng),
                );
            }
        }
        Ok(out)
    }

    fn n_parameters(&self) -> usize {
        let (n_components, n_features) = self.means().shape();
        let mean_params = n_components * n_features;
        let var_params = match self.kind {
            CovarianceKind::Unit => 0,
            CovarianceKind::Spherical => n_components,
            CovarianceKind::Diag => n_components * n_features,
        };
        mean_params + var_params
    }

    fn parameters(&self) -> EmissionParameters {
        EmissionParameters::Gaussian {
            means: self.means().clone(),
            variances: self.variances().clone(),
        }
    }

    fn set_parameters(&mut self, params: EmissionParameters) -> Result<()> {
        match params {
            EmissionParameters::Gaussian { means, variances } => {
                if means.n_rows() != self.n_components || means.shape() != variances.shape() {
                    return Err(MezclaError::DimensionMismatch {
                        expected: format!(
                            "means and variances with {} rows and matching shapes",
                            self.n_components
                        ),
                        actual: format!("{:?} and {:?}", means.shape(), variances.shape()),
                    });
                }
                self.means = Some(means);
                self.variances = Some(variances);
                Ok(())
            }
            other => Err(MezclaError::Other(format!(
                "Parameter bundle mismatch: expected gaussian, got {}",
                other.family()
            ))),
        }
    }

    fn clone_box(&self) -> Box<dyn Emission> {
        Box::new(self.clone())
    }
}
