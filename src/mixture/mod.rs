//! Latent class mixture estimation with multi-step procedures.
//!
//! [`LatentMixture`] is the user-facing estimator: it combines a
//! measurement emission model over the indicator columns with an optional
//! structural emission model over external covariates or outcomes, fit
//! jointly (1-step) or sequentially with optional bias correction
//! (2-step / 3-step).

mod correction;
mod em;

pub use correction::{Assignment, Correction};

use crate::emission::{build_emission, Emission, EmissionDescriptor, EmissionParameters, StructuralParams};
use crate::error::{MezclaError, Result};
use crate::numeric::modal;
use crate::primitives::{Matrix, Vector};
use em::{posterior, EmOptimizer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Full parameter bundle of a fitted model, layout-preserving for
/// caller-side serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Class weights (length `n_components`, sums to 1).
    pub weights: Vector<f64>,
    /// Measurement model parameters.
    pub measurement: EmissionParameters,
    /// Structural model parameters, when a structural model was fit.
    pub structural: Option<EmissionParameters>,
}

/// Latent class mixture model with 1-step, 2-step, or 3-step estimation.
///
/// # Examples
///
/// ```
/// use mezcla::prelude::*;
///
/// // Two latent classes over four binary indicators.
/// let mut data = Vec::new();
/// for _ in 0..10 {
///     data.extend_from_slice(&[1.0, 1.0, 0.0, 0.0]);
/// }
/// for _ in 0..10 {
///     data.extend_from_slice(&[0.0, 0.0, 1.0, 1.0]);
/// }
/// let x = Matrix::from_vec(20, 4, data).expect("valid matrix");
///
/// let mut model = LatentMixture::new(2, "bernoulli")
///     .with_n_init(4)
///     .with_random_state(42);
/// model.fit(&x, None).expect("fit succeeds");
///
/// let labels = model.predict(&x, None);
/// assert_eq!(labels.len(), 20);
/// assert_ne!(labels[0], labels[19]);
/// ```
#[derive(Debug, Clone)]
pub struct LatentMixture {
    /// Number of latent classes.
    n_components: usize,
    /// Estimation procedure: 1 (joint), 2 (sequential), or 3 (corrected).
    n_steps: usize,
    /// Measurement model descriptor.
    measurement: EmissionDescriptor,
    /// Structural model descriptor, if any.
    structural: Option<EmissionDescriptor>,
    /// Number of EM restarts.
    n_init: usize,
    /// Maximum EM iterations per restart.
    max_iter: usize,
    /// Convergence tolerance on the log-likelihood increase.
    tol: f64,
    /// Base random seed; restarts derive their own streams from it.
    random_state: Option<u64>,
    /// Assignment mode for the 3-step structural stage.
    assignment: Assignment,
    /// Bias-correction method for the 3-step structural stage.
    correction: Correction,
    /// Inner solver settings for the covariate model.
    structural_params: StructuralParams,

    /// Fitted measurement model.
    measurement_model: Option<Box<dyn Emission>>,
    /// Fitted structural model.
    structural_model: Option<Box<dyn Emission>>,
    /// Fitted class weights.
    weights: Option<Vector<f64>>,
    /// Final training log-likelihood of the winning restart.
    log_likelihood: Option<f64>,
    /// Log-likelihood trace of the winning restart.
    trace: Option<Vec<f64>>,
    /// Whether the winning restart converged before `max_iter`.
    converged: bool,
    /// Random stream for post-fit sampling.
    sample_rng: Option<StdRng>,
}

impl LatentMixture {
    /// Creates a new estimator with the given number of latent classes and
    /// measurement descriptor.
    #[must_use]
    pub fn new(n_components: usize, measurement: impl Into<EmissionDescriptor>) -> Self {
        Self {
            n_components,
            n_steps: 1,
            measurement: measurement.into(),
            structural: None,
            n_init: 1,
            max_iter: 100,
            tol: 1e-3,
            random_state: None,
            assignment: Assignment::default(),
            correction: Correction::default(),
            structural_params: StructuralParams::default(),
            measurement_model: None,
            structural_model: None,
            weights: None,
            log_likelihood: None,
            trace: None,
            converged: false,
            sample_rng: None,
        }
    }

    /// Sets the estimation procedure (1, 2, or 3 steps).
    #[must_use]
    pub fn with_n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps;
        self
    }

    /// Sets the structural model descriptor.
    #[must_use]
    pub fn with_structural(mut self, structural: impl Into<EmissionDescriptor>) -> Self {
        self.structural = Some(structural.into());
        self
    }

    /// Sets the number of independent EM restarts.
    #[must_use]
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Sets the maximum number of EM iterations per restart.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the convergence tolerance.
    #[must_use]
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Sets the base random seed for reproducibility.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Sets the 3-step assignment mode (modal or soft).
    #[must_use]
    pub fn with_assignment(mut self, assignment: Assignment) -> Self {
        self.assignment = assignment;
        self
    }

    /// Sets the 3-step bias-correction method.
    #[must_use]
    pub fn with_correction(mut self, correction: Correction) -> Self {
        self.correction = correction;
        self
    }

    /// Sets the covariate model's inner solver hyperparameters.
    #[must_use]
    pub fn with_structural_params(mut self, params: StructuralParams) -> Self {
        self.structural_params = params;
        self
    }

    /// Number of latent classes.
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Whether a successful fit has completed.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.measurement_model.is_some()
    }

    /// Whether the winning restart converged before `max_iter`.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Fitted class weights.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn weights(&self) -> &Vector<f64> {
        self.weights
            .as_ref()
            .expect("Model not fitted. Call fit() first.")
    }

    /// Final training log-likelihood of the winning restart.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
            .expect("Model not fitted. Call fit() first.")
    }

    /// Log-likelihood trace of the winning restart, one entry per EM
    /// iteration.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn log_likelihood_trace(&self) -> &[f64] {
        self.trace
            .as_deref()
            .expect("Model not fitted. Call fit() first.")
    }

    /// Fits the model.
    ///
    /// `x` holds the measurement indicators; `y` the structural covariates
    /// or outcomes, required exactly when a structural descriptor is
    /// configured.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid hyperparameters or
    /// descriptors, a dimension error for incompatible matrices, and a
    /// fitting failure when every restart diverges.
    pub fn fit(&mut self, x: &Matrix<f64>, y: Option<&Matrix<f64>>) -> Result<()> {
        self.validate_config()?;

        let mm_proto = build_emission(
            &self.measurement,
            self.n_components,
            &self.structural_params,
        )?;
        let sm_proto = match &self.structural {
            Some(descriptor) => Some(build_emission(
                descriptor,
                self.n_components,
                &self.structural_params,
            )?),
            None => None,
        };

        self.validate_data(x, y, mm_proto.as_ref(), sm_proto.as_deref())?;

        let optimizer = EmOptimizer {
            n_components: self.n_components,
            n_init: self.n_init,
            max_iter: self.max_iter,
            tol: self.tol,
            random_state: self.random_state,
        };

        let (fit, structural_model) = match self.n_steps {
            1 => {
                let mut fit = optimizer.fit(x, y, mm_proto.as_ref(), sm_proto.as_deref())?;
                let sm = fit.structural.take();
                (fit, sm)
            }
            2 => {
                // Measurement model alone, then a one-shot regression
                // against its frozen soft responsibilities.
                let fit = optimizer.fit(x, None, mm_proto.as_ref(), None)?;
                let sm = match (&sm_proto, y) {
                    (Some(proto), Some(y)) => {
                        Some(self.fit_structural_stage(y, &fit.resp, proto.as_ref()))
                    }
                    _ => None,
                };
                (fit, sm)
            }
            _ => {
                // 3-step: measurement alone, assignment, correction,
                // structural regression on the corrected targets.
                let fit = optimizer.fit(x, None, mm_proto.as_ref(), None)?;
                let sm = match (&sm_proto, y) {
                    (Some(proto), Some(y)) => {
                        let assignments = match self.assignment {
                            Assignment::Modal => modal(&fit.resp),
                            Assignment::Soft => fit.resp.clone(),
                        };
                        let targets = self.correction.correct(&fit.resp, &assignments)?;
                        Some(self.fit_structural_stage(y, &targets, proto.as_ref()))
                    }
                    _ => None,
                };
                (fit, sm)
            }
        };

        self.measurement_model = Some(fit.measurement);
        self.structural_model = structural_model;
        self.weights = Some(fit.weights);
        self.log_likelihood = Some(fit.log_likelihood);
        self.trace = Some(fit.trace);
        self.converged = fit.converged;
        self.sample_rng = Some(match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed + self.n_init as u64 + 1),
            None => StdRng::from_entropy(),
        });
        Ok(())
    }

    /// Posterior class probabilities for each sample.
    ///
    /// The structural model contributes to the posterior only when `y` is
    /// provided.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn predict_proba(&self, x: &Matrix<f64>, y: Option<&Matrix<f64>>) -> Matrix<f64> {
        self.joint_posterior(x, y).0
    }

    /// Most probable class index for each sample (ties to the lowest
    /// index).
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn predict(&self, x: &Matrix<f64>, y: Option<&Matrix<f64>>) -> Vec<usize> {
        let resp = self.predict_proba(x, y);
        (0..resp.n_rows())
            .map(|i| crate::numeric::argmax_row(&resp, i))
            .collect()
    }

    /// Mean per-sample total log-likelihood.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn score(&self, x: &Matrix<f64>, y: Option<&Matrix<f64>>) -> f64 {
        self.joint_posterior(x, y).1 / x.n_rows() as f64
    }

    /// Akaike information criterion on the given data.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn aic(&self, x: &Matrix<f64>, y: Option<&Matrix<f64>>) -> f64 {
        let total_ll = self.joint_posterior(x, y).1;
        -2.0 * total_ll + 2.0 * self.n_parameters() as f64
    }

    /// Bayesian information criterion on the given data.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn bic(&self, x: &Matrix<f64>, y: Option<&Matrix<f64>>) -> f64 {
        let total_ll = self.joint_posterior(x, y).1;
        -2.0 * total_ll + self.n_parameters() as f64 * (x.n_rows() as f64).ln()
    }

    /// Total free parameters: every fitted emission model plus the
    /// `n_components - 1` class-weight degrees of freedom.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn n_parameters(&self) -> usize {
        let mm = self
            .measurement_model
            .as_ref()
            .expect("Model not fitted. Call fit() first.");
        let structural: usize = self
            .structural_model
            .as_ref()
            .map_or(0, |sm| sm.n_parameters());
        mm.n_parameters() + structural + (self.n_components - 1)
    }

    /// Extracts the fitted parameter bundle.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn get_parameters(&self) -> ModelParameters {
        let mm = self
            .measurement_model
            .as_ref()
            .expect("Model not fitted. Call fit() first.");
        ModelParameters {
            weights: self.weights().clone(),
            measurement: mm.parameters(),
            structural: self.structural_model.as_ref().map(|sm| sm.parameters()),
        }
    }

    /// Reconstructs the fitted state from a parameter bundle previously
    /// produced by [`LatentMixture::get_parameters`].
    ///
    /// The estimator's descriptors must match the bundle's families.
    ///
    /// # Errors
    ///
    /// Returns an error for mismatched families, shapes, or weight length.
    pub fn set_parameters(&mut self, params: ModelParameters) -> Result<()> {
        self.validate_config()?;
        if params.weights.len() != self.n_components {
            return Err(MezclaError::DimensionMismatch {
                expected: format!("{} class weights", self.n_components),
                actual: format!("{} class weights", params.weights.len()),
            });
        }

        let mut mm = build_emission(
            &self.measurement,
            self.n_components,
            &self.structural_params,
        )?;
        mm.set_parameters(params.measurement)?;

        let sm = match (&self.structural, params.structural) {
            (Some(descriptor), Some(bundle)) => {
                let mut model =
                    build_emission(descriptor, self.n_components, &self.structural_params)?;
                model.set_parameters(bundle)?;
                Some(model)
            }
            (None, None) => None,
            (Some(_), None) => {
                return Err(MezclaError::Other(
                    "parameter bundle is missing the structural model".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(MezclaError::Other(
                    "parameter bundle carries a structural model but none is configured"
                        .to_string(),
                ))
            }
        };

        self.measurement_model = Some(mm);
        self.structural_model = sm;
        self.weights = Some(params.weights);
        self.log_likelihood = None;
        self.trace = None;
        self.converged = false;
        self.sample_rng = Some(match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed + self.n_init as u64 + 1),
            None => StdRng::from_entropy(),
        });
        Ok(())
    }

    /// Draws synthetic observations from one class's fitted distributions:
    /// measurement samples, plus structural samples when that sub-model
    /// supports sampling.
    ///
    /// # Errors
    ///
    /// Returns an error for an out-of-range class or a structural family
    /// without a sampling distribution (covariate).
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    pub fn sample(
        &mut self,
        class_no: usize,
        n_samples: usize,
    ) -> Result<(Matrix<f64>, Option<Matrix<f64>>)> {
        if class_no >= self.n_components {
            return Err(MezclaError::InvalidHyperparameter {
                param: "class_no".to_string(),
                value: class_no.to_string(),
                constraint: format!("< n_components = {}", self.n_components),
            });
        }
        let mm = self
            .measurement_model
            .as_ref()
            .expect("Model not fitted. Call fit() first.");
        let rng = self
            .sample_rng
            .as_mut()
            .expect("Model not fitted. Call fit() first.");

        let x = mm.sample(class_no, n_samples, rng)?;
        let y = match self.structural_model.as_ref() {
            Some(sm) => Some(sm.sample(class_no, n_samples, rng)?),
            None => None,
        };
        Ok((x, y))
    }

    /// Human-readable fit report.
    ///
    /// # Panics
    ///
    /// Panics if the model is not fitted.
    #[must_use]
    pub fn summary(&self, x: &Matrix<f64>, y: Option<&Matrix<f64>>) -> String {
        let n_samples = x.n_rows();
        let mut out = String::new();
        let _ = writeln!(out, "Latent class mixture fit");
        let _ = writeln!(out, "------------------------");
        let _ = writeln!(out, "Estimation method             : {}-step", self.n_steps);
        if self.n_steps == 3 {
            let _ = writeln!(out, "Correction method             : {:?}", self.correction);
            let _ = writeln!(out, "Assignment method             : {:?}", self.assignment);
        }
        let _ = writeln!(out, "Number of observations        : {n_samples}");
        let _ = writeln!(out, "Number of latent classes      : {}", self.n_components);
        let _ = writeln!(
            out,
            "Number of estimated parameters: {}",
            self.n_parameters()
        );
        let _ = writeln!(out, "Average log-likelihood        : {:.4}", self.score(x, y));
        let _ = writeln!(out, "AIC                           : {:.2}", self.aic(x, y));
        let _ = writeln!(out, "BIC                           : {:.2}", self.bic(x, y));
        let _ = writeln!(out, "Class weights");
        for (i, w) in self.weights().iter().enumerate() {
            let _ = writeln!(out, "    Class {} : {:.2}", i + 1, w);
        }
        out
    }

    fn joint_posterior(&self, x: &Matrix<f64>, y: Option<&Matrix<f64>>) -> (Matrix<f64>, f64) {
        let mm = self
            .measurement_model
            .as_ref()
            .expect("Model not fitted. Call fit() first.");
        let mm_ll = mm.log_likelihood(x);
        let sm_ll = match (self.structural_model.as_ref(), y) {
            (Some(sm), Some(y)) => Some(sm.log_likelihood(y)),
            _ => None,
        };
        posterior(self.weights(), &mm_ll, sm_ll.as_ref())
    }

    /// One-shot structural stage used by the 2-step and 3-step procedures.
    fn fit_structural_stage(
        &self,
        y: &Matrix<f64>,
        targets: &Matrix<f64>,
        proto: &dyn Emission,
    ) -> Box<dyn Emission> {
        let mut sm = proto.clone_box();
        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed + self.n_init as u64),
            None => StdRng::from_entropy(),
        };
        sm.initialize(y, &mut rng);
        sm.m_step(y, targets);
        sm
    }

    fn validate_config(&self) -> Result<()> {
        if self.n_components == 0 {
            return Err(MezclaError::InvalidHyperparameter {
                param: "n_components".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        if !(1..=3).contains(&self.n_steps) {
            return Err(MezclaError::InvalidHyperparameter {
                param: "n_steps".to_string(),
                value: self.n_steps.to_string(),
                constraint: "1, 2, or 3".to_string(),
            });
        }
        if self.n_init == 0 {
            return Err(MezclaError::InvalidHyperparameter {
                param: "n_init".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        if self.max_iter == 0 {
            return Err(MezclaError::InvalidHyperparameter {
                param: "max_iter".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        if !self.tol.is_finite() || self.tol < 0.0 {
            return Err(MezclaError::InvalidHyperparameter {
                param: "tol".to_string(),
                value: self.tol.to_string(),
                constraint: "finite and >= 0".to_string(),
            });
        }
        if !self.structural_params.lr.is_finite() || self.structural_params.lr <= 0.0 {
            return Err(MezclaError::InvalidHyperparameter {
                param: "structural_params.lr".to_string(),
                value: self.structural_params.lr.to_string(),
                constraint: "> 0".to_string(),
            });
        }
        if self.structural_params.max_iter == 0 {
            return Err(MezclaError::InvalidHyperparameter {
                param: "structural_params.max_iter".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        if !self.structural_params.tol.is_finite() || self.structural_params.tol < 0.0 {
            return Err(MezclaError::InvalidHyperparameter {
                param: "structural_params.tol".to_string(),
                value: self.structural_params.tol.to_string(),
                constraint: "finite and >= 0".to_string(),
            });
        }
        Ok(())
    }

    fn validate_data(
        &self,
        x: &Matrix<f64>,
        y: Option<&Matrix<f64>>,
        mm: &dyn Emission,
        sm: Option<&dyn Emission>,
    ) -> Result<()> {
        if x.n_rows() == 0 || x.n_cols() == 0 {
            return Err(MezclaError::DimensionMismatch {
                expected: "a non-empty observation matrix".to_string(),
                actual: format!("{}x{}", x.n_rows(), x.n_cols()),
            });
        }
        mm.validate(x)?;

        match (sm, y) {
            (Some(sm), Some(y)) => {
                if y.n_rows() != x.n_rows() {
                    return Err(MezclaError::DimensionMismatch {
                        expected: format!("structural matrix with {} rows", x.n_rows()),
                        actual: format!("{} rows", y.n_rows()),
                    });
                }
                sm.validate(y)?;
            }
            (Some(_), None) => {
                return Err(MezclaError::DimensionMismatch {
                    expected: "a structural matrix (a structural model is configured)"
                        .to_string(),
                    actual: "no structural matrix".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(MezclaError::InvalidHyperparameter {
                    param: "structural".to_string(),
                    value: "None".to_string(),
                    constraint: "an emission descriptor when Y is provided".to_string(),
                });
            }
            (None, None) => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bernoulli_blocks(n_per_class: usize) -> Matrix<f64> {
        let mut data = Vec::new();
        for _ in 0..n_per_class {
            data.extend_from_slice(&[1.0, 1.0, 0.0, 0.0]);
        }
        for _ in 0..n_per_class {
            data.extend_from_slice(&[0.0, 0.0, 1.0, 1.0]);
        }
        Matrix::from_vec(2 * n_per_class, 4, data).expect("valid matrix")
    }

    fn fitted_measurement_model() -> (LatentMixture, Matrix<f64>) {
        let x = bernoulli_blocks(20);
        let mut model = LatentMixture::new(2, "bernoulli")
            .with_n_init(4)
            .with_max_iter(200)
            .with_tol(1e-8)
            .with_random_state(42);
        model.fit(&x, None).expect("fit succeeds");
        (model, x)
    }

    #[test]
    fn test_fit_separates_classes() {
        let (model, x) = fitted_measurement_model();
        let labels = model.predict(&x, None);
        assert_eq!(labels.len(), 40);
        assert_ne!(labels[0], labels[39]);
        // All members of one block share a label.
        assert!(labels[..20].iter().all(|&l| l == labels[0]));
        assert!(labels[20..].iter().all(|&l| l == labels[39]));
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (model, x) = fitted_measurement_model();
        let proba = model.predict_proba(&x, None);
        for i in 0..40 {
            let sum: f64 = (0..2).map(|c| proba.get(i, c)).sum();
            assert!((sum - 1.0).abs() < 1e-8);
        }
    }

    #[test]
    fn test_score_and_criteria_are_finite() {
        let (model, x) = fitted_measurement_model();
        assert!(model.score(&x, None).is_finite());
        assert!(model.aic(&x, None).is_finite());
        assert!(model.bic(&x, None) >= model.aic(&x, None));
    }

    #[test]
    fn test_n_parameters_includes_weights() {
        let (model, _) = fitted_measurement_model();
        // 4 features x 2 classes + 1 weight degree of freedom.
        assert_eq!(model.n_parameters(), 9);
    }

    #[test]
    fn test_single_component_boundary() {
        let x = bernoulli_blocks(10);
        let mut model = LatentMixture::new(1, "bernoulli").with_random_state(0);
        model.fit(&x, None).expect("fit succeeds");
        assert_eq!(model.weights().len(), 1);
        assert!((model.weights()[0] - 1.0).abs() < 1e-12);
        let proba = model.predict_proba(&x, None);
        for i in 0..20 {
            assert!((proba.get(i, 0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_parameter_round_trip_preserves_score() {
        let (model, x) = fitted_measurement_model();
        let params = model.get_parameters();

        let mut rebuilt = LatentMixture::new(2, "bernoulli").with_random_state(42);
        rebuilt.set_parameters(params).expect("bundle matches");
        assert!((model.score(&x, None) - rebuilt.score(&x, None)).abs() < 1e-12);
    }

    #[test]
    fn test_config_validation_errors() {
        let x = bernoulli_blocks(5);

        let mut zero_components = LatentMixture::new(0, "bernoulli");
        assert!(zero_components.fit(&x, None).is_err());

        let mut bad_steps = LatentMixture::new(2, "bernoulli").with_n_steps(4);
        assert!(bad_steps.fit(&x, None).is_err());

        let mut bad_tol = LatentMixture::new(2, "bernoulli").with_tol(-1.0);
        assert!(bad_tol.fit(&x, None).is_err());

        let mut unknown = LatentMixture::new(2, "weibull");
        assert!(unknown.fit(&x, None).is_err());

        let mut bad_lr = LatentMixture::new(2, "bernoulli").with_structural_params(
            StructuralParams {
                lr: 0.0,
                max_iter: 10,
                tol: 1e-4,
            },
        );
        assert!(bad_lr.fit(&x, None).is_err());
    }

    #[test]
    fn test_missing_structural_matrix_is_rejected() {
        let x = bernoulli_blocks(5);
        let mut model = LatentMixture::new(2, "bernoulli").with_structural("covariate");
        assert!(model.fit(&x, None).is_err());

        let mut no_descriptor = LatentMixture::new(2, "bernoulli");
        let y = Matrix::zeros(10, 1);
        assert!(no_descriptor.fit(&x, Some(&y)).is_err());
    }

    #[test]
    fn test_nan_rejected_without_missing_support() {
        let mut x = bernoulli_blocks(5);
        x.set(0, 0, f64::NAN);
        let mut model = LatentMixture::new(2, "bernoulli").with_random_state(1);
        assert!(model.fit(&x, None).is_err());

        let mut nan_model = LatentMixture::new(2, "bernoulli_nan")
            .with_random_state(1)
            .with_n_init(2);
        assert!(nan_model.fit(&x, None).is_ok());
    }

    #[test]
    fn test_sample_round_trip() {
        let (mut model, _) = fitted_measurement_model();
        let (draws, structural) = model.sample(0, 25).expect("bernoulli samples");
        assert_eq!(draws.shape(), (25, 4));
        assert!(structural.is_none());
        assert!(model.sample(5, 1).is_err());
    }

    #[test]
    fn test_summary_mentions_method() {
        let (model, x) = fitted_measurement_model();
        let report = model.summary(&x, None);
        assert!(report.contains("1-step"));
        assert!(report.contains("Class 1"));
    }
}
