//! Expectation-Maximization driver with random restarts.

use crate::emission::Emission;
use crate::error::{MezclaError, Result};
use crate::numeric::{clip_prob, logsumexp};
use crate::primitives::{Matrix, Vector};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// One fitted restart: the winning models, class weights, final
/// responsibilities, and the log-likelihood trace.
#[derive(Debug)]
pub(crate) struct EmFit {
    pub measurement: Box<dyn Emission>,
    pub structural: Option<Box<dyn Emission>>,
    pub weights: Vector<f64>,
    pub resp: Matrix<f64>,
    pub log_likelihood: f64,
    pub trace: Vec<f64>,
    pub converged: bool,
}

/// EM loop configuration shared by every estimation procedure.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EmOptimizer {
    pub n_components: usize,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub random_state: Option<u64>,
}

impl EmOptimizer {
    /// Runs `n_init` independent restarts and keeps the best one.
    ///
    /// Restarts are data-parallel: the observation matrices are shared
    /// read-only, each restart owns its model copies and random stream, and
    /// selection is by final log-likelihood with ties broken by the lowest
    /// restart index, so scheduling order never changes the result.
    pub fn fit(
        &self,
        x: &Matrix<f64>,
        y: Option<&Matrix<f64>>,
        measurement: &dyn Emission,
        structural: Option<&dyn Emission>,
    ) -> Result<EmFit> {
        let restarts: Vec<Option<EmFit>> = (0..self.n_init)
            .into_par_iter()
            .map(|restart| self.run_restart(x, y, measurement, structural, restart))
            .collect();

        let mut best: Option<EmFit> = None;
        for fit in restarts.into_iter().flatten() {
            let better = match &best {
                Some(current) => fit.log_likelihood > current.log_likelihood,
                None => true,
            };
            if better {
                best = Some(fit);
            }
        }
        best.ok_or(MezclaError::FittingFailure {
            n_init: self.n_init,
        })
    }

    /// One restart of the EM loop, or `None` if its log-likelihood went
    /// non-finite. Failed restarts are abandoned, never retried.
    fn run_restart(
        &self,
        x: &Matrix<f64>,
        y: Option<&Matrix<f64>>,
        measurement: &dyn Emission,
        structural: Option<&dyn Emission>,
        restart: usize,
    ) -> Option<EmFit> {
        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed + restart as u64),
            None => StdRng::from_entropy(),
        };

        let mut mm = measurement.clone_box();
        mm.initialize(x, &mut rng);

        let mut sm = match (structural, y) {
            (Some(proto), Some(y)) => {
                let mut model = proto.clone_box();
                model.initialize(y, &mut rng);
                Some(model)
            }
            _ => None,
        };

        let uniform = 1.0 / self.n_components as f64;
        let mut weights = Vector::from_vec(vec![uniform; self.n_components]);
        let mut prev_ll = f64::NEG_INFINITY;
        let mut trace = Vec::new();
        let mut converged = false;

        for _ in 0..self.max_iter {
            let (resp, ll) = self.e_step(&weights, x, y, mm.as_ref(), sm.as_deref())?;
            trace.push(ll);

            weights = class_weights(&resp);
            mm.m_step(x, &resp);
            if let (Some(model), Some(y)) = (sm.as_mut(), y) {
                model.m_step(y, &resp);
            }

            if (ll - prev_ll).abs() < self.tol {
                converged = true;
                break;
            }
            prev_ll = ll;
        }

        // Refresh the responsibilities so they match the final parameters.
        let (resp, log_likelihood) =
            self.e_step(&weights, x, y, mm.as_ref(), sm.as_deref())?;

        Some(EmFit {
            measurement: mm,
            structural: sm,
            weights,
            resp,
            log_likelihood,
            trace,
            converged,
        })
    }

    /// E-step: softmax-normalized per-class log-joint, in log space.
    ///
    /// Returns `None` as soon as the total log-likelihood goes non-finite.
    fn e_step(
        &self,
        weights: &Vector<f64>,
        x: &Matrix<f64>,
        y: Option<&Matrix<f64>>,
        measurement: &dyn Emission,
        structural: Option<&dyn Emission>,
    ) -> Option<(Matrix<f64>, f64)> {
        let mm_ll = measurement.log_likelihood(x);
        let sm_ll = match (structural, y) {
            (Some(model), Some(y)) => Some(model.log_likelihood(y)),
            _ => None,
        };
        let (resp, ll) = posterior(weights, &mm_ll, sm_ll.as_ref());
        if ll.is_finite() {
            Some((resp, ll))
        } else {
            None
        }
    }
}

/// Class weights as mean responsibility per class.
pub(crate) fn class_weights(resp: &Matrix<f64>) -> Vector<f64> {
    let (n_samples, n_components) = resp.shape();
    let mut weights = vec![0.0; n_components];
    for i in 0..n_samples {
        for (c, w) in weights.iter_mut().enumerate() {
            *w += resp.get(i, c);
        }
    }
    for w in &mut weights {
        *w /= n_samples as f64;
    }
    Vector::from_vec(weights)
}

/// Combines class priors with per-model log-likelihoods into posterior
/// responsibilities and the total log-likelihood.
///
/// Each row of the log-joint is normalized with log-sum-exp; the returned
/// total is the sum of the per-row normalizers.
pub(crate) fn posterior(
    weights: &Vector<f64>,
    measurement_ll: &Matrix<f64>,
    structural_ll: Option<&Matrix<f64>>,
) -> (Matrix<f64>, f64) {
    let (n_samples, n_components) = measurement_ll.shape();
    let log_weights: Vec<f64> = weights.iter().map(|&w| clip_prob(w).ln()).collect();

    let mut resp = Matrix::zeros(n_samples, n_components);
    let mut total_ll = 0.0;
    let mut row = vec![0.0; n_components];

    for i in 0..n_samples {
        for (c, value) in row.iter_mut().enumerate() {
            *value = log_weights[c] + measurement_ll.get(i, c);
            if let Some(sm_ll) = structural_ll {
                *value += sm_ll.get(i, c);
            }
        }
        let norm = logsumexp(&row);
        total_ll += norm;
        for c in 0..n_components {
            resp.set(i, c, (row[c] - norm).exp());
        }
    }

    (resp, total_ll)
}
