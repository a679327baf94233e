//! Bernoulli (binary) emission models.

use super::{random_resp, Emission, EmissionParameters};
use crate::error::{MezclaError, Result};
use crate::numeric::clip_prob;
use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bernoulli (binary) emission model.
///
/// Each of the K binary features is an independent coin per class; the
/// parameter table `pis` holds the `n_features x n_components` success
/// probabilities, clipped away from exact 0/1.
///
/// # Examples
///
/// ```
/// use mezcla::emission::{Bernoulli, Emission};
/// use mezcla::primitives::Matrix;
/// use rand::rngs::StdRng;
/// use rand::SeedableRng;
///
/// let x = Matrix::from_vec(4, 2, vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0])
///     .expect("valid matrix");
/// let mut rng = StdRng::seed_from_u64(42);
/// let mut model = Bernoulli::new(2);
/// model.initialize(&x, &mut rng);
/// assert_eq!(model.log_likelihood(&x).shape(), (4, 2));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bernoulli {
    /// Number of latent classes.
    n_components: usize,
    /// Success probability table after initialization (`K x C`).
    pis: Option<Matrix<f64>>,
}

impl Bernoulli {
    /// Creates an uninitialized Bernoulli emission model.
    #[must_use]
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            pis: None,
        }
    }

    /// Fitted success probability table (`n_features x n_components`).
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    #[must_use]
    pub fn pis(&self) -> &Matrix<f64> {
        self.pis
            .as_ref()
            .expect("Model not initialized. Call initialize() first.")
    }

    fn ratio_m_step(x: &Matrix<f64>, resp: &Matrix<f64>) -> Matrix<f64> {
        // pis = (X^T R) ./ colsum(R), clipped away from 0/1.
        let mut pis = x
            .transpose()
            .matmul(resp)
            .expect("sample counts of X and responsibilities match");
        let (n_features, n_components) = pis.shape();
        for c in 0..n_components {
            let mass: f64 = (0..resp.n_rows()).map(|i| resp.get(i, c)).sum();
            for k in 0..n_features {
                pis.set(k, c, clip_prob(pis.get(k, c) / mass));
            }
        }
        pis
    }
}

impl Emission for Bernoulli {
    fn family(&self) -> &'static str {
        "bernoulli"
    }

    fn initialize(&mut self, x: &Matrix<f64>, rng: &mut StdRng) {
        let resp = random_resp(x.n_rows(), self.n_components, rng);
        self.pis = Some(Self::ratio_m_step(x, &resp));
    }

    fn m_step(&mut self, x: &Matrix<f64>, resp: &Matrix<f64>) {
        self.pis = Some(Self::ratio_m_step(x, resp));
    }

    fn log_likelihood(&self, x: &Matrix<f64>) -> Matrix<f64> {
        let pis = self.pis();
        let log_pis = pis.map(|p| clip_prob(p).ln());
        let log_one_minus = pis.map(|p| (1.0 - clip_prob(p)).ln());
        let complement = x.map(|v| 1.0 - v);

        // X log(pis) + (1 - X) log(1 - pis), as matrix products.
        let on = x
            .matmul(&log_pis)
            .expect("feature counts of X and pis match");
        let off = complement
            .matmul(&log_one_minus)
            .expect("feature counts of X and pis match");
        on.add(&off).expect("both terms share the same shape")
    }

    fn sample(&self, class_no: usize, n_samples: usize, rng: &mut StdRng) -> Result<Matrix<f64>> {
        let pis = self.pis();
        let n_features = pis.n_rows();
        let mut out = Matrix::zeros(n_samples, n_features);
        for i in 0..n_samples {
            for k in 0..n_features {
                let u: f64 = rng.gen_range(0.0..1.0);
                out.set(i, k, if u < pis.get(k, class_no) { 1.0 } else { 0.0 });
            }
        }
        Ok(out)
    }

    fn n_parameters(&self) -> usize {
        let (rows, cols) = self.pis().shape();
        rows * cols
    }

    fn parameters(&self) -> EmissionParameters {
        EmissionParameters::Bernoulli {
            pis: self.pis().clone(),
        }
    }

    fn set_parameters(&mut self, params: EmissionParameters) -> Result<()> {
        match params {
            EmissionParameters::Bernoulli { pis } => {
                if pis.n_cols() != self.n_components {
                    return Err(MezclaError::DimensionMismatch {
                        expected: format!("pis with {} columns", self.n_components),
                        actual: format!("{} columns", pis.n_cols()),
                    });
                }
                self.pis = Some(pis);
                Ok(())
            }
            other => Err(MezclaError::Other(format!(
                "Parameter bundle mismatch: expected bernoulli, got {}",
                other.family()
            ))),
        }
    }

    fn clone_box(&self) -> Box<dyn Emission> {
        Box::new(self.clone())
    }
}

/// Bernoulli emission model supporting missing values (full-information
/// maximum likelihood).
///
/// Missing entries are marked `f64::NAN`. Each feature's M-step normalizer
/// only uses responsibility mass from individuals observed on that feature,
/// and unobserved entries contribute zero log-likelihood mass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BernoulliNan {
    /// Number of latent classes.
    n_components: usize,
    /// Success probability table after initialization (`K x C`).
    pis: Option<Matrix<f64>>,
}

impl BernoulliNan {
    /// Creates an uninitialized missing-data Bernoulli emission model.
    #[must_use]
    pub fn new(n_components: usize) -> Self {
        Self {
            n_components,
            pis: None,
        }
    }

    /// Fitted success probability table (`n_features x n_components`).
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    #[must_use]
    pub fn pis(&self) -> &Matrix<f64> {
        self.pis
            .as_ref()
            .expect("Model not initialized. Call initialize() first.")
    }

    fn masked_m_step(x: &Matrix<f64>, resp: &Matrix<f64>) -> Matrix<f64> {
        let (n_samples, n_features) = x.shape();
        let n_components = resp.n_cols();

        let mut pis = Matrix::zeros(n_features, n_components);
        for k in 0..n_features {
            for c in 0..n_components {
                let mut num = 0.0;
                let mut mass = 0.0;
                for i in 0..n_samples {
                    let v = x.get(i, k);
                    if v.is_nan() {
                        continue;
                    }
                    num += v * resp.get(i, c);
                    mass += resp.get(i, c);
                }
                pis.set(k, c, clip_prob(num / mass));
            }
        }
        pis
    }
}

impl Emission for BernoulliNan {
    fn family(&self) -> &'static str {
        "bernoulli_nan"
    }

    fn validate(&self, x: &Matrix<f64>) -> Result<()> {
        // NaN is the missing marker here; only infinities are rejected.
        let (n_rows, n_cols) = x.shape();
        for i in 0..n_rows {
            for j in 0..n_cols {
                if x.get(i, j).is_infinite() {
                    return Err(MezclaError::DimensionMismatch {
                        expected: "finite or NaN entries".to_string(),
                        actual: format!("infinite value at row {i}, column {j}"),
                    });
                }
            }
        }
        Ok(())
    }

    fn initialize(&mut self, x: &Matrix<f64>, rng: &mut StdRng) {
        let resp = random_resp(x.n_rows(), self.n_components, rng);
        self.pis = Some(Self::masked_m_step(x, &resp));
    }

    fn m_step(&mut self, x: &Matrix<f64>, resp: &Matrix<f64>) {
        self.pis = Some(Self::masked_m_step(x, resp));
    }

    fn log_likelihood(&self, x: &Matrix<f64>) -> Matrix<f64> {
        let pis = self.pis();
        let log_pis = pis.map(|p| clip_prob(p).ln());
        let log_one_minus = pis.map(|p| (1.0 - clip_prob(p)).ln());

        // Mask both the X and (1 - X) terms so unobserved entries carry no
        // likelihood mass.
        let observed_x = x.map(|v| if v.is_nan() { 0.0 } else { v });
        let observed_complement = x.map(|v| if v.is_nan() { 0.0 } else { 1.0 - v });

        let on = observed_x
            .matmul(&log_pis)
            .expect("feature counts of X and pis match");
        let off = observed_complement
            .matmul(&log_one_minus)
            .expect("feature counts of X and pis match");
        on.add(&off).expect("both terms share the same shape")
    }

    fn sample(&self, class_no: usize, n_samples: usize, rng: &mut StdRng) -> Result<Matrix<f64>> {
        let pis = self.pis();
        let n_features = pis.n_rows();
        let mut out = Matrix::zeros(n_samples, n_features);
        for i in 0..n_samples {
            for k in 0..n_features {
                let u: f64 = rng.gen_range(0.0..1.0);
                out.set(i, k, if u < pis.get(k, class_no) { 1.0 } else { 0.0 });
            }
        }
        Ok(out)
    }

    fn n_parameters(&self) -> usize {
        let (rows, cols) = self.pis().shape();
        rows * cols
    }

    fn parameters(&self) -> EmissionParameters {
        EmissionParameters::Bernoulli {
            pis: self.pis().clone(),
        }
    }

    fn set_parameters(&mut self, params: EmissionParameters) -> Result<()> {
        match params {
            EmissionParameters::Bernoulli { pis } => {
                if pis.n_cols() != self.n_components {
                    return Err(MezclaError::DimensionMismatch {
                        expected: format!("pis with {} columns", self.n_components),
                        actual: format!("{} columns", pis.n_cols()),
                    });
                }
                self.pis = Some(pis);
                Ok(())
            }
            other => Err(MezclaError::Other(format!(
                "Parameter bundle mismatch: expected bernoulli, got {}",
                other.family()
            ))),
        }
    }

    fn clone_box(&self) -> Box<dyn Emission> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::PROB_CLIP;
    use rand::SeedableRng;

    fn two_block_data() -> Matrix<f64> {
        // Rows 0-3 light up the first two features, rows 4-7 the last two.
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&[1.0, 1.0, 0.0, 0.0]);
        }
        for _ in 0..4 {
            data.extend_from_slice(&[0.0, 0.0, 1.0, 1.0]);
        }
        Matrix::from_vec(8, 4, data).expect("valid matrix")
    }

    fn one_hot_resp() -> Matrix<f64> {
        let mut resp = Matrix::zeros(8, 2);
        for i in 0..4 {
            resp.set(i, 0, 1.0);
        }
        for i in 4..8 {
            resp.set(i, 1, 1.0);
        }
        resp
    }

    #[test]
    fn test_m_step_recovers_block_structure() {
        let x = two_block_data();
        let mut model = Bernoulli::new(2);
        let mut rng = StdRng::seed_from_u64(0);
        model.initialize(&x, &mut rng);
        model.m_step(&x, &one_hot_resp());

        let pis = model.pis();
        assert!(pis.get(0, 0) > 0.99);
        assert!(pis.get(2, 0) < 0.01);
        assert!(pis.get(2, 1) > 0.99);
        assert!(pis.get(0, 1) < 0.01);
    }

    #[test]
    fn test_pis_strictly_inside_clip_bound() {
        let x = two_block_data();
        let mut model = Bernoulli::new(2);
        model.m_step(&x, &one_hot_resp());
        let pis = model.pis();
        for k in 0..4 {
            for c in 0..2 {
                let p = pis.get(k, c);
                assert!(p >= PROB_CLIP && p <= 1.0 - PROB_CLIP);
                assert!(p.ln().is_finite());
            }
        }
    }

    #[test]
    fn test_log_likelihood_finite_and_ordered() {
        let x = two_block_data();
        let mut model = Bernoulli::new(2);
        model.m_step(&x, &one_hot_resp());
        let ll = model.log_likelihood(&x);
        assert_eq!(ll.shape(), (8, 2));
        // Row 0 matches class 0 far better than class 1.
        assert!(ll.get(0, 0) > ll.get(0, 1));
        assert!(ll.get(7, 1) > ll.get(7, 0));
        for i in 0..8 {
            for c in 0..2 {
                assert!(ll.get(i, c).is_finite());
            }
        }
    }

    #[test]
    fn test_initialize_gives_finite_log_likelihood() {
        let x = two_block_data();
        let mut model = Bernoulli::new(3);
        let mut rng = StdRng::seed_from_u64(123);
        model.initialize(&x, &mut rng);
        let ll = model.log_likelihood(&x);
        for i in 0..8 {
            for c in 0..3 {
                assert!(ll.get(i, c).is_finite());
            }
        }
    }

    #[test]
    fn test_sample_matches_fitted_distribution() {
        let x = two_block_data();
        let mut model = Bernoulli::new(2);
        model.m_step(&x, &one_hot_resp());

        let mut rng = StdRng::seed_from_u64(9);
        let draws = model.sample(0, 500, &mut rng).expect("bernoulli samples");
        assert_eq!(draws.shape(), (500, 4));
        let mean_0: f64 = (0..500).map(|i| draws.get(i, 0)).sum::<f64>() / 500.0;
        let mean_2: f64 = (0..500).map(|i| draws.get(i, 2)).sum::<f64>() / 500.0;
        assert!(mean_0 > 0.95);
        assert!(mean_2 < 0.05);
    }

    #[test]
    fn test_n_parameters() {
        let x = two_block_data();
        let mut model = Bernoulli::new(2);
        model.m_step(&x, &one_hot_resp());
        assert_eq!(model.n_parameters(), 8);
    }

    #[test]
    fn test_parameters_round_trip() {
        let x = two_block_data();
        let mut model = Bernoulli::new(2);
        model.m_step(&x, &one_hot_resp());

        let params = model.parameters();
        let mut rebuilt = Bernoulli::new(2);
        rebuilt.set_parameters(params).expect("matching bundle");
        assert_eq!(model.pis(), rebuilt.pis());
    }

    #[test]
    fn test_set_parameters_wrong_family() {
        let mut model = Bernoulli::new(2);
        let wrong = EmissionParameters::Gaussian {
            means: Matrix::zeros(2, 2),
            variances: Matrix::ones(2, 2),
        };
        assert!(model.set_parameters(wrong).is_err());
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut x = two_block_data();
        x.set(0, 0, f64::NAN);
        let model = Bernoulli::new(2);
        assert!(model.validate(&x).is_err());
    }

    #[test]
    fn test_nan_variant_validate_accepts_nan() {
        let mut x = two_block_data();
        x.set(0, 0, f64::NAN);
        let model = BernoulliNan::new(2);
        assert!(model.validate(&x).is_ok());
    }

    #[test]
    fn test_nan_m_step_ignores_missing_entries() {
        // Feature 0 is missing for half of class 0; the observed rows all
        // have the feature on, so the estimate should stay near 1.
        let mut x = two_block_data();
        x.set(0, 0, f64::NAN);
        x.set(1, 0, f64::NAN);

        let mut model = BernoulliNan::new(2);
        model.m_step(&x, &one_hot_resp());
        assert!(model.pis().get(0, 0) > 0.99);
    }

    #[test]
    fn test_nan_log_likelihood_masks_both_terms() {
        let mut x = two_block_data();
        x.set(0, 0, f64::NAN);

        let mut model = BernoulliNan::new(2);
        model.m_step(&x, &one_hot_resp());
        let ll = model.log_likelihood(&x);

        // The masked row still gets finite values; a row with one missing
        // feature can only be at least as likely as its fully observed twin.
        assert!(ll.get(0, 0).is_finite());
        assert!(ll.get(0, 0) >= ll.get(1, 0));
    }
}
