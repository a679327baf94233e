//! Multinoulli (categorical) emission model.

use super::{random_resp, Emission, EmissionParameters};
use crate::error::{MezclaError, Result};
use crate::numeric::clip_prob;
use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Multinoulli (categorical) emission model.
///
/// Each of the K categorical features is one-hot encoded into an L-wide
/// block, so the data matrix has `K * L` columns. The parameter table
/// `pis[k * L + l, c]` is the probability that feature k takes outcome l in
/// class c; each K-block is a probability simplex over the L outcomes.
///
/// No per-block normalization is needed in the M-step because the
/// responsibility weighting is feature-independent: the ratio form used for
/// the binary family already yields simplex blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Multinoulli {
    /// Number of latent classes.
    n_components: usize,
    /// Possible outcomes per categorical feature.
    n_outcomes: usize,
    /// Outcome probability table after initialization (`K*L x C`).
    pis: Option<Matrix<f64>>,
}

impl Multinoulli {
    /// Creates an uninitialized Multinoulli emission model with
    /// `n_outcomes` possible outcomes per feature.
    #[must_use]
    pub fn new(n_components: usize, n_outcomes: usize) -> Self {
        Self {
            n_components,
            n_outcomes,
            pis: None,
        }
    }

    /// Fitted outcome probability table (`(K * L) x n_components`).
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

    /// Number of categorical features K derived from the fitted table.
    fn n_features(&self) -> usize {
        self.pis().n_rows() / self.n_outcomes
    }

    fn ratio_m_step(x: &Matrix<f64>, resp: &Matrix<f64>) -> Matrix<f64> {
        let mut pis = x
            .transpose()
            .matmul(resp)
            .expect("sample counts of X and responsibilities match");
        let (n_rows, n_components) = pis.shape();
        for c in 0..n_components {
            let mass: f64 = (0..resp.n_rows()).map(|i| resp.get(i, c)).sum();
            for r in 0..n_rows {
                pis.set(r, c, clip_prob(pis.get(r, c) / mass));
            }
        }
        pis
    }
}

impl Emission for Multinoulli {
    fn family(&self) -> &'static str {
        "multinoulli"
    }

    fn validate(&self, x: &Matrix<f64>) -> Result<()> {
        super::check_finite(x, self.family())?;
        if x.n_cols() % self.n_outcomes != 0 {
            return Err(MezclaError::DimensionMismatch {
                expected: format!("column count divisible by n_outcomes = {}", self.n_outcomes),
                actual: format!("{} columns", x.n_cols()),
            });
        }
        Ok(())
    }

    fn initialize(&mut self, x: &Matrix<f64>, rng: &mut StdRng) {
        let resp = random_resp(x.n_rows(), self.n_components, rng);
        self.pis = Some(Self::ratio_m_step(x, &resp));
    }

    fn m_step(&mut self, x: &Matrix<f64>, resp: &Matrix<f64>) {
        self.pis = Some(Self::ratio_m_step(x, resp));
    }

    fn log_likelihood(&self, x: &Matrix<f64>) -> Matrix<f64> {
        // One term per active one-hot entry: X log(pis).
        let log_pis = self.pis().map(|p| clip_prob(p).ln());
        x.matmul(&log_pis)
            .expect("column counts of X and pis match")
    }

    fn sample(&self, class_no: usize, n_samples: usize, rng: &mut StdRng) -> Result<Matrix<f64>> {
        let pis = self.pis();
        let n_features = self.n_features();
        let l = self.n_outcomes;

        let mut out = Matrix::zeros(n_samples, n_features * l);
        for i in 0..n_samples {
            // One multinomial trial per feature block, re-interleaved into
            // the K*L column layout.
            for k in 0..n_features {
                let block: Vec<f64> = (0..l).map(|o| pis.get(k * l + o, class_no)).collect();
                let total: f64 = block.iter().sum();
                let mut u: f64 = rng.gen_range(0.0..1.0) * total;
                let mut chosen = l - 1;
                for (o, &p) in block.iter().enumerate() {
                    if u < p {
                        chosen = o;
                        break;
                    }
                    u -= p;
                }
                out.set(i, k * l + chosen, 1.0);
            }
        }
        Ok(out)
    }

    fn n_parameters(&self) -> usize {
        let (rows, cols) = self.pis().shape();
        rows * cols
    }

    fn parameters(&self) -> EmissionParameters {
        EmissionParameters::Multinoulli {
            pis: self.pis().clone(),
            n_outcomes: self.n_outcomes,
        }
    }

    fn set_parameters(&mut self, params: EmissionParameters) -> Result<()> {
        match params {
            EmissionParameters::Multinoulli { pis, n_outcomes } => {
                if pis.n_cols() != self.n_components {
                    return Err(MezclaError::DimensionMismatch {
                        expected: format!("pis with {} columns", self.n_components),
                        actual: format!("{} columns", pis.n_cols()),
                    });
                }
                if n_outcomes != self.n_outcomes || pis.n_rows() % n_outcomes != 0 {
                    return Err(MezclaError::DimensionMismatch {
                        expected: format!("row count divisible by n_outcomes = {}", self.n_outcomes),
                        actual: format!("{} rows, n_outcomes = {n_outcomes}", pis.n_rows()),
                    });
                }
                self.pis = Some(pis);
                Ok(())
            }
            other => Err(MezclaError::Other(format!(
                "Parameter bundle mismatch: expected multinoulli, got {}",
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
    use rand::SeedableRng;

    /// Two categorical features with three outcomes each, one-hot encoded.
    /// Class 0 rows take outcome 0 twice; class 1 rows take outcome 2 twice.
    fn one_hot_data() -> (Matrix<f64>, Matrix<f64>) {
        let mut data = Vec::new();
        for _ in 0..5 {
            data.extend_from_slice(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        }
        for _ in 0..5 {
            data.extend_from_slice(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        }
        let x = Matrix::from_vec(10, 6, data).expect("valid matrix");

        let mut resp = Matrix::zeros(10, 2);
        for i in 0..5 {
            resp.set(i, 0, 1.0);
        }
        for i in 5..10 {
            resp.set(i, 1, 1.0);
        }
        (x, resp)
    }

    #[test]
    fn test_m_step_blocks_are_simplexes() {
        let (x, resp) = one_hot_data();
        let mut model = Multinoulli::new(2, 3);
        model.m_step(&x, &resp);

        let pis = model.pis();
        for c in 0..2 {
            for k in 0..2 {
                let block_sum: f64 = (0..3).map(|o| pis.get(k * 3 + o, c)).sum();
                assert!((block_sum - 1.0).abs() < 1e-9, "block sum {block_sum}");
            }
        }
        assert!(pis.get(0, 0) > 0.99);
        assert!(pis.get(2, 1) > 0.99);
    }

    #[test]
    fn test_log_likelihood_prefers_matching_class() {
        let (x, resp) = one_hot_data();
        let mut model = Multinoulli::new(2, 3);
        model.m_step(&x, &resp);
        let ll = model.log_likelihood(&x);
        assert!(ll.get(0, 0) > ll.get(0, 1));
        assert!(ll.get(9, 1) > ll.get(9, 0));
    }

    #[test]
    fn test_validate_rejects_misaligned_columns() {
        let model = Multinoulli::new(2, 3);
        let x = Matrix::zeros(4, 5);
        assert!(model.validate(&x).is_err());
    }

    #[test]
    fn test_sample_rows_are_one_hot_per_block() {
        let (x, resp) = one_hot_data();
        let mut model = Multinoulli::new(2, 3);
        model.m_step(&x, &resp);

        let mut rng = StdRng::seed_from_u64(5);
        let draws = model.sample(0, 100, &mut rng).expect("multinoulli samples");
        assert_eq!(draws.shape(), (100, 6));
        for i in 0..100 {
            for k in 0..2 {
                let block_sum: f64 = (0..3).map(|o| draws.get(i, k * 3 + o)).sum();
                assert!((block_sum - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_initialize_finite() {
        let (x, _) = one_hot_data();
        let mut model = Multinoulli::new(3, 3);
        let mut rng = StdRng::seed_from_u64(11);
        model.initialize(&x, &mut rng);
        let ll = model.log_likelihood(&x);
        for i in 0..10 {
            for c in 0..3 {
                assert!(ll.get(i, c).is_finite());
            }
        }
    }

    #[test]
    fn test_parameters_round_trip() {
        let (x, resp) = one_hot_data();
        let mut model = Multinoulli::new(2, 3);
        model.m_step(&x, &resp);

        let mut rebuilt = Multinoulli::new(2, 3);
        rebuilt
            .set_parameters(model.parameters())
            .expect("matching bundle");
        assert_eq!(model.pis(), rebuilt.pis());
        assert_eq!(model.n_parameters(), 12);
    }
}
