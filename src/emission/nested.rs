//! Nested composite emission model over disjoint column blocks.

use super::{Emission, EmissionParameters};
use crate::error::{MezclaError, Result};
use crate::primitives::Matrix;
use rand::rngs::StdRng;

/// Composite emission model: ordered sub-models over disjoint column
/// blocks of the data matrix.
///
/// Each block owns a contiguous range of columns and dispatches the full
/// emission contract to its inner model; per-class log-likelihoods sum
/// across blocks (features are independent given the class), samples
/// concatenate, and parameter counts add up.
#[derive(Debug)]
pub struct Nested {
    /// Sub-models with the column width each one consumes.
    blocks: Vec<(Box<dyn Emission>, usize)>,
}

impl Clone for Nested {
    fn clone(&self) -> Self {
        Self {
            blocks: self
                .blocks
                .iter()
                .map(|(model, width)| (model.clone_box(), *width))
                .collect(),
        }
    }
}

impl Nested {
    /// Creates a composite from sub-models and their column widths.
    #[must_use]
    pub fn new(blocks: Vec<(Box<dyn Emission>, usize)>) -> Self {
        Self { blocks }
    }

    /// Total number of data columns the composite expects.
    #[must_use]
    pub fn total_width(&self) -> usize {
        self.blocks.iter().map(|(_, width)| width).sum()
    }

    fn check_width(&self, x: &Matrix<f64>) -> Result<()> {
        let expected = self.total_width();
        if x.n_cols() != expected {
            return Err(MezclaError::DimensionMismatch {
                expected: format!("{expected} columns across nested blocks"),
                actual: format!("{} columns", x.n_cols()),
            });
        }
        Ok(())
    }
}

impl Emission for Nested {
    fn family(&self) -> &'static str {
        "nested"
    }

    fn validate(&self, x: &Matrix<f64>) -> Result<()> {
        self.check_width(x)?;
        let mut start = 0;
        for (model, width) in &self.blocks {
            model.validate(&x.slice_columns(start, *width))?;
            start += width;
        }
        Ok(())
    }

    fn initialize(&mut self, x: &Matrix<f64>, rng: &mut StdRng) {
        let mut start = 0;
        for (model, width) in &mut self.blocks {
            model.initialize(&x.slice_columns(start, *width), rng);
            start += *width;
        }
    }

    fn m_step(&mut self, x: &Matrix<f64>, resp: &Matrix<f64>) {
        let mut start = 0;
        for (model, width) in &mut self.blocks {
            model.m_step(&x.slice_columns(start, *width), resp);
            start += *width;
        }
    }

    fn log_likelihood(&self, x: &Matrix<f64>) -> Matrix<f64> {
        let mut total: Option<Matrix<f64>> = None;
        let mut start = 0;
        for (model, width) in &self.blocks {
            let block_ll = model.log_likelihood(&x.slice_columns(start, *width));
            total = Some(match total {
                Some(acc) => acc
                    .add(&block_ll)
                    .expect("every block yields an n_samples x n_components matrix"),
                None => block_ll,
            });
            start += width;
        }
        total.expect("a nested model always has at least one block")
    }

    fn sample(&self, class_no: usize, n_samples: usize, rng: &mut StdRng) -> Result<Matrix<f64>> {
        let mut out: Option<Matrix<f64>> = None;
        for (model, _) in &self.blocks {
            let block = model.sample(class_no, n_samples, rng)?;
            out = Some(match out {
                Some(acc) => acc
                    .hcat(&block)
                    .expect("every block draws the same number of samples"),
                None => block,
            });
        }
        out.ok_or_else(|| MezclaError::Other("nested model has no blocks".to_string()))
    }

    fn n_parameters(&self) -> usize {
        self.blocks.iter().map(|(model, _)| model.n_parameters()).sum()
    }

    fn parameters(&self) -> EmissionParameters {
        EmissionParameters::Nested(
            self.blocks
                .iter()
                .map(|(model, _)| model.parameters())
                .collect(),
        )
    }

    fn set_parameters(&mut self, params: EmissionParameters) -> Result<()> {
        match params {
            EmissionParameters::Nested(bundles) => {
                if bundles.len() != self.blocks.len() {
                    return Err(MezclaError::DimensionMismatch {
                        expected: format!("{} block bundles", self.blocks.len()),
                        actual: format!("{} block bundles", bundles.len()),
                    });
                }
                for ((model, _), bundle) in self.blocks.iter_mut().zip(bundles) {
                    model.set_parameters(bundle)?;
                }
                Ok(())
            }
            other => Err(MezclaError::Other(format!(
                "Parameter bundle mismatch: expected nested, got {}",
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
    use crate::emission::{Bernoulli, CovarianceKind, Gaussian};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Two binary columns followed by one continuous column.
    fn mixed_data() -> (Matrix<f64>, Matrix<f64>) {
        let mut data = Vec::new();
        for i in 0..10 {
            if i < 5 {
                data.extend_from_slice(&[1.0, 1.0, -3.0 - 0.1 * i as f64]);
            } else {
                data.extend_from_slice(&[0.0, 0.0, 3.0 + 0.1 * i as f64]);
            }
        }
        let x = Matrix::from_vec(10, 3, data).expect("valid matrix");
        let mut resp = Matrix::zeros(10, 2);
        for i in 0..5 {
            resp.set(i, 0, 1.0);
        }
        for i in 5..10 {
            resp.set(i, 1, 1.0);
        }
        (x, resp)
    }

    fn mixed_model() -> Nested {
        Nested::new(vec![
            (Box::new(Bernoulli::new(2)) as Box<dyn Emission>, 2),
            (
                Box::new(Gaussian::new(2, CovarianceKind::Diag)) as Box<dyn Emission>,
                1,
            ),
        ])
    }

    #[test]
    fn test_total_width() {
        assert_eq!(mixed_model().total_width(), 3);
    }

    #[test]
    fn test_validate_checks_width() {
        let model = mixed_model();
        assert!(model.validate(&Matrix::zeros(4, 3)).is_ok());
        assert!(model.validate(&Matrix::zeros(4, 4)).is_err());
    }

    fn fitted() -> Nested {
        let (x, resp) = mixed_data();
        let mut model = mixed_model();
        let mut rng = StdRng::seed_from_u64(17);
        model.initialize(&x, &mut rng);
        model.m_step(&x, &resp);
        model
    }

    #[test]
    fn test_log_likelihood_sums_blocks() {
        let (x, _) = mixed_data();
        let model = fitted();
        let ll = model.log_likelihood(&x);
        assert_eq!(ll.shape(), (10, 2));
        assert!(ll.get(0, 0) > ll.get(0, 1));
        assert!(ll.get(9, 1) > ll.get(9, 0));

        // Block sums equal the composite value.
        let bernoulli_ll = model.blocks[0].0.log_likelihood(&x.slice_columns(0, 2));
        let gaussian_ll = model.blocks[1].0.log_likelihood(&x.slice_columns(2, 1));
        for i in 0..10 {
            for c in 0..2 {
                let expected = bernoulli_ll.get(i, c) + gaussian_ll.get(i, c);
                assert!((ll.get(i, c) - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_sample_concatenates_blocks() {
        let model = fitted();
        let mut rng = StdRng::seed_from_u64(4);
        let draws = model.sample(0, 50, &mut rng).expect("mixed samples");
        assert_eq!(draws.shape(), (50, 3));
        // First block is binary, second is continuous near -3.
        for i in 0..50 {
            assert!(draws.get(i, 0) == 0.0 || draws.get(i, 0) == 1.0);
        }
        let mean: f64 = (0..50).map(|i| draws.get(i, 2)).sum::<f64>() / 50.0;
        assert!((mean + 3.2).abs() < 0.5, "sample mean {mean}");
    }

    #[test]
    fn test_n_parameters_sums() {
        let model = fitted();
        // Bernoulli: 2 features x 2 classes; Gaussian diag: 2 means + 2 vars.
        assert_eq!(model.n_parameters(), 8);
    }

    #[test]
    fn test_parameters_round_trip() {
        let model = fitted();
        let mut rebuilt = mixed_model();
        rebuilt
            .set_parameters(model.parameters())
            .expect("matching bundle");
        assert_eq!(rebuilt.n_parameters(), model.n_parameters());
        let (x, _) = mixed_data();
        assert_eq!(
            model.log_likelihood(&x).as_slice(),
            rebuilt.log_likelihood(&x).as_slice()
        );
    }

    #[test]
    fn test_set_parameters_wrong_block_count() {
        let model = fitted();
        let mut rebuilt = Nested::new(vec![(
            Box::new(Bernoulli::new(2)) as Box<dyn Emission>,
            2,
        )]);
        assert!(rebuilt.set_parameters(model.parameters()).is_err());
    }
}
