//! Class-conditional emission models.
//!
//! Each emission model encapsulates one distribution family over the
//! observed columns: how to initialize its parameters, update them from
//! responsibilities (the M-step), evaluate per-class log densities (the
//! E-step input), draw synthetic observations, and count free parameters.
//!
//! Models plug into the EM engine through the [`Emission`] trait. The
//! [`Nested`] variant composes several models over disjoint column blocks,
//! so heterogeneous data (say, binary indicators next to continuous
//! measures) fits a single latent class structure.

mod bernoulli;
mod categorical;
mod covariate;
mod gaussian;
mod nested;

pub use bernoulli::{Bernoulli, BernoulliNan};
pub use categorical::Multinoulli;
pub use covariate::{Covariate, StructuralParams};
pub use gaussian::{CovarianceKind, Gaussian};
pub use nested::Nested;

use crate::error::{MezclaError, Result};
use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capability set every emission model implements.
///
/// Lifecycle: a model starts uninitialized, becomes initialized after
/// [`Emission::initialize`] produces a valid random starting parameter set,
/// and is fitted once at least one [`Emission::m_step`] has run against
/// real responsibilities. `log_likelihood`, `sample`, `n_parameters` and
/// `parameters` are only valid from the initialized state onward and panic
/// before it.
pub trait Emission: Send + Sync + fmt::Debug {
    /// Checks that the data matrix is compatible with this model.
    ///
    /// # Errors
    ///
    /// Returns a dimension/consistency error for incompatible column
    /// layouts or unsupported missing values. Runs before any EM pass.
    fn validate(&self, x: &Matrix<f64>) -> Result<()> {
        check_finite(x, self.family())
    }

    /// Short family name used in descriptors and error messages.
    fn family(&self) -> &'static str;

    /// Produces a valid random starting parameter set.
    ///
    /// The resulting parameters always yield a finite log-likelihood.
    fn initialize(&mut self, x: &Matrix<f64>, rng: &mut StdRng);

    /// Updates parameters to maximize the expected complete-data
    /// log-likelihood under fixed responsibilities.
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    fn m_step(&mut self, x: &Matrix<f64>, resp: &Matrix<f64>);

    /// Per-sample, per-class log emission densities (class priors not
    /// included): an `n_samples x n_components` matrix.
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    fn log_likelihood(&self, x: &Matrix<f64>) -> Matrix<f64>;

    /// Draws `n_samples` synthetic observations from one class's fitted
    /// distribution.
    ///
    /// # Errors
    ///
    /// Returns an error for families that do not define a sampling
    /// distribution (covariate regression).
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    fn sample(&self, class_no: usize, n_samples: usize, rng: &mut StdRng) -> Result<Matrix<f64>>;

    /// Number of free parameters, used by AIC/BIC.
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    fn n_parameters(&self) -> usize;

    /// Extracts the fitted parameter bundle.
    ///
    /// # Panics
    ///
    /// Panics if the model was never initialized.
    fn parameters(&self) -> EmissionParameters;

    /// Reinjects a parameter bundle previously produced by
    /// [`Emission::parameters`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bundle belongs to a different family or has
    /// an incompatible shape.
    fn set_parameters(&mut self, params: EmissionParameters) -> Result<()>;

    /// Clones this model behind a fresh box (per-restart copies).
    fn clone_box(&self) -> Box<dyn Emission>;
}

impl Clone for Box<dyn Emission> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Fitted parameter bundle for one emission model.
///
/// Shapes mirror the model internals: probability tables are
/// `n_features x n_components` (`n_features * n_outcomes` rows for the
/// categorical family), regression coefficients are
/// `n_covariates x n_components` with a separate `1 x n_components`
/// intercept row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmissionParameters {
    /// Bernoulli success probability table.
    Bernoulli {
        /// `n_features x n_components` success probabilities.
        pis: Matrix<f64>,
    },
    /// Multinoulli outcome probability table.
    Multinoulli {
        /// `(n_features * n_outcomes) x n_components` outcome probabilities.
        pis: Matrix<f64>,
        /// Outcomes per categorical feature.
        n_outcomes: usize,
    },
    /// Gaussian means and variances.
    Gaussian {
        /// `n_components x n_features` means.
        means: Matrix<f64>,
        /// `n_components x n_features` variances.
        variances: Matrix<f64>,
    },
    /// Multinomial logistic regression coefficients.
    Covariate {
        /// `n_covariates x n_components` feature coefficients.
        coef: Matrix<f64>,
        /// `1 x n_components` intercepts.
        intercept: Matrix<f64>,
    },
    /// Per-block bundles of a nested model, in block order.
    Nested(Vec<EmissionParameters>),
}

impl EmissionParameters {
    /// Family name of this bundle, for error messages.
    #[must_use]
    pub fn family(&self) -> &'static str {
        match self {
            EmissionParameters::Bernoulli { .. } => "bernoulli",
            EmissionParameters::Multinoulli { .. } => "multinoulli",
            EmissionParameters::Gaussian { .. } => "gaussian",
            EmissionParameters::Covariate { .. } => "covariate",
            EmissionParameters::Nested(_) => "nested",
        }
    }
}

/// Configuration describing which emission model to build.
///
/// A bare name covers all columns with one homogeneous family. Blocks
/// describe a nested composite over disjoint column ranges.
///
/// # Examples
///
/// ```
/// use mezcla::emission::{BlockDescriptor, EmissionDescriptor};
///
/// let homogeneous = EmissionDescriptor::from("bernoulli");
/// let nested = EmissionDescriptor::Blocks(vec![
///     BlockDescriptor::new("bernoulli", 3),
///     BlockDescriptor::new("multinoulli", 2).with_n_outcomes(4),
/// ]);
/// assert_ne!(homogeneous, nested);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EmissionDescriptor {
    /// One distribution family covering every column.
    Name(String),
    /// Nested composite: ordered blocks over disjoint column ranges.
    Blocks(Vec<BlockDescriptor>),
}

impl From<&str> for EmissionDescriptor {
    fn from(name: &str) -> Self {
        EmissionDescriptor::Name(name.to_string())
    }
}

/// One block of a nested emission descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    /// Distribution family name.
    pub model: String,
    /// Number of features in this block.
    pub n_features: usize,
    /// Outcomes per feature (categorical blocks only; 1 otherwise).
    pub n_outcomes: usize,
}

impl BlockDescriptor {
    /// Creates a block with a single outcome per feature.
    #[must_use]
    pub fn new(model: impl Into<String>, n_features: usize) -> Self {
        Self {
            model: model.into(),
            n_features,
            n_outcomes: 1,
        }
    }

    /// Sets the number of outcomes per categorical feature.
    #[must_use]
    pub fn with_n_outcomes(mut self, n_outcomes: usize) -> Self {
        self.n_outcomes = n_outcomes;
        self
    }

    /// Columns this block consumes in the data matrix.
    #[must_use]
    pub fn width(&self) -> usize {
        if self.model == "multinoulli" {
            self.n_features * self.n_outcomes
        } else {
            self.n_features
        }
    }
}

/// Valid emission family names.
pub const KNOWN_FAMILIES: [&str; 7] = [
    "bernoulli",
    "bernoulli_nan",
    "multinoulli",
    "gaussian_unit",
    "gaussian_spherical",
    "gaussian_diag",
    "covariate",
];

/// Builds an emission model from its descriptor.
///
/// # Errors
///
/// Returns a configuration error for unknown family names or malformed
/// nested blocks (zero features, missing outcome count, empty block list).
pub fn build_emission(
    descriptor: &EmissionDescriptor,
    n_components: usize,
    structural_params: &StructuralParams,
) -> Result<Box<dyn Emission>> {
    match descriptor {
        EmissionDescriptor::Name(name) => {
            build_single(name, 2, n_components, structural_params)
        }
        EmissionDescriptor::Blocks(blocks) => {
            if blocks.is_empty() {
                return Err(MezclaError::InvalidHyperparameter {
                    param: "emission".to_string(),
                    value: "[]".to_string(),
                    constraint: "at least one block in a nested descriptor".to_string(),
                });
            }
            let mut built = Vec::with_capacity(blocks.len());
            for block in blocks {
                if block.n_features == 0 {
                    return Err(MezclaError::InvalidHyperparameter {
                        param: "n_features".to_string(),
                        value: "0".to_string(),
                        constraint: ">= 1 in every nested block".to_string(),
                    });
                }
                if block.model == "multinoulli" && block.n_outcomes < 2 {
                    return Err(MezclaError::InvalidHyperparameter {
                        param: "n_outcomes".to_string(),
                        value: block.n_outcomes.to_string(),
                        constraint: ">= 2 for multinoulli blocks".to_string(),
                    });
                }
                if block.model != "multinoulli" && block.n_outcomes != 1 {
                    return Err(MezclaError::InvalidHyperparameter {
                        param: "n_outcomes".to_string(),
                        value: block.n_outcomes.to_string(),
                        constraint: "1 for non-categorical blocks".to_string(),
                    });
                }
                let model =
                    build_single(&block.model, block.n_outcomes, n_components, structural_params)?;
                built.push((model, block.width()));
            }
            Ok(Box::new(Nested::new(built)))
        }
    }
}

fn build_single(
    name: &str,
    n_outcomes: usize,
    n_components: usize,
    structural_params: &StructuralParams,
) -> Result<Box<dyn Emission>> {
    let model: Box<dyn Emission> = match name {
        "bernoulli" => Box::new(Bernoulli::new(n_components)),
        "bernoulli_nan" => Box::new(BernoulliNan::new(n_components)),
        "multinoulli" => Box::new(Multinoulli::new(n_components, n_outcomes)),
        "gaussian_unit" => Box::new(Gaussian::new(n_components, CovarianceKind::Unit)),
        "gaussian_spherical" => Box::new(Gaussian::new(n_components, CovarianceKind::Spherical)),
        "gaussian_diag" => Box::new(Gaussian::new(n_components, CovarianceKind::Diag)),
        "covariate" => Box::new(Covariate::new(n_components).with_params(structural_params)),
        _ => {
            return Err(MezclaError::InvalidHyperparameter {
                param: "emission".to_string(),
                value: name.to_string(),
                constraint: format!("one of {:?}", KNOWN_FAMILIES),
            })
        }
    };
    Ok(model)
}

/// Uniform random responsibilities: each row is an independent draw on the
/// simplex, used to bootstrap a model's first M-step.
pub(crate) fn random_resp(n_samples: usize, n_components: usize, rng: &mut StdRng) -> Matrix<f64> {
    let mut resp = Matrix::zeros(n_samples, n_components);
    for i in 0..n_samples {
        let mut total = 0.0;
        for c in 0..n_components {
            let v: f64 = rng.gen_range(1e-6..1.0);
            resp.set(i, c, v);
            total += v;
        }
        for c in 0..n_components {
            resp.set(i, c, resp.get(i, c) / total);
        }
    }
    resp
}

/// Rejects non-finite entries for families without missing-data support.
pub(crate) fn check_finite(x: &Matrix<f64>, family: &str) -> Result<()> {
    let (n_rows, n_cols) = x.shape();
    for i in 0..n_rows {
        for j in 0..n_cols {
            if !x.get(i, j).is_finite() {
                return Err(MezclaError::DimensionMismatch {
                    expected: format!("finite entries ({family} does not support missing values)"),
                    actual: format!("non-finite value at row {i}, column {j}"),
                });
            }
        }
    }
    Ok(())
}
