//! Mezcla: latent class mixture models in pure Rust.
//!
//! Mezcla estimates latent class mixture models: given observed indicator
//! variables (and optionally external covariates or outcomes), it infers a
//! small number of unobserved classes, the probability of membership in
//! each class, and class-conditional distributions over the observed
//! variables.
//!
//! Estimation runs a numerically stable Expectation-Maximization loop in
//! log space, with multiple seeded restarts and best-of-N selection. The
//! measurement model (how classes generate the indicators) and the
//! structural model (how classes relate to covariates/outcomes) can be fit
//! jointly in one step, sequentially in two steps, or with an intermediate
//! bias-correction stage in three steps.
//!
//! # Quick Start
//!
//! ```
//! use mezcla::prelude::*;
//!
//! // Two latent classes over four binary indicators.
//! let mut data = Vec::new();
//! for _ in 0..15 {
//!     data.extend_from_slice(&[1.0, 1.0, 0.0, 0.0]);
//! }
//! for _ in 0..15 {
//!     data.extend_from_slice(&[0.0, 0.0, 1.0, 1.0]);
//! }
//! let x = Matrix::from_vec(30, 4, data).expect("valid matrix");
//!
//! let mut model = LatentMixture::new(2, "bernoulli")
//!     .with_n_init(4)
//!     .with_random_state(42);
//! model.fit(&x, None).expect("fit succeeds");
//!
//! let proba = model.predict_proba(&x, None);
//! assert_eq!(proba.shape(), (30, 2));
//! assert!(model.score(&x, None).is_finite());
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Vector and Matrix types
//! - [`emission`]: Class-conditional emission model families
//! - [`mixture`]: EM engine, multi-step estimation, scoring
//! - [`numeric`]: Shared log-space numeric utilities
//! - [`error`]: Error types

pub mod emission;
pub mod error;
pub mod mixture;
pub mod numeric;
pub mod prelude;
pub mod primitives;
