//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use mezcla::prelude::*;
//! ```

pub use crate::emission::{
    BlockDescriptor, Emission, EmissionDescriptor, EmissionParameters, StructuralParams,
};
pub use crate::error::{MezclaError, Result};
pub use crate::mixture::{Assignment, Correction, LatentMixture, ModelParameters};
pub use crate::numeric::{identify_coef, modal};
pub use crate::primitives::{Matrix, Vector};
