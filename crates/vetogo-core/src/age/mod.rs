//! Age ↔ weight estimation.
//!
//! - [`AgeWeightTable`]: discrete lookup against labelled reference weights
//! - [`WeightModel`]: continuous estimation from an age in months

mod estimator;
mod models;

pub use estimator::*;
pub use models::*;
