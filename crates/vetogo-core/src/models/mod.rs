//! Domain models for the dosing engine.

mod calculation;
mod drug;
mod patient;

pub use calculation::*;
pub use drug::*;
pub use patient::*;
