//! Unit canonicalization and dimensional compatibility.

mod normalizer;

pub use normalizer::*;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unit errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit: {0}")]
    Unknown(String),

    #[error("Incompatible units: {dose_unit} ({dose_family}) cannot be divided by {concentration_unit} ({concentration_family})")]
    Incompatible {
        dose_unit: String,
        dose_family: UnitFamily,
        concentration_unit: String,
        concentration_family: UnitFamily,
    },
}

pub type UnitResult<T> = Result<T, UnitError>;

/// Dimensional family of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFamily {
    /// g, mg, µg, ng: convertible through a mg base
    Mass,
    /// UI, mEq, mmol: atomic, never inter-converted
    Count,
    /// mL, L: the dose is already an administration volume
    Volume,
}

impl fmt::Display for UnitFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitFamily::Mass => write!(f, "mass"),
            UnitFamily::Count => write!(f, "count"),
            UnitFamily::Volume => write!(f, "volume"),
        }
    }
}

/// A canonical unit token with its family and base factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalUnit {
    /// Canonical display token (e.g., "mg", "µg", "UI", "mL")
    pub token: String,
    /// Dimensional family
    pub family: UnitFamily,
    /// Multiply by this to reach the family base (mg or mL); 1.0 for counts
    pub to_base: f64,
}

impl CanonicalUnit {
    pub fn new(token: &str, family: UnitFamily, to_base: f64) -> Self {
        Self {
            token: token.to_string(),
            family,
            to_base,
        }
    }

    /// Milligram, the default concentration numerator.
    pub fn milligram() -> Self {
        Self::new("mg", UnitFamily::Mass, 1.0)
    }

    /// Millilitre, the unit of every computed volume.
    pub fn millilitre() -> Self {
        Self::new("mL", UnitFamily::Volume, 1.0)
    }
}

impl fmt::Display for CanonicalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}

/// Optional time basis of an infusion-rate dose (`mg/kg/h`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBasis {
    PerMinute,
    PerHour,
    PerDay,
}

impl TimeBasis {
    /// Suffix appended to rate labels.
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeBasis::PerMinute => "/min",
            TimeBasis::PerHour => "/h",
            TimeBasis::PerDay => "/j",
        }
    }
}

/// A parsed catalog dose label: base unit plus optional time basis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseUnit {
    pub unit: CanonicalUnit,
    pub per_time: Option<TimeBasis>,
}

impl DoseUnit {
    pub fn new(unit: CanonicalUnit) -> Self {
        Self {
            unit,
            per_time: None,
        }
    }
}

/// How to bring a dose expressed in one unit into a concentration's numerator unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub family: UnitFamily,
    /// Multiply a dose amount by this before dividing by the concentration
    pub factor: f64,
}
