//! Patient context models.

use serde::{Deserialize, Serialize};

use super::Species;

/// The patient as entered in the form. Owned by the caller, read-only to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientContext {
    /// Active species (none until the user picks one)
    pub species: Option<Species>,
    /// Weight in kg
    pub weight_kg: Option<f64>,
    /// Age label chosen from the reference table
    pub age_label: Option<String>,
}

impl PatientContext {
    /// Create a context with species and weight.
    pub fn new(species: Species, weight_kg: f64) -> Self {
        Self {
            species: Some(species),
            weight_kg: Some(weight_kg),
            age_label: None,
        }
    }
}

/// One row of the age/weight reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightAgeEntry {
    /// Age label (e.g., "6 mois", "2 ans")
    pub label: String,
    /// Reference weight in kg
    pub weight_kg: f64,
}

impl WeightAgeEntry {
    pub fn new(label: impl Into<String>, weight_kg: f64) -> Self {
        Self {
            label: label.into(),
            weight_kg,
        }
    }
}
